// Wayfarer
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Password reset tokens.
//!
//! The plaintext token only ever travels to the account owner.  Storage keeps its digest, which
//! is what incoming reset requests are matched against.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::fmt;
use wayfarer_core::model::{ModelError, ModelResult};

/// Number of random bytes in a reset token.
const TOKEN_BYTES: usize = 32;

/// A plaintext password reset token.
#[derive(Clone, Eq, PartialEq)]
pub struct ResetToken(String);

impl ResetToken {
    /// Creates a token from the value the account owner presented.
    pub fn new<S: Into<String>>(token: S) -> ModelResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(ModelError("Token is invalid or has expired".to_owned()));
        }
        Ok(Self(token))
    }

    /// Generates a new random token.
    pub fn generate() -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns the plaintext form of the token, to be sent to the account owner.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Computes the digest of the token, which is what gets persisted.
    pub fn digest(&self) -> ResetTokenHash {
        ResetTokenHash(format!("{:x}", Sha256::digest(self.0.as_bytes())))
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scrubbed reset token")
    }
}

/// The hex-encoded SHA-256 digest of a `ResetToken`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResetTokenHash(String);

impl ResetTokenHash {
    /// Returns the textual form of the digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
