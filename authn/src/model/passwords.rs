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

//! The `Password` and `HashedPassword` data types.

use std::fmt;
use tokio::sync::OnceCell;
use wayfarer_core::model::{ModelError, ModelResult};

/// Work factor for bcrypt.  Each increment doubles the cost of hashing and verifying.
const HASH_COST: u32 = 12;

/// Minimum number of characters a new password must have.
const MIN_PASSWORD_CHARS: usize = 8;

/// Maximum number of bytes bcrypt takes into account.
const MAX_PASSWORD_BYTES: usize = 72;

/// Hash verified against when an account does not exist, so that lookups of unknown accounts
/// take as long as lookups of known ones.
static DUMMY_HASH: OnceCell<HashedPassword> = OnceCell::const_new();

/// An opaque type to hold a password, protecting it from leaking into logs.
#[derive(PartialEq)]
#[cfg_attr(any(test, feature = "testutils"), derive(Clone))]
pub struct Password(String);

impl Password {
    /// Creates a new password from a literal string.
    ///
    /// Length rules only apply when hashing so that credentials typed at login time are always
    /// compared instead of rejected upfront.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(ModelError("Please provide a password".to_owned()));
        }
        Ok(Password(s))
    }

    /// Returns a string view of the password.
    #[cfg(any(test, feature = "testutils"))]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hashes the password after validating its length.  Consumes the password because there is
    /// no context in which keeping the password alive once we have generated its hash is correct.
    ///
    /// Hashing is CPU-bound and slow on purpose, so it runs on the blocking thread pool.
    pub async fn hash(self) -> ModelResult<HashedPassword> {
        if self.0.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ModelError(format!(
                "Password must have at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }
        if self.0.len() > MAX_PASSWORD_BYTES {
            return Err(ModelError(format!(
                "Password must have at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(self.0, HASH_COST))
            .await
            .map_err(|e| ModelError(format!("Password hashing did not complete: {}", e)))?
            .map_err(|e| ModelError(format!("Password error: {}", e)))?;
        Ok(HashedPassword::new(hashed))
    }

    /// Verifies if this password matches a given `hash`.
    pub async fn verify(self, hash: &HashedPassword) -> ModelResult<bool> {
        let hash = hash.0.clone();
        tokio::task::spawn_blocking(move || bcrypt::verify(self.0, &hash))
            .await
            .map_err(|e| ModelError(format!("Password verification did not complete: {}", e)))?
            .map_err(|e| ModelError(format!("Password error: {}", e)))
    }
}

#[cfg(any(test, feature = "testutils"))]
impl From<&'static str> for Password {
    /// Creates a new password from a hardcoded string, which must be valid.
    fn from(s: &'static str) -> Self {
        Password::new(s).expect("Hardcoded passwords must be valid")
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scrubbed password")
    }
}

/// An opaque type to hold a hashed password, protecting it from leaking into logs.
#[derive(Clone, PartialEq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Creates a new hashed password from a literal string.
    pub fn new<S: Into<String>>(s: S) -> Self {
        HashedPassword(s.into())
    }

    /// Returns a string view of the hash.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scrubbed hash")
    }
}

/// Verifies `password` against the `hash` of an account, if the account exists.
///
/// Missing accounts still pay for one bcrypt verification against a dummy hash.
pub async fn verify_password(
    password: Password,
    hash: Option<&HashedPassword>,
) -> ModelResult<bool> {
    match hash {
        Some(hash) => password.verify(hash).await,
        None => {
            let dummy = DUMMY_HASH
                .get_or_try_init(|| async {
                    Password("correct horse battery staple".to_owned()).hash().await
                })
                .await?;
            password.verify(dummy).await?;
            Ok(false)
        }
    }
}
