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

//! Session tokens: signed, stateless credentials asserting an account identity.

use derivative::Derivative;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use wayfarer_core::env::{get_optional_var, get_required_var};
use wayfarer_core::model::{ModelError, ModelResult};

/// Lifetime of tokens and cookies when not configured.
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Configuration of session tokens.
#[derive(Clone, Derivative)]
#[derivative(Debug, PartialEq)]
pub struct SessionOptions {
    /// Secret with which tokens are signed.
    #[derivative(Debug = "ignore")]
    pub secret: String,

    /// How long issued tokens remain valid.
    pub expires_in: Duration,

    /// How long browsers keep the session cookie.
    pub cookie_expires_in: Duration,
}

impl SessionOptions {
    /// Initializes a set of options from environment variables whose name is prefixed with the
    /// given `prefix`.
    ///
    /// This will use variables such as `<prefix>_JWT_SECRET`, `<prefix>_JWT_EXPIRES_IN` and
    /// `<prefix>_JWT_COOKIE_EXPIRES_IN`.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        Ok(Self {
            secret: get_required_var::<String>(prefix, "JWT_SECRET")?,
            expires_in: get_optional_var::<Duration>(prefix, "JWT_EXPIRES_IN")?
                .unwrap_or(DEFAULT_EXPIRES_IN),
            cookie_expires_in: get_optional_var::<Duration>(prefix, "JWT_COOKIE_EXPIRES_IN")?
                .unwrap_or(DEFAULT_EXPIRES_IN),
        })
    }
}

/// An opaque type holding an encoded session token, protecting it from leaking into logs.
#[derive(Clone, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Creates a new token from its encoded form.
    pub fn new<S: Into<String>>(token: S) -> ModelResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(ModelError("Session token cannot be empty".to_owned()));
        }
        Ok(Self(token))
    }

    /// Returns the encoded form of the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scrubbed session token")
    }
}

/// Claims carried by a session token.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SessionClaims {
    /// Identifier of the account the token belongs to.
    pub sub: String,

    /// Issuance time in seconds since the epoch.
    pub iat: i64,

    /// Expiration time in seconds since the epoch.
    pub exp: i64,
}

/// Reasons for which a session token is rejected.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum TokenError {
    /// The token is well-formed and signed but past its expiration time.
    #[error("Your token has expired! Please log in again.")]
    Expired,

    /// The token is malformed or carries a bad signature.
    #[error("Invalid token. Please log in again!")]
    Invalid,
}

/// Issues and verifies HS256-signed session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    /// Key to sign new tokens with.
    encoding_key: EncodingKey,

    /// Key to verify signatures with.
    decoding_key: DecodingKey,

    /// How long issued tokens remain valid.
    expires_in: Duration,
}

impl TokenCodec {
    /// Creates a codec from the session `opts`.
    pub fn new(opts: &SessionOptions) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(opts.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(opts.secret.as_bytes()),
            expires_in: opts.expires_in,
        }
    }

    /// Issues a token for the account `subject` as of `now`.
    pub fn issue(&self, subject: &str, now: OffsetDateTime) -> ModelResult<SessionToken> {
        let iat = now.unix_timestamp();
        let lifetime = i64::try_from(self.expires_in.as_secs()).unwrap_or(i64::MAX);
        let claims =
            SessionClaims { sub: subject.to_owned(), iat, exp: iat.saturating_add(lifetime) };
        let header = Header::new(Algorithm::HS256);
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ModelError(format!("Cannot sign session token: {}", e)))?;
        SessionToken::new(token)
    }

    /// Verifies the signature of `token` and checks its expiration against `now`.
    ///
    /// Expiration is checked here instead of by `jsonwebtoken` so that it follows the injected
    /// clock instead of the system one.
    pub fn verify(
        &self,
        token: &SessionToken,
        now: OffsetDateTime,
    ) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = jsonwebtoken::decode::<SessionClaims>(
            token.as_str(),
            &self.decoding_key,
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?
        .claims;

        if now.unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
