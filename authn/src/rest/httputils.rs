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

//! Utilities to deal with HTTP authorization.

use crate::model::SessionToken;
use http::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use wayfarer_core::rest::{REALM, RestError, RestResult, get_unique_header};

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE: &str = "jwt";

/// Builds an `Unauthorized` error for the bearer scheme.
fn unauthorized<S: Into<String>>(message: S) -> RestError {
    RestError::Unauthorized { scheme: "Bearer", realm: REALM, message: message.into() }
}

/// Extracts the payload of a bearer `Authorization` header, if there is one.
///
/// Headers for other schemes are ignored as if they were not present.
fn get_bearer_payload(headers: &HeaderMap) -> RestResult<Option<&str>> {
    let authz = match get_unique_header(headers, &header::AUTHORIZATION) {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(None),
        Err(e) => return Err(unauthorized(e.to_string())),
    };

    let authz = authz
        .to_str()
        .map_err(|e| unauthorized(format!("Bad encoding in Authorization header: {}", e)))?;

    match authz.split_once(' ') {
        Some(("Bearer", payload)) if !payload.trim().is_empty() => Ok(Some(payload.trim())),
        _ => Ok(None),
    }
}

/// Extracts the value of the session cookie, if there is one.
fn get_cookie_payload(headers: &HeaderMap) -> Option<&str> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            if let Some((name, payload)) = pair.trim().split_once('=') {
                if name == SESSION_COOKIE && !payload.is_empty() {
                    return Some(payload);
                }
            }
        }
    }
    None
}

/// Obtains the session token presented by the caller, if any.
///
/// A bearer `Authorization` header takes precedence over the session cookie.
pub fn get_session_token(headers: &HeaderMap) -> RestResult<Option<SessionToken>> {
    let payload = match get_bearer_payload(headers)? {
        Some(payload) => payload,
        None => match get_cookie_payload(headers) {
            Some(payload) => payload,
            None => return Ok(None),
        },
    };
    SessionToken::new(payload).map(Some).map_err(|e| unauthorized(e.0))
}

/// Builds the `Set-Cookie` value that stores `token` in the browser for `max_age`.
///
/// `secure` restricts the cookie to HTTPS connections.
pub fn session_cookie(
    token: &SessionToken,
    max_age: Duration,
    secure: bool,
) -> RestResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        SESSION_COOKIE,
        token.as_str(),
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| RestError::InternalError(format!("Cannot build session cookie: {}", e)))
}
