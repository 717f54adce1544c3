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

//! API to change the password of the caller.

use crate::driver::Driver;
use crate::rest::access::{AnyUser, Authorized};
use crate::rest::session_response;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use wayfarer_core::env::Environment;
use wayfarer_core::rest::RestResult;

/// Message sent to the server to change the password.
#[derive(Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdatePasswordRequest {
    /// The password currently in use.
    password_current: Option<String>,

    /// The new password.
    password: Option<String>,

    /// Confirmation of the new password.
    password_confirm: Option<String>,
}

/// PATCH handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    State(environment): State<Environment>,
    caller: Authorized<AnyUser>,
    Json(request): Json<UpdatePasswordRequest>,
) -> RestResult<Response> {
    let (token, user) = driver
        .clone()
        .update_password(
            caller.into_user()?,
            request.password_current,
            request.password,
            request.password_confirm,
        )
        .await?;
    session_response(&driver, environment, StatusCode::OK, token, user)
}
