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

//! API to log into an existing account.

use crate::driver::Driver;
use crate::rest::session_response;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use wayfarer_core::env::Environment;
use wayfarer_core::rest::RestResult;

/// Message sent to the server to log in.
#[derive(Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct LoginRequest {
    /// Email address of the account.
    email: Option<String>,

    /// Password of the account.
    password: Option<String>,
}

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    State(environment): State<Environment>,
    Json(request): Json<LoginRequest>,
) -> RestResult<Response> {
    let (token, user) = driver.clone().login(request.email, request.password).await?;
    session_response(&driver, environment, StatusCode::OK, token, user)
}
