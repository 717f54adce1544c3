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

//! API to create a new account and log into it.

use crate::driver::Driver;
use crate::model::record::Document;
use crate::model::user::{PASSWORD_CONFIRM_FIELD, PASSWORD_FIELD};
use crate::rest::session_response;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use wayfarer_core::env::Environment;
use wayfarer_core::rest::RestResult;

/// Removes `field` from `body` and returns it if it was a string.
fn take_string(body: &mut Document, field: &str) -> Option<String> {
    match body.remove(field) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    State(environment): State<Environment>,
    Json(mut body): Json<Document>,
) -> RestResult<Response> {
    let password = take_string(&mut body, PASSWORD_FIELD);
    let password_confirm = take_string(&mut body, PASSWORD_CONFIRM_FIELD);

    let (token, user) = driver.clone().signup(body, password, password_confirm).await?;
    session_response(&driver, environment, StatusCode::CREATED, token, user)
}
