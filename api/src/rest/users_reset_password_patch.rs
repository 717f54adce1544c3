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

//! API to set a new password using a reset token.

use crate::driver::Driver;
use crate::rest::session_response;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use wayfarer_core::env::Environment;
use wayfarer_core::rest::RestResult;

/// Message sent to the server to choose a new password.
#[derive(Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetPasswordRequest {
    /// The new password.
    password: Option<String>,

    /// Confirmation of the new password.
    password_confirm: Option<String>,
}

/// PATCH handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    State(environment): State<Environment>,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> RestResult<Response> {
    let (token, user) = driver
        .clone()
        .reset_password(token, request.password, request.password_confirm)
        .await?;
    session_response(&driver, environment, StatusCode::OK, token, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testutils::*;
    use axum::http;
    use serde_json::{Value, json};
    use std::time::Duration;
    use wayfarer_core::rest::testutils::*;

    fn route(token: &str) -> (http::Method, String) {
        (http::Method::PATCH, format!("/api/v1/users/resetPassword/{}", token))
    }

    /// Requests a password reset for `email` and returns the token that was mailed.
    async fn request_reset(context: &TestContext, email: &str) -> String {
        context.driver().forgot_password(Some(email.to_owned())).await.unwrap();
        context.take_reset_token(email).await
    }

    fn new_password() -> ResetPasswordRequest {
        ResetPasswordRequest {
            password: Some("newpass123".to_owned()),
            password_confirm: Some("newpass123".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;
        let token = request_reset(&context, "sophie@example.com").await;

        let response = OneShotBuilder::new(context.app(), route(&token))
            .send_json(new_password())
            .await
            .expect_json::<Value>()
            .await;
        assert_eq!(json!(user.id().to_string()), response["data"]["user"]["id"]);
        assert!(response["token"].is_string());

        OneShotBuilder::new(context.app(), route(&token))
            .send_json(new_password())
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_error("Token is invalid or has expired")
            .await;

        context
            .driver()
            .login(Some("sophie@example.com".to_owned()), Some("newpass123".to_owned()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired() {
        let context = TestContextBuilder::new().build().await;
        context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;
        let token = request_reset(&context, "sophie@example.com").await;

        context.clock().advance(Duration::from_secs(11 * 60));
        OneShotBuilder::new(context.app(), route(&token))
            .send_json(new_password())
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_error("Token is invalid or has expired")
            .await;
    }

    #[tokio::test]
    async fn test_passwords_differ() {
        let context = TestContextBuilder::new().build().await;
        context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;
        let token = request_reset(&context, "sophie@example.com").await;

        OneShotBuilder::new(context.app(), route(&token))
            .send_json(json!({"password": "newpass123", "passwordConfirm": "other123"}))
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_error("Passwords are not the same!")
            .await;
    }
}
