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

//! API to request a password reset email.

use crate::driver::Driver;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use wayfarer_core::rest::{RestResult, SuccessResponse};

/// Message sent to the server to request a password reset.
#[derive(Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct ForgotPasswordRequest {
    /// Email address of the account to reset.
    email: Option<String>,
}

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Json(request): Json<ForgotPasswordRequest>,
) -> RestResult<impl IntoResponse> {
    driver.forgot_password(request.email).await?;
    Ok(Json(SuccessResponse::with_message("Token sent to email!")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::USERS;
    use crate::rest::testutils::*;
    use axum::http::{self, StatusCode};
    use serde_json::{Value, json};
    use wayfarer_core::model::EmailAddress;
    use wayfarer_core::rest::testutils::*;
    use wayfarer_core::test_payload_must_be_json;

    fn route() -> (http::Method, String) {
        (http::Method::POST, "/api/v1/users/forgotPassword".to_owned())
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;

        let response = OneShotBuilder::new(context.app(), route())
            .send_json(ForgotPasswordRequest { email: Some("sophie@example.com".to_owned()) })
            .await
            .expect_json::<Value>()
            .await;
        assert_eq!(json!({"status": "success", "message": "Token sent to email!"}), response);

        let token = context.take_reset_token("sophie@example.com").await;
        assert!(!token.is_empty());
        let raw = context.get_raw(&USERS, user.id()).await;
        assert!(raw.contains_key("passwordResetToken"));
        assert_ne!(json!(token), raw["passwordResetToken"]);
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let context = TestContextBuilder::new().build().await;

        OneShotBuilder::new(context.app(), route())
            .send_json(json!({"email": "nobody@example.com"}))
            .await
            .expect_status(StatusCode::NOT_FOUND)
            .expect_error("There is no user with that email address.")
            .await;

        context.mailer().expect_no_messages().await;
    }

    #[tokio::test]
    async fn test_email_failure() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;
        context.mailer().inject_error_for(EmailAddress::from("sophie@example.com")).await;

        OneShotBuilder::new(context.app(), route())
            .send_json(json!({"email": "sophie@example.com"}))
            .await
            .expect_status(StatusCode::INTERNAL_SERVER_ERROR)
            .expect_error("There was an error sending the email. Try again later!")
            .await;

        let raw = context.get_raw(&USERS, user.id()).await;
        assert!(!raw.contains_key("passwordResetToken"));
    }

    test_payload_must_be_json!(TestContextBuilder::new().build().await.into_app(), route());
}
