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

//! API to deactivate the account of the caller.

use crate::driver::Driver;
use crate::rest::access::{AnyUser, Authorized};
use axum::extract::State;
use axum::http::StatusCode;
use wayfarer_core::rest::{EmptyBody, RestResult};

/// DELETE handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    caller: Authorized<AnyUser>,
    _: EmptyBody,
) -> RestResult<StatusCode> {
    driver.delete_me(caller.into_user()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::model::user::USERS;
    use crate::rest::testutils::*;
    use axum::http::{self, StatusCode};
    use serde_json::json;
    use wayfarer_core::rest::testutils::*;

    fn route() -> (http::Method, String) {
        (http::Method::DELETE, "/api/v1/users/deleteMe".to_owned())
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;
        let bearer = context.bearer_for(&user);

        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(&bearer)
            .send_empty()
            .await
            .expect_status(StatusCode::NO_CONTENT)
            .expect_empty()
            .await;

        let raw = context.get_raw(&USERS, user.id()).await;
        assert_eq!(json!(false), raw["active"]);

        OneShotBuilder::new(context.app(), (http::Method::GET, "/api/v1/users/me"))
            .with_bearer_auth(&bearer)
            .send_empty()
            .await
            .expect_status(StatusCode::UNAUTHORIZED)
            .expect_error("The user belonging to this token no longer exists.")
            .await;

        OneShotBuilder::new(context.app(), (http::Method::POST, "/api/v1/users/login"))
            .send_json(json!({"email": "sophie@example.com", "password": DEFAULT_PASSWORD}))
            .await
            .expect_status(StatusCode::UNAUTHORIZED)
            .expect_error("Incorrect email or password")
            .await;
    }

    #[tokio::test]
    async fn test_payload_must_be_empty() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;

        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_text("should not be here")
            .await
            .expect_status(StatusCode::PAYLOAD_TOO_LARGE)
            .expect_error("should be empty")
            .await;

        let raw = context.get_raw(&USERS, user.id()).await;
        assert_eq!(json!(true), raw["active"]);
    }
}
