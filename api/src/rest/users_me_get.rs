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

//! API to get the account of the caller.

use crate::driver::Driver;
use crate::model::user::USERS;
use crate::rest::DocumentData;
use crate::rest::access::{AnyUser, Authorized};
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use wayfarer_core::rest::{EmptyBody, RestResult, SuccessResponse};

/// GET handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    caller: Authorized<AnyUser>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let user = caller.into_user()?;
    let doc = driver.get_one(&USERS, user.id()).await?;
    Ok(Json(SuccessResponse::with_data(DocumentData { data: doc })))
}

#[cfg(test)]
mod tests {
    use crate::rest::testutils::*;
    use axum::http::{self, StatusCode};
    use serde_json::{Value, json};
    use wayfarer_core::rest::testutils::*;

    fn route() -> (http::Method, String) {
        (http::Method::GET, "/api/v1/users/me".to_owned())
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Lourdes Browning", "lourdes@example.com", Guide).await;

        let response = OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_empty()
            .await
            .expect_json::<Value>()
            .await;
        let doc = &response["data"]["data"];
        assert_eq!(json!(user.id().to_string()), doc["id"]);
        assert_eq!(json!("lourdes@example.com"), doc["email"]);
        assert_eq!(json!("guide"), doc["role"]);
        assert!(doc.get("password").is_none());
    }

    #[tokio::test]
    async fn test_bad_tokens() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Lourdes Browning", "lourdes@example.com", Guide).await;

        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth("not.a.token")
            .send_empty()
            .await
            .expect_status(StatusCode::UNAUTHORIZED)
            .expect_error("Invalid token. Please log in again!")
            .await;

        let bearer = context.bearer_for(&user);
        context.clock().advance(std::time::Duration::from_secs(91 * 24 * 60 * 60));
        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(bearer)
            .send_empty()
            .await
            .expect_status(StatusCode::UNAUTHORIZED)
            .expect_error("Your token has expired! Please log in again.")
            .await;
    }

    #[tokio::test]
    async fn test_cookie_auth() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Lourdes Browning", "lourdes@example.com", Guide).await;

        let cookie = format!("jwt={}", context.bearer_for(&user));
        OneShotBuilder::new(context.app(), route())
            .with_header(http::header::COOKIE, cookie)
            .send_empty()
            .await
            .expect_json::<Value>()
            .await;
    }
}
