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

//! REST interface of the tour booking service.

use crate::driver::Driver;
use crate::model::query::QuerySpec;
use crate::model::record::Document;
use crate::model::review::Reviews;
use crate::model::tour::Tours;
use crate::model::user::Users;
use axum::Router;
use axum::extract::FromRef;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, middleware};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use wayfarer_authn::model::SessionToken;
use wayfarer_authn::rest::session_cookie;
use wayfarer_core::env::Environment;
use wayfarer_core::rest::{
    RestError, RestResult, SuccessResponse, log_requests, normalize_errors, panic_response,
    route_not_found,
};

mod access;
use access::{Admins, AnyUser, Public, Reviewers, Staff};
mod resource_delete;
mod resource_get;
mod resource_patch;
mod resources_get;
mod resources_post;
mod reviews_post;
#[cfg(test)]
mod testutils;
mod tour_reviews_get;
mod tour_reviews_post;
mod tours_distances_get;
mod tours_monthly_plan_get;
mod tours_stats_get;
mod tours_top_cheap_get;
mod tours_within_get;
mod users_delete_me_delete;
mod users_forgot_password_post;
mod users_login_post;
mod users_me_get;
mod users_reset_password_patch;
mod users_signup_post;
mod users_update_me_patch;
mod users_update_password_patch;

/// Maximum size of request bodies.
const MAX_BODY_SIZE: usize = 10 * 1024;

/// Payload of responses that carry documents.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct DocumentData<T> {
    /// The document or documents.
    pub(crate) data: T,
}

/// Payload of responses that carry an account.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct UserData {
    /// Public view of the account.
    pub(crate) user: Document,
}

/// State shared by all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Business logic.
    driver: Driver,

    /// Mode in which the service runs.
    environment: Environment,
}

impl FromRef<AppState> for Driver {
    fn from_ref(state: &AppState) -> Self {
        state.driver.clone()
    }
}

impl FromRef<AppState> for Environment {
    fn from_ref(state: &AppState) -> Self {
        state.environment
    }
}

/// Decodes the raw query string of a request into its key/value pairs, in order.
pub(crate) fn query_pairs(query: Option<&str>) -> RestResult<Vec<(String, String)>> {
    serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| RestError::InvalidRequest(format!("Invalid query string: {}", e)))
}

/// Translates the raw query string of a request into a query specification.
pub(crate) fn parse_query(query: Option<&str>) -> RestResult<QuerySpec> {
    Ok(QuerySpec::from_query(&query_pairs(query)?)?)
}

/// Builds the response for APIs that log the caller in: the envelope carries the session
/// `token` and the `user`, and the token is also stored in a cookie.
pub(crate) fn session_response(
    driver: &Driver,
    environment: Environment,
    status: StatusCode,
    token: SessionToken,
    user: Document,
) -> RestResult<Response> {
    let cookie = session_cookie(&token, driver.cookie_expires_in(), environment.is_production())?;
    let body = SuccessResponse::with_data(UserData { user }).with_token(token.as_str());
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Creates the router for the application.
pub(crate) fn app(driver: Driver, environment: Environment) -> Router {
    use axum::routing::{delete, get, patch, post};

    let state = AppState { driver, environment };

    let router = Router::new()
        .route(
            "/api/v1/tours",
            get(resources_get::handler::<Tours, Public>)
                .post(resources_post::handler::<Tours, Staff>),
        )
        .route("/api/v1/tours/top-5-cheap", get(tours_top_cheap_get::handler))
        .route("/api/v1/tours/stats", get(tours_stats_get::handler))
        .route("/api/v1/tours/monthly-plan/:year", get(tours_monthly_plan_get::handler))
        .route(
            "/api/v1/tours/within/:distance/center/:latlng/unit/:unit",
            get(tours_within_get::handler),
        )
        .route("/api/v1/tours/distances/:latlng/unit/:unit", get(tours_distances_get::handler))
        .route(
            "/api/v1/tours/:id",
            get(resource_get::handler::<Tours, Public>)
                .patch(resource_patch::handler::<Tours, Staff>)
                .delete(resource_delete::handler::<Tours, Staff>),
        )
        .route(
            "/api/v1/tours/:id/reviews",
            get(tour_reviews_get::handler).post(tour_reviews_post::handler),
        )
        .route(
            "/api/v1/reviews",
            get(resources_get::handler::<Reviews, AnyUser>).post(reviews_post::handler),
        )
        .route(
            "/api/v1/reviews/:id",
            get(resource_get::handler::<Reviews, AnyUser>)
                .patch(resource_patch::handler::<Reviews, Reviewers>)
                .delete(resource_delete::handler::<Reviews, Reviewers>),
        )
        .route("/api/v1/users/signup", post(users_signup_post::handler))
        .route("/api/v1/users/login", post(users_login_post::handler))
        .route("/api/v1/users/forgotPassword", post(users_forgot_password_post::handler))
        .route("/api/v1/users/resetPassword/:token", patch(users_reset_password_patch::handler))
        .route("/api/v1/users/updatePassword", patch(users_update_password_patch::handler))
        .route("/api/v1/users/me", get(users_me_get::handler))
        .route("/api/v1/users/updateMe", patch(users_update_me_patch::handler))
        .route("/api/v1/users/deleteMe", delete(users_delete_me_delete::handler))
        .route("/api/v1/users", get(resources_get::handler::<Users, Admins>))
        .route(
            "/api/v1/users/:id",
            get(resource_get::handler::<Users, Admins>)
                .patch(resource_patch::handler::<Users, Admins>)
                .delete(resource_delete::handler::<Users, Admins>),
        )
        .fallback(route_not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(CatchPanicLayer::custom(panic_response));

    let router = if environment.is_production() {
        router
    } else {
        router.layer(middleware::from_fn(log_requests))
    };

    router.layer(middleware::from_fn_with_state(environment, normalize_errors))
}

#[cfg(test)]
mod tests {
    use super::testutils::*;
    use crate::model::tour::TOURS;
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};
    use wayfarer_core::env::Environment;
    use wayfarer_core::rest::testutils::*;

    #[tokio::test]
    async fn test_route_not_found() {
        let context = TestContextBuilder::new().build().await;

        OneShotBuilder::new(context.app(), (Method::GET, "/api/v1/nothing?x=1"))
            .send_empty()
            .await
            .expect_status(StatusCode::NOT_FOUND)
            .expect_error("Can't find /api/v1/nothing\\?x=1 on this server!")
            .await;
    }

    #[tokio::test]
    async fn test_development_errors_are_verbose() {
        let context = TestContextBuilder::new().build().await;

        let response = OneShotBuilder::new(context.app(), (Method::GET, "/api/v1/tours/abc"))
            .send_empty()
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_json::<Value>()
            .await;
        assert_eq!(json!("fail"), response["status"]);
        assert_eq!(json!("Invalid id: abc"), response["message"]);
        assert!(response["error"].as_str().unwrap().contains("InvalidRequest"));
        assert!(response.get("stack").is_some());
    }

    #[tokio::test]
    async fn test_production_errors_are_terse() {
        let context =
            TestContextBuilder::new().with_environment(Environment::Production).build().await;

        let response = OneShotBuilder::new(context.app(), (Method::GET, "/api/v1/tours/abc"))
            .send_empty()
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_json::<Value>()
            .await;
        assert_eq!(json!({"status": "fail", "message": "Invalid id: abc"}), response);
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Jonas Schmedtmann", "admin@example.com", Admin).await;

        let mut body = tour_doc("The Forest Hiker", 397);
        body.insert("description".to_owned(), json!("x".repeat(20 * 1024)));
        OneShotBuilder::new(context.app(), (Method::POST, "/api/v1/tours"))
            .with_bearer_auth(context.bearer_for(&user))
            .send_json(body)
            .await
            .expect_status(StatusCode::PAYLOAD_TOO_LARGE)
            .expect_error("length limit exceeded")
            .await;

        let docs = context.driver().get_all(&TOURS, Default::default()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_e2e_password_lifecycle() {
        let context = TestContextBuilder::new().build().await;

        let response = OneShotBuilder::new(context.app(), (Method::POST, "/api/v1/users/signup"))
            .send_json(json!({
                "name": "Sophie Louise Hart",
                "email": "sophie@example.com",
                "password": "pass1234",
                "passwordConfirm": "pass1234",
            }))
            .await
            .expect_status(StatusCode::CREATED)
            .expect_json::<Value>()
            .await;
        let first_token = response["token"].as_str().unwrap().to_owned();

        OneShotBuilder::new(context.app(), (Method::GET, "/api/v1/users/me"))
            .with_bearer_auth(&first_token)
            .send_empty()
            .await
            .expect_json::<Value>()
            .await;

        context.clock().advance(std::time::Duration::from_secs(5));
        OneShotBuilder::new(context.app(), (Method::POST, "/api/v1/users/forgotPassword"))
            .send_json(json!({"email": "sophie@example.com"}))
            .await
            .expect_json::<Value>()
            .await;
        let token = context.take_reset_token("sophie@example.com").await;

        context.clock().advance(std::time::Duration::from_secs(5));
        let response = OneShotBuilder::new(
            context.app(),
            (Method::PATCH, format!("/api/v1/users/resetPassword/{}", token)),
        )
        .send_json(json!({"password": "newpass123", "passwordConfirm": "newpass123"}))
        .await
        .expect_json::<Value>()
        .await;
        let second_token = response["token"].as_str().unwrap().to_owned();

        OneShotBuilder::new(context.app(), (Method::GET, "/api/v1/users/me"))
            .with_bearer_auth(&first_token)
            .send_empty()
            .await
            .expect_status(StatusCode::UNAUTHORIZED)
            .expect_error("User recently changed password! Please log in again.")
            .await;

        OneShotBuilder::new(context.app(), (Method::GET, "/api/v1/users/me"))
            .with_bearer_auth(&second_token)
            .send_empty()
            .await
            .expect_json::<Value>()
            .await;

        OneShotBuilder::new(context.app(), (Method::POST, "/api/v1/users/login"))
            .send_json(json!({"email": "sophie@example.com", "password": "pass1234"}))
            .await
            .expect_status(StatusCode::UNAUTHORIZED)
            .expect_error("Incorrect email or password")
            .await;

        OneShotBuilder::new(context.app(), (Method::POST, "/api/v1/users/login"))
            .send_json(json!({"email": "sophie@example.com", "password": "newpass123"}))
            .await
            .expect_json::<Value>()
            .await;
    }
}
