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

//! Generic code for REST handlers.
//!
//! All services should implement an `app` function in their `rest` module that returns the
//! `Router` for the application.
//!
//! Every API should be put in its own `.rs` file, using a name like `<entity>_<method>.rs`, and
//! its tests should define a `route` function that returns the HTTP method and path under test.
//!
//! Errors from every layer end up as a `RestError`, whose `IntoResponse` implementation renders
//! the terse error envelope.  The `normalize_errors` middleware is the single place where the
//! final error shape is decided: it adds debugging details in development, hides unexpected
//! errors in production, and rewraps error responses that did not come from a `RestError`.

use crate::driver::DriverError;
use crate::env::Environment;
use crate::model::ModelError;
use async_trait::async_trait;
use axum::Json;
use axum::body::HttpBody;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::AsHeaderName;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::Backtrace;
use std::time::Instant;

mod base_url;
pub use base_url::BaseUrl;

/// Maximum size of an error body produced outside of `RestError` that we are willing to rewrap.
const MAX_REWRAP_BODY: usize = 4096;

/// Message returned in production for errors that are not safe to expose.
const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// Frontend errors.  These are the errors that are visible to the user on failed requests.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RestError {
    /// Indicates that a write would violate a uniqueness constraint.
    #[error("{0}")]
    Conflict(String),

    /// Indicates that an external collaborator failed while serving the request.
    #[error("{0}")]
    DependencyFailed(String),

    /// Indicates an authorization problem.
    #[error("{0}")]
    Forbidden(String),

    /// Catch-all error type for all unexpected errors.
    #[error("{0}")]
    InternalError(String),

    /// Indicates an error in the contents of the request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Indicates that a requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Indicates that a request that should have empty content did not.
    #[error("Content should be empty")]
    PayloadNotEmpty,

    /// Indicates that the web framework rejected the request before it reached a handler.
    #[error("{message}")]
    Rejected {
        /// Status code chosen by the framework.
        status: StatusCode,

        /// Description of the rejection.
        message: String,
    },

    /// Indicates an authentication problem.
    #[error("{message}")]
    Unauthorized {
        /// Expected authorization scheme.
        scheme: &'static str,

        /// Expected authorization realm.
        realm: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,
    },
}

impl RestError {
    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::Conflict(_) => StatusCode::BAD_REQUEST,
            RestError::DependencyFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::Forbidden(_) => StatusCode::FORBIDDEN,
            RestError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RestError::NotFound(_) => StatusCode::NOT_FOUND,
            RestError::PayloadNotEmpty => StatusCode::PAYLOAD_TOO_LARGE,
            RestError::Rejected { status, .. } => *status,
            RestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    /// Returns true if this error is an anticipated condition whose message is safe to show.
    pub fn is_operational(&self) -> bool {
        !matches!(self, RestError::InternalError(_))
    }
}

impl From<DriverError> for RestError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::AlreadyExists(msg) => RestError::Conflict(msg),
            DriverError::BackendError(msg) => RestError::InternalError(msg),
            DriverError::DependencyFailed(msg) => RestError::DependencyFailed(msg),
            DriverError::Forbidden(msg) => RestError::Forbidden(msg),
            DriverError::InvalidInput(msg) => RestError::InvalidRequest(msg),
            DriverError::NotFound(msg) => RestError::NotFound(msg),
            DriverError::Unauthenticated(message) => {
                RestError::Unauthorized { scheme: "Bearer", realm: REALM, message }
            }
        }
    }
}

impl From<ModelError> for RestError {
    fn from(e: ModelError) -> Self {
        RestError::InvalidRequest(e.to_string())
    }
}

impl From<serde_json::Error> for RestError {
    fn from(e: serde_json::Error) -> Self {
        RestError::InvalidRequest(e.to_string())
    }
}

/// Authentication realm advertised in `WWW-Authenticate` headers.
pub const REALM: &str = "wayfarer";

/// Returns the status class of the envelope for an error with `status`.
fn status_class(status: StatusCode) -> &'static str {
    if status.is_server_error() { "error" } else { "fail" }
}

/// Everything known about an error, attached to the response for the `normalize_errors`
/// middleware to consume.
#[derive(Clone, Debug)]
struct ErrorDetail {
    /// The terse envelope sent to clients.
    envelope: ErrorResponse,

    /// Whether the message is safe to show in production.
    operational: bool,

    /// Debug representation of the original error.
    error: String,

    /// Backtrace captured when the response was built.  Only populated when backtraces are
    /// enabled via `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`.
    stack: String,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();
        if let RestError::Unauthorized { scheme, realm, .. } = &self {
            match HeaderValue::from_str(&format!("{} realm=\"{}\"", scheme, realm)) {
                Ok(value) => {
                    headers.insert(header::WWW_AUTHENTICATE, value);
                }
                Err(e) => warn!("Cannot build WWW-Authenticate header: {}", e),
            }
        }

        let envelope =
            ErrorResponse { status: status_class(status).to_owned(), message: self.to_string() };
        let detail = ErrorDetail {
            envelope: envelope.clone(),
            operational: self.is_operational(),
            error: format!("{:?}", self),
            stack: Backtrace::capture().to_string(),
        };

        let mut response = (status, headers, Json(envelope)).into_response();
        response.extensions_mut().insert(detail);
        response
    }
}

/// Result type for this module.
pub type RestResult<T> = Result<T, RestError>;

/// Representation of the details of an error response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Either `fail` for client errors or `error` for server errors.
    pub status: String,

    /// Textual representation of the error message.
    pub message: String,
}

/// Error response emitted in development, carrying debugging information.
#[derive(Debug, Serialize)]
struct VerboseErrorResponse {
    /// Either `fail` for client errors or `error` for server errors.
    status: String,

    /// Textual representation of the error message.
    message: String,

    /// Debug representation of the error.
    error: String,

    /// Backtrace captured when the error was turned into a response.
    stack: String,
}

/// Converts an error response produced outside of `RestError`, such as an extractor rejection,
/// into a `RestError` response.
async fn rewrap(response: Response) -> Response {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), MAX_REWRAP_BODY).await;
    let message = match body {
        Ok(body) if !body.is_empty() => String::from_utf8_lossy(&body).trim().to_owned(),
        _ => status.canonical_reason().unwrap_or("Unknown error").to_owned(),
    };

    let error = if status.is_server_error() {
        RestError::InternalError(message)
    } else {
        RestError::Rejected { status, message }
    };
    error.into_response()
}

/// Middleware that finalizes every error response of the app according to `environment`.
///
/// Install with `axum::middleware::from_fn_with_state(environment, normalize_errors)` as the
/// outermost layer of the router.
pub async fn normalize_errors(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let is_error = response.status().is_client_error() || response.status().is_server_error();
    if is_error && response.extensions().get::<ErrorDetail>().is_none() {
        response = rewrap(response).await;
    }

    let Some(detail) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    if !detail.operational {
        error!("Unexpected error: {}", detail.error);
    }

    match environment {
        Environment::Development => {
            let (mut parts, _body) = response.into_parts();
            let verbose = VerboseErrorResponse {
                status: detail.envelope.status,
                message: detail.envelope.message,
                error: detail.error,
                stack: detail.stack,
            };
            parts.headers.remove(header::CONTENT_LENGTH);
            (parts, Json(verbose)).into_response()
        }

        Environment::Production if detail.operational => response,

        Environment::Production => {
            let body = ErrorResponse {
                status: status_class(StatusCode::INTERNAL_SERVER_ERROR).to_owned(),
                message: GENERIC_ERROR_MESSAGE.to_owned(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Fallback handler for requests that do not match any route.
pub async fn route_not_found(uri: Uri) -> RestError {
    RestError::NotFound(format!("Can't find {} on this server!", uri))
}

/// Converts the payload of a panic caught while serving a request into an error response.
///
/// Meant to be used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "Unknown panic".to_owned()
    };
    RestError::InternalError(format!("Handler panicked: {}", message)).into_response()
}

/// Middleware that logs one line per request with its outcome and latency.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let response = next.run(request).await;
    info!(
        "{} {} {} - {:.3} ms",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    response
}

/// Envelope for all successful responses.
#[derive(Debug, Deserialize, Serialize)]
pub struct SuccessResponse<T> {
    /// Always `success`.
    pub status: String,

    /// Number of records in `data`, for list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,

    /// Session token, for responses that log the caller in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Human-readable outcome, for responses without data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> SuccessResponse<T> {
    /// Creates a response carrying `data`.
    pub fn with_data(data: T) -> Self {
        Self {
            status: "success".to_owned(),
            results: None,
            token: None,
            message: None,
            data: Some(data),
        }
    }

    /// Sets the number of results reported by the response.
    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    /// Sets the session token reported by the response.
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl SuccessResponse<()> {
    /// Creates a response that only carries a `message`.
    pub fn with_message<S: Into<String>>(message: S) -> Self {
        Self {
            status: "success".to_owned(),
            results: None,
            token: None,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// A request body extractor that forbids any content.
///
/// Any API that doesn't expect a body should use this to ensure we don't get garbage data that we
/// don't care about.
pub struct EmptyBody {}

#[async_trait]
impl<S> FromRequest<S> for EmptyBody
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        if req.into_body().is_end_stream() {
            Ok(EmptyBody {})
        } else {
            Err(RestError::PayloadNotEmpty)
        }
    }
}

/// Extracts the header `name` from `headers` and ensures it has at most one value.
pub fn get_unique_header<K: AsHeaderName + Copy>(
    headers: &HeaderMap,
    name: K,
) -> RestResult<Option<&HeaderValue>> {
    let mut iter = headers.get_all(name).iter();
    let value = iter.next();
    if iter.next().is_some() {
        return Err(RestError::InvalidRequest(format!(
            "Header {} cannot have more than one value",
            name.as_str()
        )));
    }
    Ok(value)
}

/// Common test code for the REST server.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{self, HeaderName};
    use serde::de::DeserializeOwned;
    use std::fmt;
    use tower::util::ServiceExt;

    /// Maximum body size for testing purposes.
    const MAX_BODY_SIZE: usize = 1024 * 1024;

    /// Builder for a single request to the API server.
    #[must_use]
    pub struct OneShotBuilder {
        /// The router for the app being tested.
        app: Router,

        /// Builder for the request that will be sent to the app.
        builder: axum::http::request::Builder,
    }

    impl OneShotBuilder {
        /// Creates a new request against a given `method`/`uri` pair served by an `app` router.
        pub fn new<U: AsRef<str>>(app: Router, (method, uri): (http::Method, U)) -> Self {
            let builder = Request::builder().method(method).uri(uri.as_ref());
            Self { app, builder }
        }

        /// Extends the URI in the request with a `query`.
        pub fn with_query<Q: Serialize>(mut self, query: Q) -> Self {
            let uri = self.builder.uri_ref().unwrap().to_string();
            assert!(!uri.contains('?'), "URI already contains a query: {}", uri);
            self.builder = self.builder.uri(format!(
                "{}?{}",
                uri,
                serde_urlencoded::to_string(query).unwrap()
            ));
            self
        }

        /// Adds bearer authentication to the request.
        pub fn with_bearer_auth<T>(mut self, token: T) -> Self
        where
            T: fmt::Display,
        {
            let value = format!("Bearer {}", token);
            self.builder = self.builder.header(http::header::AUTHORIZATION, value);
            self
        }

        /// Sets the header `name` to `value` in the outgoing request.
        pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
        where
            HeaderName: TryFrom<K>,
            <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
            HeaderValue: TryFrom<V>,
            <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
        {
            self.builder = self.builder.header(name, value);
            self
        }

        /// Finishes building the request and sends it with an empty payload.
        pub async fn send_empty(self) -> ResponseChecker {
            let request = self.builder.body(Body::empty()).unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a text payload.
        pub async fn send_text<T: Into<String>>(self, text: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref())
                .body(Body::from(text.into()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a JSON payload.
        pub async fn send_json<T: Serialize>(self, request: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }
    }

    /// Validator for the outcome of a request sent by a `OneShotBuilder`.
    #[must_use]
    pub struct ResponseChecker {
        /// Actual response that we received from the app.
        response: Response,

        /// Expected HTTP status code in the response above.
        exp_status: http::StatusCode,
    }

    impl From<Response> for ResponseChecker {
        fn from(response: Response) -> Self {
            Self { response, exp_status: http::StatusCode::OK }
        }
    }

    impl ResponseChecker {
        /// Sets the expected exit HTTP status to `status`.
        pub fn expect_status(mut self, status: http::StatusCode) -> Self {
            self.exp_status = status;
            self
        }

        /// Performs common validation operations on the response.
        pub fn verify(&self) {
            assert_eq!(self.exp_status, self.response.status());
        }

        /// Returns the value of the `name` header, which must be present exactly once.
        pub fn header(&self, name: HeaderName) -> String {
            get_unique_header(self.response.headers(), &name)
                .unwrap()
                .unwrap_or_else(|| panic!("Header {} not present", name))
                .to_str()
                .unwrap()
                .to_owned()
        }

        /// Consumes the response body and returns it.
        async fn body(self) -> Vec<u8> {
            self.verify();
            axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap().to_vec()
        }

        /// Finishes checking the response and expects it to contain an empty body.
        pub async fn expect_empty(self) {
            let body = String::from_utf8(self.body().await).unwrap();
            assert!(body.is_empty(), "Body not empty; got {}", body);
        }

        /// Finishes checking the response and expects its body to be an `ErrorResponse` whose
        /// message matches `exp_re` and whose status class matches the HTTP status.
        pub async fn expect_error(self, exp_re: &str) {
            let exp_class = status_class(self.exp_status);
            let body = self.body().await;
            let response: ErrorResponse = match serde_json::from_slice(&body) {
                Ok(response) => response,
                Err(e) => {
                    let body = String::from_utf8_lossy(&body);
                    panic!("Invalid error response due to {}; content was {}", e, body);
                }
            };
            assert_eq!(exp_class, response.status);
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(
                re.is_match(&response.message),
                "Response content '{:?}' does not match re '{}'",
                response,
                exp_re
            );
        }

        /// Finishes checking the response and expects it to contain a valid JSON object of
        /// type `T`.
        pub async fn expect_json<T: DeserializeOwned>(self) -> T {
            let body = self.body().await;
            match serde_json::from_slice::<T>(&body) {
                Ok(value) => value,
                Err(e) => {
                    let body = String::from_utf8_lossy(&body);
                    panic!("Invalid JSON due to {}; content was {}", e, body);
                }
            }
        }

        /// Finishes checking the response and returns the response itself for out of band
        /// validation of properties not supported by the `ResponseChecker`.
        pub async fn take_response(self) -> Response {
            self.verify();
            self.response
        }
    }

    /// Generates a test to verify that an API that expects JSON fails when it gets something else.
    #[macro_export]
    macro_rules! test_payload_must_be_json {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_json() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE)
                    .expect_error("Content-Type")
                    .await;

                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .with_header(axum::http::header::CONTENT_TYPE, "application/json")
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::BAD_REQUEST)
                    .expect_error("expected ident")
                    .await;
            }
        };
    }

    pub use test_payload_must_be_json;

    /// Generates a test to verify that an API that does not expect a payload fails as necessary.
    #[macro_export]
    macro_rules! test_payload_must_be_empty {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_empty() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .send_text("should not be here")
                    .await
                    .expect_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE)
                    .expect_error("should be empty")
                    .await;
            }
        };
    }

    pub use test_payload_must_be_empty;
}
