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

//! Generic API to create a document.

use crate::driver::Driver;
use crate::model::record::Document;
use crate::model::schema::Resource;
use crate::rest::DocumentData;
use crate::rest::access::{Access, Authorized};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use wayfarer_core::rest::{RestResult, SuccessResponse};

/// POST handler for this API.
pub(crate) async fn handler<R: Resource, A: Access>(
    State(driver): State<Driver>,
    _: Authorized<A>,
    Json(body): Json<Document>,
) -> RestResult<impl IntoResponse> {
    let doc = driver.create_one(R::SCHEMA, body).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::with_data(DocumentData { data: doc }))))
}

#[cfg(test)]
mod tests {
    use crate::model::record::{Document, RecordId};
    use crate::model::tour::TOURS;
    use crate::rest::DocumentData;
    use crate::rest::testutils::*;
    use axum::http::{self, StatusCode};
    use serde_json::json;
    use wayfarer_core::rest::SuccessResponse;
    use wayfarer_core::rest::testutils::*;

    fn route() -> (http::Method, String) {
        (http::Method::POST, "/api/v1/tours".to_owned())
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Jonas Schmedtmann", "admin@example.com", Admin).await;

        let mut body = tour_doc("The Forest Hiker", 397);
        body.insert("id".to_owned(), json!("5c88fa8cf4afda39709c2955"));
        body.insert("__v".to_owned(), json!(7));
        let response = OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_json(body)
            .await
            .expect_status(StatusCode::CREATED)
            .expect_json::<SuccessResponse<DocumentData<Document>>>()
            .await;
        assert_eq!("success", response.status);
        let doc = response.data.unwrap().data;
        assert_eq!(json!("the-forest-hiker"), doc["slug"]);
        assert_eq!(json!(4.5), doc["ratingsAverage"]);

        let id = RecordId::parse(doc["id"].as_str().unwrap()).unwrap();
        let raw = context.get_raw(&TOURS, id).await;
        assert_eq!(json!(0), raw["__v"]);
        assert_ne!(json!("5c88fa8cf4afda39709c2955"), doc["id"]);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Leo Gillespie", "leo@example.com", LeadGuide).await;

        let mut body = tour_doc("Short", 397);
        body.insert("difficulty".to_owned(), json!("extreme"));
        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_json(body)
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_error(
                "^Invalid input data. A tour name must have more or equal then 10 characters. \
                 Difficulty is either: easy, medium, difficult$",
            )
            .await;
    }

    #[tokio::test]
    async fn test_long_validation_error_keeps_envelope() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Jonas Schmedtmann", "admin@example.com", Admin).await;

        let guide = "x".repeat(5000);
        let mut body = tour_doc("The Forest Hiker", 397);
        body.insert("guides".to_owned(), json!([guide]));
        let response = OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_json(body)
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_json::<serde_json::Value>()
            .await;
        assert_eq!("fail", response["status"]);
        assert!(response["message"].as_str().unwrap().ends_with(&format!("Invalid id: {}", guide)));
        assert!(response["stack"].is_string());
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Jonas Schmedtmann", "admin@example.com", Admin).await;
        context.create_tour("The Forest Hiker", 397).await;

        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_json(tour_doc("The Forest Hiker", 497))
            .await
            .expect_status(StatusCode::BAD_REQUEST)
            .expect_error("Duplicate field value")
            .await;
    }

    #[tokio::test]
    async fn test_forbidden_for_customers() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Sophie Louise Hart", "sophie@example.com", Customer).await;

        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_json(tour_doc("The Forest Hiker", 397))
            .await
            .expect_status(StatusCode::FORBIDDEN)
            .expect_error("You do not have permission to perform this action")
            .await;

        let docs = context.driver().get_all(&TOURS, Default::default()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_payload_must_be_json() {
        let context = TestContextBuilder::new().build().await;
        let user = context.create_user("Jonas Schmedtmann", "admin@example.com", Admin).await;

        OneShotBuilder::new(context.app(), route())
            .with_bearer_auth(context.bearer_for(&user))
            .send_text("this is not json")
            .await
            .expect_status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .expect_error("Content-Type")
            .await;
    }
}
