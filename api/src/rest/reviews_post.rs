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

//! API to create a review.

use crate::driver::Driver;
use crate::model::record::{Document, RecordId};
use crate::model::review::{REVIEWS, TOUR_FIELD, USER_FIELD};
use crate::model::user::User;
use crate::rest::DocumentData;
use crate::rest::access::{Authorized, Customers};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use wayfarer_core::rest::{RestResult, SuccessResponse};

/// Creates a review from `body` written by `author`.
///
/// The review is attributed to `author` regardless of what the body says and, if the body does
/// not name a tour, it refers to `tour`.
pub(super) async fn create_review(
    driver: Driver,
    author: User,
    tour: Option<RecordId>,
    mut body: Document,
) -> RestResult<Response> {
    if let Some(tour) = tour {
        if body.get(TOUR_FIELD).is_none_or(Value::is_null) {
            body.insert(TOUR_FIELD.to_owned(), Value::String(tour.to_string()));
        }
    }
    body.insert(USER_FIELD.to_owned(), Value::String(author.id().to_string()));

    let doc = driver.create_one(&REVIEWS, body).await?;
    let response = SuccessResponse::with_data(DocumentData { data: doc });
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    caller: Authorized<Customers>,
    Json(body): Json<Document>,
) -> RestResult<Response> {
    create_review(driver, caller.into_user()?, None, body).await
}
