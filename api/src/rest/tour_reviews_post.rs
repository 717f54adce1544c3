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

//! API to create a review for the tour named in the path.

use crate::driver::Driver;
use crate::model::record::{Document, RecordId};
use crate::rest::access::{Authorized, Customers};
use crate::rest::reviews_post::create_review;
use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;
use wayfarer_core::rest::RestResult;

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    caller: Authorized<Customers>,
    Path(tour): Path<String>,
    Json(body): Json<Document>,
) -> RestResult<Response> {
    let tour = RecordId::parse(&tour)?;
    create_review(driver, caller.into_user()?, Some(tour), body).await
}
