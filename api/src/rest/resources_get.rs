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

//! Generic API to list the documents of a collection.

use crate::driver::Driver;
use crate::model::schema::Resource;
use crate::rest::access::{Access, Authorized};
use crate::rest::{DocumentData, parse_query};
use axum::Json;
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use wayfarer_core::rest::{EmptyBody, RestResult, SuccessResponse};

/// GET handler for this API, instantiated once per resource `R` with its access policy `A`.
pub(crate) async fn handler<R: Resource, A: Access>(
    State(driver): State<Driver>,
    _: Authorized<A>,
    RawQuery(query): RawQuery,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let spec = parse_query(query.as_deref())?;
    let docs = driver.get_all(R::SCHEMA, spec).await?;
    let results = docs.len();
    Ok(Json(SuccessResponse::with_data(DocumentData { data: docs }).with_results(results)))
}
