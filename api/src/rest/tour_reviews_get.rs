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

//! API to list the reviews of the tour named in the path.

use crate::driver::Driver;
use crate::model::query::Comparison;
use crate::model::record::RecordId;
use crate::model::review::{REVIEWS, TOUR_FIELD};
use crate::rest::access::{AnyUser, Authorized};
use crate::rest::{DocumentData, parse_query};
use axum::Json;
use axum::extract::{Path, RawQuery, State};
use axum::response::IntoResponse;
use wayfarer_core::rest::{EmptyBody, RestResult, SuccessResponse};

/// GET handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    _: Authorized<AnyUser>,
    Path(tour): Path<String>,
    RawQuery(query): RawQuery,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let tour = RecordId::parse(&tour)?;
    let spec = parse_query(query.as_deref())?.with_predicate(
        TOUR_FIELD,
        Comparison::Eq,
        tour.to_string(),
    );

    let docs = driver.get_all(&REVIEWS, spec).await?;
    let results = docs.len();
    Ok(Json(SuccessResponse::with_data(DocumentData { data: docs }).with_results(results)))
}
