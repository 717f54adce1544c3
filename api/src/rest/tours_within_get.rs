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

//! API to find the tours that start within a distance of a point.

use crate::driver::Driver;
use crate::model::geo::{DistanceUnit, LatLng, parse_distance};
use crate::rest::DocumentData;
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use wayfarer_core::rest::{EmptyBody, RestResult, SuccessResponse};

/// GET handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let distance = parse_distance(&distance)?;
    let center = LatLng::parse(&latlng)?;
    let unit = DistanceUnit::parse(&unit)?;

    let docs = driver.tours_within(distance, center, unit).await?;
    let results = docs.len();
    Ok(Json(SuccessResponse::with_data(DocumentData { data: docs }).with_results(results)))
}
