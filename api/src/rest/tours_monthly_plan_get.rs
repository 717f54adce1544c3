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

//! API to get how many tours start in each month of a year.

use crate::driver::Driver;
use crate::model::tour::MonthlyPlan;
use crate::rest::access::{Authorized, Planners};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Serialize;
use wayfarer_core::rest::{EmptyBody, RestError, RestResult, SuccessResponse};

/// Payload of the response.
#[derive(Serialize)]
struct PlanData {
    plan: Vec<MonthlyPlan>,
}

/// GET handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    _: Authorized<Planners>,
    Path(year): Path<String>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let year = year
        .parse::<i32>()
        .map_err(|_| RestError::InvalidRequest(format!("Invalid year: {}", year)))?;
    let plan = driver.monthly_plan(year).await?;
    Ok(Json(SuccessResponse::with_data(PlanData { plan })))
}
