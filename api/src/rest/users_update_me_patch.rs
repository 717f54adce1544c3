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

//! API to update the profile of the caller.

use crate::driver::Driver;
use crate::model::record::Document;
use crate::rest::UserData;
use crate::rest::access::{AnyUser, Authorized};
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use wayfarer_core::rest::{RestResult, SuccessResponse};

/// PATCH handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    caller: Authorized<AnyUser>,
    Json(body): Json<Document>,
) -> RestResult<impl IntoResponse> {
    let user = driver.update_me(caller.into_user()?, body).await?;
    Ok(Json(SuccessResponse::with_data(UserData { user })))
}
