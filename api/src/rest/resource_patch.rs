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

//! Generic API to update a document.

use crate::driver::Driver;
use crate::model::record::{Document, RecordId};
use crate::model::schema::Resource;
use crate::rest::DocumentData;
use crate::rest::access::{Access, Authorized};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use wayfarer_core::rest::{RestResult, SuccessResponse};

/// PATCH handler for this API.
pub(crate) async fn handler<R: Resource, A: Access>(
    State(driver): State<Driver>,
    _: Authorized<A>,
    Path(id): Path<String>,
    Json(patch): Json<Document>,
) -> RestResult<impl IntoResponse> {
    let id = RecordId::parse(&id)?;
    let doc = driver.update_one(R::SCHEMA, id, patch).await?;
    Ok(Json(SuccessResponse::with_data(DocumentData { data: doc })))
}
