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

//! API to list the five best and cheapest tours.

use crate::driver::Driver;
use crate::model::query::QuerySpec;
use crate::model::tour::TOURS;
use crate::rest::{DocumentData, query_pairs};
use axum::Json;
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use wayfarer_core::rest::{EmptyBody, RestResult, SuccessResponse};

/// Query parameters forced by this alias, overriding any given by the client.
const PRESET: &[(&str, &str)] = &[
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Combines the client's `query` with the preset parameters of this alias.
fn aliased_query(query: Option<&str>) -> RestResult<QuerySpec> {
    let mut pairs = query_pairs(query)?;
    pairs.retain(|(key, _)| !PRESET.iter().any(|(preset, _)| key == preset));
    pairs.extend(PRESET.iter().map(|(key, value)| ((*key).to_owned(), (*value).to_owned())));
    Ok(QuerySpec::from_query(&pairs)?)
}

/// GET handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    RawQuery(query): RawQuery,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let spec = aliased_query(query.as_deref())?;
    let docs = driver.get_all(&TOURS, spec).await?;
    let results = docs.len();
    Ok(Json(SuccessResponse::with_data(DocumentData { data: docs }).with_results(results)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::query::{Comparison, Projection, SortOrder};
    use crate::model::record::Document;
    use crate::rest::testutils::*;
    use axum::http;
    use serde_json::json;
    use wayfarer_core::rest::testutils::*;
    use wayfarer_core::test_payload_must_be_empty;

    fn route() -> (http::Method, String) {
        (http::Method::GET, "/api/v1/tours/top-5-cheap".to_owned())
    }

    #[test]
    fn test_aliased_query_overrides_client() {
        let spec = aliased_query(Some("limit=50&sort=name&difficulty=easy")).unwrap();
        assert_eq!(5, spec.limit);
        assert_eq!(
            vec![
                ("ratingsAverage".to_owned(), SortOrder::Descending),
                ("price".to_owned(), SortOrder::Ascending),
            ],
            spec.sort
        );
        assert_eq!(
            Projection::Include(
                ["name", "price", "ratingsAverage", "summary", "difficulty"]
                    .iter()
                    .map(|f| (*f).to_owned())
                    .collect()
            ),
            spec.projection
        );
        assert_eq!(Some(&json!("easy")), spec.filter["difficulty"].get(&Comparison::Eq));
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContextBuilder::new().build().await;

        for (i, price) in [900, 300, 700, 100, 500, 200, 800].into_iter().enumerate() {
            context.create_tour(&format!("The Numbered Tour {}", i), price).await;
        }

        let response = OneShotBuilder::new(context.app(), route())
            .send_empty()
            .await
            .expect_json::<SuccessResponse<DocumentData<Vec<Document>>>>()
            .await;
        assert_eq!(Some(5), response.results);
        let docs = response.data.unwrap().data;
        let prices: Vec<i64> = docs.iter().map(|doc| doc["price"].as_i64().unwrap()).collect();
        assert_eq!(vec![100, 200, 300, 500, 700], prices);
        assert!(docs.iter().all(|doc| !doc.contains_key("duration")));
    }

    test_payload_must_be_empty!(TestContextBuilder::new().build().await.into_app(), route());
}
