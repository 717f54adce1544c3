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

//! Aggregation of review ratings into their tours.

use crate::db;
use crate::driver::not_found;
use crate::model::query::{Comparison, QuerySpec};
use crate::model::record::RecordId;
use crate::model::review::{RATING_FIELD, REVIEWS, TOUR_FIELD};
use crate::model::tour::{DEFAULT_RATINGS_AVERAGE, TOURS};
use serde_json::Value;
use wayfarer_core::db::Executor;
use wayfarer_core::driver::DriverResult;

/// Recomputes the number of ratings and the average rating of `tour` from its reviews.
///
/// Must run in the same transaction as the review write that triggered it.  The tour is locked
/// before the reviews are read so that concurrent review writes on the same tour serialize.
pub(super) async fn recompute_ratings(ex: &mut Executor, tour: RecordId) -> DriverResult<()> {
    let mut doc = db::get_for_update(ex, TOURS.collection, tour).await.map_err(not_found)?;

    let spec = QuerySpec::default().with_predicate(TOUR_FIELD, Comparison::Eq, tour.to_string());
    let reviews = db::find(ex, REVIEWS.collection, &spec.filter, &[], None).await?;
    let ratings: Vec<f64> =
        reviews.iter().filter_map(|review| review.get(RATING_FIELD)?.as_f64()).collect();

    let (quantity, average) = if ratings.is_empty() {
        (0, DEFAULT_RATINGS_AVERAGE)
    } else {
        (ratings.len(), ratings.iter().sum::<f64>() / ratings.len() as f64)
    };
    doc.insert("ratingsQuantity".to_owned(), Value::from(quantity));
    doc.insert("ratingsAverage".to_owned(), Value::from(average));

    db::replace(ex, TOURS.collection, tour, &doc).await.map_err(not_found)?;
    Ok(())
}
