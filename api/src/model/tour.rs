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

//! The tours collection.

use crate::model::query::{Comparison, Populate, QuerySpec};
use crate::model::review::REVIEWS;
use crate::model::record::Document;
use crate::model::schema::{Checker, Resource, Schema, set_default};
use serde::Serialize;
use serde_json::Value;

/// Rating given to tours that have no reviews yet.
pub(crate) const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Accepted values for the difficulty of a tour.
const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

/// Marker type for the tours collection.
pub(crate) enum Tours {}

impl Resource for Tours {
    const SCHEMA: &'static Schema = &TOURS;
}

/// Schema of the tours collection.
pub(crate) static TOURS: Schema = Schema {
    collection: "tours",
    hidden: &[],
    protected: &[],
    prepare,
    validate,
    decorators: &[hide_secret_tours],
    single_populate: &[Populate::Virtual {
        path: "reviews",
        schema: &REVIEWS,
        foreign_field: "tour",
    }],
    rated_parent: None,
};

/// Turns a tour name into the URL-friendly slug stored alongside it.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Fills in defaults and derives the slug from the name.
fn prepare(doc: &mut Document) {
    set_default(doc, "ratingsAverage", DEFAULT_RATINGS_AVERAGE);
    set_default(doc, "ratingsQuantity", 0);
    set_default(doc, "secretTour", false);

    let slug = match doc.get("name") {
        Some(Value::String(name)) => Some(slugify(name)),
        _ => None,
    };
    match slug {
        Some(slug) => doc.insert("slug".to_owned(), Value::String(slug)),
        None => doc.remove("slug"),
    };
}

/// Validates a tour.
fn validate(doc: &Document) -> Vec<String> {
    let mut checker = Checker::new(doc);
    checker.required("name", "A tour must have a name").string_length(
        "name",
        Some((10, "A tour name must have more or equal then 10 characters")),
        Some((40, "A tour name must have less or equal then 40 characters")),
    );
    checker.required("duration", "A tour must have a duration").positive("duration");
    checker.required("maxGroupSize", "A tour must have a group size").positive("maxGroupSize");
    checker.required("difficulty", "A tour must have a difficulty").one_of(
        "difficulty",
        DIFFICULTIES,
        "Difficulty is either: easy, medium, difficult",
    );
    checker.number_range("ratingsAverage", 1.0, 5.0, "Rating must be between 1.0 and 5.0");
    checker.number_range("ratingsQuantity", 0.0, f64::MAX, "Ratings quantity cannot be negative");
    checker.required("price", "A tour must have a price");
    let price = checker.number("price");
    let discount = checker.number("priceDiscount");
    if price.is_some_and(|price| price <= 0.0) {
        checker.fail("price must be greater than zero");
    }
    if let (Some(discount), Some(price)) = (discount, price) {
        if discount >= price {
            checker.fail(format!(
                "Discount price ({}) should be below regular price",
                doc.get("priceDiscount").map(Value::to_string).unwrap_or_default()
            ));
        }
    }
    for field in ["slug", "summary", "description", "imageCover"] {
        checker.string(field);
    }
    checker.string_array("images").date_array("startDates").boolean("secretTour");
    checker.point("startLocation").point_array("locations").id_array("guides");
    checker.finish()
}

/// Hides secret tours from every query.
fn hide_secret_tours(spec: QuerySpec) -> QuerySpec {
    spec.with_predicate("secretTour", Comparison::Ne, true)
}

/// Aggregated statistics for the tours of one difficulty level.
#[derive(Debug, PartialEq, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub(crate) struct TourStats {
    /// Difficulty level in uppercase.
    #[serde(rename = "_id")]
    pub(crate) difficulty: String,

    /// Number of tours in the group.
    pub(crate) num_tours: u64,

    /// Total number of ratings received by the tours in the group.
    pub(crate) num_ratings: u64,

    /// Mean of the average ratings of the tours in the group.
    pub(crate) avg_rating: f64,

    /// Mean price of the tours in the group.
    pub(crate) avg_price: f64,

    /// Cheapest price in the group.
    pub(crate) min_price: f64,

    /// Most expensive price in the group.
    pub(crate) max_price: f64,
}

/// Tours starting in a given month.
#[derive(Debug, PartialEq, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub(crate) struct MonthlyPlan {
    /// Month number, 1 for January.
    pub(crate) month: u8,

    /// Number of tour departures in the month.
    pub(crate) num_tour_starts: u64,

    /// Names of the departing tours, one per departure.
    pub(crate) tours: Vec<String>,
}

/// Distance from a reference point to the start of a tour.
#[derive(Debug, PartialEq, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub(crate) struct TourDistance {
    /// Identifier of the tour.
    pub(crate) id: String,

    /// Name of the tour.
    pub(crate) name: String,

    /// Distance in the requested unit.
    pub(crate) distance: f64,
}
