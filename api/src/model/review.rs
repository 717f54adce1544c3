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

//! The reviews collection.

use crate::model::query::{Populate, QuerySpec};
use crate::model::record::Document;
use crate::model::schema::{Checker, Resource, Schema};
use crate::model::user::USERS;

/// Field referencing the reviewed tour.
pub(crate) const TOUR_FIELD: &str = "tour";

/// Field referencing the author of the review.
pub(crate) const USER_FIELD: &str = "user";

/// Field with the numeric rating.
pub(crate) const RATING_FIELD: &str = "rating";

/// Marker type for the reviews collection.
pub(crate) enum Reviews {}

impl Resource for Reviews {
    const SCHEMA: &'static Schema = &REVIEWS;
}

/// Schema of the reviews collection.
pub(crate) static REVIEWS: Schema = Schema {
    collection: "reviews",
    hidden: &[],
    protected: &[],
    prepare: |_| (),
    validate,
    decorators: &[populate_author],
    single_populate: &[],
    rated_parent: Some(TOUR_FIELD),
};

/// Validates a review.
fn validate(doc: &Document) -> Vec<String> {
    let mut checker = Checker::new(doc);
    checker.required("review", "Review cannot be empty").string_length(
        "review",
        Some((1, "Review cannot be empty")),
        Some((500, "A review must have less or equal than 500 characters")),
    );
    checker.number_range(RATING_FIELD, 1.0, 5.0, "Rating must be between 1 and 5");
    checker.required(TOUR_FIELD, "Review must belong to a tour").id(TOUR_FIELD);
    checker.required(USER_FIELD, "Review must have an author").id(USER_FIELD);
    checker.finish()
}

/// Embeds the public profile of the author into every review.
fn populate_author(spec: QuerySpec) -> QuerySpec {
    spec.with_populate(Populate::Reference {
        path: USER_FIELD,
        schema: &USERS,
        fields: &["name", "photo"],
    })
}
