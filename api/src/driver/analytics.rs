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

//! Aggregated views over the tours collection.

use crate::db;
use crate::driver::Driver;
use crate::model::geo::{DistanceUnit, LatLng};
use crate::model::query::{Comparison, Projection, QuerySpec, decorate};
use crate::model::record::{Document, get_str};
use crate::model::schema::parse_date;
use crate::model::tour::{MonthlyPlan, TOURS, TourDistance, TourStats};
use serde_json::Value;
use std::collections::BTreeMap;
use wayfarer_core::db::Executor;
use wayfarer_core::driver::DriverResult;

/// Minimum average rating of the tours that take part in the statistics.
const STATS_MIN_RATING: f64 = 4.5;

/// Maximum number of months reported by the monthly plan.
const PLAN_MAX_MONTHS: usize = 12;

/// Field holding the GeoJSON point where a tour starts.
const START_LOCATION_FIELD: &str = "startLocation";

/// Fetches all visible tours that match `spec`.
async fn visible_tours(ex: &mut Executor, spec: QuerySpec) -> DriverResult<Vec<Document>> {
    let spec = decorate(spec, TOURS.decorators);
    Ok(db::find(ex, TOURS.collection, &spec.filter, &[], None).await?)
}

/// Returns the numeric value of `field` in `doc`, or zero if missing.
fn number(doc: &Document, field: &str) -> f64 {
    doc.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Running totals for one group of tours.
#[derive(Default)]
struct StatsAccumulator {
    num_tours: u64,
    num_ratings: u64,
    sum_rating: f64,
    sum_price: f64,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

impl StatsAccumulator {
    /// Adds `tour` to the group.
    fn add(&mut self, tour: &Document) {
        let price = number(tour, "price");
        self.num_tours += 1;
        self.num_ratings += tour.get("ratingsQuantity").and_then(Value::as_u64).unwrap_or(0);
        self.sum_rating += number(tour, "ratingsAverage");
        self.sum_price += price;
        self.min_price = Some(self.min_price.map_or(price, |min| min.min(price)));
        self.max_price = Some(self.max_price.map_or(price, |max| max.max(price)));
    }

    /// Computes the statistics of the group labeled `difficulty`.
    fn finish(self, difficulty: String) -> TourStats {
        let n = self.num_tours as f64;
        TourStats {
            difficulty,
            num_tours: self.num_tours,
            num_ratings: self.num_ratings,
            avg_rating: self.sum_rating / n,
            avg_price: self.sum_price / n,
            min_price: self.min_price.unwrap_or(0.0),
            max_price: self.max_price.unwrap_or(0.0),
        }
    }
}

impl Driver {
    /// Computes per-difficulty statistics over the well rated tours.
    pub(crate) async fn tour_stats(self) -> DriverResult<Vec<TourStats>> {
        let spec = QuerySpec::default().with_predicate(
            "ratingsAverage",
            Comparison::Gte,
            STATS_MIN_RATING,
        );
        let mut ex = self.db.ex().await?;
        let tours = visible_tours(&mut ex, spec).await?;

        let mut groups: BTreeMap<String, StatsAccumulator> = BTreeMap::new();
        for tour in &tours {
            let difficulty = get_str(tour, "difficulty").unwrap_or_default().to_uppercase();
            groups.entry(difficulty).or_default().add(tour);
        }

        let mut stats: Vec<TourStats> =
            groups.into_iter().map(|(difficulty, acc)| acc.finish(difficulty)).collect();
        stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
        Ok(stats)
    }

    /// Computes how many tours start in each month of `year`, busiest months first.
    pub(crate) async fn monthly_plan(self, year: i32) -> DriverResult<Vec<MonthlyPlan>> {
        let mut ex = self.db.ex().await?;
        let tours = visible_tours(&mut ex, QuerySpec::default()).await?;

        let mut months: BTreeMap<u8, Vec<String>> = BTreeMap::new();
        for tour in &tours {
            let name = get_str(tour, "name").unwrap_or_default();
            let dates = tour.get("startDates").and_then(Value::as_array);
            for date in dates.into_iter().flatten().filter_map(Value::as_str).filter_map(parse_date)
            {
                if date.year() == year {
                    months.entry(u8::from(date.month())).or_default().push(name.to_owned());
                }
            }
        }

        let mut plan: Vec<MonthlyPlan> = months
            .into_iter()
            .map(|(month, tours)| MonthlyPlan { month, num_tour_starts: tours.len() as u64, tours })
            .collect();
        plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts).then(a.month.cmp(&b.month)));
        plan.truncate(PLAN_MAX_MONTHS);
        Ok(plan)
    }

    /// Finds the tours that start within `distance` of `center`.
    pub(crate) async fn tours_within(
        self,
        distance: f64,
        center: LatLng,
        unit: DistanceUnit,
    ) -> DriverResult<Vec<Document>> {
        let max_angle = distance / unit.earth_radius();

        let mut ex = self.db.ex().await?;
        let tours = visible_tours(&mut ex, QuerySpec::default()).await?;

        Ok(tours
            .into_iter()
            .filter(|tour| {
                LatLng::from_geojson(tour, START_LOCATION_FIELD)
                    .is_some_and(|start| center.central_angle(start) <= max_angle)
            })
            .map(|tour| TOURS.present(tour, &Projection::default()))
            .collect())
    }

    /// Computes the distance from `center` to the start of every tour, closest first.
    pub(crate) async fn tour_distances(
        self,
        center: LatLng,
        unit: DistanceUnit,
    ) -> DriverResult<Vec<TourDistance>> {
        let mut ex = self.db.ex().await?;
        let tours = visible_tours(&mut ex, QuerySpec::default()).await?;

        let mut distances: Vec<TourDistance> = tours
            .iter()
            .filter_map(|tour| {
                let start = LatLng::from_geojson(tour, START_LOCATION_FIELD)?;
                Some(TourDistance {
                    id: get_str(tour, "id")?.to_owned(),
                    name: get_str(tour, "name").unwrap_or_default().to_owned(),
                    distance: unit.distance(center.central_angle(start)),
                })
            })
            .collect();
        distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(distances)
    }
}
