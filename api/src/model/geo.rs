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

//! Geospatial helpers for the tour search endpoints.

use crate::model::record::Document;
use wayfarer_core::model::{ModelError, ModelResult};

/// Error message for malformed coordinates.
const BAD_LATLNG: &str = "Please provide latitude and longitude in the format lat,lng.";

/// A point on the surface of the earth, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LatLng {
    /// Latitude, in -90..=90.
    lat: f64,

    /// Longitude, in -180..=180.
    lng: f64,
}

impl LatLng {
    /// Creates a point after validating the ranges of its coordinates.
    pub(crate) fn new(lat: f64, lng: f64) -> ModelResult<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(ModelError(BAD_LATLNG.to_owned()));
        }
        Ok(Self { lat, lng })
    }

    /// Parses a point given as `lat,lng`.
    pub(crate) fn parse(s: &str) -> ModelResult<Self> {
        let (lat, lng) = s.split_once(',').ok_or_else(|| ModelError(BAD_LATLNG.to_owned()))?;
        match (lat.trim().parse::<f64>(), lng.trim().parse::<f64>()) {
            (Ok(lat), Ok(lng)) => Self::new(lat, lng),
            _ => Err(ModelError(BAD_LATLNG.to_owned())),
        }
    }

    /// Extracts the GeoJSON point stored in `field` of `doc`, whose coordinates are in
    /// `[lng, lat]` order.
    pub(crate) fn from_geojson(doc: &Document, field: &str) -> Option<Self> {
        let coordinates = doc.get(field)?.get("coordinates")?.as_array()?;
        match coordinates.as_slice() {
            [lng, lat] => Self::new(lat.as_f64()?, lng.as_f64()?).ok(),
            _ => None,
        }
    }

    /// Computes the angle between two points as seen from the center of the earth, in radians.
    pub(crate) fn central_angle(self, other: LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }
}

/// Units in which distances are requested and reported.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum DistanceUnit {
    /// Statute miles.
    Miles,

    /// Kilometers.
    Kilometers,
}

impl DistanceUnit {
    /// Parses the unit given in a URL.
    pub(crate) fn parse(s: &str) -> ModelResult<Self> {
        match s {
            "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Kilometers),
            _ => Err(ModelError(format!("Invalid unit {}: must be mi or km", s))),
        }
    }

    /// Radius of the earth in this unit.
    pub(crate) fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => 3963.2,
            DistanceUnit::Kilometers => 6378.1,
        }
    }

    /// Distance along the surface of the earth that spans `angle` radians.
    pub(crate) fn distance(self, angle: f64) -> f64 {
        angle * self.earth_radius()
    }
}

/// Parses a non-negative distance given in a URL.
pub(crate) fn parse_distance(s: &str) -> ModelResult<f64> {
    match s.parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(ModelError(format!("Invalid distance: {}", s))),
    }
}

/// Returns the value of a GeoJSON point with `lat` and `lng`, for tests and seeding.
#[cfg(test)]
pub(crate) fn geojson_point(lat: f64, lng: f64) -> serde_json::Value {
    serde_json::json!({"type": "Point", "coordinates": [lng, lat]})
}
