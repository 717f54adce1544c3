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

//! Declarative description of the collections served by the API.

use crate::model::query::{Decorator, Populate, Projection, QuerySpec, project};
use crate::model::record::{Document, RecordId, parse_timestamp};
use serde_json::Value;
use std::fmt;
use wayfarer_core::model::{ModelError, ModelResult};

/// Everything the generic handlers need to know about a collection.
pub(crate) struct Schema {
    /// Name of the collection in the store.
    pub(crate) collection: &'static str,

    /// Fields that are stored but never returned to clients.
    pub(crate) hidden: &'static [&'static str],

    /// Fields that generic create and update operations refuse to write.
    pub(crate) protected: &'static [&'static str],

    /// Fills in defaults and derived fields before validation.
    pub(crate) prepare: fn(&mut Document),

    /// Returns the list of problems found in a fully-merged document.
    pub(crate) validate: fn(&Document) -> Vec<String>,

    /// Transformations applied to every query against the collection.
    pub(crate) decorators: &'static [Decorator],

    /// Related documents embedded when fetching a single record.
    pub(crate) single_populate: &'static [Populate],

    /// Field holding the tour whose ratings are aggregated from this collection, if any.
    pub(crate) rated_parent: Option<&'static str>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("collection", &self.collection).finish_non_exhaustive()
    }
}

impl Schema {
    /// Ensures that `body` does not attempt to write protected fields.
    pub(crate) fn check_writable(&self, body: &Document) -> ModelResult<()> {
        match self.protected.iter().find(|field| body.contains_key(**field)) {
            Some(field) => {
                Err(ModelError(format!("Field {} cannot be modified through this route", field)))
            }
            None => Ok(()),
        }
    }

    /// Ensures that `spec` does not filter or sort on hidden fields.
    pub(crate) fn check_queryable(&self, spec: &QuerySpec) -> ModelResult<()> {
        for field in spec.referenced_fields() {
            let top = field.split('.').next().unwrap_or(field);
            if self.hidden.contains(&top) {
                return Err(ModelError(format!("Invalid field name: {}", field)));
            }
        }
        Ok(())
    }

    /// Prepares `doc` and validates it, joining all problems into a single error.
    pub(crate) fn prepare_and_validate(&self, doc: &mut Document) -> ModelResult<()> {
        (self.prepare)(doc);
        let errors = (self.validate)(doc);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModelError(format!("Invalid input data. {}", errors.join(". "))))
        }
    }

    /// Converts a stored document into what clients get to see.
    pub(crate) fn present(&self, doc: Document, projection: &Projection) -> Document {
        let mut doc = project(doc, projection);
        for field in self.hidden {
            doc.remove(*field);
        }
        doc
    }
}

/// Static binding between a type and the schema of the collection it represents.
///
/// Generic handlers are instantiated once per resource type, as in `handler::<Tours>`.
pub(crate) trait Resource: Send + Sync + 'static {
    /// Schema of the collection.
    const SCHEMA: &'static Schema;
}

/// Accumulates validation problems for a document.
pub(crate) struct Checker<'a> {
    /// Document under validation.
    doc: &'a Document,

    /// Problems found so far.
    errors: Vec<String>,
}

impl<'a> Checker<'a> {
    /// Starts validating `doc`.
    pub(crate) fn new(doc: &'a Document) -> Self {
        Self { doc, errors: vec![] }
    }

    /// Returns the value of `field`, treating `null` as absent.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.doc.get(field).filter(|v| !v.is_null())
    }

    /// Records a problem.
    pub(crate) fn fail<S: Into<String>>(&mut self, message: S) {
        self.errors.push(message.into());
    }

    /// Records a type error for `field`.
    fn invalid(&mut self, field: &str, value: &Value) {
        self.fail(format!("Invalid {}: {}", field, value));
    }

    /// Requires `field` to be present.
    pub(crate) fn required(&mut self, field: &str, message: &str) -> &mut Self {
        if self.get(field).is_none() {
            self.fail(message);
        }
        self
    }

    /// Requires `field`, if present, to be a string and returns it.
    pub(crate) fn string(&mut self, field: &str) -> Option<&'a str> {
        match self.get(field) {
            None => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                self.invalid(field, other);
                None
            }
        }
    }

    /// Requires `field`, if present, to be a string whose length in characters is in range.
    pub(crate) fn string_length(
        &mut self,
        field: &str,
        min: Option<(usize, &str)>,
        max: Option<(usize, &str)>,
    ) -> &mut Self {
        if let Some(s) = self.string(field) {
            let length = s.trim().chars().count();
            if let Some((min, message)) = min {
                if length < min {
                    self.fail(message);
                }
            }
            if let Some((max, message)) = max {
                if length > max {
                    self.fail(message);
                }
            }
        }
        self
    }

    /// Requires `field`, if present, to be one of `values`.
    pub(crate) fn one_of(&mut self, field: &str, values: &[&str], message: &str) -> &mut Self {
        if let Some(s) = self.string(field) {
            if !values.contains(&s) {
                self.fail(message);
            }
        }
        self
    }

    /// Requires `field`, if present, to be a number and returns it.
    pub(crate) fn number(&mut self, field: &str) -> Option<f64> {
        match self.get(field) {
            None => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(other) => {
                self.invalid(field, other);
                None
            }
        }
    }

    /// Requires `field`, if present, to be a number within `min..=max`.
    pub(crate) fn number_range(
        &mut self,
        field: &str,
        min: f64,
        max: f64,
        message: &str,
    ) -> &mut Self {
        if let Some(n) = self.number(field) {
            if n < min || n > max {
                self.fail(message);
            }
        }
        self
    }

    /// Requires `field`, if present, to be a number strictly greater than zero.
    pub(crate) fn positive(&mut self, field: &str) -> &mut Self {
        if let Some(n) = self.number(field) {
            if n <= 0.0 {
                self.fail(format!("{} must be greater than zero", field));
            }
        }
        self
    }

    /// Requires `field`, if present, to be a boolean.
    pub(crate) fn boolean(&mut self, field: &str) -> &mut Self {
        match self.get(field) {
            None | Some(Value::Bool(_)) => (),
            Some(other) => self.invalid(field, other),
        }
        self
    }

    /// Requires `field`, if present, to be an array and returns its elements.
    fn array(&mut self, field: &str) -> &'a [Value] {
        match self.get(field) {
            None => &[],
            Some(Value::Array(values)) => values.as_slice(),
            Some(other) => {
                self.invalid(field, other);
                &[]
            }
        }
    }

    /// Requires `field`, if present, to be an array of strings.
    pub(crate) fn string_array(&mut self, field: &str) -> &mut Self {
        for value in self.array(field) {
            if !value.is_string() {
                self.invalid(field, value);
            }
        }
        self
    }

    /// Requires `value` to be a string holding a record identifier.
    fn check_id(&mut self, field: &str, value: &Value) {
        match value.as_str().map(RecordId::parse) {
            Some(Ok(_)) => (),
            Some(Err(e)) => self.fail(e.0),
            None => self.invalid(field, value),
        }
    }

    /// Requires `field`, if present, to be a record identifier.
    pub(crate) fn id(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.get(field) {
            self.check_id(field, value);
        }
        self
    }

    /// Requires `field`, if present, to be an array of record identifiers.
    pub(crate) fn id_array(&mut self, field: &str) -> &mut Self {
        for value in self.array(field) {
            self.check_id(field, value);
        }
        self
    }

    /// Requires `field`, if present, to be an array of dates in `YYYY-MM-DD` form, optionally
    /// followed by a time.
    pub(crate) fn date_array(&mut self, field: &str) -> &mut Self {
        for value in self.array(field) {
            if value.as_str().and_then(parse_date).is_none() {
                self.invalid(field, value);
            }
        }
        self
    }

    /// Requires `field`, if present, to be a timestamp as produced by the service.
    pub(crate) fn timestamp(&mut self, field: &str) -> &mut Self {
        if let Some(s) = self.string(field) {
            if let Err(e) = parse_timestamp(s) {
                self.fail(e.0);
            }
        }
        self
    }

    /// Requires `value` to be a GeoJSON point with `[longitude, latitude]` coordinates.
    fn check_point(&mut self, field: &str, value: &Value) {
        let valid = value.as_object().is_some_and(|point| {
            let kind_ok = point.get("type").is_none_or(|kind| kind == "Point");
            let coordinates_ok = match point.get("coordinates").and_then(Value::as_array) {
                Some(coordinates) => match coordinates.as_slice() {
                    [lng, lat] => match (lng.as_f64(), lat.as_f64()) {
                        (Some(lng), Some(lat)) => {
                            (-180.0..=180.0).contains(&lng) && (-90.0..=90.0).contains(&lat)
                        }
                        _ => false,
                    },
                    _ => false,
                },
                None => false,
            };
            kind_ok && coordinates_ok
        });
        if !valid {
            self.fail(format!("Invalid {}: coordinates must be [longitude, latitude]", field));
        }
    }

    /// Requires `field`, if present, to be a GeoJSON point.
    pub(crate) fn point(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.get(field) {
            self.check_point(field, value);
        }
        self
    }

    /// Requires `field`, if present, to be an array of GeoJSON points.
    pub(crate) fn point_array(&mut self, field: &str) -> &mut Self {
        for value in self.array(field) {
            self.check_point(field, value);
        }
        self
    }

    /// Returns all problems found.
    pub(crate) fn finish(self) -> Vec<String> {
        self.errors
    }
}

/// Parses the date part of a start date, which is in `YYYY-MM-DD` form optionally followed by
/// a time.
pub(crate) fn parse_date(s: &str) -> Option<time::Date> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    let date = s.get(0..10)?;
    match s.as_bytes().get(10) {
        None | Some(b'T') | Some(b' ') | Some(b',') => time::Date::parse(date, format).ok(),
        Some(_) => None,
    }
}

/// Sets `field` to `value` unless the document already has a value for it.
pub(crate) fn set_default<V: Into<Value>>(doc: &mut Document, field: &str, value: V) {
    if doc.get(field).is_none_or(Value::is_null) {
        doc.insert(field.to_owned(), value.into());
    }
}
