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

//! Identifiers, timestamps and helpers shared by every stored record.

use serde_json::Value;
use std::fmt;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;
use wayfarer_core::model::{ModelError, ModelResult};

/// A record as stored and returned by the service: a JSON object keyed by field name.
pub(crate) type Document = serde_json::Map<String, Value>;

/// Name of the field that carries the identifier of a record.
pub(crate) const ID_FIELD: &str = "id";

/// Name of the field that carries the creation time of a record.
pub(crate) const CREATED_AT_FIELD: &str = "createdAt";

/// Name of the field that counts the updates applied to a record.
pub(crate) const VERSION_FIELD: &str = "__v";

/// Fields maintained by the service that clients cannot set.
pub(crate) const SYSTEM_FIELDS: &[&str] = &[ID_FIELD, CREATED_AT_FIELD, VERSION_FIELD];

/// Unique identifier of a record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct RecordId(Uuid);

impl RecordId {
    /// Generates a new random identifier.
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier received from a client.
    pub(crate) fn parse(s: &str) -> ModelResult<Self> {
        Uuid::parse_str(s).map(Self).map_err(|_| ModelError(format!("Invalid id: {}", s)))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Formats `ts` the way timestamps are stored in documents.
///
/// All timestamps have the same width so that their lexicographical order matches their
/// chronological order, which lets the store compare them as plain strings.
pub(crate) fn format_timestamp(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(time::UtcOffset::UTC);
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    match ts.format(format) {
        Ok(s) => s,
        Err(e) => unreachable!("Timestamps in UTC must always be formattable: {}", e),
    }
}

/// Parses a timestamp previously produced by `format_timestamp`.
pub(crate) fn parse_timestamp(s: &str) -> ModelResult<OffsetDateTime> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    PrimitiveDateTime::parse(s, format)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| ModelError(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Returns the string value of `field` in `doc`, if it is present and is a string.
pub(crate) fn get_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// Returns the identifier of `doc`, which must have been read back from the store.
pub(crate) fn get_id(doc: &Document) -> ModelResult<RecordId> {
    match get_str(doc, ID_FIELD) {
        Some(id) => RecordId::parse(id),
        None => Err(ModelError("Record has no id".to_owned())),
    }
}
