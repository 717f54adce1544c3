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

//! Translation of URL query parameters into store-agnostic query specifications.
//!
//! A `QuerySpec` is built fresh for every request, optionally adjusted by the decorators of the
//! resource being queried, and then handed to the `db` layer, which renders the filter, sort
//! and window to SQL.  Projections and populate directives are applied by the driver on the
//! documents returned by the store.

use crate::model::record::{CREATED_AT_FIELD, Document, ID_FIELD, VERSION_FIELD};
use crate::model::schema::Schema;
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use wayfarer_core::model::{ModelError, ModelResult};

/// Page returned when the query does not ask for one.
const DEFAULT_PAGE: u64 = 1;

/// Number of records per page when the query does not ask for a specific amount.
const DEFAULT_LIMIT: u64 = 100;

/// Maximum length of a field path accepted in a query.
const MAX_PATH_LENGTH: usize = 128;

/// Query parameters that control the shape of the result instead of filtering it.
pub(crate) const RESERVED_PARAMS: &[&str] = &["page", "sort", "limit", "fields"];

/// Comparison operators supported in filters.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub(crate) enum Comparison {
    /// Field equals the value.
    Eq,

    /// Field is absent or differs from the value.
    Ne,

    /// Field is greater than the value.
    Gt,

    /// Field is greater than or equal to the value.
    Gte,

    /// Field is less than the value.
    Lt,

    /// Field is less than or equal to the value.
    Lte,
}

impl Comparison {
    /// Parses the operator given in brackets after a field name, as in `price[lt]=500`.
    fn from_operator(op: &str) -> ModelResult<Self> {
        match op {
            "gt" => Ok(Comparison::Gt),
            "gte" => Ok(Comparison::Gte),
            "lt" => Ok(Comparison::Lt),
            "lte" => Ok(Comparison::Lte),
            _ => Err(ModelError(format!("Unsupported operator: {}", op))),
        }
    }

    /// Returns the SQL operator for this comparison.
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

/// Conjunction of conditions: field path to comparison to value.
pub(crate) type Filter = BTreeMap<String, BTreeMap<Comparison, Value>>;

/// Direction in which to sort by a field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum SortOrder {
    /// Smallest values first.
    Ascending,

    /// Largest values first.
    Descending,
}

/// Subset of fields to return for every document.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Projection {
    /// Return only these fields, plus the identifier.
    Include(Vec<String>),

    /// Return all fields except these.
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(vec![VERSION_FIELD.to_owned()])
    }
}

/// Instructions to embed related documents into the documents returned by a query.
#[derive(Clone, Debug)]
pub(crate) enum Populate {
    /// Replaces the identifier stored in `path` with the referenced document.
    Reference {
        /// Field holding the identifier of the referenced document.
        path: &'static str,

        /// Schema of the referenced document.
        schema: &'static Schema,

        /// Fields of the referenced document to embed.
        fields: &'static [&'static str],
    },

    /// Adds a `path` field listing the documents whose `foreign_field` points back at us.
    Virtual {
        /// Field to add to the document.
        path: &'static str,

        /// Schema of the documents to embed.
        schema: &'static Schema,

        /// Field of the embedded documents that holds our identifier.
        foreign_field: &'static str,
    },
}

/// Everything needed to run a query against a collection.
#[derive(Clone, Debug)]
pub(crate) struct QuerySpec {
    /// Conditions that returned documents must satisfy.
    pub(crate) filter: Filter,

    /// Sort keys, most significant first.
    pub(crate) sort: Vec<(String, SortOrder)>,

    /// Fields to return.
    pub(crate) projection: Projection,

    /// 1-based page number.
    pub(crate) page: u64,

    /// Maximum number of documents per page.
    pub(crate) limit: u64,

    /// Related documents to embed, in order.
    pub(crate) populate: Vec<Populate>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            sort: vec![(CREATED_AT_FIELD.to_owned(), SortOrder::Descending)],
            projection: Projection::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            populate: vec![],
        }
    }
}

/// Checks that `path` is a plausible dotted field path, which also makes it safe to embed in
/// JSON path expressions.
pub(crate) fn validate_path(path: &str) -> ModelResult<()> {
    let valid = !path.is_empty()
        && path.len() <= MAX_PATH_LENGTH
        && path.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid { Ok(()) } else { Err(ModelError(format!("Invalid field name: {}", path))) }
}

/// Converts a raw query value to the most specific JSON type it can represent.
fn coerce(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_owned()),
    }
}

/// Parses a positive integer for pagination, returning `None` for anything else.
fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

/// Splits a filter key like `price[lt]` into its field and comparison.
fn parse_filter_key(key: &str) -> ModelResult<(&str, Comparison)> {
    let (field, comparison) = match key.split_once('[') {
        None => (key, Comparison::Eq),
        Some((field, rest)) => match rest.strip_suffix(']') {
            Some(op) => (field, Comparison::from_operator(op)?),
            None => return Err(ModelError(format!("Invalid field name: {}", key))),
        },
    };
    validate_path(field)?;
    Ok((field, comparison))
}

/// Parses the value of the `sort` parameter.
fn parse_sort(raw: &str) -> ModelResult<Vec<(String, SortOrder)>> {
    let mut sort = vec![];
    for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let (field, order) = match field.strip_prefix('-') {
            Some(field) => (field, SortOrder::Descending),
            None => (field, SortOrder::Ascending),
        };
        validate_path(field)?;
        sort.push((field.to_owned(), order));
    }
    Ok(sort)
}

/// Parses the value of the `fields` parameter.
fn parse_fields(raw: &str) -> ModelResult<Option<Projection>> {
    let mut include = vec![];
    let mut exclude = vec![];
    for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match field.strip_prefix('-') {
            Some(field) => {
                validate_path(field)?;
                exclude.push(field.to_owned());
            }
            None => {
                validate_path(field)?;
                include.push(field.to_owned());
            }
        }
    }

    match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Ok(None),
        (false, true) => Ok(Some(Projection::Include(include))),
        (true, false) => Ok(Some(Projection::Exclude(exclude))),
        (false, false) => Err(ModelError(
            "Cannot mix included and excluded fields in a projection".to_owned(),
        )),
    }
}

impl QuerySpec {
    /// Translates the raw query-string `pairs` of a request into a query specification.
    pub(crate) fn from_query<K, V>(pairs: &[(K, V)]) -> ModelResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut spec = QuerySpec::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "page" => spec.page = parse_positive(value).unwrap_or(DEFAULT_PAGE),
                "limit" => spec.limit = parse_positive(value).unwrap_or(DEFAULT_LIMIT),
                "sort" => {
                    let sort = parse_sort(value)?;
                    if !sort.is_empty() {
                        spec.sort = sort;
                    }
                }
                "fields" => {
                    if let Some(projection) = parse_fields(value)? {
                        spec.projection = projection;
                    }
                }
                key => {
                    let (field, comparison) = parse_filter_key(key)?;
                    spec = spec.with_predicate(field, comparison, coerce(value));
                }
            }
        }
        Ok(spec)
    }

    /// Number of documents to skip to reach the requested page.
    pub(crate) fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Adds a condition to the filter, replacing any previous one on the same field and
    /// comparison.
    pub(crate) fn with_predicate<F, V>(mut self, field: F, comparison: Comparison, value: V) -> Self
    where
        F: Into<String>,
        V: Into<Value>,
    {
        self.filter.entry(field.into()).or_default().insert(comparison, value.into());
        self
    }

    /// Appends a populate directive.
    pub(crate) fn with_populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    /// Returns an iterator over every field path referenced by the filter and the sort keys.
    pub(crate) fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.filter.keys().map(String::as_str).chain(self.sort.iter().map(|(f, _)| f.as_str()))
    }
}

/// Pure transformation applied to every query against a collection.
pub(crate) type Decorator = fn(QuerySpec) -> QuerySpec;

/// Applies the `decorators` of a resource to `spec`, in order.
pub(crate) fn decorate(spec: QuerySpec, decorators: &[Decorator]) -> QuerySpec {
    decorators.iter().fold(spec, |spec, decorator| decorator(spec))
}

/// Removes the nested field at `path` from `doc`, if present.
fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Applies `projection` to `doc`.
///
/// Inclusions operate on top-level fields: including `startLocation.address` keeps the whole
/// `startLocation` object.
pub(crate) fn project(mut doc: Document, projection: &Projection) -> Document {
    match projection {
        Projection::Include(fields) => {
            doc.retain(|key, _| {
                key == ID_FIELD
                    || fields.iter().any(|f| f.split('.').next() == Some(key.as_str()))
            });
        }
        Projection::Exclude(fields) => {
            for field in fields {
                remove_path(&mut doc, field);
            }
        }
    }
    doc
}
