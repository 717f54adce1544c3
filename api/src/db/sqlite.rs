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

//! Document storage on top of SQLite.
//!
//! Documents are stored as JSON text and fields are addressed with `json_extract`, whose
//! paths are always bound as query parameters.

use crate::model::query::{Comparison, Filter, SortOrder};
use crate::model::record::{Document, ID_FIELD, RecordId};
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};
use wayfarer_core::db::sqlite::{SqliteExecutor, map_sqlx_error};
use wayfarer_core::db::{DbError, DbResult};

/// Converts a window bound to the type SQLite expects.
fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Appends the SQL expression that yields `field`.
fn push_field(qb: &mut QueryBuilder<'_, Sqlite>, field: &str) {
    if field == ID_FIELD {
        qb.push("id");
    } else {
        qb.push("json_extract(doc, ");
        qb.push_bind(format!("$.{}", field));
        qb.push(")");
    }
}

/// Appends `value` as a bound parameter of the type `json_extract` would return for it.
fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or(f64::NAN));
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

/// Appends the `WHERE` clause that restricts the query to `collection` and `filter`.
fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, collection: &str, filter: &Filter) {
    qb.push(" WHERE collection = ");
    qb.push_bind(collection.to_owned());
    for (field, conditions) in filter {
        for (comparison, value) in conditions {
            qb.push(" AND ");
            if *comparison == Comparison::Ne {
                qb.push("(");
                push_field(qb, field);
                qb.push(" IS NULL OR ");
                push_field(qb, field);
                qb.push(" <> ");
                push_value(qb, value);
                qb.push(")");
            } else {
                push_field(qb, field);
                qb.push(" ");
                qb.push(comparison.as_sql());
                qb.push(" ");
                push_value(qb, value);
            }
        }
    }
}

/// Appends the `ORDER BY` clause for `sort`, using the identifier to break ties.
fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, sort: &[(String, SortOrder)]) {
    qb.push(" ORDER BY ");
    for (field, order) in sort {
        push_field(qb, field);
        match order {
            SortOrder::Ascending => qb.push(" ASC, "),
            SortOrder::Descending => qb.push(" DESC, "),
        };
    }
    qb.push("id ASC");
}

/// Converts a row with `id` and `doc` columns into a document.
fn decode(row: SqliteRow) -> DbResult<Document> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let doc: String = row.try_get("doc").map_err(map_sqlx_error)?;
    let mut doc: Document = serde_json::from_str(&doc)?;
    doc.insert(ID_FIELD.to_owned(), Value::String(id));
    Ok(doc)
}

pub(super) async fn insert(
    ex: &mut SqliteExecutor,
    collection: &str,
    id: RecordId,
    doc: &Document,
) -> DbResult<()> {
    let query_str = "INSERT INTO documents (collection, id, doc) VALUES (?, ?, ?)";
    let done = sqlx::query(query_str)
        .bind(collection)
        .bind(id.to_string())
        .bind(serde_json::to_string(doc)?)
        .execute(ex.conn())
        .await
        .map_err(map_sqlx_error)?;
    if done.rows_affected() != 1 {
        return Err(DbError::BackendError("Insertion did not affect exactly one row".to_owned()));
    }
    Ok(())
}

pub(super) async fn find(
    ex: &mut SqliteExecutor,
    collection: &str,
    filter: &Filter,
    sort: &[(String, SortOrder)],
    window: Option<(u64, u64)>,
) -> DbResult<Vec<Document>> {
    let mut qb = QueryBuilder::new("SELECT id, doc FROM documents");
    push_where(&mut qb, collection, filter);
    push_order(&mut qb, sort);
    if let Some((skip, limit)) = window {
        qb.push(" LIMIT ");
        qb.push_bind(to_i64(limit));
        qb.push(" OFFSET ");
        qb.push_bind(to_i64(skip));
    }

    let rows = qb.build().fetch_all(ex.conn()).await.map_err(map_sqlx_error)?;
    rows.into_iter().map(decode).collect()
}

pub(super) async fn count(
    ex: &mut SqliteExecutor,
    collection: &str,
    filter: &Filter,
) -> DbResult<u64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM documents");
    push_where(&mut qb, collection, filter);
    let count: i64 =
        qb.build_query_scalar().fetch_one(ex.conn()).await.map_err(map_sqlx_error)?;
    u64::try_from(count).map_err(|e| DbError::DataIntegrityError(e.to_string()))
}

pub(super) async fn get(
    ex: &mut SqliteExecutor,
    collection: &str,
    id: RecordId,
) -> DbResult<Document> {
    // SQLite serializes writers, so there is nothing to lock here.
    let query_str = "SELECT id, doc FROM documents WHERE collection = ? AND id = ?";
    let row = sqlx::query(query_str)
        .bind(collection)
        .bind(id.to_string())
        .fetch_optional(ex.conn())
        .await
        .map_err(map_sqlx_error)?;
    match row {
        Some(row) => decode(row),
        None => Err(DbError::NotFound),
    }
}

pub(super) async fn replace(
    ex: &mut SqliteExecutor,
    collection: &str,
    id: RecordId,
    doc: &Document,
) -> DbResult<()> {
    let query_str = "UPDATE documents SET doc = ? WHERE collection = ? AND id = ?";
    let done = sqlx::query(query_str)
        .bind(serde_json::to_string(doc)?)
        .bind(collection)
        .bind(id.to_string())
        .execute(ex.conn())
        .await
        .map_err(map_sqlx_error)?;
    match done.rows_affected() {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Update affected more than one row".to_owned())),
    }
}

pub(super) async fn delete(
    ex: &mut SqliteExecutor,
    collection: &str,
    id: RecordId,
) -> DbResult<()> {
    let query_str = "DELETE FROM documents WHERE collection = ? AND id = ?";
    let done = sqlx::query(query_str)
        .bind(collection)
        .bind(id.to_string())
        .execute(ex.conn())
        .await
        .map_err(map_sqlx_error)?;
    match done.rows_affected() {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
    }
}
