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

//! Database abstraction in terms of the operations needed by the service.
//!
//! All collections share a single `documents` table keyed by collection name and identifier.
//! The identifier is kept out of the stored document and is merged back in on every read.

use crate::model::query::{Filter, SortOrder};
use crate::model::record::{Document, ID_FIELD, RecordId};
use wayfarer_core::db::{DbResult, Executor};

mod postgres;
mod sqlite;
#[cfg(test)]
mod tests;

/// Creates the schema of the service if it does not exist yet.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        Executor::Postgres(ex) => {
            wayfarer_core::db::postgres::run_schema(ex, include_str!("postgres.sql")).await
        }

        Executor::Sqlite(ex) => {
            wayfarer_core::db::sqlite::run_schema(ex, include_str!("sqlite.sql")).await
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Returns a copy of `doc` without its identifier, which lives in its own column.
fn without_id(doc: &Document) -> Document {
    doc.iter().filter(|(k, _)| *k != ID_FIELD).map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Stores a new `doc` with `id` in `collection`.
///
/// Fails with `AlreadyExists` if the document violates any of the uniqueness constraints.
pub(crate) async fn insert(
    ex: &mut Executor,
    collection: &str,
    id: RecordId,
    doc: &Document,
) -> DbResult<()> {
    let doc = without_id(doc);
    match ex {
        Executor::Postgres(ex) => postgres::insert(ex, collection, id, &doc).await,
        Executor::Sqlite(ex) => sqlite::insert(ex, collection, id, &doc).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Finds all documents in `collection` that match `filter`, ordered by `sort`.
///
/// `window` carries the number of documents to skip and the maximum number of documents to
/// return.  Documents that compare equal under `sort` are returned in identifier order.
pub(crate) async fn find(
    ex: &mut Executor,
    collection: &str,
    filter: &Filter,
    sort: &[(String, SortOrder)],
    window: Option<(u64, u64)>,
) -> DbResult<Vec<Document>> {
    match ex {
        Executor::Postgres(ex) => postgres::find(ex, collection, filter, sort, window).await,
        Executor::Sqlite(ex) => sqlite::find(ex, collection, filter, sort, window).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Counts the documents in `collection` that match `filter`.
pub(crate) async fn count(ex: &mut Executor, collection: &str, filter: &Filter) -> DbResult<u64> {
    match ex {
        Executor::Postgres(ex) => postgres::count(ex, collection, filter).await,
        Executor::Sqlite(ex) => sqlite::count(ex, collection, filter).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets the document with `id` from `collection`.
pub(crate) async fn get(ex: &mut Executor, collection: &str, id: RecordId) -> DbResult<Document> {
    match ex {
        Executor::Postgres(ex) => postgres::get(ex, collection, id, false).await,
        Executor::Sqlite(ex) => sqlite::get(ex, collection, id).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets the document with `id` from `collection` and locks it until the end of the transaction
/// that `ex` represents.
pub(crate) async fn get_for_update(
    ex: &mut Executor,
    collection: &str,
    id: RecordId,
) -> DbResult<Document> {
    match ex {
        Executor::Postgres(ex) => postgres::get(ex, collection, id, true).await,
        Executor::Sqlite(ex) => sqlite::get(ex, collection, id).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Replaces the contents of the existing document with `id` in `collection` with `doc`.
pub(crate) async fn replace(
    ex: &mut Executor,
    collection: &str,
    id: RecordId,
    doc: &Document,
) -> DbResult<()> {
    let doc = without_id(doc);
    match ex {
        Executor::Postgres(ex) => postgres::replace(ex, collection, id, &doc).await,
        Executor::Sqlite(ex) => sqlite::replace(ex, collection, id, &doc).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Deletes the document with `id` from `collection`.
pub(crate) async fn delete(ex: &mut Executor, collection: &str, id: RecordId) -> DbResult<()> {
    match ex {
        Executor::Postgres(ex) => postgres::delete(ex, collection, id).await,
        Executor::Sqlite(ex) => sqlite::delete(ex, collection, id).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}
