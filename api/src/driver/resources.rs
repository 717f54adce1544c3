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

//! Generic operations on the documents of any collection.

use crate::db;
use crate::driver::ratings::recompute_ratings;
use crate::driver::{Driver, NO_DOCUMENT, corrupt, not_found};
use crate::model::query::{Comparison, Populate, Projection, QuerySpec, decorate};
use crate::model::record::{
    CREATED_AT_FIELD, Document, ID_FIELD, RecordId, SYSTEM_FIELDS, VERSION_FIELD,
    format_timestamp, get_str,
};
use crate::model::schema::Schema;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use time::OffsetDateTime;
use wayfarer_core::db::Executor;
use wayfarer_core::driver::{DriverError, DriverResult};

/// Message returned when the requested page starts past the last document.
const NO_PAGE: &str = "This page does not exist";

/// Copies the fields of a new document that clients may set, dropping system fields and nulls.
fn sanitize_new(body: Document) -> Document {
    body.into_iter()
        .filter(|(key, value)| !value.is_null() && !SYSTEM_FIELDS.contains(&key.as_str()))
        .collect()
}

/// Merges `patch` into `doc`.  A `null` in the patch removes the field and system fields are
/// left untouched.
fn merge(doc: &mut Document, patch: Document) {
    for (key, value) in patch {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if value.is_null() {
            doc.remove(&key);
        } else {
            doc.insert(key, value);
        }
    }
}

/// Increments the version counter of `doc`.
fn bump_version(doc: &mut Document) {
    let version = doc.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0);
    doc.insert(VERSION_FIELD.to_owned(), Value::from(version + 1));
}

/// Returns the query that finds the document with `id` in `schema` if clients can see it.
pub(super) fn by_id(schema: &Schema, id: RecordId) -> QuerySpec {
    let spec = QuerySpec::default().with_predicate(ID_FIELD, Comparison::Eq, id.to_string());
    decorate(spec, schema.decorators)
}

/// Embeds the related documents named by `directives` into every document in `docs`.
///
/// Populated documents are subject to the decorators of their own schema, which may ask to
/// populate further documents.
pub(super) fn populate<'a>(
    ex: &'a mut Executor,
    mut docs: Vec<Document>,
    directives: &'a [Populate],
) -> BoxFuture<'a, DriverResult<Vec<Document>>> {
    async move {
        for directive in directives {
            match directive {
                Populate::Reference { path, schema, fields } => {
                    let projection =
                        Projection::Include(fields.iter().map(|f| (*f).to_owned()).collect());
                    let mut cache: HashMap<String, Value> = HashMap::new();
                    for doc in docs.iter_mut() {
                        let Some(id) = get_str(doc, path).map(str::to_owned) else {
                            continue;
                        };
                        if !cache.contains_key(&id) {
                            let value = match RecordId::parse(&id) {
                                Ok(id) => {
                                    let spec = by_id(schema, id);
                                    let found = db::find(
                                        ex,
                                        schema.collection,
                                        &spec.filter,
                                        &[],
                                        Some((0, 1)),
                                    )
                                    .await?;
                                    let found = populate(ex, found, &spec.populate).await?;
                                    match found.into_iter().next() {
                                        Some(found) => {
                                            Value::Object(schema.present(found, &projection))
                                        }
                                        None => Value::Null,
                                    }
                                }
                                Err(_) => Value::Null,
                            };
                            cache.insert(id.clone(), value);
                        }
                        let value = cache.get(&id).cloned().unwrap_or(Value::Null);
                        doc.insert((*path).to_owned(), value);
                    }
                }

                Populate::Virtual { path, schema, foreign_field } => {
                    for doc in docs.iter_mut() {
                        let Some(id) = get_str(doc, ID_FIELD).map(str::to_owned) else {
                            continue;
                        };
                        let spec = QuerySpec::default().with_predicate(
                            *foreign_field,
                            Comparison::Eq,
                            id,
                        );
                        let spec = decorate(spec, schema.decorators);
                        let found =
                            db::find(ex, schema.collection, &spec.filter, &spec.sort, None)
                                .await?;
                        let found = populate(ex, found, &spec.populate).await?;
                        let found = found
                            .into_iter()
                            .map(|found| Value::Object(schema.present(found, &spec.projection)))
                            .collect();
                        doc.insert((*path).to_owned(), Value::Array(found));
                    }
                }
            }
        }
        Ok(docs)
    }
    .boxed()
}

/// Recomputes the ratings of the tours referenced by the `before` and `after` versions of a
/// document of `schema`, if the collection feeds tour ratings.
async fn refresh_ratings(
    ex: &mut Executor,
    schema: &Schema,
    before: Option<&Document>,
    after: Option<&Document>,
) -> DriverResult<()> {
    let Some(field) = schema.rated_parent else {
        return Ok(());
    };

    let before = before.and_then(|doc| get_str(doc, field));
    let after = after.and_then(|doc| get_str(doc, field));

    if let Some(tour) = after {
        recompute_ratings(ex, RecordId::parse(tour)?).await?;
    }

    if let Some(tour) = before.filter(|before| Some(*before) != after) {
        // The previous tour may be gone already, in which case there is nothing to refresh.
        match recompute_ratings(ex, RecordId::parse(tour).map_err(corrupt)?).await {
            Ok(()) | Err(DriverError::NotFound(_)) => (),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Validates and stores a new document `doc` in `schema` as of `now`, returning the stored
/// document including its identifier.
pub(super) async fn insert_document(
    ex: &mut Executor,
    schema: &Schema,
    now: OffsetDateTime,
    mut doc: Document,
) -> DriverResult<Document> {
    schema.prepare_and_validate(&mut doc)?;
    doc.insert(CREATED_AT_FIELD.to_owned(), Value::String(format_timestamp(now)));
    doc.insert(VERSION_FIELD.to_owned(), Value::from(0));

    let id = RecordId::generate();
    db::insert(ex, schema.collection, id, &doc).await?;
    doc.insert(ID_FIELD.to_owned(), Value::String(id.to_string()));

    refresh_ratings(ex, schema, None, Some(&doc)).await?;
    Ok(doc)
}

impl Driver {
    /// Lists the documents of `schema` that match `spec`.
    pub(crate) async fn get_all(
        self,
        schema: &'static Schema,
        spec: QuerySpec,
    ) -> DriverResult<Vec<Document>> {
        schema.check_queryable(&spec)?;
        let spec = decorate(spec, schema.decorators);

        let mut ex = self.db.ex().await?;

        let skip = spec.skip();
        if skip > 0 && skip >= db::count(&mut ex, schema.collection, &spec.filter).await? {
            return Err(DriverError::NotFound(NO_PAGE.to_owned()));
        }

        let docs = db::find(
            &mut ex,
            schema.collection,
            &spec.filter,
            &spec.sort,
            Some((skip, spec.limit)),
        )
        .await?;
        let docs = populate(&mut ex, docs, &spec.populate).await?;
        Ok(docs.into_iter().map(|doc| schema.present(doc, &spec.projection)).collect())
    }

    /// Gets the document with `id` from `schema`, embedding the related documents that are
    /// only shown for single documents.
    pub(crate) async fn get_one(
        self,
        schema: &'static Schema,
        id: RecordId,
    ) -> DriverResult<Document> {
        let spec = by_id(schema, id);

        let mut ex = self.db.ex().await?;

        let docs = db::find(&mut ex, schema.collection, &spec.filter, &[], Some((0, 1))).await?;
        if docs.is_empty() {
            return Err(DriverError::NotFound(NO_DOCUMENT.to_owned()));
        }

        let mut directives = spec.populate.clone();
        directives.extend_from_slice(schema.single_populate);
        let mut docs = populate(&mut ex, docs, &directives).await?;
        match docs.pop() {
            Some(doc) => Ok(schema.present(doc, &spec.projection)),
            None => Err(DriverError::NotFound(NO_DOCUMENT.to_owned())),
        }
    }

    /// Creates a new document in `schema` from the client-provided `body`.
    pub(crate) async fn create_one(
        self,
        schema: &'static Schema,
        body: Document,
    ) -> DriverResult<Document> {
        schema.check_writable(&body)?;

        let now = self.clock.now_utc();
        let mut tx = self.db.begin().await?;
        let doc = insert_document(tx.ex(), schema, now, sanitize_new(body)).await?;
        tx.commit().await?;

        Ok(schema.present(doc, &Projection::default()))
    }

    /// Applies the client-provided `patch` to the document with `id` in `schema`.
    ///
    /// The merged document is validated as a whole before anything is written.
    pub(crate) async fn update_one(
        self,
        schema: &'static Schema,
        id: RecordId,
        patch: Document,
    ) -> DriverResult<Document> {
        schema.check_writable(&patch)?;

        let mut tx = self.db.begin().await?;

        let before = db::get_for_update(tx.ex(), schema.collection, id).await.map_err(not_found)?;
        let mut doc = before.clone();
        merge(&mut doc, patch);
        bump_version(&mut doc);
        schema.prepare_and_validate(&mut doc)?;

        db::replace(tx.ex(), schema.collection, id, &doc).await.map_err(not_found)?;
        refresh_ratings(tx.ex(), schema, Some(&before), Some(&doc)).await?;
        tx.commit().await?;

        Ok(schema.present(doc, &Projection::default()))
    }

    /// Deletes the document with `id` from `schema`.
    pub(crate) async fn delete_one(
        self,
        schema: &'static Schema,
        id: RecordId,
    ) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;

        let before = db::get_for_update(tx.ex(), schema.collection, id).await.map_err(not_found)?;
        db::delete(tx.ex(), schema.collection, id).await.map_err(not_found)?;
        refresh_ratings(tx.ex(), schema, Some(&before), None).await?;
        tx.commit().await?;

        Ok(())
    }
}
