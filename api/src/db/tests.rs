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

//! Database tests shared by all implementations.

use super::*;
use crate::model::query::Comparison;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use wayfarer_core::db::{Db, DbError};

/// Converts a JSON object literal into a document.
fn doc(value: Value) -> Document {
    value.as_object().unwrap().clone()
}

/// Builds a filter with a single `comparison` on `field`.
fn filter(field: &str, comparison: Comparison, value: Value) -> Filter {
    let mut filter = Filter::default();
    filter.insert(field.to_owned(), BTreeMap::from([(comparison, value)]));
    filter
}

/// Inserts a tour named `name` with `price` and returns its identifier.
async fn insert_tour(ex: &mut Executor, name: &str, price: i64) -> RecordId {
    let id = RecordId::generate();
    insert(ex, "tours", id, &doc(json!({"name": name, "price": price}))).await.unwrap();
    id
}

/// Extracts the names of the given documents, in order.
fn names(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d["name"].as_str().unwrap()).collect()
}

async fn test_insert_and_get(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    let id = RecordId::generate();
    let stored = doc(json!({"name": "The Sea Explorer", "price": 497, "nested": {"a": [1, 2]}}));
    insert(&mut ex, "tours", id, &stored).await.unwrap();

    let mut exp = stored.clone();
    exp.insert("id".to_owned(), json!(id.to_string()));
    assert_eq!(exp, get(&mut ex, "tours", id).await.unwrap());
    assert_eq!(exp, get_for_update(&mut ex, "tours", id).await.unwrap());

    assert_eq!(DbError::NotFound, get(&mut ex, "users", id).await.unwrap_err());
    assert_eq!(
        DbError::NotFound,
        get(&mut ex, "tours", RecordId::generate()).await.unwrap_err()
    );
}

async fn test_insert_strips_id(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    let id = RecordId::generate();
    let other = RecordId::generate();
    insert(&mut ex, "tours", id, &doc(json!({"id": other.to_string(), "name": "x"})))
        .await
        .unwrap();

    let fetched = get(&mut ex, "tours", id).await.unwrap();
    assert_eq!(json!(id.to_string()), fetched["id"]);
}

async fn test_unique_constraints(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    insert_tour(&mut ex, "The Forest Hiker", 397).await;
    assert_eq!(
        DbError::AlreadyExists,
        insert(&mut ex, "tours", RecordId::generate(), &doc(json!({"name": "The Forest Hiker"})))
            .await
            .unwrap_err()
    );

    // Names only need to be unique within tours.
    insert(&mut ex, "users", RecordId::generate(), &doc(json!({"name": "The Forest Hiker"})))
        .await
        .unwrap();

    let review = doc(json!({"tour": "t1", "user": "u1", "review": "Nice"}));
    insert(&mut ex, "reviews", RecordId::generate(), &review).await.unwrap();
    insert(&mut ex, "reviews", RecordId::generate(), &doc(json!({"tour": "t1", "user": "u2"})))
        .await
        .unwrap();
    assert_eq!(
        DbError::AlreadyExists,
        insert(&mut ex, "reviews", RecordId::generate(), &review).await.unwrap_err()
    );
}

async fn test_find_filter_and_sort(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    insert_tour(&mut ex, "c", 300).await;
    insert_tour(&mut ex, "a", 100).await;
    insert_tour(&mut ex, "d", 400).await;
    insert_tour(&mut ex, "b", 200).await;
    insert(&mut ex, "users", RecordId::generate(), &doc(json!({"name": "e", "price": 250})))
        .await
        .unwrap();

    let all = find(&mut ex, "tours", &Filter::default(), &[], None).await.unwrap();
    assert_eq!(4, all.len());

    let sort = [("price".to_owned(), SortOrder::Ascending)];
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, None).await.unwrap();
    assert_eq!(vec!["a", "b", "c", "d"], names(&docs));

    let sort = [("name".to_owned(), SortOrder::Descending)];
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, None).await.unwrap();
    assert_eq!(vec!["d", "c", "b", "a"], names(&docs));

    let sort = [("price".to_owned(), SortOrder::Ascending)];
    let mut f = filter("price", Comparison::Gte, json!(200));
    f.get_mut("price").unwrap().insert(Comparison::Lt, json!(400.5));
    let docs = find(&mut ex, "tours", &f, &sort, None).await.unwrap();
    assert_eq!(vec!["b", "c", "d"], names(&docs));

    let f = filter("name", Comparison::Eq, json!("c"));
    let docs = find(&mut ex, "tours", &f, &sort, None).await.unwrap();
    assert_eq!(vec!["c"], names(&docs));
}

async fn test_find_window(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    for (i, name) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        insert_tour(&mut ex, name, i as i64).await;
    }

    let sort = [("price".to_owned(), SortOrder::Ascending)];
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, Some((0, 2))).await.unwrap();
    assert_eq!(vec!["a", "b"], names(&docs));
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, Some((2, 2))).await.unwrap();
    assert_eq!(vec!["c", "d"], names(&docs));
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, Some((4, 2))).await.unwrap();
    assert_eq!(vec!["e"], names(&docs));
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, Some((6, 2))).await.unwrap();
    assert!(docs.is_empty());
}

async fn test_find_ties_broken_by_id(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    let mut ids = vec![];
    for name in ["a", "b", "c", "d"] {
        ids.push(insert_tour(&mut ex, name, 100).await.to_string());
    }
    ids.sort();

    let sort = [("price".to_owned(), SortOrder::Descending)];
    let docs = find(&mut ex, "tours", &Filter::default(), &sort, None).await.unwrap();
    let found: Vec<String> = docs.iter().map(|d| d["id"].as_str().unwrap().to_owned()).collect();
    assert_eq!(ids, found);
}

async fn test_find_ne_matches_missing(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    for (name, secret) in [("a", Some(true)), ("b", Some(false)), ("c", None)] {
        let mut tour = doc(json!({"name": name}));
        if let Some(secret) = secret {
            tour.insert("secretTour".to_owned(), json!(secret));
        }
        insert(&mut ex, "tours", RecordId::generate(), &tour).await.unwrap();
    }

    let sort = [("name".to_owned(), SortOrder::Ascending)];
    let f = filter("secretTour", Comparison::Ne, json!(true));
    let docs = find(&mut ex, "tours", &f, &sort, None).await.unwrap();
    assert_eq!(vec!["b", "c"], names(&docs));
    assert_eq!(2, count(&mut ex, "tours", &f).await.unwrap());

    let f = filter("secretTour", Comparison::Eq, json!(true));
    let docs = find(&mut ex, "tours", &f, &sort, None).await.unwrap();
    assert_eq!(vec!["a"], names(&docs));
}

async fn test_find_nested_and_id_fields(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    let id = RecordId::generate();
    let tour = doc(json!({"name": "a", "startLocation": {"description": "Miami, USA"}}));
    insert(&mut ex, "tours", id, &tour).await.unwrap();
    insert_tour(&mut ex, "b", 5).await;

    let f = filter("startLocation.description", Comparison::Eq, json!("Miami, USA"));
    let docs = find(&mut ex, "tours", &f, &[], None).await.unwrap();
    assert_eq!(vec!["a"], names(&docs));

    let f = filter("id", Comparison::Eq, json!(id.to_string()));
    let docs = find(&mut ex, "tours", &f, &[], None).await.unwrap();
    assert_eq!(vec!["a"], names(&docs));

    let f = filter("id", Comparison::Ne, json!(id.to_string()));
    let docs = find(&mut ex, "tours", &f, &[], None).await.unwrap();
    assert_eq!(vec!["b"], names(&docs));
}

async fn test_count(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    assert_eq!(0, count(&mut ex, "tours", &Filter::default()).await.unwrap());
    insert_tour(&mut ex, "a", 100).await;
    insert_tour(&mut ex, "b", 200).await;
    assert_eq!(2, count(&mut ex, "tours", &Filter::default()).await.unwrap());
    assert_eq!(0, count(&mut ex, "users", &Filter::default()).await.unwrap());

    let f = filter("price", Comparison::Gt, json!(100));
    assert_eq!(1, count(&mut ex, "tours", &f).await.unwrap());
}

async fn test_replace_and_delete(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    let id = insert_tour(&mut ex, "a", 100).await;
    replace(&mut ex, "tours", id, &doc(json!({"name": "z"}))).await.unwrap();
    let fetched = get(&mut ex, "tours", id).await.unwrap();
    assert_eq!(doc(json!({"id": id.to_string(), "name": "z"})), fetched);

    let missing = RecordId::generate();
    assert_eq!(
        DbError::NotFound,
        replace(&mut ex, "tours", missing, &doc(json!({}))).await.unwrap_err()
    );
    assert_eq!(
        DbError::NotFound,
        replace(&mut ex, "users", id, &doc(json!({}))).await.unwrap_err()
    );

    assert_eq!(DbError::NotFound, delete(&mut ex, "users", id).await.unwrap_err());
    delete(&mut ex, "tours", id).await.unwrap();
    assert_eq!(DbError::NotFound, get(&mut ex, "tours", id).await.unwrap_err());
    assert_eq!(DbError::NotFound, delete(&mut ex, "tours", id).await.unwrap_err());
}

async fn test_replace_keeps_unique_constraints(db: &dyn Db) {
    let mut ex = db.ex().await.unwrap();

    insert_tour(&mut ex, "a", 100).await;
    let id = insert_tour(&mut ex, "b", 100).await;
    assert_eq!(
        DbError::AlreadyExists,
        replace(&mut ex, "tours", id, &doc(json!({"name": "a"}))).await.unwrap_err()
    );
}

async fn test_tx_rollback_on_drop(db: &dyn Db) {
    {
        let mut tx = db.begin().await.unwrap();
        insert_tour(tx.ex(), "a", 100).await;
    }

    let mut ex = db.ex().await.unwrap();
    assert_eq!(0, count(&mut ex, "tours", &Filter::default()).await.unwrap());
}

async fn test_tx_commit(db: &dyn Db) {
    let mut tx = db.begin().await.unwrap();
    let id = insert_tour(tx.ex(), "a", 100).await;
    tx.commit().await.unwrap();

    let mut ex = db.ex().await.unwrap();
    get(&mut ex, "tours", id).await.unwrap();
}

macro_rules! generate_one_db_test [
    ( $name:ident, $setup:expr $(, #[$extra:meta])? ) => {
        #[tokio::test]
        $( #[$extra] )?
        async fn $name() {
            let db = $setup.await;
            init_schema(&mut db.ex().await.unwrap()).await.unwrap();
            super::$name(&db).await;
            db.close().await;
        }
    }
];

macro_rules! generate_db_tests [
    ( $setup:expr, #[$extra:meta] ; $( $name:ident ),+ $(,)? ) => {
        $(
            generate_one_db_test!($name, $setup, #[$extra]);
        )+
    };

    ( $setup:expr ; $( $name:ident ),+ $(,)? ) => {
        $(
            generate_one_db_test!($name, $setup);
        )+
    };
];

macro_rules! all_db_tests [
    ( $setup:expr $(, #[$extra:meta])? ) => {
        generate_db_tests!(
            $setup $(, #[$extra])? ;
            test_insert_and_get,
            test_insert_strips_id,
            test_unique_constraints,
            test_find_filter_and_sort,
            test_find_window,
            test_find_ties_broken_by_id,
            test_find_ne_matches_missing,
            test_find_nested_and_id_fields,
            test_count,
            test_replace_and_delete,
            test_replace_keeps_unique_constraints,
            test_tx_rollback_on_drop,
            test_tx_commit,
        );
    }
];

mod postgres {
    use super::*;

    all_db_tests!(
        wayfarer_core::db::postgres::testutils::setup(),
        #[ignore = "Requires environment configuration and is expensive"]
    );
}

mod sqlite {
    use super::*;

    all_db_tests!(wayfarer_core::db::sqlite::testutils::setup());
}
