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

//! Test utilities for the business logic.

use crate::db::{self, init_schema};
use crate::driver::Driver;
use crate::driver::resources::insert_document;
use crate::model::record::{Document, RecordId};
use crate::model::review::REVIEWS;
use crate::model::schema::Schema;
use crate::model::tour::TOURS;
use crate::model::user::{USERS, User};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use time::macros::datetime;
use wayfarer_authn::model::{Password, Role, SessionOptions, SessionToken, TokenCodec};
use wayfarer_core::clocks::Clock;
use wayfarer_core::clocks::testutils::SettableClock;
use wayfarer_core::db::{Db, Executor, sqlite};
use wayfarer_core::model::EmailAddress;
use wayfarer_core::rest::BaseUrl;
use wayfarer_smtp::driver::testutils::RecorderSmtpMailer;
use wayfarer_smtp::model::testutils::parse_message;

/// Password given to all accounts created by `TestContext::create_user`.
pub(crate) const DEFAULT_PASSWORD: &str = "test1234";

/// Returns the session options used by tests.
pub(crate) fn test_session_options() -> SessionOptions {
    SessionOptions {
        secret: "test-secret".to_owned(),
        expires_in: Duration::from_secs(90 * 24 * 60 * 60),
        cookie_expires_in: Duration::from_secs(90 * 24 * 60 * 60),
    }
}

/// Builds a valid tour document named `name` that costs `price`.
pub(crate) fn tour_doc(name: &str, price: i64) -> Document {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "price": price,
    })
    .as_object()
    .unwrap()
    .clone()
}

/// Builds a valid review document by `user` for `tour` with `rating`.
pub(crate) fn review_doc(tour: RecordId, user: RecordId, rating: u8) -> Document {
    json!({
        "review": "What an experience!",
        "rating": rating,
        "tour": tour.to_string(),
        "user": user.to_string(),
    })
    .as_object()
    .unwrap()
    .clone()
}

/// Container for the state required to run a driver test.
pub(crate) struct TestContext {
    db: Arc<dyn Db + Send + Sync>,
    clock: Arc<SettableClock>,
    mailer: Arc<RecorderSmtpMailer>,
    tokens: TokenCodec,
    driver: Driver,
}

impl TestContext {
    /// Initializes a driver backed by an in-memory database and fake collaborators.
    pub(crate) async fn setup() -> Self {
        let _can_fail = env_logger::builder().is_test(true).try_init();

        let db = Arc::from(sqlite::testutils::setup().await);
        let mut ex = db.ex().await.unwrap();
        init_schema(&mut ex).await.unwrap();
        drop(ex);

        let clock = Arc::from(SettableClock::new(datetime!(2023-10-17 06:00:00 UTC)));
        let mailer = Arc::from(RecorderSmtpMailer::default());

        let session = test_session_options();
        let driver = Driver::new(
            db.clone(),
            clock.clone(),
            mailer.clone(),
            &session,
            Arc::from(BaseUrl::from_str_unchecked("http://localhost:3000/")),
            "Wayfarer <noreply@example.com>".parse().unwrap(),
        );

        Self { db, clock, mailer, tokens: TokenCodec::new(&session), driver }
    }

    /// Returns a copy of the driver under test.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Returns the clock used by the driver.
    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    /// Returns the mailer used by the driver.
    pub(crate) fn mailer(&self) -> &RecorderSmtpMailer {
        &self.mailer
    }

    /// Returns a direct executor against the database.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Gets the stored form of the document `id` in `schema`, bypassing any presentation rules.
    pub(crate) async fn get_raw(&self, schema: &Schema, id: RecordId) -> Document {
        let mut ex = self.ex().await;
        db::get(&mut ex, schema.collection, id).await.unwrap()
    }

    /// Creates a valid tour named `name` that costs `price`.
    pub(crate) async fn create_tour(&self, name: &str, price: i64) -> RecordId {
        let doc = self.driver().create_one(&TOURS, tour_doc(name, price)).await.unwrap();
        RecordId::parse(doc["id"].as_str().unwrap()).unwrap()
    }

    /// Creates an account with `role` whose password is `DEFAULT_PASSWORD`.
    pub(crate) async fn create_user(&self, name: &str, email: &str, role: Role) -> User {
        let hash = Password::from(DEFAULT_PASSWORD).hash().await.unwrap();
        let doc = json!({
            "name": name,
            "email": email,
            "role": role.as_str(),
            "password": hash.as_str(),
        })
        .as_object()
        .unwrap()
        .clone();

        let mut tx = self.db.begin().await.unwrap();
        let doc = insert_document(tx.ex(), &USERS, self.clock.now_utc(), doc).await.unwrap();
        tx.commit().await.unwrap();
        User::try_from(doc).unwrap()
    }

    /// Creates a review by `user` for `tour` with `rating`.
    pub(crate) async fn create_review(
        &self,
        tour: RecordId,
        user: RecordId,
        rating: u8,
    ) -> RecordId {
        let doc = self.driver().create_one(&REVIEWS, review_doc(tour, user, rating)).await.unwrap();
        RecordId::parse(doc["id"].as_str().unwrap()).unwrap()
    }

    /// Issues a session token for `user` as of the current fake time.
    pub(crate) fn token_for(&self, user: &User) -> SessionToken {
        self.token_for_subject(&user.id().to_string())
    }

    /// Issues a session token for an arbitrary `subject` as of the current fake time.
    pub(crate) fn token_for_subject(&self, subject: &str) -> SessionToken {
        self.tokens.issue(subject, self.clock.now_utc()).unwrap()
    }

    /// Extracts the password reset token from the only email sent to `email`.
    pub(crate) async fn take_reset_token(&self, email: &str) -> String {
        let message = self.mailer.expect_one_message(&EmailAddress::from(email)).await;
        let parsed = parse_message(&message);
        let link = parsed.link_containing("/resetPassword/");
        link.rsplit('/').next().unwrap().to_owned()
    }
}
