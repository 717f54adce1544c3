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

//! Business logic for the service.

use std::sync::Arc;
use std::time::Duration;
use wayfarer_authn::model::{SessionOptions, TokenCodec};
use wayfarer_core::clocks::Clock;
use wayfarer_core::db::{Db, DbError};
use wayfarer_core::driver::DriverError;
use wayfarer_core::model::ModelError;
use wayfarer_core::rest::BaseUrl;
use wayfarer_smtp::driver::SmtpMailer;
use wayfarer_smtp::model::{EmailTemplate, Mailbox};

mod analytics;
mod auth;
pub(crate) use auth::restrict_to;
mod ratings;
mod resources;
#[cfg(test)]
pub(crate) mod testutils;

/// Message returned when a document requested by identifier does not exist or is hidden.
const NO_DOCUMENT: &str = "No document found with that ID";

/// Subject of the password reset email.
const RESET_SUBJECT: &str = "Your password reset token (valid for 10 min)";

/// Body of the password reset email.
const RESET_BODY: &str = "Forgot your password? Submit a PATCH request with your new password \
and passwordConfirm to: %reset_url%

If you didn't forget your password, please ignore this email!
";

/// Converts a database error into a driver error, describing missing documents the way
/// clients expect.
fn not_found(e: DbError) -> DriverError {
    match e {
        DbError::NotFound => DriverError::NotFound(NO_DOCUMENT.to_owned()),
        e => e.into(),
    }
}

/// Converts a model error found while reading stored data into a driver error.
///
/// Stored documents were validated when written, so failures here are not the caller's fault.
fn corrupt(e: ModelError) -> DriverError {
    DbError::from(e).into()
}

/// Business logic.
///
/// The public operations exposed by the driver are all "one shot": they start and commit a
/// transaction, so it's incorrect for the caller to use two separate calls.  For this reason,
/// these operations consume the driver in an attempt to minimize the possibility of executing
/// two operations.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The database that the driver uses for persistence.
    db: Arc<dyn Db + Send + Sync>,

    /// The clock used to obtain timestamps.
    clock: Arc<dyn Clock + Send + Sync>,

    /// The service used to send password reset emails.
    mailer: Arc<dyn SmtpMailer + Send + Sync>,

    /// Issuer and verifier of session tokens.
    tokens: TokenCodec,

    /// Lifetime of the session cookie.
    cookie_expires_in: Duration,

    /// Public address of the service, used to build links sent by email.
    base_url: Arc<BaseUrl>,

    /// Template of the password reset email.
    reset_template: Arc<EmailTemplate>,
}

impl Driver {
    /// Creates a new driver backed by the given injected components.
    pub(crate) fn new(
        db: Arc<dyn Db + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        mailer: Arc<dyn SmtpMailer + Send + Sync>,
        session: &SessionOptions,
        base_url: Arc<BaseUrl>,
        email_from: Mailbox,
    ) -> Self {
        let reset_template = EmailTemplate {
            from: email_from,
            subject_template: RESET_SUBJECT,
            body_template: RESET_BODY,
        };
        Self {
            db,
            clock,
            mailer,
            tokens: TokenCodec::new(session),
            cookie_expires_in: session.cookie_expires_in,
            base_url,
            reset_template: Arc::from(reset_template),
        }
    }

    /// Returns how long session cookies should live in the browser.
    pub(crate) fn cookie_expires_in(&self) -> Duration {
        self.cookie_expires_in
    }
}

