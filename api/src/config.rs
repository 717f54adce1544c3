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

//! Startup configuration of the service.

use wayfarer_authn::model::SessionOptions;
use wayfarer_core::db::postgres::PostgresOptions;
use wayfarer_core::env::{Environment, get_optional_var, get_required_var};
use wayfarer_core::rest::BaseUrl;
use wayfarer_smtp::driver::SmtpOptions;
use wayfarer_smtp::model::Mailbox;

/// Port to listen on when none is configured.
const DEFAULT_PORT: u16 = 3000;

/// Where the documents live.
#[derive(Debug)]
pub(crate) enum DatabaseOptions {
    /// A PostgreSQL server.
    Postgres(PostgresOptions),

    /// A SQLite database, identified by its connection string.
    Sqlite(String),
}

impl DatabaseOptions {
    /// Initializes the database options from the `<prefix>_URL` environment variable, picking
    /// the backend from the scheme of the URL.
    ///
    /// PostgreSQL URLs may carry a password placeholder, filled in from `<prefix>_PASSWORD`.
    fn from_env(prefix: &str) -> Result<Self, String> {
        let url = get_required_var::<String>(prefix, "URL")?;
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DatabaseOptions::Postgres(PostgresOptions::from_env(prefix)?))
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseOptions::Sqlite(url))
        } else {
            Err(format!("Unsupported database URL in {}_URL: must be postgres or sqlite", prefix))
        }
    }
}

/// Settings of the service, read once at startup.
pub struct Config {
    /// Where the documents live.
    pub(crate) database: DatabaseOptions,

    /// Port to listen on.
    pub(crate) port: u16,

    /// Mode in which the service runs.
    pub(crate) environment: Environment,

    /// Public address of the service.
    pub(crate) base_url: BaseUrl,

    /// Configuration of session tokens and cookies.
    pub(crate) session: SessionOptions,

    /// Connection details of the outgoing mail server.
    pub(crate) smtp: SmtpOptions,

    /// Sender of the emails sent by the service.
    pub(crate) email_from: Mailbox,
}

impl Config {
    /// Reads the configuration from environment variables whose names start with `prefix`.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let email_from = get_required_var::<String>(prefix, "EMAIL_FROM")?;
        let email_from = email_from
            .parse::<Mailbox>()
            .map_err(|e| format!("Invalid {}_EMAIL_FROM '{}': {}", prefix, email_from, e))?;

        Ok(Self {
            database: DatabaseOptions::from_env(&format!("{}_DATABASE", prefix))?,
            port: get_optional_var::<u16>(prefix, "PORT")?.unwrap_or(DEFAULT_PORT),
            environment: get_optional_var::<Environment>(prefix, "ENV")?.unwrap_or_default(),
            base_url: BaseUrl::from_env(prefix)?,
            session: SessionOptions::from_env(prefix)?,
            smtp: SmtpOptions::from_env(&format!("{}_SMTP", prefix))?,
            email_from,
        })
    }
}
