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

//! Wayfarer: a REST service to browse and book tours.
//!
//! The service exposes tours, their reviews and the accounts of the people that book them under
//! `/api/v1`.  Collections can be filtered, sorted, projected and paginated through the query
//! string, and accounts authenticate with JWT session tokens.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use log::{info, warn};
use std::error::Error;
use std::net::Ipv4Addr;
use std::sync::Arc;
use wayfarer_core::clocks::SystemClock;
use wayfarer_core::db::postgres::PostgresDb;
use wayfarer_core::db::{Db, sqlite};
use wayfarer_smtp::driver::LettreSmtpMailer;

mod config;
pub use config::Config;
use config::DatabaseOptions;
mod db;
use db::init_schema;
mod driver;
use driver::Driver;
pub(crate) mod model;
mod rest;
use rest::app;

/// Connects to the database described by `opts`.
async fn connect_db(opts: DatabaseOptions) -> Result<Arc<dyn Db + Send + Sync>, Box<dyn Error>> {
    match opts {
        DatabaseOptions::Postgres(opts) => Ok(Arc::from(PostgresDb::connect(opts)?)),
        DatabaseOptions::Sqlite(url) => Ok(Arc::from(sqlite::connect(&url).await?)),
    }
}

/// Completes when the process is asked to terminate.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested; draining in-flight requests"),
        Err(e) => warn!("Cannot listen for shutdown signals: {}", e),
    }
}

/// Instantiates all resources described by `config` and serves the application until the
/// process is interrupted.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(config: Config) -> Result<(), Box<dyn Error>> {
    let db = connect_db(config.database).await?;
    init_schema(&mut db.ex().await?).await?;

    let mailer = Arc::from(LettreSmtpMailer::connect(config.smtp)?);
    let driver = Driver::new(
        db.clone(),
        Arc::from(SystemClock::default()),
        mailer,
        &config.session,
        Arc::from(config.base_url),
        config.email_from,
    );
    let app = app(driver, config.environment);

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
    info!("Listening on {} in {} mode", listener.local_addr()?, config.environment);
    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    db.close().await;
    info!("Database connections closed");
    Ok(result?)
}
