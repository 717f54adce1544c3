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

//! Generic abstraction to access different database systems.
//!
//! PostgreSQL is the production backend.  SQLite backs unit tests and small local deployments.
//! Code in the `db` layer of a service receives an `Executor` and destructures it to issue
//! backend-specific queries.

use crate::model::ModelError;
use async_trait::async_trait;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Database errors.  Any unexpected errors that come from the database are classified as
/// `BackendError`, but errors we know about have more specific types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DbError {
    /// Indicates that a write failed because it would violate a uniqueness constraint.
    #[error("Duplicate field value: please use another value")]
    AlreadyExists,

    /// Catch-all error type for unexpected database errors.
    #[error("Database error: {0}")]
    BackendError(String),

    /// Indicates a failure processing the data that already exists in the database.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// Indicates that a requested entry does not exist.
    #[error("Entity not found")]
    NotFound,

    /// Indicates that the database is not available (maybe because of too many active concurrent
    /// connections).
    #[error("Database unavailable")]
    Unavailable,
}

impl From<ModelError> for DbError {
    fn from(e: ModelError) -> Self {
        DbError::DataIntegrityError(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::DataIntegrityError(format!("Invalid stored document: {}", e))
    }
}

/// Result type for this module.
pub type DbResult<T> = Result<T, DbError>;

/// Marker in a connection URL that is replaced by a separately-provided password.
pub const PASSWORD_PLACEHOLDER: &str = "<PASSWORD>";

/// Fills in the `PASSWORD_PLACEHOLDER` of the connection URL `raw` with `password`.
///
/// URLs without the placeholder are returned unmodified, with or without a `password`.
pub fn expand_password(raw: &str, password: Option<&str>) -> Result<String, String> {
    if !raw.contains(PASSWORD_PLACEHOLDER) {
        return Ok(raw.to_owned());
    }

    let password = password.ok_or_else(|| {
        format!("Database URL contains {} but no password was provided", PASSWORD_PLACEHOLDER)
    })?;

    let mut url = url::Url::parse(&raw.replace(PASSWORD_PLACEHOLDER, "x"))
        .map_err(|e| format!("Invalid database URL: {}", e))?;
    url.set_password(Some(password))
        .map_err(|()| "Database URL cannot carry a password".to_owned())?;
    Ok(url.to_string())
}

/// A database executor that can talk to multiple database implementations.
///
/// Users of this type are forced to destructure it and issue different calls for each database,
/// which lets sqlx type-check the queries for every backend.
///
/// This can wrap a connection taken directly from the pool or an open transaction.
pub enum Executor {
    /// A PostgreSQL executor that can be used in `sqlx` operations.
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresExecutor),

    /// A SQLite executor that can be used in `sqlx` operations.
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteExecutor),
}

/// A wrapper for a database executor backed by an open transaction.
pub struct TxExecutor(Executor);

impl TxExecutor {
    /// Returns the executor wrapped by this transaction.
    pub fn ex(&mut self) -> &mut Executor {
        &mut self.0
    }

    /// Commits the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self.0 {
            #[cfg(feature = "postgres")]
            Executor::Postgres(e) => e.commit().await,

            #[cfg(feature = "sqlite")]
            Executor::Sqlite(e) => e.commit().await,
        }
    }
}

/// Abstraction over the database connection.
#[async_trait]
pub trait Db {
    /// Obtains an executor for direct access to the pool.
    async fn ex(&self) -> DbResult<Executor>;

    /// Begins a transaction.
    ///
    /// It is the responsibility of the caller to call `commit` on the returned executor.  Otherwise
    /// the transaction is rolled back on drop.
    async fn begin(&self) -> DbResult<TxExecutor>;

    /// Closes the connection pool, waiting for in-flight connections to be returned.
    async fn close(&self);
}
