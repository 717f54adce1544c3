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

//! Building blocks shared by every Wayfarer crate.
//!
//! The service adheres to a layered architecture and every crate in the workspace exposes the
//! same set of modules:
//!
//! 1.  `model`: High-level data types that represent concepts of the domain.  Types here validate
//!     their inputs on construction and carry no business logic.
//!
//! 1.  `db`: The persistence layer.  Functions in this layer receive an `Executor` and issue
//!     queries against either PostgreSQL or SQLite.
//!
//! 1.  `driver`: The business logic layer.  A `Driver` owns the database, the clock and any other
//!     collaborator, and coordinates transactions across multiple `db` calls.
//!
//! 1.  `rest`: The HTTP layer.  Handlers parse requests, call into the driver and shape the
//!     responses into the common envelope.
//!
//! Every layer has its own result and error types, such as `DbResult` and `DbError`.  Errors float
//! to the top of the app via the `?` operator and are turned into HTTP responses only once they
//! reach the `rest` layer, where the error normalizer decides how much detail to expose.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

pub mod clocks;
pub mod db;
pub mod driver;
pub mod env;
pub mod model;
pub mod rest;
pub mod template;
