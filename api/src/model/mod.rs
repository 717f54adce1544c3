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

//! Data types for the tour booking service.
//!
//! Records are schemaless JSON documents.  What gives them shape are the static `Schema`s of
//! each collection, which list their defaults, validations and query decorators.

pub(crate) mod geo;
pub(crate) mod query;
pub(crate) mod record;
pub(crate) mod review;
pub(crate) mod schema;
pub(crate) mod tour;
pub(crate) mod user;
