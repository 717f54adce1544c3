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

//! Test utilities for the REST API.

use crate::driver::testutils::TestContext as DriverTestContext;
use crate::model::user::User;
use crate::rest::app;
use axum::Router;
use std::ops::Deref;
use wayfarer_core::env::Environment;

pub(crate) use crate::driver::testutils::{DEFAULT_PASSWORD, review_doc, tour_doc};
pub(crate) use wayfarer_authn::model::Role::{Admin, Customer, Guide, LeadGuide};

/// State of a running test.
///
/// Derefs to the driver's test context for direct access to the backing services.
pub(crate) struct TestContext {
    context: DriverTestContext,
    app: Router,
}

impl TestContext {
    /// Gets a clone of the app router.
    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    /// Consumes the context and transforms it into the app router.
    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    /// Returns a bearer token that authenticates as `user`.
    pub(crate) fn bearer_for(&self, user: &User) -> String {
        self.context.token_for(user).as_str().to_owned()
    }
}

impl Deref for TestContext {
    type Target = DriverTestContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// Builder pattern for the test context.
#[must_use]
pub(crate) struct TestContextBuilder {
    environment: Environment,
}

impl TestContextBuilder {
    /// Initializes a new builder with the default test settings.
    pub(crate) fn new() -> Self {
        Self { environment: Environment::Development }
    }

    /// Runs the app in the given `environment`.
    pub(crate) fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Builds the test context.
    pub(crate) async fn build(self) -> TestContext {
        let context = DriverTestContext::setup().await;
        let app = app(context.driver(), self.environment);
        TestContext { context, app }
    }
}
