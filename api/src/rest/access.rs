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

//! Authentication and authorization of API callers.

use crate::driver::{Driver, restrict_to};
use crate::model::user::User;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::marker::PhantomData;
use wayfarer_authn::model::Role;
use wayfarer_authn::rest::get_session_token;
use wayfarer_core::rest::{RestError, RestResult};

/// Policy that decides who can call an API.
pub(crate) trait Access: Send + Sync + 'static {
    /// Roles allowed to call the API, or `None` if the API does not require authentication.
    const ROLES: Option<&'static [Role]>;
}

/// Anyone, including anonymous callers.
pub(crate) enum Public {}

impl Access for Public {
    const ROLES: Option<&'static [Role]> = None;
}

/// Any logged in account.
pub(crate) enum AnyUser {}

impl Access for AnyUser {
    const ROLES: Option<&'static [Role]> =
        Some(&[Role::Customer, Role::Guide, Role::LeadGuide, Role::Admin]);
}

/// Accounts that manage tours.
pub(crate) enum Staff {}

impl Access for Staff {
    const ROLES: Option<&'static [Role]> = Some(&[Role::Admin, Role::LeadGuide]);
}

/// Accounts that plan tour departures.
pub(crate) enum Planners {}

impl Access for Planners {
    const ROLES: Option<&'static [Role]> = Some(&[Role::Admin, Role::LeadGuide, Role::Guide]);
}

/// Accounts that manage other accounts.
pub(crate) enum Admins {}

impl Access for Admins {
    const ROLES: Option<&'static [Role]> = Some(&[Role::Admin]);
}

/// Accounts that write reviews.
pub(crate) enum Customers {}

impl Access for Customers {
    const ROLES: Option<&'static [Role]> = Some(&[Role::Customer]);
}

/// Accounts that can modify existing reviews.
pub(crate) enum Reviewers {}

impl Access for Reviewers {
    const ROLES: Option<&'static [Role]> = Some(&[Role::Customer, Role::Admin]);
}

/// Extractor that enforces the access policy `A` on the caller.
///
/// Holds the caller's account when the policy requires authentication.
pub(crate) struct Authorized<A: Access> {
    /// Account of the caller, if authenticated.
    user: Option<User>,

    /// Policy that was enforced.
    _access: PhantomData<fn() -> A>,
}

impl<A: Access> Authorized<A> {
    /// Returns the account of the caller.
    ///
    /// Only valid for policies that require authentication.
    pub(crate) fn into_user(self) -> RestResult<User> {
        self.user.ok_or_else(|| {
            RestError::InternalError("Access policy does not authenticate callers".to_owned())
        })
    }
}

#[async_trait]
impl<S, A> FromRequestParts<S> for Authorized<A>
where
    Driver: FromRef<S>,
    S: Send + Sync,
    A: Access,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> RestResult<Self> {
        let Some(roles) = A::ROLES else {
            return Ok(Self { user: None, _access: PhantomData });
        };

        let token = get_session_token(&parts.headers)?;
        let user = Driver::from_ref(state).protect(token).await?;
        restrict_to(&user, roles)?;
        Ok(Self { user: Some(user), _access: PhantomData })
    }
}
