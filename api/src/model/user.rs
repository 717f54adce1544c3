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

//! The users collection.

use crate::model::query::{Comparison, QuerySpec};
use crate::model::record::{Document, RecordId, get_id, get_str, parse_timestamp};
use crate::model::schema::{Checker, Resource, Schema, set_default};
use serde_json::Value;
use time::OffsetDateTime;
use wayfarer_authn::model::{HashedPassword, Role};
use wayfarer_core::model::{EmailAddress, ModelError, ModelResult};

/// Field with the bcrypt hash of the password.
pub(crate) const PASSWORD_FIELD: &str = "password";

/// Field with the password confirmation, which is never stored.
pub(crate) const PASSWORD_CONFIRM_FIELD: &str = "passwordConfirm";

/// Field with the time of the last password change.
pub(crate) const PASSWORD_CHANGED_AT_FIELD: &str = "passwordChangedAt";

/// Field with the digest of the pending password reset token.
pub(crate) const PASSWORD_RESET_TOKEN_FIELD: &str = "passwordResetToken";

/// Field with the expiration time of the pending password reset token.
pub(crate) const PASSWORD_RESET_EXPIRES_FIELD: &str = "passwordResetExpires";

/// Field that marks whether the account is active.
pub(crate) const ACTIVE_FIELD: &str = "active";

/// Fields that users can change about themselves.
pub(crate) const SELF_UPDATABLE_FIELDS: &[&str] = &["name", "email"];

/// Accepted values for the role of an account.
const ROLES: &[&str] = &["customer", "guide", "lead-guide", "admin"];

/// Marker type for the users collection.
pub(crate) enum Users {}

impl Resource for Users {
    const SCHEMA: &'static Schema = &USERS;
}

/// Schema of the users collection.
pub(crate) static USERS: Schema = Schema {
    collection: "users",
    hidden: &[
        PASSWORD_FIELD,
        PASSWORD_RESET_TOKEN_FIELD,
        PASSWORD_RESET_EXPIRES_FIELD,
        ACTIVE_FIELD,
    ],
    protected: &[
        PASSWORD_FIELD,
        PASSWORD_CONFIRM_FIELD,
        PASSWORD_CHANGED_AT_FIELD,
        PASSWORD_RESET_TOKEN_FIELD,
        PASSWORD_RESET_EXPIRES_FIELD,
    ],
    prepare,
    validate,
    decorators: &[hide_inactive_users],
    single_populate: &[],
    rated_parent: None,
};

/// Normalizes the email address and fills in defaults.
fn prepare(doc: &mut Document) {
    if let Some(Value::String(email)) = doc.get_mut("email") {
        *email = email.trim().to_lowercase();
    }
    set_default(doc, "role", Role::default().as_str());
    set_default(doc, ACTIVE_FIELD, true);
}

/// Validates a user.
fn validate(doc: &Document) -> Vec<String> {
    let mut checker = Checker::new(doc);
    checker.required("name", "Please tell us your name").string("name");
    checker.required("email", "Please provide your email");
    if let Some(email) = checker.string("email") {
        if let Err(e) = EmailAddress::new(email) {
            checker.fail(e.0);
        }
    }
    checker.string("photo");
    checker.one_of("role", ROLES, "Role is either: customer, guide, lead-guide, admin");
    checker.required(PASSWORD_FIELD, "Please provide a password").string(PASSWORD_FIELD);
    checker.timestamp(PASSWORD_CHANGED_AT_FIELD).string(PASSWORD_RESET_TOKEN_FIELD);
    checker.timestamp(PASSWORD_RESET_EXPIRES_FIELD).boolean(ACTIVE_FIELD);
    checker.finish()
}

/// Hides deactivated accounts from every query.
fn hide_inactive_users(spec: QuerySpec) -> QuerySpec {
    spec.with_predicate(ACTIVE_FIELD, Comparison::Ne, false)
}

/// Typed view over a stored user document, with the fields the auth service cares about.
#[derive(Clone, Debug)]
pub(crate) struct User {
    /// Identifier of the account.
    id: RecordId,

    /// Email address of the account.
    email: EmailAddress,

    /// Role of the account.
    role: Role,

    /// Hash of the password of the account.
    password: Option<HashedPassword>,

    /// Time of the last password change, if any.
    password_changed_at: Option<OffsetDateTime>,

    /// The full stored document.
    doc: Document,
}

impl TryFrom<Document> for User {
    type Error = ModelError;

    fn try_from(doc: Document) -> ModelResult<Self> {
        let id = get_id(&doc)?;
        let email = match get_str(&doc, "email") {
            Some(email) => EmailAddress::new(email)?,
            None => return Err(ModelError(format!("User {} has no email", id))),
        };
        let role = match doc.get("role") {
            Some(role) => serde_json::from_value::<Role>(role.clone())
                .map_err(|e| ModelError(format!("Invalid role for user {}: {}", id, e)))?,
            None => Role::default(),
        };
        let password = get_str(&doc, PASSWORD_FIELD).map(HashedPassword::new);
        let password_changed_at =
            get_str(&doc, PASSWORD_CHANGED_AT_FIELD).map(parse_timestamp).transpose()?;
        Ok(Self { id, email, role, password, password_changed_at, doc })
    }
}

impl User {
    /// Returns the identifier of the account.
    pub(crate) fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the email address of the account.
    pub(crate) fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the role of the account.
    pub(crate) fn role(&self) -> Role {
        self.role
    }

    /// Returns the password hash of the account, if it has one.
    pub(crate) fn password(&self) -> Option<&HashedPassword> {
        self.password.as_ref()
    }

    /// Returns true if the password changed after a token issued at `iat` (in seconds since the
    /// epoch).
    pub(crate) fn changed_password_after(&self, iat: i64) -> bool {
        self.password_changed_at.is_some_and(|changed| changed.unix_timestamp() > iat)
    }

    /// Consumes the view and returns the stored document.
    pub(crate) fn into_doc(self) -> Document {
        self.doc
    }
}
