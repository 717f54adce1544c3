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

//! Authentication and authorization of accounts.

use crate::db;
use crate::driver::resources::{by_id, insert_document};
use crate::driver::{Driver, corrupt, not_found};
use crate::model::query::{Comparison, Projection, QuerySpec, decorate};
use crate::model::record::{Document, RecordId, format_timestamp, get_str, parse_timestamp};
use crate::model::user::{
    ACTIVE_FIELD, PASSWORD_CHANGED_AT_FIELD, PASSWORD_CONFIRM_FIELD, PASSWORD_FIELD,
    PASSWORD_RESET_EXPIRES_FIELD, PASSWORD_RESET_TOKEN_FIELD, SELF_UPDATABLE_FIELDS, USERS, User,
};
use log::warn;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use wayfarer_authn::model::{
    HashedPassword, Password, ResetToken, ResetTokenHash, Role, SessionToken, TokenError,
    verify_password,
};
use wayfarer_core::db::Executor;
use wayfarer_core::driver::{DriverError, DriverResult};
use wayfarer_core::model::EmailAddress;

/// How long password reset tokens remain valid.
const RESET_TOKEN_LIFETIME: Duration = Duration::minutes(10);

/// Message returned when the caller did not present any credentials.
const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

/// Message returned for failed logins, whatever the reason.
const BAD_CREDENTIALS: &str = "Incorrect email or password";

/// Message returned when a reset token does not match any account.
const BAD_RESET_TOKEN: &str = "Token is invalid or has expired";

/// Message returned when a password and its confirmation differ.
const PASSWORDS_DIFFER: &str = "Passwords are not the same!";

/// Message returned when the password reset email cannot be delivered.
const EMAIL_FAILED: &str = "There was an error sending the email. Try again later!";

/// Ensures that the caller with `user` holds one of the `roles`.
pub(crate) fn restrict_to(user: &User, roles: &[Role]) -> DriverResult<()> {
    if roles.contains(&user.role()) {
        Ok(())
    } else {
        Err(DriverError::Forbidden("You do not have permission to perform this action".to_owned()))
    }
}

/// Validates that `password` is present and matches its `confirmation`, returning the new
/// password.
fn new_password(password: Option<String>, confirmation: Option<String>) -> DriverResult<Password> {
    let password = password.unwrap_or_default();
    let confirmed = confirmation.map(|confirmation| confirmation == password);
    let password = Password::new(password)?;
    match confirmed {
        None => Err(DriverError::InvalidInput("Please confirm your password".to_owned())),
        Some(false) => Err(DriverError::InvalidInput(PASSWORDS_DIFFER.to_owned())),
        Some(true) => Ok(password),
    }
}

/// Stores `hash` as the new password in `doc`.
///
/// The change is stamped one second in the past so that tokens issued right after the change
/// are not considered stale.
fn set_password(doc: &mut Document, hash: HashedPassword, now: OffsetDateTime) {
    doc.insert(PASSWORD_FIELD.to_owned(), Value::String(hash.as_str().to_owned()));
    doc.insert(
        PASSWORD_CHANGED_AT_FIELD.to_owned(),
        Value::String(format_timestamp(now - Duration::seconds(1))),
    );
    doc.remove(PASSWORD_RESET_TOKEN_FIELD);
    doc.remove(PASSWORD_RESET_EXPIRES_FIELD);
}

/// Finds the visible account that matches `spec`.
async fn find_user(ex: &mut Executor, spec: QuerySpec) -> DriverResult<Option<User>> {
    let spec = decorate(spec, USERS.decorators);
    let mut docs = db::find(ex, USERS.collection, &spec.filter, &[], Some((0, 1))).await?;
    match docs.pop() {
        Some(doc) => Ok(Some(User::try_from(doc).map_err(corrupt)?)),
        None => Ok(None),
    }
}

/// Returns the query that finds the account with `email`, which is normalized first.
fn by_email(email: &str) -> QuerySpec {
    let email = email.trim().to_lowercase();
    QuerySpec::default().with_predicate("email", Comparison::Eq, email)
}

/// Returns true if `doc` holds an unexpired reset token whose digest is `digest`.
fn has_reset_token(doc: &Document, digest: &ResetTokenHash, now: OffsetDateTime) -> bool {
    let matches = get_str(doc, PASSWORD_RESET_TOKEN_FIELD) == Some(digest.as_str());
    let unexpired = get_str(doc, PASSWORD_RESET_EXPIRES_FIELD)
        .and_then(|expires| parse_timestamp(expires).ok())
        .is_some_and(|expires| expires > now);
    let active = doc.get(ACTIVE_FIELD) != Some(&Value::Bool(false));
    matches && unexpired && active
}

/// Locks the account `id` and returns it if it still holds the reset token with `digest`.
///
/// Concurrent resets can all find the account through its token, but only the first to lock it
/// can claim the token.
async fn claim_reset_token(
    ex: &mut Executor,
    id: RecordId,
    digest: &ResetTokenHash,
    now: OffsetDateTime,
) -> DriverResult<Document> {
    let doc = db::get_for_update(ex, USERS.collection, id).await.map_err(not_found)?;
    if has_reset_token(&doc, digest, now) {
        Ok(doc)
    } else {
        Err(DriverError::InvalidInput(BAD_RESET_TOKEN.to_owned()))
    }
}

impl Driver {
    /// Issues a new session token for `user` and returns it along with the public view of the
    /// account.
    fn start_session(&self, user: User) -> DriverResult<(SessionToken, Document)> {
        let token = self.tokens.issue(&user.id().to_string(), self.clock.now_utc())?;
        Ok((token, USERS.present(user.into_doc(), &Projection::default())))
    }

    /// Creates a new account with the customer role and logs it in.
    pub(crate) async fn signup(
        self,
        mut profile: Document,
        password: Option<String>,
        password_confirm: Option<String>,
    ) -> DriverResult<(SessionToken, Document)> {
        let password = new_password(password, password_confirm)?;
        let hash = password.hash().await?;

        profile.retain(|key, value| {
            !value.is_null() && (SELF_UPDATABLE_FIELDS.contains(&key.as_str()) || key == "photo")
        });
        profile.insert(PASSWORD_FIELD.to_owned(), Value::String(hash.as_str().to_owned()));

        let now = self.clock.now_utc();
        let mut tx = self.db.begin().await?;
        let doc = insert_document(tx.ex(), &USERS, now, profile).await?;
        tx.commit().await?;

        let user = User::try_from(doc).map_err(corrupt)?;
        self.start_session(user)
    }

    /// Verifies the credentials of an account and logs it in.
    ///
    /// Unknown accounts and wrong passwords are indistinguishable to the caller.
    pub(crate) async fn login(
        self,
        email: Option<String>,
        password: Option<String>,
    ) -> DriverResult<(SessionToken, Document)> {
        let (email, password) = match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                (email, Password::new(password)?)
            }
            _ => {
                return Err(DriverError::InvalidInput(
                    "Please provide email and password!".to_owned(),
                ));
            }
        };

        let user = {
            let mut ex = self.db.ex().await?;
            find_user(&mut ex, by_email(&email)).await?
        };

        let valid = verify_password(password, user.as_ref().and_then(User::password)).await?;
        match user {
            Some(user) if valid => self.start_session(user),
            _ => Err(DriverError::Unauthenticated(BAD_CREDENTIALS.to_owned())),
        }
    }

    /// Resolves the account that owns the session `token`.
    ///
    /// Fails closed: missing, invalid and expired tokens are rejected, as are tokens for
    /// accounts that no longer exist or whose password changed after the token was issued.
    pub(crate) async fn protect(self, token: Option<SessionToken>) -> DriverResult<User> {
        let token = token.ok_or_else(|| DriverError::Unauthenticated(NOT_LOGGED_IN.to_owned()))?;

        let claims = self
            .tokens
            .verify(&token, self.clock.now_utc())
            .map_err(|e| DriverError::Unauthenticated(e.to_string()))?;
        let id = RecordId::parse(&claims.sub)
            .map_err(|_| DriverError::Unauthenticated(TokenError::Invalid.to_string()))?;

        let mut ex = self.db.ex().await?;
        let user = find_user(&mut ex, by_id(&USERS, id)).await?.ok_or_else(|| {
            DriverError::Unauthenticated(
                "The user belonging to this token no longer exists.".to_owned(),
            )
        })?;

        if user.changed_password_after(claims.iat) {
            return Err(DriverError::Unauthenticated(
                "User recently changed password! Please log in again.".to_owned(),
            ));
        }

        Ok(user)
    }

    /// Generates a password reset token for the account with `email` and sends it by email.
    ///
    /// Only the digest of the token is stored.  The token is committed before the email goes
    /// out and is discarded again if the email cannot be sent.
    pub(crate) async fn forgot_password(self, email: Option<String>) -> DriverResult<()> {
        let email = email.unwrap_or_default();

        let now = self.clock.now_utc();
        let token = ResetToken::generate();
        let digest = token.digest();

        let mut tx = self.db.begin().await?;
        let user = find_user(tx.ex(), by_email(&email)).await?.ok_or_else(|| {
            DriverError::NotFound("There is no user with that email address.".to_owned())
        })?;
        let id = user.id();
        let to: EmailAddress = user.email().clone();

        let mut doc = db::get_for_update(tx.ex(), USERS.collection, id).await.map_err(not_found)?;
        doc.insert(
            PASSWORD_RESET_TOKEN_FIELD.to_owned(),
            Value::String(digest.as_str().to_owned()),
        );
        doc.insert(
            PASSWORD_RESET_EXPIRES_FIELD.to_owned(),
            Value::String(format_timestamp(now + RESET_TOKEN_LIFETIME)),
        );
        db::replace(tx.ex(), USERS.collection, id, &doc).await.map_err(not_found)?;
        tx.commit().await?;

        let url = self.base_url.make(&format!("api/v1/users/resetPassword/{}", token.as_str()));
        let message = self.reset_template.apply(&to, &[("reset_url", url.as_str())])?;
        if let Err(e) = self.mailer.send(message).await {
            warn!("Failed to send password reset email to {}: {}", to.as_str(), e);
            self.discard_reset_token(id, &digest).await?;
            return Err(DriverError::DependencyFailed(EMAIL_FAILED.to_owned()));
        }

        Ok(())
    }

    /// Removes the reset token with `digest` from the account `id` unless a newer request has
    /// replaced it already.
    async fn discard_reset_token(&self, id: RecordId, digest: &ResetTokenHash) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        let mut doc = db::get_for_update(tx.ex(), USERS.collection, id).await.map_err(not_found)?;
        if get_str(&doc, PASSWORD_RESET_TOKEN_FIELD) == Some(digest.as_str()) {
            doc.remove(PASSWORD_RESET_TOKEN_FIELD);
            doc.remove(PASSWORD_RESET_EXPIRES_FIELD);
            db::replace(tx.ex(), USERS.collection, id, &doc).await.map_err(not_found)?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Sets a new password for the account that requested the reset `token` and logs it in.
    pub(crate) async fn reset_password(
        self,
        token: String,
        password: Option<String>,
        password_confirm: Option<String>,
    ) -> DriverResult<(SessionToken, Document)> {
        let token = ResetToken::new(token)?;
        let digest = token.digest();
        let password = new_password(password, password_confirm)?;
        let hash = password.hash().await?;

        let now = self.clock.now_utc();
        let mut tx = self.db.begin().await?;

        let spec = QuerySpec::default()
            .with_predicate(PASSWORD_RESET_TOKEN_FIELD, Comparison::Eq, digest.as_str())
            .with_predicate(PASSWORD_RESET_EXPIRES_FIELD, Comparison::Gt, format_timestamp(now));
        let user = find_user(tx.ex(), spec)
            .await?
            .ok_or_else(|| DriverError::InvalidInput(BAD_RESET_TOKEN.to_owned()))?;
        let id = user.id();

        let mut doc = claim_reset_token(tx.ex(), id, &digest, now).await?;
        set_password(&mut doc, hash, now);
        USERS.prepare_and_validate(&mut doc)?;
        db::replace(tx.ex(), USERS.collection, id, &doc).await.map_err(not_found)?;
        tx.commit().await?;

        self.start_session(User::try_from(doc).map_err(corrupt)?)
    }

    /// Changes the password of the logged in `user` after checking its `current` password,
    /// and logs it in again.
    pub(crate) async fn update_password(
        self,
        user: User,
        current: Option<String>,
        password: Option<String>,
        password_confirm: Option<String>,
    ) -> DriverResult<(SessionToken, Document)> {
        let current = Password::new(current.unwrap_or_default())?;
        if !verify_password(current, user.password()).await? {
            return Err(DriverError::Unauthenticated(
                "Your current password is wrong.".to_owned(),
            ));
        }
        let hash = new_password(password, password_confirm)?.hash().await?;

        let now = self.clock.now_utc();
        let mut tx = self.db.begin().await?;
        let mut doc =
            db::get_for_update(tx.ex(), USERS.collection, user.id()).await.map_err(not_found)?;
        set_password(&mut doc, hash, now);
        USERS.prepare_and_validate(&mut doc)?;
        db::replace(tx.ex(), USERS.collection, user.id(), &doc).await.map_err(not_found)?;
        tx.commit().await?;

        self.start_session(User::try_from(doc).map_err(corrupt)?)
    }

    /// Updates the profile of the logged in `user` with the fields in `body` that users may
    /// change about themselves.
    pub(crate) async fn update_me(self, user: User, body: Document) -> DriverResult<Document> {
        if body.contains_key(PASSWORD_FIELD) || body.contains_key(PASSWORD_CONFIRM_FIELD) {
            return Err(DriverError::InvalidInput(
                "This route is not for password updates. Please use /updatePassword.".to_owned(),
            ));
        }

        let patch = body
            .into_iter()
            .filter(|(key, _)| SELF_UPDATABLE_FIELDS.contains(&key.as_str()))
            .collect();
        self.update_one(&USERS, user.id(), patch).await
    }

    /// Deactivates the account of the logged in `user`, hiding it from every query.
    pub(crate) async fn delete_me(self, user: User) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        let mut doc =
            db::get_for_update(tx.ex(), USERS.collection, user.id()).await.map_err(not_found)?;
        doc.insert(ACTIVE_FIELD.to_owned(), Value::Bool(false));
        db::replace(tx.ex(), USERS.collection, user.id(), &doc).await.map_err(not_found)?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testutils::*;
    use serde_json::json;
    use std::time::Duration as StdDuration;
    use wayfarer_core::clocks::Clock;

    /// Builds the profile document of a new account.
    fn profile(name: &str, email: &str) -> Document {
        json!({"name": name, "email": email}).as_object().unwrap().clone()
    }

    /// Shorthand to build an optional owned string.
    fn some(s: &str) -> Option<String> {
        Some(s.to_owned())
    }

    #[test]
    fn test_restrict_to() {
        let doc = json!({
            "id": RecordId::generate().to_string(),
            "email": "guide@example.com",
            "role": "lead-guide",
        })
        .as_object()
        .unwrap()
        .clone();
        let user = User::try_from(doc).unwrap();

        restrict_to(&user, &[Role::Admin, Role::LeadGuide]).unwrap();
        assert_eq!(
            DriverError::Forbidden("You do not have permission to perform this action".to_owned()),
            restrict_to(&user, &[Role::Admin]).unwrap_err()
        );
    }

    #[test]
    fn test_new_password() {
        new_password(some("pass1234"), some("pass1234")).unwrap();
        assert_eq!(
            DriverError::InvalidInput("Passwords are not the same!".to_owned()),
            new_password(some("pass1234"), some("pass12345")).unwrap_err()
        );
        assert_eq!(
            DriverError::InvalidInput("Passwords are not the same!".to_owned()),
            new_password(some("pass1234"), some("")).unwrap_err()
        );
        assert_eq!(
            DriverError::InvalidInput("Please provide a password".to_owned()),
            new_password(some(""), some("")).unwrap_err()
        );
    }

    #[test]
    fn test_has_reset_token() {
        let digest = ResetToken::new("abc").unwrap().digest();
        let now = time::macros::datetime!(2023-10-17 06:00:00 UTC);
        let doc = json!({
            "passwordResetToken": digest.as_str(),
            "passwordResetExpires": "2023-10-17T06:10:00.000Z",
        })
        .as_object()
        .unwrap()
        .clone();

        assert!(has_reset_token(&doc, &digest, now));
        assert!(!has_reset_token(&doc, &digest, now + Duration::minutes(10)));
        assert!(!has_reset_token(&doc, &ResetToken::new("xyz").unwrap().digest(), now));

        let mut inactive = doc.clone();
        inactive.insert("active".to_owned(), json!(false));
        assert!(!has_reset_token(&inactive, &digest, now));

        let mut cleared = doc;
        cleared.remove("passwordResetToken");
        assert!(!has_reset_token(&cleared, &digest, now));
    }

    #[tokio::test]
    async fn test_signup_ok() {
        let context = TestContext::setup().await;

        let (token, doc) = context
            .driver()
            .signup(
                profile("Jonas Schmedtmann", "  Jonas@Example.COM "),
                some("pass1234"),
                some("pass1234"),
            )
            .await
            .unwrap();
        assert_eq!(json!("jonas@example.com"), doc["email"]);
        assert_eq!(json!("customer"), doc["role"]);
        assert!(!doc.contains_key("password"));
        assert!(!doc.contains_key("passwordConfirm"));
        assert!(!doc.contains_key("passwordChangedAt"));
        assert!(!doc.contains_key("active"));

        let user = context.driver().protect(Some(token)).await.unwrap();
        assert_eq!(doc["id"], json!(user.id().to_string()));

        let raw = context.get_raw(&USERS, user.id()).await;
        assert!(raw["password"].as_str().unwrap().starts_with("$2"));
        assert!(!raw.contains_key("passwordConfirm"));
    }

    #[tokio::test]
    async fn test_signup_ignores_role_and_protected_fields() {
        let context = TestContext::setup().await;

        let mut body = profile("Jonas Schmedtmann", "jonas@example.com");
        body.insert("role".to_owned(), json!("admin"));
        body.insert("passwordChangedAt".to_owned(), json!("2000-01-01T00:00:00.000Z"));
        let (_token, doc) =
            context.driver().signup(body, some("pass1234"), some("pass1234")).await.unwrap();
        assert_eq!(json!("customer"), doc["role"]);
        assert!(!doc.contains_key("passwordChangedAt"));
    }

    #[tokio::test]
    async fn test_signup_password_errors() {
        let context = TestContext::setup().await;

        for (password, confirm, exp) in [
            (None, some("pass1234"), "Please provide a password"),
            (some("pass1234"), None, "Please confirm your password"),
            (some("pass1234"), some("pass4321"), "Passwords are not the same!"),
            (some("short"), some("short"), "Password must have at least 8 characters"),
        ] {
            assert_eq!(
                DriverError::InvalidInput(exp.to_owned()),
                context
                    .driver()
                    .signup(profile("Jonas Schmedtmann", "jonas@example.com"), password, confirm)
                    .await
                    .unwrap_err()
            );
        }
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let context = TestContext::setup().await;

        context.create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer).await;
        assert_eq!(
            DriverError::AlreadyExists(
                "Duplicate field value: please use another value".to_owned()
            ),
            context
                .driver()
                .signup(profile("Other", "JONAS@example.com"), some("pass1234"), some("pass1234"))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_login_ok() {
        let context = TestContext::setup().await;

        let user = context.create_user("Jonas Schmedtmann", "jonas@example.com", Role::Admin).await;
        let (token, doc) = context
            .driver()
            .login(some("JONAS@example.com"), some(DEFAULT_PASSWORD))
            .await
            .unwrap();
        assert_eq!(json!(user.id().to_string()), doc["id"]);
        assert!(!doc.contains_key("password"));
        assert_eq!(user.id(), context.driver().protect(Some(token)).await.unwrap().id());
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let context = TestContext::setup().await;

        for (email, password) in [
            (None, some("x")),
            (some("a@example.com"), None),
            (some(""), some("x")),
            (some("a@example.com"), some("")),
        ] {
            assert_eq!(
                DriverError::InvalidInput("Please provide email and password!".to_owned()),
                context.driver().login(email, password).await.unwrap_err()
            );
        }
    }

    #[tokio::test]
    async fn test_login_does_not_reveal_accounts() {
        let context = TestContext::setup().await;

        context.create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer).await;
        let exp = DriverError::Unauthenticated("Incorrect email or password".to_owned());
        assert_eq!(
            exp,
            context.driver().login(some("jonas@example.com"), some("wrong-pass")).await.unwrap_err()
        );
        assert_eq!(
            exp,
            context
                .driver()
                .login(some("nobody@example.com"), some("wrong-pass"))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_login_inactive_account() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        context.driver().delete_me(user).await.unwrap();
        assert_eq!(
            DriverError::Unauthenticated("Incorrect email or password".to_owned()),
            context
                .driver()
                .login(some("jonas@example.com"), some(DEFAULT_PASSWORD))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_protect_missing_and_invalid() {
        let context = TestContext::setup().await;

        assert_eq!(
            DriverError::Unauthenticated(
                "You are not logged in! Please log in to get access.".to_owned()
            ),
            context.driver().protect(None).await.unwrap_err()
        );

        let token = SessionToken::new("not.a.token").unwrap();
        assert_eq!(
            DriverError::Unauthenticated("Invalid token. Please log in again!".to_owned()),
            context.driver().protect(Some(token)).await.unwrap_err()
        );

        let token = context.token_for_subject("not-an-id");
        assert_eq!(
            DriverError::Unauthenticated("Invalid token. Please log in again!".to_owned()),
            context.driver().protect(Some(token)).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_protect_expired() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        let token = context.token_for(&user);
        context.clock().advance(StdDuration::from_secs(90 * 24 * 60 * 60));
        assert_eq!(
            DriverError::Unauthenticated("Your token has expired! Please log in again.".to_owned()),
            context.driver().protect(Some(token)).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_protect_deleted_account() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        let token = context.token_for(&user);
        context.driver().delete_one(&USERS, user.id()).await.unwrap();
        assert_eq!(
            DriverError::Unauthenticated(
                "The user belonging to this token no longer exists.".to_owned()
            ),
            context.driver().protect(Some(token)).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_protect_stale_after_password_change() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        let old_token = context.token_for(&user);

        context.clock().advance(StdDuration::from_secs(10));
        let (new_token, _doc) = context
            .driver()
            .update_password(user, some(DEFAULT_PASSWORD), some("newpass123"), some("newpass123"))
            .await
            .unwrap();

        assert_eq!(
            DriverError::Unauthenticated(
                "User recently changed password! Please log in again.".to_owned()
            ),
            context.driver().protect(Some(old_token)).await.unwrap_err()
        );
        context.driver().protect(Some(new_token)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_password_wrong_current() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        assert_eq!(
            DriverError::Unauthenticated("Your current password is wrong.".to_owned()),
            context
                .driver()
                .update_password(user, some("wrong-pass"), some("newpass123"), some("newpass123"))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        context.driver().forgot_password(some("jonas@example.com")).await.unwrap();

        let token = context.take_reset_token("jonas@example.com").await;
        let raw = context.get_raw(&USERS, user.id()).await;
        assert_eq!(
            json!(ResetToken::new(token.clone()).unwrap().digest().as_str()),
            raw["passwordResetToken"]
        );
        assert_ne!(json!(token), raw["passwordResetToken"]);
        assert_eq!(json!("2023-10-17T06:10:00.000Z"), raw["passwordResetExpires"]);

        context.clock().advance(StdDuration::from_secs(60));
        let (session, doc) = context
            .driver()
            .reset_password(token.clone(), some("newpass123"), some("newpass123"))
            .await
            .unwrap();
        assert!(!doc.contains_key("passwordResetToken"));
        assert_eq!(user.id(), context.driver().protect(Some(session)).await.unwrap().id());

        let raw = context.get_raw(&USERS, user.id()).await;
        assert!(!raw.contains_key("passwordResetToken"));
        assert!(!raw.contains_key("passwordResetExpires"));
        assert_eq!(json!("2023-10-17T06:00:59.000Z"), raw["passwordChangedAt"]);

        context.driver().login(some("jonas@example.com"), some("newpass123")).await.unwrap();

        // Tokens are single use.
        assert_eq!(
            DriverError::InvalidInput("Token is invalid or has expired".to_owned()),
            context
                .driver()
                .reset_password(token, some("other1234"), some("other1234"))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_reset_password_token_claimed_once() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        context.driver().forgot_password(some("jonas@example.com")).await.unwrap();
        let token = context.take_reset_token("jonas@example.com").await;
        let digest = ResetToken::new(token.clone()).unwrap().digest();

        // Lookup of a second reset that found the account before the first one committed.
        let now = context.clock().now_utc();
        let mut ex = context.ex().await;
        claim_reset_token(&mut ex, user.id(), &digest, now).await.unwrap();
        drop(ex);

        context
            .driver()
            .reset_password(token, some("newpass123"), some("newpass123"))
            .await
            .unwrap();

        let mut ex = context.ex().await;
        assert_eq!(
            DriverError::InvalidInput("Token is invalid or has expired".to_owned()),
            claim_reset_token(&mut ex, user.id(), &digest, now).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_reset_password_expired() {
        let context = TestContext::setup().await;

        context.create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer).await;
        context.driver().forgot_password(some("jonas@example.com")).await.unwrap();
        let token = context.take_reset_token("jonas@example.com").await;

        context.clock().advance(StdDuration::from_secs(10 * 60));
        assert_eq!(
            DriverError::InvalidInput("Token is invalid or has expired".to_owned()),
            context
                .driver()
                .reset_password(token, some("newpass123"), some("newpass123"))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let context = TestContext::setup().await;

        assert_eq!(
            DriverError::NotFound("There is no user with that email address.".to_owned()),
            context.driver().forgot_password(some("nobody@example.com")).await.unwrap_err()
        );
        context.mailer().expect_no_messages().await;
    }

    #[tokio::test]
    async fn test_forgot_password_email_failure_rolls_back() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        context.mailer().inject_error_for("jonas@example.com").await;

        assert_eq!(
            DriverError::DependencyFailed(
                "There was an error sending the email. Try again later!".to_owned()
            ),
            context.driver().forgot_password(some("jonas@example.com")).await.unwrap_err()
        );

        let raw = context.get_raw(&USERS, user.id()).await;
        assert!(!raw.contains_key("passwordResetToken"));
        assert!(!raw.contains_key("passwordResetExpires"));
        assert_eq!(json!("Jonas Schmedtmann"), raw["name"]);
        assert!(raw["password"].as_str().unwrap().starts_with("$2"));
    }

    #[tokio::test]
    async fn test_update_me() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        let body = json!({"name": "Jonas S.", "role": "admin", "email": "NEW@example.com"})
            .as_object()
            .unwrap()
            .clone();
        let doc = context.driver().update_me(user.clone(), body).await.unwrap();
        assert_eq!(json!("Jonas S."), doc["name"]);
        assert_eq!(json!("new@example.com"), doc["email"]);
        assert_eq!(json!("customer"), doc["role"]);

        let body = json!({"password": "newpass123"}).as_object().unwrap().clone();
        assert_eq!(
            DriverError::InvalidInput(
                "This route is not for password updates. Please use /updatePassword.".to_owned()
            ),
            context.driver().update_me(user, body).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_delete_me_hides_account() {
        let context = TestContext::setup().await;

        let user = context
            .create_user("Jonas Schmedtmann", "jonas@example.com", Role::Customer)
            .await;
        let token = context.token_for(&user);
        let id = user.id();
        context.driver().delete_me(user).await.unwrap();

        let raw = context.get_raw(&USERS, id).await;
        assert_eq!(json!(false), raw["active"]);
        assert!(context.driver().get_all(&USERS, QuerySpec::default()).await.unwrap().is_empty());
        assert_eq!(
            DriverError::Unauthenticated(
                "The user belonging to this token no longer exists.".to_owned()
            ),
            context.driver().protect(Some(token)).await.unwrap_err()
        );
    }
}
