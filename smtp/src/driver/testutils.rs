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

//! Test utilities for email handling.

use crate::driver::SmtpMailer;
use async_trait::async_trait;
use futures::lock::Mutex;
use lettre::Message;
use std::collections::HashSet;
use std::sync::Arc;
use wayfarer_core::driver::{DriverError, DriverResult};
use wayfarer_core::model::EmailAddress;

/// Mailer that keeps every delivered message in an outbox instead of sending it.
#[derive(Clone, Default)]
pub struct RecorderSmtpMailer {
    /// Delivered messages and their recipients, in delivery order.
    outbox: Arc<Mutex<Vec<(EmailAddress, Message)>>>,

    /// Recipients whose deliveries fail.
    unreachable: Arc<Mutex<HashSet<EmailAddress>>>,
}

impl RecorderSmtpMailer {
    /// Makes every later delivery to `email` fail.
    pub async fn inject_error_for<E: Into<EmailAddress>>(&self, email: E) {
        self.unreachable.lock().await.insert(email.into());
    }

    /// Returns the messages delivered to `to`, oldest first.
    pub async fn sent_to(&self, to: &EmailAddress) -> Vec<Message> {
        let outbox = self.outbox.lock().await;
        outbox.iter().filter(|(rcpt, _)| rcpt == to).map(|(_, message)| message.clone()).collect()
    }

    /// Expects that nothing was delivered.
    pub async fn expect_no_messages(&self) {
        let outbox = self.outbox.lock().await;
        assert!(outbox.is_empty(), "Expected no deliveries but found {}", outbox.len());
    }

    /// Expects that exactly one message was delivered, to `exp_to`, and returns it.
    pub async fn expect_one_message(&self, exp_to: &EmailAddress) -> Message {
        let mut outbox = self.outbox.lock().await.clone();
        assert_eq!(1, outbox.len(), "Expected exactly one delivery");
        let (to, message) = outbox.pop().unwrap();
        assert_eq!(exp_to, &to);
        message
    }
}

#[async_trait]
impl SmtpMailer for RecorderSmtpMailer {
    async fn send(&self, message: Message) -> DriverResult<()> {
        let to = message.headers().get_raw("To").map(EmailAddress::from).ok_or_else(|| {
            DriverError::InvalidInput("Message has no recipient".to_owned())
        })?;

        if self.unreachable.lock().await.contains(&to) {
            return Err(DriverError::DependencyFailed(format!(
                "Sending email to {} failed",
                to.as_str()
            )));
        }

        self.outbox.lock().await.push((to, message));
        Ok(())
    }
}
