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

//! Utilities to send messages over email.

use async_trait::async_trait;
use derivative::Derivative;
use lettre::message::Message;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use log::warn;
use wayfarer_core::driver::{DriverError, DriverResult};
use wayfarer_core::env::{get_optional_var, get_required_var};

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

/// Options to establish an SMTP connection.
#[derive(Derivative)]
#[derivative(Debug)]
#[cfg_attr(test, derivative(PartialEq))]
pub struct SmtpOptions {
    /// SMTP server to use.
    pub relay: String,

    /// Port of the SMTP server, if different from the default submission port.
    pub port: Option<u16>,

    /// Username for logging into the SMTP server.
    pub username: String,

    /// Password for logging into the SMTP server.
    #[derivative(Debug = "ignore")]
    pub password: String,
}

impl SmtpOptions {
    /// Initializes a set of options from environment variables whose name is prefixed with the
    /// given `prefix`.
    ///
    /// This will use variables such as `<prefix>_RELAY`, `<prefix>_PORT`, `<prefix>_USERNAME`
    /// and `<prefix>_PASSWORD`.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        Ok(Self {
            relay: get_required_var::<String>(prefix, "RELAY")?,
            port: get_optional_var::<u16>(prefix, "PORT")?,
            username: get_required_var::<String>(prefix, "USERNAME")?,
            password: get_required_var::<String>(prefix, "PASSWORD")?,
        })
    }
}

/// Trait to abstract the integration with the mailer.
#[async_trait]
pub trait SmtpMailer {
    /// Sends a message over SMTP.
    async fn send(&self, message: Message) -> DriverResult<()>;
}

/// Mailer backed by a real SMTP connection using `lettre`.
#[derive(Clone)]
pub struct LettreSmtpMailer(AsyncSmtpTransport<Tokio1Executor>);

impl LettreSmtpMailer {
    /// Configures a pooled transport to the SMTP server described by `opts`.
    ///
    /// No connection is established until the first message is sent.
    pub fn connect(opts: SmtpOptions) -> Result<Self, String> {
        let creds = Credentials::new(opts.username, opts.password);
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&opts.relay)
            .map_err(|e| format!("Invalid SMTP relay {}: {}", opts.relay, e))?
            .credentials(creds);
        if let Some(port) = opts.port {
            builder = builder.port(port);
        }
        Ok(LettreSmtpMailer(builder.build()))
    }
}

#[async_trait]
impl SmtpMailer for LettreSmtpMailer {
    async fn send(&self, message: Message) -> DriverResult<()> {
        self.0.send(message).await.map_err(|e| {
            warn!("SMTP communication failed: {}", e);
            DriverError::DependencyFailed(format!("SMTP communication failed: {}", e))
        })?;
        Ok(())
    }
}
