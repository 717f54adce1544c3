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

//! Data types to interact with email messages.

use lettre::message::Body;
use lettre::message::header::ContentTransferEncoding;
pub use lettre::message::{Mailbox, Message};
use wayfarer_core::model::{EmailAddress, ModelError, ModelResult};
use wayfarer_core::template;

/// A transactional email whose subject and body carry `%key%` markers.
pub struct EmailTemplate {
    /// Sender of every message built from the template.
    pub from: Mailbox,

    /// Subject line, before replacements.
    pub subject_template: &'static str,

    /// Plain text body, before replacements.
    pub body_template: &'static str,
}

impl EmailTemplate {
    /// Builds the message for recipient `to`, expanding the markers with `replacements`.
    ///
    /// Bodies are quoted-printable encoded so that long links survive line length limits.
    pub fn apply(&self, to: &EmailAddress, replacements: &[(&str, &str)]) -> ModelResult<Message> {
        let to: Mailbox = to
            .as_str()
            .parse()
            .map_err(|e| ModelError(format!("Cannot parse email address {}: {}", to.as_str(), e)))?;
        let subject = template::apply(self.subject_template, replacements)?;
        let text = template::apply(self.body_template, replacements)?;

        let body = Body::new_with_encoding(text, ContentTransferEncoding::QuotedPrintable)
            .map_err(|e| ModelError(format!("Failed to encode message: {:?}", e)))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .map_err(|e| ModelError(format!("Failed to build message: {:?}", e)))
    }
}

/// Utilities to inspect the messages produced in tests.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use std::collections::HashMap;

    /// A message as its recipient reads it: unfolded headers and decoded text.
    pub struct ParsedMessage {
        /// Headers keyed by their name.
        pub headers: HashMap<String, String>,

        /// Decoded body with Unix line endings.
        pub body: String,
    }

    impl ParsedMessage {
        /// Returns the value of the header `name`, which must be present.
        pub fn header(&self, name: &str) -> &str {
            self.headers.get(name).unwrap_or_else(|| panic!("No {} header in message", name))
        }

        /// Returns the only link in the body that contains `path`.
        pub fn link_containing(&self, path: &str) -> &str {
            let mut links = self
                .body
                .split_whitespace()
                .filter(|word| word.starts_with("http") && word.contains(path));
            match (links.next(), links.next()) {
                (Some(link), None) => link,
                _ => panic!("Expected one link containing {} in: {}", path, self.body),
            }
        }
    }

    /// Decodes the wire form of `message`.
    pub fn parse_message(message: &Message) -> ParsedMessage {
        let text = String::from_utf8(message.formatted()).unwrap();
        let (raw_headers, raw_body) = text
            .split_once("\r\n\r\n")
            .unwrap_or_else(|| panic!("No header separator in message: {}", text));

        let mut headers: HashMap<String, String> = HashMap::default();
        let mut last: Option<String> = None;
        for line in raw_headers.split("\r\n") {
            if line.starts_with([' ', '\t']) {
                let name = last.as_ref().unwrap_or_else(|| panic!("Orphan line: {}", line));
                headers.get_mut(name).unwrap().push_str(line);
                continue;
            }
            let (name, value) =
                line.split_once(": ").unwrap_or_else(|| panic!("Malformed header: {}", line));
            let previous = headers.insert(name.to_owned(), value.to_owned());
            assert!(previous.is_none(), "Duplicate header {}", name);
            last = Some(name.to_owned());
        }

        let body = match headers.get("Content-Transfer-Encoding").map(String::as_str) {
            Some("quoted-printable") => {
                let decoded =
                    quoted_printable::decode(raw_body, quoted_printable::ParseMode::Strict)
                        .unwrap();
                String::from_utf8(decoded).unwrap()
            }
            _ => raw_body.to_owned(),
        };

        ParsedMessage { headers, body: body.replace("\r\n", "\n") }
    }
}
