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

//! Trivial templating engine.

use crate::model::{ModelError, ModelResult};

/// Expands `%key%` markers in `input` with the values in `replacements`.
///
/// A literal `%` is written as `%%`.  Every key referenced by `input` must have exactly one
/// replacement and values are not expanded again.
pub fn apply(input: &str, replacements: &[(&str, &str)]) -> ModelResult<String> {
    let mut output = String::with_capacity(input.len());
    let mut chunks = input.split('%').enumerate().peekable();
    while let Some((i, chunk)) = chunks.next() {
        if i % 2 == 0 {
            output.push_str(chunk);
            continue;
        }

        if chunks.peek().is_none() {
            return Err(ModelError(format!("Unterminated replacement in template: %{}", chunk)));
        }
        if chunk.is_empty() {
            output.push('%');
            continue;
        }

        let mut values = replacements.iter().filter(|(key, _)| *key == chunk);
        match (values.next(), values.next()) {
            (Some((_, value)), None) => output.push_str(value),
            (None, _) => return Err(ModelError(format!("No replacement for {}", chunk))),
            (Some(_), Some(_)) => {
                return Err(ModelError(format!("Found two values for replacement {}", chunk)));
            }
        }
    }
    Ok(output)
}
