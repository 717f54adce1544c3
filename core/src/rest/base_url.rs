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

//! The `BaseUrl` type.

use crate::env::get_required_var;
use url::Url;

/// Public address of the service, used to build absolute links that leave the process, such as
/// the ones embedded in emails.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Creates a base URL from an already-parsed URL, which must end in a slash so that
    /// relative paths are appended to it.
    pub fn new(base: Url) -> Result<Self, String> {
        if base.cannot_be_a_base() || !base.path().ends_with('/') {
            return Err(format!("URL '{}' cannot be a base: missing trailing slash", base));
        }
        Ok(Self(base))
    }

    /// Creates a base URL from the `<prefix>_BASE_URL` environment variable.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        Self::new(get_required_var::<Url>(prefix, "BASE_URL")?)
    }

    /// Creates a base URL from a fixed string, which must represent a valid URL.
    #[cfg(any(test, feature = "testutils"))]
    pub fn from_str_unchecked(base: &'static str) -> Self {
        Self::new(Url::parse(base).unwrap()).unwrap()
    }

    /// Builds an absolute URL for `path`, which is relative to the base.
    pub fn make(&self, path: &str) -> Url {
        let mut url = self.0.clone();
        url.set_path(&format!("{}{}", self.0.path(), path.trim_start_matches('/')));
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_trailing_slash() {
        assert!(BaseUrl::new(Url::parse("https://example.com/").unwrap()).is_ok());
        assert!(BaseUrl::new(Url::parse("https://example.com").unwrap()).is_ok());
        let err = BaseUrl::new(Url::parse("https://example.com/api").unwrap()).unwrap_err();
        assert!(err.contains("missing trailing slash"));
    }

    #[test]
    fn test_make() {
        let base = BaseUrl::from_str_unchecked("https://example.com:8080/prefix/");
        assert_eq!(
            "https://example.com:8080/prefix/api/v1/users/resetPassword/abc",
            base.make("/api/v1/users/resetPassword/abc").as_str()
        );
        assert_eq!("https://example.com:8080/prefix/x", base.make("x").as_str());
    }

    #[test]
    fn test_from_env() {
        temp_env::with_var("APP_BASE_URL", Some("http://localhost:3000/"), || {
            let base = BaseUrl::from_env("APP").unwrap();
            assert_eq!("http://localhost:3000/a", base.make("a").as_str());
        });
        temp_env::with_var_unset("APP_BASE_URL", || {
            assert!(BaseUrl::from_env("APP").unwrap_err().contains("APP_BASE_URL not present"));
        });
    }
}
