// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2025-2026 schwab-rs contributors. All rights reserved.
//  https://github.com/schwab-rs/schwab-rs
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Schwab application credential handling.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Schwab application credentials.
///
/// The key and secret are read once at initialization and never mutated.
/// The token endpoint authenticates with `Authorization: Basic
/// base64(key:secret)`.
#[derive(Clone)]
pub struct SchwabCredential {
    app_key: String,
    app_secret: String,
}

impl SchwabCredential {
    /// Creates a new `SchwabCredential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or secret is empty.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self, crate::error::SchwabError> {
        let app_key = app_key.into();
        let app_secret = app_secret.into();

        if app_key.is_empty() || app_secret.is_empty() {
            return Err(crate::error::SchwabError::MissingCredentials);
        }

        Ok(Self {
            app_key,
            app_secret,
        })
    }

    /// Returns the application key.
    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Returns the `Authorization` header value for the token endpoint.
    #[must_use]
    pub fn basic_auth(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.app_key, self.app_secret));
        format!("Basic {encoded}")
    }
}

impl fmt::Debug for SchwabCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchwabCredential")
            .field("app_key", &"[REDACTED]")
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_basic_auth_encoding() {
        let credential = SchwabCredential::new("key", "secret").unwrap();
        // base64("key:secret")
        assert_eq!(credential.basic_auth(), "Basic a2V5OnNlY3JldA==");
    }

    #[rstest]
    fn test_empty_credentials_rejected() {
        assert!(SchwabCredential::new("", "secret").is_err());
        assert!(SchwabCredential::new("key", "").is_err());
    }

    #[rstest]
    fn test_debug_redaction() {
        let credential = SchwabCredential::new("my_key", "my_secret").unwrap();
        let debug_str = format!("{credential:?}");
        assert!(!debug_str.contains("my_key"));
        assert!(!debug_str.contains("my_secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
