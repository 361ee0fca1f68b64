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

//! HTTP client over `reqwest` with per-request timeouts.

pub mod client;
pub mod error;

use std::collections::HashMap;

pub use client::HttpClient;
pub use error::HttpClientError;
pub use reqwest::Method;

/// An HTTP response with status, selected headers, and body.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The response status code.
    pub status: HttpStatus,
    /// The response headers (string-valued headers only).
    pub headers: HashMap<String, String>,
    /// The response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns the body interpreted as UTF-8 text (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Wrapper around an HTTP status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpStatus(reqwest::StatusCode);

impl HttpStatus {
    /// Creates a new [`HttpStatus`] from a `reqwest` status code.
    #[must_use]
    pub const fn new(status: reqwest::StatusCode) -> Self {
        Self(status)
    }

    /// Returns the status code as a `u16`.
    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0.as_u16()
    }

    /// Returns `true` for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.0.is_success()
    }

    /// Returns `true` for a 4xx status.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.0.is_client_error()
    }

    /// Returns `true` for a 5xx status.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.0.is_server_error()
    }
}
