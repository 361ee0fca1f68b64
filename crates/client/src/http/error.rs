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

//! REST error types.

use schwab_network::http::HttpClientError;
use thiserror::Error;

/// Result type for REST operations.
pub type SchwabHttpResult<T> = Result<T, SchwabHttpError>;

/// Errors surfaced by REST calls.
///
/// A call racing a concurrent token refresh may read the old bearer and
/// surface as `Status { code: 401 }`; no ordering with in-flight refreshes
/// is promised.
#[derive(Debug, Error)]
pub enum SchwabHttpError {
    /// Transport-level failure: DNS, TCP, TLS, or timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API returned a non-2xx status.
    #[error("Status error: {code}")]
    Status {
        /// The HTTP status code.
        code: u16,
    },

    /// The response body was empty or malformed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// No access token is available; authorize first.
    #[error("Missing access token: connect() has not authorized the client")]
    MissingToken,
}

impl From<HttpClientError> for SchwabHttpError {
    fn from(source: HttpClientError) -> Self {
        Self::Transport(source.to_string())
    }
}
