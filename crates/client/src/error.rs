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

//! Top-level client error types.

use thiserror::Error;

use crate::http::error::SchwabHttpError;

/// Result type for client operations.
pub type SchwabResult<T> = Result<T, SchwabError>;

/// Errors surfaced by [`SchwabClient`](crate::SchwabClient).
#[derive(Debug, Error)]
pub enum SchwabError {
    /// The application key or secret is missing or empty.
    #[error("Missing credentials: both app_key and app_secret are required")]
    MissingCredentials,

    /// The client has not been connected (or `connect()` failed).
    #[error("Client not connected: call connect() first")]
    NotConnected,

    /// An HTTP request failed.
    #[error(transparent)]
    Http(#[from] SchwabHttpError),

    /// A streamer operation failed.
    #[error("Streamer error: {0}")]
    Streamer(String),
}
