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

//! Configuration for the Schwab client.

use std::path::PathBuf;

use crate::common::consts::{
    DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_CACHE_PATH, MARKET_DATA_API_BASE_URL, OAUTH_BASE_URL,
    REST_TIMEOUT_SECS, TOKEN_CHECK_INTERVAL_SECS, TRADER_API_BASE_URL,
};

/// Configuration for [`SchwabClient`](crate::SchwabClient).
///
/// The URL overrides exist primarily so tests can point the client at mock
/// servers; production use relies on the defaults.
#[derive(Clone, Debug)]
pub struct SchwabClientConfig {
    /// Base URL of the trader API.
    pub trader_base_url: String,
    /// Base URL of the market-data API.
    pub market_data_base_url: String,
    /// Base URL of the OAuth endpoints.
    pub oauth_base_url: String,
    /// Redirect URI for the authorization-code flow.
    pub redirect_uri: String,
    /// Path of the persistent token cache file.
    pub token_cache_path: PathBuf,
    /// Optional override of the streamer WebSocket URL (normally taken from
    /// the user preference).
    pub ws_url_override: Option<String>,
    /// The timeout (seconds) for REST requests.
    pub http_timeout_secs: u64,
    /// The interval (seconds) of the periodic token checker.
    pub token_check_interval_secs: u64,
}

impl Default for SchwabClientConfig {
    fn default() -> Self {
        Self {
            trader_base_url: TRADER_API_BASE_URL.to_string(),
            market_data_base_url: MARKET_DATA_API_BASE_URL.to_string(),
            oauth_base_url: OAUTH_BASE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE_PATH),
            ws_url_override: None,
            http_timeout_secs: REST_TIMEOUT_SECS,
            token_check_interval_secs: TOKEN_CHECK_INTERVAL_SECS,
        }
    }
}

impl SchwabClientConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trader API base URL.
    #[must_use]
    pub fn with_trader_base_url(mut self, url: String) -> Self {
        self.trader_base_url = url;
        self
    }

    /// Sets the market-data API base URL.
    #[must_use]
    pub fn with_market_data_base_url(mut self, url: String) -> Self {
        self.market_data_base_url = url;
        self
    }

    /// Sets the OAuth base URL.
    #[must_use]
    pub fn with_oauth_base_url(mut self, url: String) -> Self {
        self.oauth_base_url = url;
        self
    }

    /// Sets the token cache path.
    #[must_use]
    pub fn with_token_cache_path(mut self, path: PathBuf) -> Self {
        self.token_cache_path = path;
        self
    }

    /// Sets the streamer WebSocket URL override.
    #[must_use]
    pub fn with_ws_url_override(mut self, url: String) -> Self {
        self.ws_url_override = Some(url);
        self
    }

    /// Sets the REST request timeout.
    #[must_use]
    pub fn with_http_timeout_secs(mut self, timeout: u64) -> Self {
        self.http_timeout_secs = timeout;
        self
    }

    /// Sets the token checker interval.
    #[must_use]
    pub fn with_token_check_interval_secs(mut self, interval: u64) -> Self {
        self.token_check_interval_secs = interval;
        self
    }
}
