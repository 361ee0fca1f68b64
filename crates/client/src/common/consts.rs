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

//! Vendor constants and design parameters.

/// Base URL for the trader API.
pub const TRADER_API_BASE_URL: &str = "https://api.schwabapi.com/trader/v1";

/// Base URL for the market-data API.
pub const MARKET_DATA_API_BASE_URL: &str = "https://api.schwabapi.com/marketdata/v1";

/// Base URL for the OAuth endpoints (`/authorize`, `/token`).
pub const OAUTH_BASE_URL: &str = "https://api.schwabapi.com/v1/oauth";

/// Redirect URI registered with the vendor for the authorization-code flow.
pub const DEFAULT_REDIRECT_URI: &str = "https://127.0.0.1";

/// Default path of the persistent token cache.
pub const DEFAULT_TOKEN_CACHE_PATH: &str = "./.tokens.json";

/// Deadline for REST requests (seconds).
pub const REST_TIMEOUT_SECS: u64 = 5;

/// Access-token lifetime as documented by the vendor (seconds).
pub const ACCESS_TOKEN_LIFETIME_SECS: u64 = 30 * 60;

/// Refresh-token lifetime as documented by the vendor (seconds).
pub const REFRESH_TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

/// How long before access-token expiry a refresh is performed (seconds).
pub const ACCESS_TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// How long before refresh-token expiry reauthorization is required (seconds).
pub const REFRESH_TOKEN_EXPIRY_MARGIN_SECS: u64 = 60 * 60;

/// Interval of the periodic token checker (seconds).
pub const TOKEN_CHECK_INTERVAL_SECS: u64 = 30;

/// Delay before retrying a failed streamer login (seconds).
pub const LOGIN_RETRY_DELAY_SECS: u64 = 5;

/// Backstop deadline for a streamer login response (seconds). The read
/// deadline normally fires first and triggers a reconnect.
pub const LOGIN_RESPONSE_TIMEOUT_SECS: u64 = 60;

/// Delay between attempts to establish the initial streamer connection
/// (seconds).
pub const STREAMER_CONNECT_RETRY_DELAY_SECS: u64 = 10;

/// Number of chances the user gets to complete the OAuth flow.
pub const OAUTH_DEFAULT_CHANCES: u32 = 3;
