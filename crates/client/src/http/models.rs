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

//! REST response models.
//!
//! Only the shapes the client actually branches on are typed; account
//! summaries pass through as raw JSON.

use serde::{Deserialize, Serialize};

/// One entry of the `/accounts/accountNumbers` response.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNumberHash {
    /// The plain account number.
    pub account_number: String,
    /// Opaque hash used in account-scoped REST paths.
    pub hash_value: String,
}

/// Per-user metadata required to authenticate the streamer session.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamerInfo {
    /// WebSocket URL of the streamer.
    #[serde(default)]
    pub streamer_socket_url: String,
    /// Customer id carried in every streamer frame.
    #[serde(default)]
    pub schwab_client_customer_id: String,
    /// Correlation id carried in every streamer frame.
    #[serde(default)]
    pub schwab_client_correl_id: String,
    /// Channel identifier for the login frame.
    #[serde(default)]
    pub schwab_client_channel: String,
    /// Function identifier for the login frame.
    #[serde(default)]
    pub schwab_client_function_id: String,
}

/// One account entry of the `/userPreference` response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferenceAccount {
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub primary_account: bool,
    #[serde(default, rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub account_color: String,
    #[serde(default)]
    pub display_acct_id: String,
    #[serde(default)]
    pub auto_position_effect: bool,
}

/// One offer entry of the `/userPreference` response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default, rename = "level2Permissions")]
    pub level_2_permissions: bool,
    #[serde(default)]
    pub mkt_data_permission: String,
}

/// The `/userPreference` response.
///
/// Required complete (with at least one [`StreamerInfo`]) before the
/// streamer may start.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    #[serde(default)]
    pub accounts: Vec<UserPreferenceAccount>,
    #[serde(default)]
    pub streamer_info: Vec<StreamerInfo>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

/// A single OHLCV candle.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Candle {
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub datetime: i64,
}

/// The `/pricehistory` response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleList {
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub previous_close: Option<f64>,
    #[serde(default)]
    pub previous_close_date: Option<i64>,
}

/// Session hours of one product from the `/markets/{type}` response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketHours {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub market_type: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub is_open: bool,
    /// Raw session hours map (session name to open/close ranges).
    #[serde(default)]
    pub session_hours: serde_json::Value,
}
