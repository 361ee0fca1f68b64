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

//! Schwab REST client.

use std::{collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use schwab_network::http::HttpClient;
use serde::de::DeserializeOwned;

use super::{
    error::{SchwabHttpError, SchwabHttpResult},
    models::{AccountNumberHash, CandleList, MarketHours, UserPreference},
    query::{MarketType, PriceHistoryParams},
};
use crate::{config::SchwabClientConfig, oauth::TokenStore};

/// REST client for the trader and market-data APIs.
///
/// The bearer token is read from the token store at call time, so a refresh
/// completing between calls is picked up without rebuilding the client. A
/// call racing a refresh may still carry the old bearer and surface a 401.
#[derive(Debug)]
pub struct SchwabHttpClient {
    http: HttpClient,
    trader_base_url: String,
    market_data_base_url: String,
    timeout_secs: u64,
    tokens: Arc<TokenStore>,
}

impl SchwabHttpClient {
    /// Creates a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &SchwabClientConfig, tokens: Arc<TokenStore>) -> SchwabHttpResult<Self> {
        let http = HttpClient::new(HashMap::new(), None)?;

        Ok(Self {
            http,
            trader_base_url: config.trader_base_url.clone(),
            market_data_base_url: config.market_data_base_url.clone(),
            timeout_secs: config.http_timeout_secs,
            tokens,
        })
    }

    /// Performs an authenticated GET and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// - `MissingToken` if no access token is available.
    /// - `Transport` on connection failure or timeout.
    /// - `Status` on a non-2xx response.
    /// - `Decode` on an empty or malformed body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        params: Option<&[(String, String)]>,
    ) -> SchwabHttpResult<T> {
        let access_token = self
            .tokens
            .access_token()
            .ok_or(SchwabHttpError::MissingToken)?;
        let headers = HashMap::from([(
            "Authorization".to_string(),
            format!("Bearer {access_token}"),
        )]);

        let response = self
            .http
            .get(url, params, Some(headers), Some(self.timeout_secs))
            .await?;

        if !response.status.is_success() {
            return Err(SchwabHttpError::Status {
                code: response.status.as_u16(),
            });
        }

        if response.body.is_empty() {
            return Err(SchwabHttpError::Decode("Empty response body".to_string()));
        }

        serde_json::from_slice(&response.body).map_err(|e| SchwabHttpError::Decode(e.to_string()))
    }

    /// `GET /accounts/accountNumbers` — plain account numbers and the opaque
    /// hashes used in account-scoped paths.
    pub async fn account_numbers(&self) -> SchwabHttpResult<Vec<AccountNumberHash>> {
        let url = format!("{}/accounts/accountNumbers", self.trader_base_url);
        self.get_json(url, None).await
    }

    /// `GET /userPreference`.
    pub async fn user_preference(&self) -> SchwabHttpResult<UserPreference> {
        let url = format!("{}/userPreference", self.trader_base_url);
        self.get_json(url, None).await
    }

    /// `GET /accounts` or `GET /accounts/{hash}`.
    ///
    /// Summaries pass through as raw JSON; the client does not branch on
    /// their contents.
    pub async fn account_summary(
        &self,
        account_hash: Option<&str>,
    ) -> SchwabHttpResult<serde_json::Value> {
        let url = match account_hash {
            Some(hash) => format!("{}/accounts/{hash}", self.trader_base_url),
            None => format!("{}/accounts", self.trader_base_url),
        };
        self.get_json(url, None).await
    }

    /// `GET /pricehistory`.
    pub async fn price_history(&self, params: &PriceHistoryParams) -> SchwabHttpResult<CandleList> {
        let url = format!("{}/pricehistory", self.market_data_base_url);
        self.get_json(url, Some(&params.to_query())).await
    }

    /// `GET /markets/{type}` for the given date (today when `None`).
    ///
    /// The response nests as `{<marketType>: {<product>: {...}}}`; the first
    /// product entry matching the market type is returned.
    pub async fn market_hours(
        &self,
        market_type: MarketType,
        date: Option<NaiveDate>,
    ) -> SchwabHttpResult<MarketHours> {
        let url = format!("{}/markets/{}", self.market_data_base_url, market_type.as_str());
        let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
        let params = vec![("date".to_string(), date.format("%Y-%m-%d").to_string())];

        let response: serde_json::Value = self.get_json(url, Some(&params)).await?;

        let matched = response
            .get(market_type.as_str())
            .and_then(|products| products.as_object())
            .and_then(|products| products.values().next())
            .ok_or_else(|| {
                SchwabHttpError::Decode(format!(
                    "No market hours found for {}",
                    market_type.as_str()
                ))
            })?;

        serde_json::from_value(matched.clone()).map_err(|e| SchwabHttpError::Decode(e.to_string()))
    }
}
