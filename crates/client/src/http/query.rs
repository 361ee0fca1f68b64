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

//! Query parameter types for the market-data endpoints.

use chrono::{DateTime, Utc};

/// Aggregation period of a price history request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeriodType {
    Day,
    Month,
    Year,
    Ytd,
}

impl PeriodType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Ytd => "ytd",
        }
    }
}

/// Candle frequency of a price history request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrequencyType {
    Minute,
    Daily,
    Weekly,
    Monthly,
}

impl FrequencyType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Market selector for the `/markets/{type}` endpoint.
///
/// The vendor returns unusable data for anything but `Equity`; the other
/// selectors exist for completeness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketType {
    Equity,
    Option,
    Bond,
    Future,
    Forex,
}

impl MarketType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Option => "option",
            Self::Bond => "bond",
            Self::Future => "future",
            Self::Forex => "forex",
        }
    }
}

/// Parameters of a `/pricehistory` request.
#[derive(Clone, Debug)]
pub struct PriceHistoryParams {
    /// The ticker symbol.
    pub symbol: String,
    /// Aggregation period type.
    pub period_type: PeriodType,
    /// Number of periods.
    pub period: u32,
    /// Candle frequency type.
    pub frequency_type: FrequencyType,
    /// Candle frequency.
    pub frequency: u32,
    /// Optional start of the window.
    pub start: Option<DateTime<Utc>>,
    /// Optional end of the window.
    pub end: Option<DateTime<Utc>>,
    /// Whether extended-hours candles are included.
    pub need_extended_hours_data: bool,
    /// Whether the previous close is included.
    pub need_previous_close: bool,
}

impl PriceHistoryParams {
    /// Creates parameters for `symbol` with one day of minute candles.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            period_type: PeriodType::Day,
            period: 1,
            frequency_type: FrequencyType::Minute,
            frequency: 1,
            start: None,
            end: None,
            need_extended_hours_data: false,
            need_previous_close: false,
        }
    }

    /// Sets the period.
    #[must_use]
    pub fn with_period(mut self, period_type: PeriodType, period: u32) -> Self {
        self.period_type = period_type;
        self.period = period;
        self
    }

    /// Sets the frequency.
    #[must_use]
    pub fn with_frequency(mut self, frequency_type: FrequencyType, frequency: u32) -> Self {
        self.frequency_type = frequency_type;
        self.frequency = frequency;
        self
    }

    /// Sets the window.
    #[must_use]
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Includes extended-hours candles.
    #[must_use]
    pub fn with_extended_hours(mut self, value: bool) -> Self {
        self.need_extended_hours_data = value;
        self
    }

    /// Includes the previous close.
    #[must_use]
    pub fn with_previous_close(mut self, value: bool) -> Self {
        self.need_previous_close = value;
        self
    }

    /// Renders the query string pairs. Window bounds are epoch milliseconds.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("symbol".to_string(), self.symbol.clone()),
            ("periodType".to_string(), self.period_type.as_str().to_string()),
            ("period".to_string(), self.period.to_string()),
            (
                "frequencyType".to_string(),
                self.frequency_type.as_str().to_string(),
            ),
            ("frequency".to_string(), self.frequency.to_string()),
            (
                "needExtendedHoursData".to_string(),
                self.need_extended_hours_data.to_string(),
            ),
            (
                "needPreviousClose".to_string(),
                self.need_previous_close.to_string(),
            ),
        ];

        if let Some(start) = self.start {
            query.push(("startDate".to_string(), start.timestamp_millis().to_string()));
        }
        if let Some(end) = self.end {
            query.push(("endDate".to_string(), end.timestamp_millis().to_string()));
        }

        query
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_wire_strings() {
        assert_eq!(PeriodType::Ytd.as_str(), "ytd");
        assert_eq!(FrequencyType::Daily.as_str(), "daily");
        assert_eq!(MarketType::Equity.as_str(), "equity");
    }

    #[rstest]
    fn test_price_history_query_defaults() {
        let query = PriceHistoryParams::new("SPY").to_query();
        assert!(query.contains(&("symbol".to_string(), "SPY".to_string())));
        assert!(query.contains(&("periodType".to_string(), "day".to_string())));
        assert!(query.contains(&("frequencyType".to_string(), "minute".to_string())));
        assert!(query.contains(&("needExtendedHoursData".to_string(), "false".to_string())));
        assert!(!query.iter().any(|(key, _)| key == "startDate"));
    }

    #[rstest]
    fn test_price_history_query_window_in_millis() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let end = DateTime::from_timestamp(1_700_086_400, 0).unwrap();
        let query = PriceHistoryParams::new("SPY")
            .with_window(start, end)
            .to_query();

        assert!(query.contains(&("startDate".to_string(), "1700000000000".to_string())));
        assert!(query.contains(&("endDate".to_string(), "1700086400000".to_string())));
    }
}
