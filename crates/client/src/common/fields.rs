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

//! Streamer field tables.
//!
//! Fields are identified by numeric codes on the wire.

/// Fields available on the `LEVELONE_EQUITIES` streamer service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LevelOneEquityField {
    Symbol = 0,
    BidPrice = 1,
    AskPrice = 2,
    LastPrice = 3,
    BidSize = 4,
    AskSize = 5,
    AskId = 6,
    BidId = 7,
    TotalVolume = 8,
    LastSize = 9,
    HighPrice = 10,
    LowPrice = 11,
    ClosePrice = 12,
    ExchangeId = 13,
    Marginable = 14,
    Description = 15,
    LastId = 16,
    OpenPrice = 17,
    NetChange = 18,
    Week52High = 19,
    Week52Low = 20,
    PeRatio = 21,
    AnnualDividendAmount = 22,
    DividendYield = 23,
    Nav = 24,
    ExchangeName = 25,
    DividendDate = 26,
    RegularMarketQuote = 27,
    RegularMarketTrade = 28,
    RegularMarketLastPrice = 29,
    RegularMarketLastSize = 30,
    RegularMarketNetChange = 31,
    SecurityStatus = 32,
    MarkPrice = 33,
    QuoteTimeInLong = 34,
    TradeTimeInLong = 35,
    RegularMarketTradeTimeInLong = 36,
    BidTime = 37,
    AskTime = 38,
    AskMicId = 39,
    BidMicId = 40,
    LastMicId = 41,
    NetPercentChange = 42,
    RegularMarketPercentChange = 43,
    MarkPriceNetChange = 44,
    MarkPricePercentChange = 45,
    HardToBorrowQuantity = 46,
    HardToBorrowRate = 47,
    HardToBorrow = 48,
    Shortable = 49,
    PostMarketNetChange = 50,
    PostMarketPercentChange = 51,
}

impl LevelOneEquityField {
    /// Returns the numeric wire code of the field.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Normalizes a field list for a subscription request.
    ///
    /// The streamer requires fields sorted ascending by code and the `Symbol`
    /// field present; `Symbol` is prepended when absent.
    #[must_use]
    pub fn normalize(mut fields: Vec<Self>) -> Vec<Self> {
        fields.sort();
        match fields.first() {
            Some(Self::Symbol) => {}
            _ => fields.insert(0, Self::Symbol),
        }
        fields
    }

    /// Joins field codes into the comma-separated wire representation.
    #[must_use]
    pub fn join_codes(fields: &[Self]) -> String {
        fields
            .iter()
            .map(|field| field.code().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_codes_match_wire_table() {
        assert_eq!(LevelOneEquityField::Symbol.code(), 0);
        assert_eq!(LevelOneEquityField::LastPrice.code(), 3);
        assert_eq!(LevelOneEquityField::ClosePrice.code(), 12);
        assert_eq!(LevelOneEquityField::OpenPrice.code(), 17);
        assert_eq!(LevelOneEquityField::PostMarketPercentChange.code(), 51);
    }

    #[rstest]
    fn test_normalize_sorts_and_prepends_symbol() {
        let fields = LevelOneEquityField::normalize(vec![
            LevelOneEquityField::OpenPrice,
            LevelOneEquityField::LastPrice,
            LevelOneEquityField::ClosePrice,
        ]);
        assert_eq!(
            fields,
            vec![
                LevelOneEquityField::Symbol,
                LevelOneEquityField::LastPrice,
                LevelOneEquityField::ClosePrice,
                LevelOneEquityField::OpenPrice,
            ]
        );
        assert_eq!(LevelOneEquityField::join_codes(&fields), "0,3,12,17");
    }

    #[rstest]
    fn test_normalize_keeps_existing_symbol() {
        let fields = LevelOneEquityField::normalize(vec![
            LevelOneEquityField::LastPrice,
            LevelOneEquityField::Symbol,
        ]);
        assert_eq!(
            fields,
            vec![LevelOneEquityField::Symbol, LevelOneEquityField::LastPrice]
        );
    }

    #[rstest]
    fn test_normalize_empty_input() {
        let fields = LevelOneEquityField::normalize(vec![]);
        assert_eq!(fields, vec![LevelOneEquityField::Symbol]);
    }
}
