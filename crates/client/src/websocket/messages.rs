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

//! Streamer frame construction and response parsing.
//!
//! Outbound frames are JSON objects of the form
//! `{service, command, requestid, SchwabClientCustomerId,
//! SchwabClientCorrelId, parameters?}`, optionally batched as
//! `{"requests": [...]}`.

use serde_json::{Value, json};

use crate::{common::fields::LevelOneEquityField, http::models::StreamerInfo};

/// Streamer service selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceType {
    Admin,
    LevelOneEquities,
    NyseBook,
    NasdaqBook,
    OptionsBook,
}

impl ServiceType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::LevelOneEquities => "LEVELONE_EQUITIES",
            Self::NyseBook => "NYSE_BOOK",
            Self::NasdaqBook => "NASDAQ_BOOK",
            Self::OptionsBook => "OPTIONS_BOOK",
        }
    }
}

/// Streamer command selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandType {
    Login,
    Logout,
    Subs,
    Add,
}

impl CommandType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Subs => "SUBS",
            Self::Add => "ADD",
        }
    }
}

/// Builds a streamer request frame.
#[must_use]
pub fn build_request(
    service: ServiceType,
    command: CommandType,
    request_id: u64,
    info: &StreamerInfo,
    parameters: Option<Value>,
) -> String {
    let mut frame = json!({
        "service": service.as_str(),
        "command": command.as_str(),
        "requestid": request_id,
        "SchwabClientCustomerId": info.schwab_client_customer_id,
        "SchwabClientCorrelId": info.schwab_client_correl_id,
    });

    if let Some(parameters) = parameters {
        frame["parameters"] = parameters;
    }

    log::trace!("Streamer request: {frame}");
    frame.to_string()
}

/// Builds the `ADMIN`/`LOGIN` frame carrying the bearer token.
#[must_use]
pub fn build_login_request(request_id: u64, info: &StreamerInfo, access_token: &str) -> String {
    build_request(
        ServiceType::Admin,
        CommandType::Login,
        request_id,
        info,
        Some(json!({
            "Authorization": access_token,
            "SchwabClientChannel": info.schwab_client_channel,
            "SchwabClientFunctionId": info.schwab_client_function_id,
        })),
    )
}

/// Builds a `LEVELONE_EQUITIES`/`ADD` frame.
///
/// Fields are sorted ascending with `Symbol` always present; note the
/// vendor silently ignores a re-subscription that changes the field set of
/// an existing service, so changing fields requires re-subscribing all keys.
#[must_use]
pub fn build_level_one_equities_request(
    request_id: u64,
    info: &StreamerInfo,
    tickers: &[String],
    fields: Vec<LevelOneEquityField>,
) -> String {
    let fields = LevelOneEquityField::normalize(fields);

    build_request(
        ServiceType::LevelOneEquities,
        CommandType::Add,
        request_id,
        info,
        Some(json!({
            "keys": tickers.join(","),
            "fields": LevelOneEquityField::join_codes(&fields),
        })),
    )
}

/// Combines frames into a single `{"requests": [...]}` batch.
///
/// Frames that fail to parse are skipped with a warning.
#[must_use]
pub fn batch_requests(frames: &[String]) -> String {
    let parsed: Vec<Value> = frames
        .iter()
        .filter_map(|frame| match serde_json::from_str(frame) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Skipping unparsable frame in batch: {e}");
                None
            }
        })
        .collect();

    json!({ "requests": parsed }).to_string()
}

/// Parses a login response, returning `(code, msg)` from the path
/// `response[0].content.{code, msg}`.
///
/// Returns `None` for any malformed shape.
#[must_use]
pub fn parse_login_response(text: &str) -> Option<(i64, String)> {
    let value: Value = serde_json::from_str(text).ok()?;
    let content = value.get("response")?.as_array()?.first()?.get("content")?;
    let code = content.get("code")?.as_i64()?;
    let msg = content.get("msg")?.as_str()?.to_string();
    Some((code, msg))
}
