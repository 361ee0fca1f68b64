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

//! Configuration for WebSocket client connections.

use crate::consts::{
    DEFAULT_READ_TIMEOUT_SECS, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_RECONNECT_TIMEOUT_MS,
};

/// Static configuration for a [`WebSocketClient`](super::WebSocketClient).
///
/// Runtime callbacks (message handler, reconnect handler) are passed
/// separately to `connect()`.
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// The URL to connect to (`ws://` or `wss://`).
    pub url: String,
    /// Additional headers for the WebSocket handshake request.
    pub headers: Vec<(String, String)>,
    /// The deadline (seconds) for a single read while reading is enabled.
    /// `None` disables the read deadline.
    pub read_timeout_secs: Option<u64>,
    /// The delay (milliseconds) between reconnection attempts.
    pub reconnect_delay_ms: Option<u64>,
    /// The deadline (milliseconds) for a full reconnection attempt.
    pub reconnect_timeout_ms: Option<u64>,
    /// The maximum number of reconnection attempts before giving up.
    /// `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,
}

impl WebSocketConfig {
    /// Creates a configuration for `url` with default recovery settings:
    /// a 30 s read deadline, a fixed 10 s reconnect delay, and unlimited
    /// reconnection attempts.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            headers: Vec::new(),
            read_timeout_secs: Some(DEFAULT_READ_TIMEOUT_SECS),
            reconnect_delay_ms: Some(DEFAULT_RECONNECT_DELAY_MS),
            reconnect_timeout_ms: Some(DEFAULT_RECONNECT_TIMEOUT_MS),
            reconnect_max_attempts: None,
        }
    }
}
