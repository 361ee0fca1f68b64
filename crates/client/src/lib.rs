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

//! Client for the Schwab trader and market-data API.
//!
//! [`SchwabClient`] is the public entry point. It maintains OAuth2 bearer
//! credentials against the Schwab identity service (with a persistent token
//! cache and a periodic refresh checker), performs authenticated synchronous
//! REST calls, and drives a streamer: a persistent, authenticated WebSocket
//! session for real-time market data with automatic recovery and subscription
//! replay.
//!
//! ```no_run
//! use schwab_client::{SchwabClient, common::fields::LevelOneEquityField};
//!
//! let client = SchwabClient::new("app-key", "app-secret").unwrap();
//! if client.connect() {
//!     client.start_streamer().unwrap();
//!     client
//!         .subscribe_level_one_equities(
//!             vec!["SCHD".to_string(), "RKLB".to_string()],
//!             vec![LevelOneEquityField::LastPrice],
//!         )
//!         .unwrap();
//! }
//! ```

pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod oauth;
pub mod timer;
pub mod websocket;

pub use client::SchwabClient;
pub use config::SchwabClientConfig;
pub use error::{SchwabError, SchwabResult};
pub use events::{AuthRequestReason, AuthStatus, ClientEvent, EventCallback};
