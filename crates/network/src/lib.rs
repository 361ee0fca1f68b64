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

//! Transport layer for the Schwab client.
//!
//! Provides the networking building blocks the higher-level client is composed
//! from:
//!
//! - An async WebSocket client with a staged connect sequence
//!   (resolve → TCP → TLS → WebSocket handshake), a single serialized writer
//!   task, a deadline-guarded read loop, and automatic reconnection.
//! - A thin HTTP client over `reqwest` with per-request timeouts.
//! - A process-wide Tokio runtime driven by a single dedicated I/O thread.

pub mod backoff;
pub mod consts;
pub mod error;
pub mod http;
pub mod mode;
pub mod runtime;
pub mod tls;
pub mod websocket;

pub use error::SendError;
pub use mode::ConnectionMode;
pub use runtime::get_runtime;
