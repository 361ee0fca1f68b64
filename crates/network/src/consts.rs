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

//! Shared constants for the transport layer.

/// Interval between connection-state checks in background tasks (milliseconds).
pub const CONNECTION_STATE_CHECK_INTERVAL_MS: u64 = 100;

/// Delay applied before releasing a connection on shutdown (milliseconds).
pub const GRACEFUL_SHUTDOWN_DELAY_MS: u64 = 100;

/// Maximum time to wait for background tasks to finish on shutdown (seconds).
pub const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Deadline for each step of the connect sequence: resolve, TCP connect,
/// TLS handshake, WebSocket handshake (seconds).
pub const HANDSHAKE_STEP_TIMEOUT_SECS: u64 = 30;

/// Default deadline for a single WebSocket read while the read loop is
/// enabled (seconds). A read that sees no frame within the deadline is
/// treated as a dead connection.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Default delay between reconnection attempts (milliseconds).
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 10_000;

/// Default deadline for a full reconnection attempt (milliseconds). Sized
/// above the sum of the per-step handshake deadlines so those stay the
/// binding limits.
pub const DEFAULT_RECONNECT_TIMEOUT_MS: u64 = 130_000;
