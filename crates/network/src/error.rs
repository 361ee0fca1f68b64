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

//! Error types for the transport layer.

use thiserror::Error;

/// Errors returned when enqueueing a message for sending.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection is closed or a disconnect is in progress.
    #[error("Connection closed")]
    Closed,

    /// The operation timed out.
    #[error("Send timed out")]
    Timeout,

    /// The writer task is no longer receiving commands.
    #[error("Broken pipe: {0}")]
    BrokenPipe(String),
}
