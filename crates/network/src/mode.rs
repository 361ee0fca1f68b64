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

//! Connection mode shared between the WebSocket client's background tasks.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

/// The lifecycle mode of a WebSocket connection.
///
/// Stored as an atomic `u8` so the read, write, and controller tasks can
/// observe state changes without locking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionMode {
    /// Connected and operating normally.
    Active = 0,
    /// Connection lost; the controller is re-establishing it.
    Reconnect = 1,
    /// A disconnect was requested; tasks are shutting down.
    Disconnect = 2,
    /// Terminal state: the client cannot be reused.
    Closed = 3,
}

impl ConnectionMode {
    /// Converts the mode to its `u8` representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a `u8` back into a mode.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not a valid mode discriminant.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::Reconnect,
            2 => Self::Disconnect,
            3 => Self::Closed,
            _ => panic!("Invalid `ConnectionMode` discriminant: {value}"),
        }
    }

    /// Loads the mode from a shared atomic.
    #[must_use]
    pub fn from_atomic(value: &Arc<AtomicU8>) -> Self {
        Self::from_u8(value.load(Ordering::SeqCst))
    }

    /// Returns `true` if the mode is [`ConnectionMode::Active`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if the mode is [`ConnectionMode::Reconnect`].
    #[must_use]
    pub fn is_reconnect(&self) -> bool {
        matches!(self, Self::Reconnect)
    }

    /// Returns `true` if the mode is [`ConnectionMode::Disconnect`].
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnect)
    }

    /// Returns `true` if the mode is [`ConnectionMode::Closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
