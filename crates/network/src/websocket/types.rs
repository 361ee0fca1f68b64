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

//! Shared type aliases for the WebSocket client.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

/// The write half of a split WebSocket stream.
pub type MessageWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// The read half of a split WebSocket stream.
pub type MessageReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Handler invoked for each inbound text frame.
pub type MessageHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Handler invoked after every successful reconnection.
pub type ReconnectHandler = Arc<dyn Fn() + Send + Sync>;

/// One-shot callback fired after a frame has been written to the socket.
pub type SentCallback = Box<dyn FnOnce() + Send>;

/// Commands processed by the writer task.
pub enum WriterCommand {
    /// Write a frame to the socket, then fire the optional callback.
    Send {
        /// The message to write.
        msg: Message,
        /// Fired once the write has completed successfully.
        on_sent: Option<SentCallback>,
    },
    /// Replace the writer after a reconnection; the sender reports drain
    /// success over the provided channel.
    Update(MessageWriter, tokio::sync::oneshot::Sender<bool>),
}

impl std::fmt::Debug for WriterCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send { msg, on_sent } => f
                .debug_struct("Send")
                .field("msg", msg)
                .field("has_on_sent", &on_sent.is_some())
                .finish(),
            Self::Update(_, _) => f.debug_struct("Update").finish_non_exhaustive(),
        }
    }
}
