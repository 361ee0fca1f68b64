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

//! WebSocket client implementation with automatic reconnection.
//!
//! The connection is split into a read half and a write half:
//!
//! - The read half is driven by a background task which invokes the message
//!   handler for each inbound text frame. Reads carry a deadline while reading
//!   is enabled; a silent connection is treated as dead. Reading can be paused
//!   and resumed without tearing the connection down.
//! - The write half is owned by a single writer task which performs one write
//!   at a time, preserving enqueue order, and fires per-frame sent callbacks.
//! - A controller task watches for dead connections and re-establishes them,
//!   invoking a reconnect handler after every successful recovery.
//!
//! Connecting is staged explicitly (resolve, TCP connect, TLS handshake,
//! WebSocket handshake) with a deadline on each step.

use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{
    MaybeTlsStream, client_async,
    tungstenite::{
        Error, Message,
        client::IntoClientRequest,
        error::UrlError,
        http::{HeaderName, HeaderValue},
    },
};

use super::{
    config::WebSocketConfig,
    types::{MessageHandler, MessageReader, MessageWriter, ReconnectHandler, WriterCommand},
};
use crate::{
    backoff::ExponentialBackoff,
    consts::{
        CONNECTION_STATE_CHECK_INTERVAL_MS, DEFAULT_RECONNECT_DELAY_MS,
        DEFAULT_RECONNECT_TIMEOUT_MS, GRACEFUL_SHUTDOWN_DELAY_MS, GRACEFUL_SHUTDOWN_TIMEOUT_SECS,
        HANDSHAKE_STEP_TIMEOUT_SECS,
    },
    error::SendError,
    mode::ConnectionMode,
    tls::{create_tls_config, install_cryptographic_provider},
    websocket::types::SentCallback,
};

/// Owns a single connection's tasks and performs reconnection.
struct WebSocketClientInner {
    config: WebSocketConfig,
    message_handler: MessageHandler,
    read_task: Option<tokio::task::JoinHandle<()>>,
    write_task: tokio::task::JoinHandle<()>,
    writer_tx: tokio::sync::mpsc::UnboundedSender<WriterCommand>,
    connection_mode: Arc<AtomicU8>,
    read_enabled: Arc<AtomicBool>,
    reconnect_timeout: Duration,
    backoff: ExponentialBackoff,
    reconnect_max_attempts: Option<u32>,
    reconnection_attempt_count: u32,
}

impl WebSocketClientInner {
    /// Establishes the initial connection and spawns the read and write tasks.
    async fn connect_url(
        config: WebSocketConfig,
        message_handler: MessageHandler,
    ) -> Result<Self, Error> {
        install_cryptographic_provider();

        let (writer, reader) = Self::connect_with_server(&config.url, &config.headers).await?;

        let connection_mode = Arc::new(AtomicU8::new(ConnectionMode::Active.as_u8()));
        let read_enabled = Arc::new(AtomicBool::new(true));

        let (writer_tx, writer_rx) = tokio::sync::mpsc::unbounded_channel::<WriterCommand>();
        let write_task = Self::spawn_write_task(connection_mode.clone(), writer, writer_rx);

        let read_task = Some(Self::spawn_read_task(
            connection_mode.clone(),
            read_enabled.clone(),
            reader,
            message_handler.clone(),
            writer_tx.clone(),
            config.read_timeout_secs.map(Duration::from_secs),
        ));

        let reconnect_delay = Duration::from_millis(
            config.reconnect_delay_ms.unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
        );
        let backoff = ExponentialBackoff::new(reconnect_delay, reconnect_delay, 1.0, 0, false)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let reconnect_timeout = Duration::from_millis(
            config
                .reconnect_timeout_ms
                .unwrap_or(DEFAULT_RECONNECT_TIMEOUT_MS),
        );
        let reconnect_max_attempts = config.reconnect_max_attempts;

        Ok(Self {
            config,
            message_handler,
            read_task,
            write_task,
            writer_tx,
            connection_mode,
            read_enabled,
            reconnect_timeout,
            backoff,
            reconnect_max_attempts,
            reconnection_attempt_count: 0,
        })
    }

    /// Connects to the server through the staged sequence: resolve the host,
    /// open the TCP stream, perform the TLS handshake for `wss://` URLs, then
    /// perform the WebSocket handshake. Each step has its own deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails or exceeds its deadline.
    async fn connect_with_server(
        url: &str,
        headers: &[(String, String)],
    ) -> Result<(MessageWriter, MessageReader), Error> {
        let step_timeout = Duration::from_secs(HANDSHAKE_STEP_TIMEOUT_SECS);

        let mut request = url.into_client_request()?;
        let req_headers = request.headers_mut();
        for (key, val) in headers {
            let header_name: HeaderName = key.parse()?;
            let header_value = HeaderValue::from_str(val)?;
            req_headers.insert(header_name, header_value);
        }

        let uri = request.uri().clone();
        let scheme = uri.scheme_str().unwrap_or("ws").to_string();
        let host = uri
            .host()
            .ok_or(Error::Url(UrlError::NoHostName))?
            .to_string();
        let port = uri
            .port_u16()
            .unwrap_or(if scheme == "wss" { 443 } else { 80 });

        // Step 1: resolve
        let addrs: Vec<std::net::SocketAddr> =
            tokio::time::timeout(step_timeout, tokio::net::lookup_host((host.as_str(), port)))
                .await
                .map_err(|_| step_timed_out("host resolution"))?
                .map_err(Error::Io)?
                .collect();
        if addrs.is_empty() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No addresses resolved for {host}"),
            )));
        }
        log::debug!("Host resolved: {host} ({} addresses)", addrs.len());

        // Step 2: TCP connect
        let tcp_stream =
            tokio::time::timeout(step_timeout, tokio::net::TcpStream::connect(addrs.as_slice()))
                .await
                .map_err(|_| step_timed_out("TCP connect"))?
                .map_err(Error::Io)?;
        if let Err(e) = tcp_stream.set_nodelay(true) {
            log::warn!("Failed to enable TCP_NODELAY: {e:?}");
        }
        log::debug!("TCP connected: {host}:{port}");

        // Step 3: TLS handshake (wss only)
        let maybe_tls_stream = if scheme == "wss" {
            let tls_connector = tokio_rustls::TlsConnector::from(create_tls_config());
            let domain = rustls::pki_types::ServerName::try_from(host.clone()).map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid DNS name: {e}"),
                ))
            })?;

            let tls_stream =
                tokio::time::timeout(step_timeout, tls_connector.connect(domain, tcp_stream))
                    .await
                    .map_err(|_| step_timed_out("TLS handshake"))?
                    .map_err(Error::Io)?;
            log::debug!("TLS handshake complete: {host}");
            MaybeTlsStream::Rustls(tls_stream)
        } else {
            MaybeTlsStream::Plain(tcp_stream)
        };

        // Step 4: WebSocket handshake
        let (stream, _response) =
            tokio::time::timeout(step_timeout, client_async(request, maybe_tls_stream))
                .await
                .map_err(|_| step_timed_out("WebSocket handshake"))??;
        log::info!("WebSocket connected: {host}");

        Ok(stream.split())
    }

    /// Re-establishes the connection after a failure.
    ///
    /// Replaces the writer inside the writer task (draining any frames
    /// buffered during the outage) and spawns a fresh read task.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt fails or exceeds the reconnect
    /// deadline.
    async fn reconnect(&mut self) -> Result<(), Error> {
        log::debug!("Reconnecting");

        if ConnectionMode::from_atomic(&self.connection_mode).is_disconnect() {
            log::debug!("Reconnect aborted due to disconnect state");
            return Ok(());
        }

        tokio::time::timeout(self.reconnect_timeout, async {
            let (new_writer, reader) =
                Self::connect_with_server(&self.config.url, &self.config.headers).await?;

            if ConnectionMode::from_atomic(&self.connection_mode).is_disconnect() {
                log::debug!("Reconnect aborted mid-flight (after connect)");
                return Ok(());
            }

            // Hand the new writer to the writer task and wait for it to
            // confirm the outage buffer drained onto the new connection.
            let (tx, rx) = tokio::sync::oneshot::channel();
            if let Err(e) = self.writer_tx.send(WriterCommand::Update(new_writer, tx)) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    format!("Failed to send update command: {e}"),
                )));
            }

            match rx.await {
                Ok(true) => log::debug!("Writer confirmed buffer drain success"),
                Ok(false) => {
                    log::warn!("Writer failed to drain buffer, aborting reconnect");
                    return Err(Error::Io(std::io::Error::other(
                        "Failed to drain reconnection buffer",
                    )));
                }
                Err(e) => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        format!("Writer task dropped response channel: {e}"),
                    )));
                }
            }

            if let Some(read_task) = self.read_task.take()
                && !read_task.is_finished()
            {
                read_task.abort();
                log::debug!("Aborted task 'read'");
            }

            // Atomic transition guards against a disconnect requested while
            // the new connection was being established.
            if self
                .connection_mode
                .compare_exchange(
                    ConnectionMode::Reconnect.as_u8(),
                    ConnectionMode::Active.as_u8(),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_err()
            {
                log::debug!("Reconnect aborted (state changed during reconnect)");
                return Ok(());
            }

            self.read_enabled.store(true, Ordering::SeqCst);
            self.read_task = Some(Self::spawn_read_task(
                self.connection_mode.clone(),
                self.read_enabled.clone(),
                reader,
                self.message_handler.clone(),
                self.writer_tx.clone(),
                self.config.read_timeout_secs.map(Duration::from_secs),
            ));

            log::debug!("Reconnect succeeded");
            Ok(())
        })
        .await
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "Reconnection timed out after {}s",
                    self.reconnect_timeout.as_secs_f64()
                ),
            ))
        })?
    }

    /// Returns `true` while the read task is alive.
    ///
    /// The read task finishing (read error, deadline elapsed, or stream end)
    /// is the signal that the connection is dead.
    fn is_alive(&self) -> bool {
        match &self.read_task {
            Some(read_task) => !read_task.is_finished(),
            None => false,
        }
    }

    fn spawn_read_task(
        connection_mode: Arc<AtomicU8>,
        read_enabled: Arc<AtomicBool>,
        mut reader: MessageReader,
        handler: MessageHandler,
        writer_tx: tokio::sync::mpsc::UnboundedSender<WriterCommand>,
        read_timeout: Option<Duration>,
    ) -> tokio::task::JoinHandle<()> {
        log::debug!("Started task 'read'");

        let check_interval = Duration::from_millis(CONNECTION_STATE_CHECK_INTERVAL_MS);

        tokio::task::spawn(async move {
            loop {
                if !ConnectionMode::from_atomic(&connection_mode).is_active() {
                    break;
                }

                // Paused: leave the socket untouched so no frame is consumed
                if !read_enabled.load(Ordering::SeqCst) {
                    tokio::time::sleep(check_interval).await;
                    continue;
                }

                let result = match read_timeout {
                    Some(deadline) => {
                        match tokio::time::timeout(deadline, reader.next()).await {
                            Ok(result) => result,
                            Err(_) => {
                                log::error!(
                                    "No frame received within {}s, treating connection as dead",
                                    deadline.as_secs()
                                );
                                break;
                            }
                        }
                    }
                    None => match tokio::time::timeout(check_interval, reader.next()).await {
                        Ok(result) => result,
                        Err(_) => continue,
                    },
                };

                match result {
                    Some(Ok(Message::Text(data))) => {
                        log::trace!("Received message: {data}");
                        handler(data.to_string());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        log::warn!("Ignoring unexpected binary frame ({} bytes)", data.len());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        log::trace!("Received ping ({} bytes)", data.len());
                        let _ = writer_tx.send(WriterCommand::Send {
                            msg: Message::Pong(data),
                            on_sent: None,
                        });
                    }
                    Some(Ok(Message::Pong(_))) => {
                        log::trace!("Received pong");
                    }
                    Some(Ok(Message::Close(_))) => {
                        log::debug!("Received close frame - terminating");
                        break;
                    }
                    Some(Ok(_)) => (),
                    Some(Err(e)) => {
                        log::error!("Received error message - terminating: {e}");
                        break;
                    }
                    None => {
                        log::debug!("No message received - terminating");
                        break;
                    }
                }
            }

            log::debug!("Stopped task 'read'");
        })
    }

    /// Writes buffered frames onto a fresh connection after reconnecting.
    ///
    /// Returns `true` if a send error occurred; unsent frames stay buffered
    /// for the next attempt.
    async fn drain_reconnect_buffer(
        buffer: &mut VecDeque<(Message, Option<SentCallback>)>,
        writer: &mut MessageWriter,
    ) -> bool {
        if buffer.is_empty() {
            return false;
        }

        let initial_buffer_len = buffer.len();
        log::info!("Sending {initial_buffer_len} buffered frames after reconnection");

        while let Some((msg, on_sent)) = buffer.pop_front() {
            if let Err(e) = writer.send(msg.clone()).await {
                log::error!(
                    "Failed to send buffered frame after reconnection: {e}, {} frames remain",
                    buffer.len() + 1
                );
                buffer.push_front((msg, on_sent));
                return true;
            }
            if let Some(callback) = on_sent {
                callback();
            }
        }

        log::info!("Successfully sent all {initial_buffer_len} buffered frames");
        false
    }

    fn spawn_write_task(
        connection_mode: Arc<AtomicU8>,
        writer: MessageWriter,
        mut writer_rx: tokio::sync::mpsc::UnboundedReceiver<WriterCommand>,
    ) -> tokio::task::JoinHandle<()> {
        log::debug!("Started task 'write'");

        let check_interval = Duration::from_millis(CONNECTION_STATE_CHECK_INTERVAL_MS);

        tokio::task::spawn(async move {
            let mut active_writer = writer;
            // Frames enqueued while the connection is down
            let mut reconnect_buffer: VecDeque<(Message, Option<SentCallback>)> = VecDeque::new();

            loop {
                match ConnectionMode::from_atomic(&connection_mode) {
                    ConnectionMode::Disconnect | ConnectionMode::Closed => {
                        if !reconnect_buffer.is_empty() {
                            log::warn!(
                                "Discarding {} buffered frames on shutdown",
                                reconnect_buffer.len()
                            );
                            reconnect_buffer.clear();
                        }
                        break;
                    }
                    _ => {}
                }

                match tokio::time::timeout(check_interval, writer_rx.recv()).await {
                    Ok(Some(command)) => {
                        let mode = ConnectionMode::from_atomic(&connection_mode);
                        if matches!(mode, ConnectionMode::Disconnect | ConnectionMode::Closed) {
                            break;
                        }

                        match command {
                            WriterCommand::Update(new_writer, tx) => {
                                // The previous writer is dropped without a close
                                // frame: the vendor's streamer mishandles explicit
                                // closes (spurious stream truncation).
                                active_writer = new_writer;
                                log::debug!("Updated writer");

                                let send_error = Self::drain_reconnect_buffer(
                                    &mut reconnect_buffer,
                                    &mut active_writer,
                                )
                                .await;

                                if tx.send(!send_error).is_err() {
                                    log::error!("Failed to report drain status to controller");
                                }
                            }
                            WriterCommand::Send { msg, on_sent } if mode.is_reconnect() => {
                                log::debug!(
                                    "Buffering frame during reconnection (buffer size: {})",
                                    reconnect_buffer.len() + 1
                                );
                                reconnect_buffer.push_back((msg, on_sent));
                            }
                            WriterCommand::Send { msg, on_sent } => {
                                match active_writer.send(msg.clone()).await {
                                    Ok(()) => {
                                        log::trace!("Sent frame: {msg}");
                                        if let Some(callback) = on_sent {
                                            callback();
                                        }
                                    }
                                    Err(e) => {
                                        log::error!("Failed to send frame: {e}");
                                        log::warn!("Writer triggering reconnect");
                                        reconnect_buffer.push_back((msg, on_sent));
                                        connection_mode.store(
                                            ConnectionMode::Reconnect.as_u8(),
                                            Ordering::SeqCst,
                                        );
                                    }
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        log::debug!("Writer channel closed, terminating writer task");
                        break;
                    }
                    Err(_) => continue,
                }
            }

            // The writer is dropped without sending a close frame (vendor quirk,
            // see above); releasing the socket is sufficient.
            drop(active_writer);

            log::debug!("Stopped task 'write'");
        })
    }
}

impl Drop for WebSocketClientInner {
    fn drop(&mut self) {
        if let Some(read_task) = self.read_task.take()
            && !read_task.is_finished()
        {
            read_task.abort();
            log::debug!("Aborted task 'read'");
        }

        if !self.write_task.is_finished() {
            self.write_task.abort();
            log::debug!("Aborted task 'write'");
        }
    }
}

impl Debug for WebSocketClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WebSocketClientInner))
            .field("config", &self.config)
            .field(
                "connection_mode",
                &ConnectionMode::from_atomic(&self.connection_mode),
            )
            .finish_non_exhaustive()
    }
}

/// WebSocket client with automatic reconnection.
///
/// `send` never blocks the caller: frames are handed to the writer task over
/// an unbounded channel and written to the socket one at a time in enqueue
/// order. The message handler runs on the I/O runtime.
pub struct WebSocketClient {
    controller_task: tokio::task::JoinHandle<()>,
    connection_mode: Arc<AtomicU8>,
    read_enabled: Arc<AtomicBool>,
    writer_tx: tokio::sync::mpsc::UnboundedSender<WriterCommand>,
}

impl Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WebSocketClient))
            .field("connection_mode", &self.connection_mode())
            .finish_non_exhaustive()
    }
}

impl WebSocketClient {
    /// Connects to the server and spawns the background tasks.
    ///
    /// `message_handler` is invoked for every inbound text frame;
    /// `reconnect_handler` is invoked after every successful reconnection
    /// (never for the initial connect).
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection cannot be established.
    pub async fn connect(
        config: WebSocketConfig,
        message_handler: MessageHandler,
        reconnect_handler: Option<ReconnectHandler>,
    ) -> Result<Self, Error> {
        log::debug!("Connecting to {}", config.url);
        let inner = WebSocketClientInner::connect_url(config, message_handler).await?;
        let connection_mode = inner.connection_mode.clone();
        let read_enabled = inner.read_enabled.clone();
        let writer_tx = inner.writer_tx.clone();

        let controller_task =
            Self::spawn_controller_task(inner, connection_mode.clone(), reconnect_handler);

        Ok(Self {
            controller_task,
            connection_mode,
            read_enabled,
            writer_tx,
        })
    }

    /// Returns the current connection mode.
    #[must_use]
    pub fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::from_atomic(&self.connection_mode)
    }

    /// Returns a clone of the connection mode atomic for external state
    /// tracking.
    #[must_use]
    pub fn connection_mode_atomic(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.connection_mode)
    }

    /// Returns `true` if the client is connected and operating normally.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.connection_mode().is_active()
    }

    /// Returns `true` if the client lost its connection and is attempting to
    /// re-establish it.
    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        self.connection_mode().is_reconnect()
    }

    /// Returns `true` if a disconnect is in progress.
    #[must_use]
    pub fn is_disconnecting(&self) -> bool {
        self.connection_mode().is_disconnect()
    }

    /// Returns `true` once the controller task has finished.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.controller_task.is_finished()
    }

    /// Enqueues a text frame for sending; never blocks.
    ///
    /// `on_sent` fires after the frame has been written to the socket.
    /// Frames enqueued during an outage are buffered and drained onto the
    /// next connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed or the writer task has
    /// terminated.
    pub fn send_text(
        &self,
        data: String,
        on_sent: Option<SentCallback>,
    ) -> Result<(), SendError> {
        let mode = self.connection_mode();
        if mode.is_closed() || mode.is_disconnect() {
            return Err(SendError::Closed);
        }

        log::trace!("Enqueueing frame: {data}");
        self.writer_tx
            .send(WriterCommand::Send {
                msg: Message::Text(data.into()),
                on_sent,
            })
            .map_err(|e| SendError::BrokenPipe(e.to_string()))
    }

    /// Stops invoking the message handler and stops consuming from the
    /// socket. Idempotent; the connection stays up.
    pub fn pause_reading(&self) {
        self.read_enabled.store(false, Ordering::SeqCst);
        log::debug!("Reading paused");
    }

    /// Resumes consuming from the socket. Idempotent.
    pub fn resume_reading(&self) {
        self.read_enabled.store(true, Ordering::SeqCst);
        log::debug!("Reading resumed");
    }

    /// Returns `true` while reading is enabled.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.read_enabled.load(Ordering::SeqCst)
    }

    /// Disconnects and waits for the background tasks to finish.
    pub async fn disconnect(&self) {
        log::debug!("Disconnecting");
        self.connection_mode
            .store(ConnectionMode::Disconnect.as_u8(), Ordering::SeqCst);

        let timeout = Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS);
        if tokio::time::timeout(timeout, async {
            while !self.is_disconnected() {
                tokio::time::sleep(Duration::from_millis(CONNECTION_STATE_CHECK_INTERVAL_MS)).await;
            }
        })
        .await
        .is_err()
        {
            log::error!("Timeout waiting for controller task to finish");
        }

        if !self.controller_task.is_finished() {
            self.controller_task.abort();
            log::debug!("Aborted task 'controller'");
        }
    }

    fn spawn_controller_task(
        mut inner: WebSocketClientInner,
        connection_mode: Arc<AtomicU8>,
        reconnect_handler: Option<ReconnectHandler>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::task::spawn(async move {
            log::debug!("Started task 'controller'");

            let check_interval = Duration::from_millis(CONNECTION_STATE_CHECK_INTERVAL_MS);

            loop {
                tokio::time::sleep(check_interval).await;
                let mut mode = ConnectionMode::from_atomic(&connection_mode);

                if mode.is_disconnect() {
                    log::debug!("Disconnecting");

                    tokio::time::sleep(Duration::from_millis(GRACEFUL_SHUTDOWN_DELAY_MS)).await;

                    if let Some(task) = &inner.read_task
                        && !task.is_finished()
                    {
                        task.abort();
                        log::debug!("Aborted task 'read'");
                    }

                    log::debug!("Closed");
                    break;
                }

                if mode.is_closed() {
                    log::debug!("Connection closed");
                    break;
                }

                if mode.is_active() && !inner.is_alive() {
                    if connection_mode
                        .compare_exchange(
                            ConnectionMode::Active.as_u8(),
                            ConnectionMode::Reconnect.as_u8(),
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                    {
                        log::debug!("Detected dead read task, transitioning to RECONNECT");
                    }
                    mode = ConnectionMode::from_atomic(&connection_mode);
                }

                if mode.is_reconnect() {
                    if let Some(max_attempts) = inner.reconnect_max_attempts
                        && inner.reconnection_attempt_count >= max_attempts
                    {
                        log::error!(
                            "Max reconnection attempts ({max_attempts}) exceeded, transitioning to CLOSED"
                        );
                        connection_mode.store(ConnectionMode::Closed.as_u8(), Ordering::SeqCst);
                        break;
                    }

                    let duration = inner.backoff.next_duration();
                    if !duration.is_zero() {
                        log::debug!("Waiting {}s before reconnecting...", duration.as_secs_f64());
                        tokio::time::sleep(duration).await;
                    }

                    inner.reconnection_attempt_count += 1;
                    log::debug!(
                        "Reconnection attempt {} of {}",
                        inner.reconnection_attempt_count,
                        inner
                            .reconnect_max_attempts
                            .map_or_else(|| "unlimited".to_string(), |m| m.to_string())
                    );

                    match inner.reconnect().await {
                        Ok(()) => {
                            inner.backoff.reset();
                            inner.reconnection_attempt_count = 0;

                            if ConnectionMode::from_atomic(&connection_mode).is_active() {
                                if let Some(ref handler) = reconnect_handler {
                                    handler();
                                    log::debug!("Called reconnect handler");
                                }
                                log::debug!("Reconnected successfully");
                            } else {
                                log::debug!(
                                    "Skipping reconnect handler due to disconnect state"
                                );
                            }
                        }
                        Err(e) => {
                            log::warn!(
                                "Reconnect attempt {} failed: {e}",
                                inner.reconnection_attempt_count
                            );
                        }
                    }
                }
            }

            inner
                .connection_mode
                .store(ConnectionMode::Closed.as_u8(), Ordering::SeqCst);

            log::debug!("Stopped task 'controller'");
        })
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        if !self.controller_task.is_finished() {
            self.controller_task.abort();
            log::debug!("Aborted task 'controller'");
        }
    }
}

fn step_timed_out(step: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("{step} timed out after {HANDSHAKE_STEP_TIMEOUT_SECS}s"),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::{net::TcpListener, task};
    use tokio_tungstenite::accept_async;

    use super::*;

    struct TestServer {
        port: u16,
        /// Frames received by the server, across all connections, in order.
        received: Arc<Mutex<Vec<String>>>,
        /// Number of connections accepted so far.
        connections: Arc<std::sync::atomic::AtomicU32>,
    }

    impl TestServer {
        /// Starts a server that accepts connections in a loop, records text
        /// frames, echoes frames prefixed `echo:`, and drops the connection
        /// on `close-now`.
        async fn setup() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let received = Arc::new(Mutex::new(Vec::new()));
            let connections = Arc::new(std::sync::atomic::AtomicU32::new(0));

            let received_clone = received.clone();
            let connections_clone = connections.clone();
            task::spawn(async move {
                loop {
                    let (conn, _) = listener.accept().await.unwrap();
                    connections_clone.fetch_add(1, Ordering::SeqCst);
                    let mut websocket = accept_async(conn).await.unwrap();

                    let received = received_clone.clone();
                    task::spawn(async move {
                        while let Some(Ok(msg)) = websocket.next().await {
                            if let Message::Text(txt) = msg {
                                if txt == "close-now" {
                                    // Drop without close frame
                                    break;
                                }
                                if let Some(payload) = txt.strip_prefix("echo:") {
                                    websocket
                                        .send(Message::Text(payload.to_string().into()))
                                        .await
                                        .unwrap();
                                }
                                received.lock().unwrap().push(txt.to_string());
                            }
                        }
                    });
                }
            });

            Self {
                port,
                received,
                connections,
            }
        }

        fn url(&self) -> String {
            format!("ws://127.0.0.1:{}", self.port)
        }
    }

    fn test_config(url: String) -> WebSocketConfig {
        WebSocketConfig {
            url,
            headers: Vec::new(),
            read_timeout_secs: None,
            reconnect_delay_ms: Some(50),
            reconnect_timeout_ms: Some(5_000),
            reconnect_max_attempts: None,
        }
    }

    async fn wait_until(condition: impl Fn() -> bool, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_send_preserves_enqueue_order() {
        let server = TestServer::setup().await;
        let client = WebSocketClient::connect(
            test_config(server.url()),
            Arc::new(|_| {}),
            None,
        )
        .await
        .unwrap();

        for i in 0..10 {
            client.send_text(format!("frame-{i}"), None).unwrap();
        }

        wait_until(
            || server.received.lock().unwrap().len() == 10,
            Duration::from_secs(2),
        )
        .await;

        {
            let received = server.received.lock().unwrap();
            let expected: Vec<String> = (0..10).map(|i| format!("frame-{i}")).collect();
            assert_eq!(*received, expected);
        }

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_message_handler_receives_frames() {
        let server = TestServer::setup().await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |data| {
            tx.send(data).unwrap();
        });

        let client = WebSocketClient::connect(test_config(server.url()), handler, None)
            .await
            .unwrap();

        client.send_text("echo:hello".to_string(), None).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "hello");

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_on_sent_callback_fires() {
        let server = TestServer::setup().await;
        let client = WebSocketClient::connect(
            test_config(server.url()),
            Arc::new(|_| {}),
            None,
        )
        .await
        .unwrap();

        let sent = Arc::new(AtomicBool::new(false));
        let sent_clone = sent.clone();
        client
            .send_text(
                "hello".to_string(),
                Some(Box::new(move || sent_clone.store(true, Ordering::SeqCst))),
            )
            .unwrap();

        wait_until(|| sent.load(Ordering::SeqCst), Duration::from_secs(2)).await;

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_reconnects_after_server_drop() {
        let server = TestServer::setup().await;
        let reconnected = Arc::new(AtomicBool::new(false));
        let reconnected_clone = reconnected.clone();

        let client = WebSocketClient::connect(
            test_config(server.url()),
            Arc::new(|_| {}),
            Some(Arc::new(move || {
                reconnected_clone.store(true, Ordering::SeqCst);
            })),
        )
        .await
        .unwrap();

        // Force the server to drop the connection
        client.send_text("close-now".to_string(), None).unwrap();

        wait_until(|| reconnected.load(Ordering::SeqCst), Duration::from_secs(5)).await;
        assert!(server.connections.load(Ordering::SeqCst) >= 2);

        wait_until(|| client.is_active(), Duration::from_secs(2)).await;

        // The new connection carries new frames
        client.send_text("after-reconnect".to_string(), None).unwrap();
        wait_until(
            || {
                server
                    .received
                    .lock()
                    .unwrap()
                    .contains(&"after-reconnect".to_string())
            },
            Duration::from_secs(2),
        )
        .await;

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_read_deadline_triggers_reconnect() {
        let server = TestServer::setup().await;
        let reconnected = Arc::new(AtomicBool::new(false));
        let reconnected_clone = reconnected.clone();

        let mut config = test_config(server.url());
        // Silent server: the read deadline declares the connection dead
        config.read_timeout_secs = Some(1);

        let client = WebSocketClient::connect(
            config,
            Arc::new(|_| {}),
            Some(Arc::new(move || {
                reconnected_clone.store(true, Ordering::SeqCst);
            })),
        )
        .await
        .unwrap();

        wait_until(|| reconnected.load(Ordering::SeqCst), Duration::from_secs(5)).await;
        assert!(server.connections.load(Ordering::SeqCst) >= 2);

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_pause_and_resume_reading() {
        let server = TestServer::setup().await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |data| {
            tx.send(data).unwrap();
        });

        let client = WebSocketClient::connect(test_config(server.url()), handler, None)
            .await
            .unwrap();

        client.pause_reading();
        assert!(!client.is_reading());
        // Give the read task time to observe the flag
        tokio::time::sleep(Duration::from_millis(200)).await;

        client.send_text("echo:while-paused".to_string(), None).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());

        client.resume_reading();
        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "while-paused");

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_finishes_controller() {
        let server = TestServer::setup().await;
        let client = WebSocketClient::connect(
            test_config(server.url()),
            Arc::new(|_| {}),
            None,
        )
        .await
        .unwrap();

        assert!(client.is_active());
        client.disconnect().await;
        assert!(client.is_disconnected());
        assert!(matches!(
            client.send_text("too-late".to_string(), None),
            Err(SendError::Closed)
        ));
    }
}
