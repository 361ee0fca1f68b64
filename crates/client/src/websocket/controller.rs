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

//! The streaming controller.
//!
//! Owns the WebSocket session and the request pipeline, and implements the
//! session state machine:
//!
//! ```text
//! Inactive  --start()-->   (connect) --login OK--> Active
//! Active    --pause()-->   Paused
//! Paused    --resume()-->  Active
//! Active    --stop()-->    Inactive
//! Active    --ws error-->  Inactive --login + replay--> Active
//! ```
//!
//! After every reconnection the controller logs in again and replays the
//! subscription record in original order before any newly enqueued frame is
//! accepted onto the wire.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use schwab_network::{
    get_runtime,
    websocket::{MessageHandler, ReconnectHandler, SentCallback, WebSocketClient, WebSocketConfig},
};

use super::{
    messages::{build_level_one_equities_request, build_login_request, parse_login_response},
    pipeline::{RequestEntry, RequestPipeline, SessionState, SharedState, flags},
};
use crate::{
    common::{
        consts::{
            LOGIN_RESPONSE_TIMEOUT_SECS, LOGIN_RETRY_DELAY_SECS, STREAMER_CONNECT_RETRY_DELAY_SECS,
        },
        fields::LevelOneEquityField,
    },
    http::models::StreamerInfo,
};

/// Handler for raw streamer data frames.
pub type DataHandler = Arc<dyn Fn(String) + Send + Sync>;

/// What the streamer needs from its owner: the current access token for the
/// login frame and the streamer metadata.
///
/// Modeled as a trait rather than a back-pointer so the ownership cycle is
/// broken and the streamer is testable with a fake.
pub trait StreamerContext: Send + Sync {
    /// Returns the current access token, if authorized.
    fn access_token(&self) -> Option<String>;

    /// Returns the current streamer metadata, if cached.
    fn streamer_info(&self) -> Option<StreamerInfo>;
}

/// The streaming controller.
pub struct Streamer {
    inner: Arc<StreamerInner>,
}

struct StreamerInner {
    context: Arc<dyn StreamerContext>,
    ws_config_override: Option<WebSocketConfig>,
    shared: Arc<SharedState>,
    pipeline: RequestPipeline,
    client: Mutex<Option<Arc<WebSocketClient>>>,
    request_id: AtomicU64,
    subscription_record: Mutex<Vec<String>>,
    streamer_info: Mutex<StreamerInfo>,
    data_handler: Mutex<DataHandler>,
    login_waiter: Mutex<Option<tokio::sync::oneshot::Sender<String>>>,
    start_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    login_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Streamer {
    /// Creates a new streamer.
    ///
    /// The streamer metadata is copied from the context at construction;
    /// later changes arrive via [`update_streamer_info`]. By default the
    /// session config is built from the metadata's socket URL;
    /// `ws_config_override` substitutes a custom one (mock servers, tuned
    /// recovery delays).
    ///
    /// [`update_streamer_info`]: Streamer::update_streamer_info
    #[must_use]
    pub fn new(
        context: Arc<dyn StreamerContext>,
        ws_config_override: Option<WebSocketConfig>,
    ) -> Self {
        log::debug!("Initializing streamer...");

        let streamer_info = context.streamer_info().unwrap_or_else(|| {
            log::error!("Failed to retrieve streamer info");
            StreamerInfo::default()
        });

        let shared = Arc::new(SharedState::default());
        let inner = Arc::new(StreamerInner {
            context,
            ws_config_override,
            pipeline: RequestPipeline::new(shared.clone()),
            shared,
            client: Mutex::new(None),
            request_id: AtomicU64::new(0),
            subscription_record: Mutex::new(Vec::new()),
            streamer_info: Mutex::new(streamer_info),
            data_handler: Mutex::new(Arc::new(default_data_handler)),
            login_waiter: Mutex::new(None),
            start_task: Mutex::new(None),
            login_task: Mutex::new(None),
        });

        Self { inner }
    }

    /// Starts the streamer: launches the sender worker, connects the
    /// WebSocket session, and runs the login procedure.
    ///
    /// Returns immediately; the streamer becomes active once login succeeds.
    /// Connection failures retry indefinitely.
    pub fn start(&self) {
        log::debug!("Starting streamer...");

        {
            let state = self.inner.shared.state.lock().unwrap();
            if state.test_flag(flags::RUN_SENDER_WORKER) {
                log::debug!("Streamer already running");
                return;
            }
        }

        let weak = Arc::downgrade(&self.inner);
        self.inner.pipeline.start(move |frame, on_sent| {
            if let Some(inner) = weak.upgrade() {
                inner.send_to_session(frame, on_sent);
            }
        });

        let inner = self.inner.clone();
        let task = get_runtime().spawn(StreamerInner::connect_and_login(inner));
        *self.inner.start_task.lock().unwrap() = Some(task);
    }

    /// Stops the streamer: joins the sender worker, cancels in-flight login
    /// attempts, and tears the session down. Pending frames that have not
    /// reached the socket are discarded.
    ///
    /// Must not be called from the I/O runtime (it blocks on session
    /// shutdown).
    pub fn stop(&self) {
        log::trace!("Stopping streamer...");

        {
            let mut state = self.inner.shared.state.lock().unwrap();
            state.set_state(SessionState::Inactive);
            state.set_flag(flags::RUN_SENDER_WORKER, false);
        }
        self.inner.shared.cv.notify_all();
        self.inner.pipeline.stop();

        if let Some(task) = self.inner.start_task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(task) = self.inner.login_task.lock().unwrap().take() {
            task.abort();
        }
        self.inner.login_waiter.lock().unwrap().take();

        let client = self.inner.client.lock().unwrap().take();
        if let Some(client) = client {
            get_runtime().block_on(client.disconnect());
        }
    }

    /// Pauses the streamer: the receive loop stops consuming and the sender
    /// worker parks. Frames enqueued while paused accumulate until resume.
    pub fn pause(&self) {
        let mut state = self.inner.shared.state.lock().unwrap();
        if state.test_state(SessionState::Active) {
            log::debug!("Pausing streamer...");
            state.set_state(SessionState::Paused);
            drop(state);

            if let Some(client) = self.inner.client.lock().unwrap().clone() {
                client.pause_reading();
            }
        } else {
            log::debug!("Streamer not streaming, cannot pause");
        }
    }

    /// Resumes a paused streamer.
    pub fn resume(&self) {
        {
            let state = self.inner.shared.state.lock().unwrap();
            if !state.test_state(SessionState::Paused) {
                log::debug!("Streamer not paused, cannot resume");
                return;
            }
        }

        log::debug!("Resuming streamer");
        if let Some(client) = self.inner.client.lock().unwrap().clone() {
            client.resume_reading();
        }

        {
            let mut state = self.inner.shared.state.lock().unwrap();
            state.set_state(SessionState::Active);
        }
        self.inner.shared.cv.notify_all();
    }

    /// Returns `true` while the streamer is logged in and streaming.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .shared
            .state
            .lock()
            .unwrap()
            .test_state(SessionState::Active)
    }

    /// Returns `true` while the streamer is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner
            .shared
            .state
            .lock()
            .unwrap()
            .test_state(SessionState::Paused)
    }

    /// Subscribes to level-one equity data for `tickers`.
    ///
    /// Safe to call before [`start`]: the request is queued and sent once
    /// the streamer is active. The frame is recorded for replay after
    /// reconnections.
    ///
    /// The vendor ignores a re-subscription that changes the field set of an
    /// existing service; to change fields, re-subscribe all keys.
    ///
    /// [`start`]: Streamer::start
    pub fn subscribe_level_one_equities(
        &self,
        tickers: Vec<String>,
        fields: Vec<LevelOneEquityField>,
    ) {
        let frame = {
            let info = self.inner.streamer_info.lock().unwrap();
            build_level_one_equities_request(
                self.inner.next_request_id(),
                &info,
                &tickers,
                fields,
            )
        };

        self.inner.subscription_record.lock().unwrap().push(frame.clone());
        self.inner.pipeline.push(RequestEntry {
            frame,
            on_sent: None,
        });
    }

    /// Enqueues an arbitrary pre-built frame.
    pub fn request(&self, frame: String, on_sent: Option<SentCallback>) {
        self.inner.pipeline.push(RequestEntry { frame, on_sent });
    }

    /// Combines frames into one `{"requests": [...]}` batch and enqueues it.
    pub fn request_batch(&self, frames: Vec<String>, on_sent: Option<SentCallback>) {
        let batch = super::messages::batch_requests(&frames);
        self.inner.pipeline.push(RequestEntry {
            frame: batch,
            on_sent,
        });
    }

    /// Replaces the cached streamer metadata; takes effect on the next
    /// constructed frame.
    pub fn update_streamer_info(&self, info: StreamerInfo) {
        *self.inner.streamer_info.lock().unwrap() = info;
        log::debug!("Streamer info updated");
    }

    /// Installs the handler for raw data frames.
    pub fn set_data_handler(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *self.inner.data_handler.lock().unwrap() = Arc::new(handler);
    }

    /// Returns a snapshot of the subscription record.
    #[must_use]
    pub fn subscription_record(&self) -> Vec<String> {
        self.inner.subscription_record.lock().unwrap().clone()
    }

    /// Returns the number of frames waiting in the request pipeline.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pipeline.len()
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Streamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamer")
            .field("active", &self.is_active())
            .field("paused", &self.is_paused())
            .field("pending_requests", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

impl StreamerInner {
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn running(&self) -> bool {
        self.shared
            .state
            .lock()
            .unwrap()
            .test_flag(flags::RUN_SENDER_WORKER)
    }

    /// Forwards one frame to the session; called by the sender worker.
    fn send_to_session(&self, frame: String, on_sent: Option<SentCallback>) {
        let client = self.client.lock().unwrap().clone();
        match client {
            Some(client) => {
                if let Err(e) = client.send_text(frame, on_sent) {
                    log::debug!("Dropping frame, session is shutting down: {e}");
                }
            }
            None => log::warn!("No session, dropping frame"),
        }
    }

    /// Establishes the session, retrying until it connects or the streamer
    /// is stopped, then runs the login procedure.
    async fn connect_and_login(inner: Arc<Self>) {
        let config = inner.ws_config_override.clone().unwrap_or_else(|| {
            let url = inner
                .streamer_info
                .lock()
                .unwrap()
                .streamer_socket_url
                .clone();
            WebSocketConfig::new(url)
        });

        loop {
            if !inner.running() {
                return;
            }

            let message_handler = Self::message_handler(&inner);
            let reconnect_handler = Self::reconnect_handler(&inner);

            match WebSocketClient::connect(
                config.clone(),
                message_handler,
                Some(reconnect_handler),
            )
            .await
            {
                Ok(client) => {
                    *inner.client.lock().unwrap() = Some(Arc::new(client));
                    Self::spawn_login(&inner, false);
                    return;
                }
                Err(e) => {
                    log::error!(
                        "Streamer connection failed: {e}. Retrying in {STREAMER_CONNECT_RETRY_DELAY_SECS}s..."
                    );
                    tokio::time::sleep(Duration::from_secs(STREAMER_CONNECT_RETRY_DELAY_SECS))
                        .await;
                }
            }
        }
    }

    /// Routes inbound frames: a pending login waiter consumes the next
    /// frame, everything else goes to the data handler.
    fn message_handler(inner: &Arc<Self>) -> MessageHandler {
        let weak = Arc::downgrade(inner);
        Arc::new(move |text: String| {
            let Some(inner) = weak.upgrade() else { return };

            if let Some(waiter) = inner.login_waiter.lock().unwrap().take() {
                let _ = waiter.send(text);
                return;
            }

            let handler = inner.data_handler.lock().unwrap().clone();
            handler(text);
        })
    }

    /// After a session-level reconnect the streamer is no longer logged in:
    /// drop back to `Inactive`, rerun login, then replay subscriptions.
    fn reconnect_handler(inner: &Arc<Self>) -> ReconnectHandler {
        let weak = Arc::downgrade(inner);
        Arc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            log::debug!("Streamer session reconnected, logging in again...");

            {
                let mut state = inner.shared.state.lock().unwrap();
                state.set_state(SessionState::Inactive);
            }

            Self::spawn_login(&inner, true);
        })
    }

    fn spawn_login(inner: &Arc<Self>, replay: bool) {
        if let Some(task) = inner.login_task.lock().unwrap().take() {
            task.abort();
        }

        let task_inner = inner.clone();
        let task = get_runtime().spawn(Self::login_procedure(task_inner, replay));
        *inner.login_task.lock().unwrap() = Some(task);
    }

    /// The login-and-receive procedure.
    ///
    /// Sends the `ADMIN`/`LOGIN` frame and arms a one-shot receive for the
    /// response. `code == 0` activates the streamer (after replaying the
    /// subscription record when recovering); anything else, including a
    /// malformed response, retries after a delay with the streamer still
    /// inactive.
    async fn login_procedure(inner: Arc<Self>, replay: bool) {
        loop {
            if !inner.running() {
                return;
            }
            let Some(client) = inner.client.lock().unwrap().clone() else {
                return;
            };

            let access_token = inner.context.access_token().unwrap_or_default();
            let frame = {
                let info = inner.streamer_info.lock().unwrap();
                build_login_request(inner.next_request_id(), &info, &access_token)
            };

            let (waiter_tx, waiter_rx) = tokio::sync::oneshot::channel();
            *inner.login_waiter.lock().unwrap() = Some(waiter_tx);

            if let Err(e) = client.send_text(
                frame,
                Some(Box::new(|| log::debug!("Streamer logging in..."))),
            ) {
                log::error!("Failed to enqueue login frame: {e}");
                return;
            }

            let timeout = Duration::from_secs(LOGIN_RESPONSE_TIMEOUT_SECS);
            let parsed = match tokio::time::timeout(timeout, waiter_rx).await {
                Ok(Ok(text)) => {
                    log::trace!("Login response: {text}");
                    parse_login_response(&text)
                }
                // Waiter replaced or streamer dropped; a newer procedure
                // owns recovery from here
                Ok(Err(_)) => return,
                Err(_) => {
                    log::error!("No login response received");
                    None
                }
            };

            match parsed {
                Some((0, _)) => {
                    log::debug!("Successfully logged in");

                    if replay {
                        let record = inner.subscription_record.lock().unwrap().clone();
                        if !record.is_empty() {
                            log::debug!("Restoring subscription...");
                            for frame in record {
                                if let Err(e) = client.send_text(frame, None) {
                                    log::error!("Failed to replay subscription: {e}");
                                }
                            }
                        }
                    }

                    {
                        let mut state = inner.shared.state.lock().unwrap();
                        state.set_state(SessionState::Active);
                    }
                    inner.shared.cv.notify_all();
                    return;
                }
                Some((code, msg)) => {
                    log::error!(
                        "Login failed. Error code: {code}, Msg: {msg}. (Will retry in {LOGIN_RETRY_DELAY_SECS} seconds...)"
                    );
                }
                None => {
                    log::error!(
                        "Received corrupted login response. (Will retry in {LOGIN_RETRY_DELAY_SECS} seconds...)"
                    );
                }
            }

            inner.login_waiter.lock().unwrap().take();
            tokio::time::sleep(Duration::from_secs(LOGIN_RETRY_DELAY_SECS)).await;
        }
    }
}

/// Logs data frames, pretty-printed when they parse as JSON.
fn default_data_handler(data: String) {
    match serde_json::from_str::<serde_json::Value>(&data) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => log::info!("Data:\n{pretty}"),
            Err(_) => log::warn!("Data: corrupted"),
        },
        Err(_) => log::warn!("Data: corrupted"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::Value;

    use super::*;

    struct FakeContext;

    impl StreamerContext for FakeContext {
        fn access_token(&self) -> Option<String> {
            Some("ACCESS".to_string())
        }

        fn streamer_info(&self) -> Option<StreamerInfo> {
            Some(StreamerInfo {
                streamer_socket_url: "wss://streamer-api.schwab.com/ws".to_string(),
                schwab_client_customer_id: "CUST".to_string(),
                schwab_client_correl_id: "CORR".to_string(),
                schwab_client_channel: "N9".to_string(),
                schwab_client_function_id: "APIAPP".to_string(),
            })
        }
    }

    fn test_streamer() -> Streamer {
        Streamer::new(Arc::new(FakeContext), None)
    }

    #[rstest]
    fn test_initial_state_inactive() {
        let streamer = test_streamer();
        assert!(!streamer.is_active());
        assert!(!streamer.is_paused());
    }

    #[rstest]
    fn test_subscribe_before_start_queues_and_records() {
        let streamer = test_streamer();

        streamer.subscribe_level_one_equities(
            vec!["SPY".to_string()],
            vec![LevelOneEquityField::LastPrice],
        );

        assert_eq!(streamer.pending_requests(), 1);
        let record = streamer.subscription_record();
        assert_eq!(record.len(), 1);

        let frame: Value = serde_json::from_str(&record[0]).unwrap();
        assert_eq!(frame["service"], "LEVELONE_EQUITIES");
        assert_eq!(frame["command"], "ADD");
        assert_eq!(frame["parameters"]["keys"], "SPY");
        assert_eq!(frame["parameters"]["fields"], "0,3");
    }

    #[rstest]
    fn test_request_ids_monotonically_increase() {
        let streamer = test_streamer();

        streamer
            .subscribe_level_one_equities(vec!["A".to_string()], vec![]);
        streamer
            .subscribe_level_one_equities(vec!["B".to_string()], vec![]);

        let record = streamer.subscription_record();
        let first: Value = serde_json::from_str(&record[0]).unwrap();
        let second: Value = serde_json::from_str(&record[1]).unwrap();
        assert!(second["requestid"].as_u64() > first["requestid"].as_u64());
    }

    #[rstest]
    fn test_pause_requires_active() {
        let streamer = test_streamer();
        streamer.pause();
        assert!(!streamer.is_paused());
    }

    #[rstest]
    fn test_resume_requires_paused() {
        let streamer = test_streamer();
        streamer.resume();
        assert!(!streamer.is_active());
    }

    #[rstest]
    fn test_update_streamer_info_takes_effect_on_next_frame() {
        let streamer = test_streamer();

        let mut info = FakeContext.streamer_info().unwrap();
        info.schwab_client_customer_id = "NEW-CUST".to_string();
        streamer.update_streamer_info(info);

        streamer.subscribe_level_one_equities(vec!["SPY".to_string()], vec![]);
        let frame: Value =
            serde_json::from_str(&streamer.subscription_record()[0]).unwrap();
        assert_eq!(frame["SchwabClientCustomerId"], "NEW-CUST");
    }

    #[rstest]
    fn test_stop_without_start_is_safe() {
        let streamer = test_streamer();
        streamer.stop();
        assert!(!streamer.is_active());
    }
}
