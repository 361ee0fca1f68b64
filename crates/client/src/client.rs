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

//! The client facade.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::NaiveDate;
use schwab_network::get_runtime;
use serde_json::Value;

use crate::{
    common::{consts::OAUTH_DEFAULT_CHANCES, credential::SchwabCredential, fields::LevelOneEquityField},
    config::SchwabClientConfig,
    error::{SchwabError, SchwabResult},
    events::{
        AuthRequestReason, AuthStatus, ClientEvent, EventCallback, OAuthCompleteEvent,
        OAuthUrlRequestEvent,
    },
    http::{
        SchwabHttpClient,
        models::{CandleList, MarketHours, StreamerInfo, UserPreference},
        query::{MarketType, PriceHistoryParams},
    },
    oauth::{CacheLoad, TokenManager, TokenStore, UpdateStatus, manager::UpdateCheck},
    timer::PeriodicTimer,
    websocket::{
        Streamer,
        controller::StreamerContext,
    },
};

/// Thread-safe client for the Schwab trader and market-data API.
///
/// `connect()` runs the authorization flow (cache, refresh, or full OAuth),
/// caches the linked accounts and user preference, and starts the periodic
/// token checker. The streamer is available after a successful connect.
pub struct SchwabClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: SchwabClientConfig,
    pub(crate) token_manager: TokenManager,
    http: SchwabHttpClient,
    linked_accounts: Mutex<HashMap<String, String>>,
    user_preference: Mutex<Option<UserPreference>>,
    // Declared before the checker so shutdown tears the streamer down first
    streamer: Mutex<Option<Streamer>>,
    token_checker: PeriodicTimer,
    event_callback: Mutex<Option<EventCallback>>,
    connected: AtomicBool,
}

/// Streamer-facing view of the facade. Holds a weak handle so the streamer
/// never keeps the client alive; once the client is dropped, lookups simply
/// return `None`.
struct ContextHandle(Weak<ClientInner>);

impl StreamerContext for ContextHandle {
    fn access_token(&self) -> Option<String> {
        self.0
            .upgrade()
            .and_then(|inner| inner.token_manager.store().access_token())
    }

    fn streamer_info(&self) -> Option<StreamerInfo> {
        self.0.upgrade().and_then(|inner| inner.streamer_info())
    }
}

impl SchwabClient {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::MissingCredentials`] if the key or secret is
    /// empty.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> SchwabResult<Self> {
        Self::with_config(app_key, app_secret, SchwabClientConfig::default())
    }

    /// Creates a client with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are missing or the HTTP client
    /// cannot be built.
    pub fn with_config(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        config: SchwabClientConfig,
    ) -> SchwabResult<Self> {
        let credential = SchwabCredential::new(app_key, app_secret)?;

        let store = Arc::new(TokenStore::new(config.token_cache_path.clone()));
        let token_manager = TokenManager::new(
            credential,
            store.clone(),
            config.oauth_base_url.clone(),
            config.redirect_uri.clone(),
        );
        let http = SchwabHttpClient::new(&config, store)?;

        let inner = Arc::new(ClientInner {
            config,
            token_manager,
            http,
            linked_accounts: Mutex::new(HashMap::new()),
            user_preference: Mutex::new(None),
            streamer: Mutex::new(None),
            token_checker: PeriodicTimer::new(),
            event_callback: Mutex::new(None),
            connected: AtomicBool::new(false),
        });

        log::info!("Schwab client initialized");
        Ok(Self { inner })
    }

    /// Installs the user's event sink.
    ///
    /// Unhandled events fall back to the built-in handlers: a terminal
    /// prompt for `OAuthUrlRequest` and a logging handler for
    /// `OAuthComplete`.
    pub fn set_event_callback(&self, callback: impl Fn(&ClientEvent) + Send + Sync + 'static) {
        *self.inner.event_callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Runs the authorization flow and prepares the client.
    ///
    /// Loads the token cache, refreshes or reauthorizes as needed, caches
    /// the linked accounts and user preference, starts the periodic token
    /// checker, and constructs the streamer. Emits `OAuthComplete` with the
    /// outcome.
    ///
    /// Returns `true` on success. On failure the client refuses streamer
    /// operations.
    pub fn connect(&self) -> bool {
        ClientInner::connect(&self.inner)
    }

    /// Returns `true` once `connect()` has succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    // -- Sync REST API

    /// Returns the account summary for `account_number`.
    ///
    /// The account hash from the linked-accounts map is embedded in the
    /// path; an unknown account number falls back to the all-accounts
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body.
    pub fn account_summary(&self, account_number: &str) -> SchwabResult<Value> {
        let hash = self
            .inner
            .linked_accounts
            .lock()
            .unwrap()
            .get(account_number)
            .cloned();

        let summary = get_runtime()
            .block_on(self.inner.http.account_summary(hash.as_deref()))?;
        Ok(summary)
    }

    /// Returns summaries for all linked accounts.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body.
    pub fn all_account_summaries(&self) -> SchwabResult<Value> {
        let summaries = get_runtime().block_on(self.inner.http.account_summary(None))?;
        Ok(summaries)
    }

    /// Returns price history candles for the given parameters.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body.
    pub fn price_history(&self, params: &PriceHistoryParams) -> SchwabResult<CandleList> {
        let candles = get_runtime().block_on(self.inner.http.price_history(params))?;
        Ok(candles)
    }

    /// Returns market hours for `market_type` on `date` (today when `None`).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body.
    pub fn market_hours(
        &self,
        market_type: MarketType,
        date: Option<NaiveDate>,
    ) -> SchwabResult<MarketHours> {
        let hours = get_runtime().block_on(self.inner.http.market_hours(market_type, date))?;
        Ok(hours)
    }

    // -- Thread-safe accessors

    /// Returns the linked account numbers.
    #[must_use]
    pub fn linked_accounts(&self) -> Vec<String> {
        self.inner
            .linked_accounts
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    /// Returns a snapshot of the cached user preference.
    #[must_use]
    pub fn user_preference(&self) -> Option<UserPreference> {
        self.inner.user_preference.lock().unwrap().clone()
    }

    /// Checks token freshness and refreshes the access token if needed,
    /// pausing an active streamer for the duration of the refresh.
    ///
    /// Normally driven by the periodic checker; exposed for manual control.
    pub fn update_tokens(&self) -> UpdateStatus {
        self.inner.update_tokens()
    }

    // -- Streamer

    /// Starts the streamer.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::NotConnected`] before a successful
    /// `connect()`.
    pub fn start_streamer(&self) -> SchwabResult<()> {
        self.with_streamer(Streamer::start)
    }

    /// Stops the streamer, tearing down its session and worker.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::NotConnected`] before a successful
    /// `connect()`.
    pub fn stop_streamer(&self) -> SchwabResult<()> {
        self.with_streamer(Streamer::stop)
    }

    /// Pauses the streamer.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::NotConnected`] before a successful
    /// `connect()`.
    pub fn pause_streamer(&self) -> SchwabResult<()> {
        self.with_streamer(Streamer::pause)
    }

    /// Resumes a paused streamer.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::NotConnected`] before a successful
    /// `connect()`.
    pub fn resume_streamer(&self) -> SchwabResult<()> {
        self.with_streamer(Streamer::resume)
    }

    /// Installs the handler for raw streamer data frames.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::NotConnected`] before a successful
    /// `connect()`.
    pub fn set_streamer_data_handler(
        &self,
        handler: impl Fn(String) + Send + Sync + 'static,
    ) -> SchwabResult<()> {
        self.with_streamer(move |streamer| streamer.set_data_handler(handler))
    }

    /// Subscribes to level-one equity data.
    ///
    /// Safe to call before `start_streamer()`; requests queue until the
    /// streamer is online.
    ///
    /// # Errors
    ///
    /// Returns [`SchwabError::NotConnected`] before a successful
    /// `connect()`.
    pub fn subscribe_level_one_equities(
        &self,
        tickers: Vec<String>,
        fields: Vec<LevelOneEquityField>,
    ) -> SchwabResult<()> {
        self.with_streamer(move |streamer| {
            streamer.subscribe_level_one_equities(tickers, fields);
        })
    }

    fn with_streamer(&self, f: impl FnOnce(&Streamer)) -> SchwabResult<()> {
        let guard = self.inner.streamer.lock().unwrap();
        match &*guard {
            Some(streamer) => {
                f(streamer);
                Ok(())
            }
            None => Err(SchwabError::NotConnected),
        }
    }
}

impl Drop for SchwabClient {
    fn drop(&mut self) {
        log::info!("Stopping client...");

        if let Some(streamer) = self.inner.streamer.lock().unwrap().take() {
            drop(streamer);
        }

        log::trace!("Shutting down token checker...");
        self.inner.token_checker.stop();
    }
}

impl std::fmt::Debug for SchwabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabClient")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn connect(inner: &Arc<Self>) -> bool {
        let auth_status = match inner.token_manager.load_from_cache() {
            CacheLoad::Loaded => match inner.update_tokens() {
                UpdateStatus::NotRequired => AuthStatus::NotRequired,
                UpdateStatus::Succeeded => AuthStatus::Succeeded,
                UpdateStatus::FailedExpired => {
                    inner.run_oauth(AuthRequestReason::RefreshTokenExpired)
                }
                UpdateStatus::FailedBadData => AuthStatus::Failed,
            },
            CacheLoad::Missing | CacheLoad::Corrupted => {
                inner.run_oauth(AuthRequestReason::InitialSetup)
            }
        };

        let result = matches!(
            auth_status,
            AuthStatus::Succeeded | AuthStatus::NotRequired
        );

        if result {
            log::info!("Schwab client authorized");

            // These do not change until the next (re)authorization
            inner.update_linked_accounts();
            inner.update_user_preference();

            log::debug!("Launching token checker...");
            let weak = Arc::downgrade(inner);
            inner.token_checker.start(
                Duration::from_secs(inner.config.token_check_interval_secs),
                move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.check_tokens_and_reauth();
                    }
                },
                false,
            );

            // Created last so the user preference is ready to use
            let context: Arc<dyn StreamerContext> =
                Arc::new(ContextHandle(Arc::downgrade(inner)));
            let ws_config = inner
                .config
                .ws_url_override
                .clone()
                .map(schwab_network::websocket::WebSocketConfig::new);
            *inner.streamer.lock().unwrap() = Some(Streamer::new(context, ws_config));

            inner.connected.store(true, Ordering::SeqCst);
        } else {
            log::error!("Failed to authorize client, please try again later");
        }

        inner.dispatch_event(&ClientEvent::OAuthComplete(OAuthCompleteEvent::new(
            auth_status,
        )));

        result
    }

    /// Token update with streamer coordination: an active streamer is paused
    /// for the refresh and resumed afterwards. A streamer the user paused
    /// stays paused.
    pub(crate) fn update_tokens(&self) -> UpdateStatus {
        match self.token_manager.check() {
            UpdateCheck::NotRequired => UpdateStatus::NotRequired,
            UpdateCheck::Expired => UpdateStatus::FailedExpired,
            UpdateCheck::RefreshRequired => {
                let paused_here = {
                    let streamer = self.streamer.lock().unwrap();
                    match &*streamer {
                        Some(streamer) if streamer.is_active() => {
                            streamer.pause();
                            true
                        }
                        _ => false,
                    }
                };

                let status = self.token_manager.refresh();

                if paused_here && status == UpdateStatus::Succeeded {
                    let streamer = self.streamer.lock().unwrap();
                    if let Some(streamer) = &*streamer
                        && streamer.is_paused()
                    {
                        streamer.resume();
                    }
                }

                status
            }
        }
    }

    /// The periodic checker tick.
    fn check_tokens_and_reauth(&self) {
        match self.update_tokens() {
            UpdateStatus::FailedExpired => {
                let status = self.run_oauth(AuthRequestReason::RefreshTokenExpired);

                if status == AuthStatus::Succeeded {
                    self.update_linked_accounts();
                    self.update_user_preference();
                }

                self.dispatch_event(&ClientEvent::OAuthComplete(OAuthCompleteEvent::new(
                    status,
                )));
            }
            UpdateStatus::FailedBadData => {
                log::warn!(
                    "Failed to update tokens due to corrupted data. Will run the update again \
                     later. (Check your internet connection)"
                );
            }
            UpdateStatus::NotRequired => {}
            UpdateStatus::Succeeded => {
                log::info!("Successfully updated tokens");
                self.update_user_preference();
            }
        }
    }

    fn run_oauth(&self, reason: AuthRequestReason) -> AuthStatus {
        self.token_manager
            .run_oauth(reason, OAUTH_DEFAULT_CHANCES, &|event| {
                self.dispatch_event(event);
            })
    }

    /// Invokes the user callback, then the built-in fallbacks for events
    /// left unhandled.
    fn dispatch_event(&self, event: &ClientEvent) {
        let callback = self.event_callback.lock().unwrap().clone();
        if let Some(callback) = &callback {
            callback(event);
        }

        match event {
            ClientEvent::OAuthUrlRequest(event) => {
                if !event.has_reply() {
                    let reply = default_oauth_url_request_handler(event);
                    event.reply(reply);
                }
            }
            ClientEvent::OAuthComplete(event) => {
                if !event.is_handled() {
                    default_oauth_complete_handler(event);
                }
            }
        }
    }

    fn update_linked_accounts(&self) {
        match get_runtime().block_on(self.http.account_numbers()) {
            Ok(entries) => {
                {
                    let mut accounts = self.linked_accounts.lock().unwrap();
                    for entry in entries {
                        accounts.insert(entry.account_number, entry.hash_value);
                    }
                }
                log::debug!("Linked accounts info cached");
            }
            Err(e) => log::error!("Failed to update linked accounts: {e}"),
        }
    }

    fn update_user_preference(&self) {
        match get_runtime().block_on(self.http.user_preference()) {
            Ok(preference) => {
                {
                    *self.user_preference.lock().unwrap() = Some(preference);
                }
                log::debug!("User preference cached");

                if let Some(info) = self.streamer_info() {
                    let streamer = self.streamer.lock().unwrap();
                    if let Some(streamer) = &*streamer {
                        streamer.update_streamer_info(info);
                    }
                }
            }
            Err(e) => log::error!("Failed to update user preference: {e}"),
        }
    }

    fn streamer_info(&self) -> Option<StreamerInfo> {
        self.user_preference
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|preference| preference.streamer_info.first().cloned())
    }
}

/// Built-in `OAuthUrlRequest` handler: prints the URL and reads the
/// redirected URL from the terminal.
fn default_oauth_url_request_handler(event: &OAuthUrlRequestEvent) -> String {
    match event.reason() {
        AuthRequestReason::InitialSetup => log::info!(
            "Please authorize to start the Schwab client. You have {} chance(s) left.",
            event.chances()
        ),
        AuthRequestReason::RefreshTokenExpired => log::info!(
            "Token expired, please reauthorize. You have {} chance(s) left.",
            event.chances()
        ),
        AuthRequestReason::PreviousAuthFailed => log::error!(
            "Previous authorization request failed. The redirected url expires rather fast; \
             make sure you paste it within 30 seconds. You have {} chance(s) left.",
            event.chances()
        ),
    }
    log::info!("Go to: {} and login.", event.authorization_url());
    log::info!("Paste the redirected url here after logging in:");

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        log::error!("Failed to read the redirected url from the terminal");
    }
    line.trim().to_string()
}

/// Built-in `OAuthComplete` handler: logs the outcome.
fn default_oauth_complete_handler(event: &OAuthCompleteEvent) {
    match event.status() {
        AuthStatus::Succeeded => log::info!("OAuth successful."),
        AuthStatus::Failed => log::error!("OAuth failed."),
        AuthStatus::NotRequired => log::info!("OAuth not required."),
    }
}
