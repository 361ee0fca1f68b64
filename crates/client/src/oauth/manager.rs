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

//! OAuth2 grant flows and token expiry management.

use std::{collections::HashMap, sync::Arc};

use schwab_network::{get_runtime, http::HttpClient};

use super::{
    models::{TokenGrant, TokenResponse},
    store::{CacheLoad, TokenSet, TokenStore, unix_nanos_now},
};
use crate::{
    common::{
        consts::{
            ACCESS_TOKEN_LIFETIME_SECS, ACCESS_TOKEN_REFRESH_MARGIN_SECS,
            REFRESH_TOKEN_EXPIRY_MARGIN_SECS, REFRESH_TOKEN_LIFETIME_SECS,
        },
        credential::SchwabCredential,
    },
    events::{AuthRequestReason, AuthStatus, ClientEvent, OAuthUrlRequestEvent},
};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Outcome of a token update pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Both tokens are still fresh.
    NotRequired,
    /// The access token was refreshed.
    Succeeded,
    /// The refresh token's lifetime has elapsed; a full OAuth flow is
    /// required.
    FailedExpired,
    /// The token endpoint returned a malformed or error response; the next
    /// checker tick retries.
    FailedBadData,
}

/// What a token update pass needs to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdateCheck {
    NotRequired,
    RefreshRequired,
    Expired,
}

/// Runs the OAuth grant flows and drives the [`TokenStore`].
pub struct TokenManager {
    credential: SchwabCredential,
    store: Arc<TokenStore>,
    http: HttpClient,
    oauth_base_url: String,
    redirect_uri: String,
}

impl TokenManager {
    /// Creates a new `TokenManager`.
    #[must_use]
    pub fn new(
        credential: SchwabCredential,
        store: Arc<TokenStore>,
        oauth_base_url: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            credential,
            store,
            http: HttpClient::default(),
            oauth_base_url,
            redirect_uri,
        }
    }

    /// Returns the token store.
    #[must_use]
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Loads tokens from the cache file.
    pub fn load_from_cache(&self) -> CacheLoad {
        self.store.load_from_cache()
    }

    /// Returns the authorization URL the user must visit.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}",
            self.oauth_base_url,
            self.credential.app_key(),
            self.redirect_uri
        )
    }

    /// Classifies what a token update pass needs to do.
    pub(crate) fn check(&self) -> UpdateCheck {
        let Some(tokens) = self.store.snapshot() else {
            return UpdateCheck::Expired;
        };

        let now = unix_nanos_now();

        let refresh_elapsed = now.saturating_sub(tokens.refresh_token_ts);
        if refresh_elapsed
            >= (REFRESH_TOKEN_LIFETIME_SECS - REFRESH_TOKEN_EXPIRY_MARGIN_SECS) * NANOS_PER_SEC
        {
            log::warn!("Refresh token expired, please reauthorize");
            return UpdateCheck::Expired;
        }

        let access_elapsed = now.saturating_sub(tokens.access_token_ts);
        if access_elapsed
            >= (ACCESS_TOKEN_LIFETIME_SECS - ACCESS_TOKEN_REFRESH_MARGIN_SECS) * NANOS_PER_SEC
        {
            log::info!("Access token expired, updating automatically");
            return UpdateCheck::RefreshRequired;
        }

        UpdateCheck::NotRequired
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// On success the new tuple is written with the refresh timestamp
    /// preserved from the prior state: the vendor issues a new refresh token
    /// body, but the original issuance clock drives refresh expiry.
    pub(crate) fn refresh(&self) -> UpdateStatus {
        let Some(tokens) = self.store.snapshot() else {
            return UpdateStatus::FailedBadData;
        };

        let body = format!(
            "grant_type=refresh_token&refresh_token={}",
            tokens.refresh_token
        );

        match self.request_tokens(body) {
            Some(TokenResponse::Grant(grant)) => {
                self.write_refreshed(&grant, tokens.refresh_token_ts);
                UpdateStatus::Succeeded
            }
            Some(TokenResponse::Error(error)) => {
                log::error!(
                    "Unable to get access token. Error: {}, {}",
                    error.error,
                    error.error_description.unwrap_or_default()
                );
                UpdateStatus::FailedBadData
            }
            None => UpdateStatus::FailedBadData,
        }
    }

    /// Checks token freshness and refreshes the access token if needed.
    ///
    /// Callers that own a streamer should pause it around the refresh; see
    /// [`SchwabClient`](crate::SchwabClient).
    pub fn update(&self) -> UpdateStatus {
        match self.check() {
            UpdateCheck::NotRequired => UpdateStatus::NotRequired,
            UpdateCheck::Expired => UpdateStatus::FailedExpired,
            UpdateCheck::RefreshRequired => self.refresh(),
        }
    }

    /// Runs the full authorization-code flow.
    ///
    /// Emits an `OAuthUrlRequest` through `dispatch` for each attempt; the
    /// event's reply supplies the redirected URL. Each failed attempt
    /// consumes a chance and re-emits with
    /// [`AuthRequestReason::PreviousAuthFailed`].
    pub fn run_oauth(
        &self,
        reason: AuthRequestReason,
        chances: u32,
        dispatch: &dyn Fn(&ClientEvent),
    ) -> AuthStatus {
        let mut reason = reason;
        let mut chances = chances;

        while chances > 0 {
            let event = ClientEvent::OAuthUrlRequest(OAuthUrlRequestEvent::new(
                self.authorize_url(),
                reason,
                chances,
            ));
            dispatch(&event);

            let reply = match &event {
                ClientEvent::OAuthUrlRequest(event) => event.take_reply(),
                ClientEvent::OAuthComplete(_) => unreachable!(),
            };

            if let Some(redirected_url) = reply {
                if let Some(code) = extract_authorization_code(&redirected_url) {
                    log::trace!("authorizationCode: {code}");

                    let body = format!(
                        "grant_type=authorization_code&code={code}&redirect_uri={}",
                        self.redirect_uri
                    );
                    match self.request_tokens(body) {
                        Some(TokenResponse::Grant(grant)) => {
                            self.write_initial(&grant);
                            return AuthStatus::Succeeded;
                        }
                        Some(TokenResponse::Error(error)) => {
                            log::error!(
                                "Unable to get tokens. Error: {}, {}",
                                error.error,
                                error.error_description.unwrap_or_default()
                            );
                        }
                        None => {}
                    }
                } else {
                    log::error!(
                        "Unable to extract authorization code from: {redirected_url}"
                    );
                }
            }

            reason = AuthRequestReason::PreviousAuthFailed;
            chances -= 1;
        }

        log::error!("You have no more chances left to authorize the client");
        AuthStatus::Failed
    }

    /// Writes tokens from an authorization-code grant; both timestamps are
    /// stamped "now".
    fn write_initial(&self, grant: &TokenGrant) {
        let now = unix_nanos_now();
        self.store.write(TokenSet {
            access_token: grant.access_token.clone(),
            access_token_ts: now,
            refresh_token: grant.refresh_token.clone(),
            refresh_token_ts: now,
        });
    }

    /// Writes tokens from a refresh grant, preserving the prior refresh
    /// timestamp.
    fn write_refreshed(&self, grant: &TokenGrant, refresh_token_ts: u64) {
        self.store.write(TokenSet {
            access_token: grant.access_token.clone(),
            access_token_ts: unix_nanos_now(),
            refresh_token: grant.refresh_token.clone(),
            refresh_token_ts,
        });
    }

    /// POSTs a grant request to the token endpoint.
    ///
    /// Returns `None` on transport failure or an unparsable body; callers
    /// classify both as bad data, not as expiry.
    fn request_tokens(&self, body: String) -> Option<TokenResponse> {
        let url = format!("{}/token", self.oauth_base_url);
        let headers = HashMap::from([
            ("Authorization".to_string(), self.credential.basic_auth()),
            (
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ),
        ]);

        let response = get_runtime().block_on(self.http.post(
            url,
            None,
            Some(headers),
            Some(body.into_bytes()),
            None,
        ));

        match response {
            Ok(response) => match serde_json::from_slice::<TokenResponse>(&response.body) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    log::error!("Unable to parse token endpoint response: {e}");
                    None
                }
            },
            Err(e) => {
                log::error!("Token endpoint request failed: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("oauth_base_url", &self.oauth_base_url)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

/// Extracts the authorization code from a redirected URL of the form
/// `https://{redirect}/?code={CODE}&session={SESSION_ID}`.
///
/// The code is the substring strictly between `?code=` and `&session=`,
/// kept percent-encoded exactly as received.
#[must_use]
pub fn extract_authorization_code(redirected_url: &str) -> Option<String> {
    let start = redirected_url.find("?code=")? + "?code=".len();
    let end = redirected_url.find("&session=")?;
    if end < start {
        return None;
    }
    Some(redirected_url[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn manager_with_store(dir: &tempfile::TempDir) -> TokenManager {
        let store = Arc::new(TokenStore::new(dir.path().join(".tokens.json")));
        TokenManager::new(
            SchwabCredential::new("key", "secret").unwrap(),
            store,
            "https://api.schwabapi.com/v1/oauth".to_string(),
            "https://127.0.0.1".to_string(),
        )
    }

    fn tokens_with_ages(access_age_secs: u64, refresh_age_secs: u64) -> TokenSet {
        let now = unix_nanos_now();
        TokenSet {
            access_token: "A1".to_string(),
            access_token_ts: now - access_age_secs * NANOS_PER_SEC,
            refresh_token: "R1".to_string(),
            refresh_token_ts: now - refresh_age_secs * NANOS_PER_SEC,
        }
    }

    #[rstest]
    #[case("https://127.0.0.1/?code=ABC&session=XYZ", Some("ABC"))]
    #[case("https://127.0.0.1/?code=C.JhY%40WQ&session=1a2b", Some("C.JhY%40WQ"))]
    #[case("https://127.0.0.1/?code=ABC", None)]
    #[case("https://127.0.0.1/?session=XYZ", None)]
    #[case("garbage", None)]
    fn test_extract_authorization_code(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_authorization_code(url).as_deref(), expected);
    }

    #[rstest]
    fn test_check_fresh_tokens_not_required() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        manager.store().write(tokens_with_ages(60, 3600));

        assert_eq!(manager.check(), UpdateCheck::NotRequired);
    }

    #[rstest]
    fn test_check_stale_access_token_requires_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        // 1900 s > 30 min - 1 min
        manager.store().write(tokens_with_ages(1900, 60));

        assert_eq!(manager.check(), UpdateCheck::RefreshRequired);
    }

    #[rstest]
    fn test_check_boundary_exactly_at_refresh_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        // Exactly at T_A - tau_A triggers a refresh
        manager.store().write(tokens_with_ages(
            ACCESS_TOKEN_LIFETIME_SECS - ACCESS_TOKEN_REFRESH_MARGIN_SECS,
            60,
        ));

        assert_eq!(manager.check(), UpdateCheck::RefreshRequired);
    }

    #[rstest]
    fn test_check_just_under_refresh_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        manager.store().write(tokens_with_ages(
            ACCESS_TOKEN_LIFETIME_SECS - ACCESS_TOKEN_REFRESH_MARGIN_SECS - 5,
            60,
        ));

        assert_eq!(manager.check(), UpdateCheck::NotRequired);
    }

    #[rstest]
    fn test_check_expired_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        manager.store().write(tokens_with_ages(
            60,
            REFRESH_TOKEN_LIFETIME_SECS - REFRESH_TOKEN_EXPIRY_MARGIN_SECS + 1,
        ));

        assert_eq!(manager.check(), UpdateCheck::Expired);
    }

    #[rstest]
    fn test_check_without_tokens_is_expired() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        assert_eq!(manager.check(), UpdateCheck::Expired);
    }

    #[rstest]
    fn test_run_oauth_single_chance_bad_redirect_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);

        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let dispatch = move |event: &ClientEvent| {
            if let ClientEvent::OAuthUrlRequest(event) = event {
                events_clone
                    .lock()
                    .unwrap()
                    .push((event.reason(), event.chances()));
                // No code/session delimiters: extraction fails
                event.reply("https://127.0.0.1/?error=access_denied");
            }
        };

        let status = manager.run_oauth(AuthRequestReason::InitialSetup, 1, &dispatch);

        assert_eq!(status, AuthStatus::Failed);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(AuthRequestReason::InitialSetup, 1)]
        );
        assert!(manager.store().snapshot().is_none());
    }

    #[rstest]
    fn test_authorize_url() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_store(&dir);
        assert_eq!(
            manager.authorize_url(),
            "https://api.schwabapi.com/v1/oauth/authorize?client_id=key&redirect_uri=https://127.0.0.1"
        );
    }
}
