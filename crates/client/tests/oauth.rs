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

//! Authorization flow tests against a mock OAuth/REST server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    http::HeaderMap,
    routing::{get, post},
    serve,
};
use schwab_client::{ClientEvent, SchwabClient, SchwabClientConfig, SchwabError};
use schwab_network::get_runtime;
use serde_json::{Value, json};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Mock vendor: OAuth token endpoint plus the REST routes `connect()`
/// touches. Records token request bodies.
struct MockVendor {
    base_url: String,
    token_bodies: Arc<Mutex<Vec<String>>>,
}

impl MockVendor {
    /// `token_response` is returned verbatim by `POST /token`.
    fn spawn(token_response: Value) -> Self {
        let token_bodies = Arc::new(Mutex::new(Vec::new()));

        let bodies = token_bodies.clone();
        let router = Router::new()
            .route(
                "/token",
                post(move |headers: HeaderMap, body: String| {
                    let bodies = bodies.clone();
                    let response = token_response.clone();
                    async move {
                        // Basic auth with base64("key:secret")
                        assert_eq!(
                            headers.get("authorization").unwrap().to_str().unwrap(),
                            "Basic a2V5OnNlY3JldA=="
                        );
                        bodies.lock().unwrap().push(body);
                        Json(response)
                    }
                }),
            )
            .route(
                "/accounts/accountNumbers",
                get(|| async {
                    Json(json!([{"accountNumber": "123", "hashValue": "HASH123"}]))
                }),
            )
            .route(
                "/userPreference",
                get(|| async {
                    Json(json!({
                        "accounts": [],
                        "streamerInfo": [{
                            "streamerSocketUrl": "wss://streamer-api.schwab.com/ws",
                            "schwabClientCustomerId": "CUST",
                            "schwabClientCorrelId": "CORR",
                            "schwabClientChannel": "N9",
                            "schwabClientFunctionId": "APIAPP"
                        }],
                        "offers": []
                    }))
                }),
            );

        let base_url = get_runtime().block_on(async {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                serve(listener, router).await.unwrap();
            });
            format!("http://{addr}")
        });

        Self {
            base_url,
            token_bodies,
        }
    }
}

fn grant(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "expires_in": 1800,
        "token_type": "Bearer",
        "scope": "api",
        "refresh_token": refresh_token,
        "access_token": access_token,
        "id_token": "ID"
    })
}

fn config_for(vendor: &MockVendor, cache_path: PathBuf) -> SchwabClientConfig {
    SchwabClientConfig::new()
        .with_oauth_base_url(vendor.base_url.clone())
        .with_trader_base_url(vendor.base_url.clone())
        .with_market_data_base_url(vendor.base_url.clone())
        .with_token_cache_path(cache_path)
        .with_http_timeout_secs(2)
}

/// Installs a callback that replies with `redirect_reply` to every URL
/// request and collects an event trace.
fn collect_events(client: &SchwabClient, redirect_reply: &'static str) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    client.set_event_callback(move |event| match event {
        ClientEvent::OAuthUrlRequest(event) => {
            events_clone.lock().unwrap().push(format!(
                "url-request:{:?}:{}",
                event.reason(),
                event.chances()
            ));
            event.reply(redirect_reply);
        }
        ClientEvent::OAuthComplete(event) => {
            events_clone
                .lock()
                .unwrap()
                .push(format!("complete:{:?}", event.status()));
            event.mark_handled();
        }
    });

    events
}

fn read_cache(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn cold_start_without_cache_runs_full_oauth() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".tokens.json");
    let vendor = MockVendor::spawn(grant("A1", "R1"));

    let client =
        SchwabClient::with_config("key", "secret", config_for(&vendor, cache_path.clone()))
            .unwrap();
    let events = collect_events(&client, "https://127.0.0.1/?code=ABC&session=XYZ");

    assert!(client.connect());
    assert!(client.is_connected());

    // The authorization code was extracted from the redirected URL
    let bodies = vendor.token_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("grant_type=authorization_code"));
    assert!(bodies[0].contains("code=ABC"));

    // Cache written with both timestamps stamped together
    let cache = read_cache(&cache_path);
    assert_eq!(cache["access_token"], "A1");
    assert_eq!(cache["refresh_token"], "R1");
    assert_eq!(cache["access_token_ts"], cache["refresh_token_ts"]);

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "url-request:InitialSetup:3".to_string(),
            "complete:Succeeded".to_string(),
        ]
    );

    // Collaborator caches were refreshed
    assert_eq!(client.linked_accounts(), vec!["123".to_string()]);
    let preference = client.user_preference().unwrap();
    assert_eq!(preference.streamer_info[0].schwab_client_customer_id, "CUST");
}

#[test]
fn warm_start_with_stale_access_token_refreshes() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".tokens.json");
    let vendor = MockVendor::spawn(grant("A2", "R2"));

    // Access token 1900 s old (stale), refresh token 60 s old (fresh)
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let refresh_ts = now - 60 * NANOS_PER_SEC;
    std::fs::write(
        &cache_path,
        serde_json::to_string(&json!({
            "access_token": "A1",
            "access_token_ts": now - 1900 * NANOS_PER_SEC,
            "refresh_token": "R1",
            "refresh_token_ts": refresh_ts
        }))
        .unwrap(),
    )
    .unwrap();

    let client =
        SchwabClient::with_config("key", "secret", config_for(&vendor, cache_path.clone()))
            .unwrap();
    let events = collect_events(&client, "unused");

    assert!(client.connect());

    // The refresh grant carried the cached refresh token
    let bodies = vendor.token_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("grant_type=refresh_token"));
    assert!(bodies[0].contains("refresh_token=R1"));

    // New tokens stored; the refresh timestamp is preserved verbatim
    let cache = read_cache(&cache_path);
    assert_eq!(cache["access_token"], "A2");
    assert_eq!(cache["refresh_token"], "R2");
    assert_eq!(cache["refresh_token_ts"].as_u64().unwrap(), refresh_ts);
    assert!(cache["access_token_ts"].as_u64().unwrap() > now - NANOS_PER_SEC);

    // No URL request: the refresh flow needs no user interaction
    assert_eq!(
        *events.lock().unwrap(),
        vec!["complete:Succeeded".to_string()]
    );
}

#[test]
fn warm_start_with_fresh_tokens_skips_oauth() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".tokens.json");
    let vendor = MockVendor::spawn(grant("UNUSED", "UNUSED"));

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    std::fs::write(
        &cache_path,
        serde_json::to_string(&json!({
            "access_token": "A1",
            "access_token_ts": now - 60 * NANOS_PER_SEC,
            "refresh_token": "R1",
            "refresh_token_ts": now - 3600 * NANOS_PER_SEC
        }))
        .unwrap(),
    )
    .unwrap();

    let client =
        SchwabClient::with_config("key", "secret", config_for(&vendor, cache_path)).unwrap();
    let events = collect_events(&client, "unused");

    assert!(client.connect());
    assert!(vendor.token_bodies.lock().unwrap().is_empty());
    assert_eq!(
        *events.lock().unwrap(),
        vec!["complete:NotRequired".to_string()]
    );
}

#[test]
fn corrupted_cache_triggers_initial_setup() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".tokens.json");
    let vendor = MockVendor::spawn(grant("A1", "R1"));

    // Required field missing classifies as corrupted
    std::fs::write(
        &cache_path,
        r#"{"access_token": "A1", "access_token_ts": 1, "refresh_token_ts": 2}"#,
    )
    .unwrap();

    let client =
        SchwabClient::with_config("key", "secret", config_for(&vendor, cache_path)).unwrap();
    let events = collect_events(&client, "https://127.0.0.1/?code=ABC&session=XYZ");

    assert!(client.connect());
    assert_eq!(
        events.lock().unwrap()[0],
        "url-request:InitialSetup:3".to_string()
    );
}

#[test]
fn chances_exhausted_fails_and_refuses_streamer() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".tokens.json");
    let vendor = MockVendor::spawn(grant("UNUSED", "UNUSED"));

    let client =
        SchwabClient::with_config("key", "secret", config_for(&vendor, cache_path.clone()))
            .unwrap();
    // The reply never parses as a redirected URL, so every chance fails
    let events = collect_events(&client, "garbage-without-code-or-session");

    assert!(!client.connect());
    assert!(!client.is_connected());

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "url-request:InitialSetup:3".to_string(),
            "url-request:PreviousAuthFailed:2".to_string(),
            "url-request:PreviousAuthFailed:1".to_string(),
            "complete:Failed".to_string(),
        ]
    );

    // No tokens were ever requested or cached
    assert!(vendor.token_bodies.lock().unwrap().is_empty());
    assert!(!cache_path.exists());

    // The facade refuses streamer operations after a failed connect
    assert!(matches!(
        client.start_streamer(),
        Err(SchwabError::NotConnected)
    ));
}
