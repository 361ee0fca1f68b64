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

//! In-memory token store with a persistent file cache.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Returns the current time as nanoseconds since `UNIX_EPOCH`.
///
/// All token timestamps use this single resolution, for both the in-memory
/// store and the cache file.
#[must_use]
pub fn unix_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// The current token tuple.
///
/// Timestamps record when each token was issued, as nanoseconds since
/// `UNIX_EPOCH`. After a refresh grant the refresh timestamp is preserved
/// from the prior state; the original issuance clock drives refresh expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// When the access token was issued (ns since epoch).
    pub access_token_ts: u64,
    /// Long-lived credential used to mint new access tokens.
    pub refresh_token: String,
    /// When the refresh token was first issued (ns since epoch).
    pub refresh_token_ts: u64,
}

/// Outcome of loading the token cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLoad {
    /// Tokens loaded from the cache file.
    Loaded,
    /// No cache file exists.
    Missing,
    /// The cache file is unreadable, unparsable, or missing required fields.
    Corrupted,
}

/// Thread-safe store of the current tokens, backed by a JSON cache file.
///
/// Readers take a short lock and copy; writers swap the whole tuple and
/// rewrite the cache with truncate-and-replace.
#[derive(Debug)]
pub struct TokenStore {
    tokens: Mutex<Option<TokenSet>>,
    cache_path: PathBuf,
}

impl TokenStore {
    /// Creates an empty store backed by `cache_path`.
    #[must_use]
    pub fn new(cache_path: PathBuf) -> Self {
        Self {
            tokens: Mutex::new(None),
            cache_path,
        }
    }

    /// Returns the cache file path.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Loads tokens from the cache file into memory.
    ///
    /// A partially written or otherwise invalid file classifies as
    /// [`CacheLoad::Corrupted`]; the caller is expected to run the full OAuth
    /// flow in that case.
    pub fn load_from_cache(&self) -> CacheLoad {
        log::debug!("Loading token cache...");

        if !self.cache_path.exists() {
            log::debug!("Token cache not found, authorization required");
            return CacheLoad::Missing;
        }

        let data = match std::fs::read_to_string(&self.cache_path) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("Token cache unreadable ({e}), please reauthorize");
                return CacheLoad::Corrupted;
            }
        };

        match serde_json::from_str::<TokenSet>(&data) {
            Ok(tokens) => {
                let now = unix_nanos_now();
                log::trace!(
                    "{} seconds passed since access token last generated",
                    now.saturating_sub(tokens.access_token_ts) / 1_000_000_000
                );
                log::trace!(
                    "{} hours passed since refresh token last generated",
                    now.saturating_sub(tokens.refresh_token_ts) / 3_600_000_000_000
                );

                *self.tokens.lock().unwrap() = Some(tokens);
                log::debug!("Tokens loaded");
                CacheLoad::Loaded
            }
            Err(e) => {
                log::debug!("Token cache corrupted ({e}), please reauthorize");
                CacheLoad::Corrupted
            }
        }
    }

    /// Atomically swaps the in-memory tokens and persists them to the cache.
    ///
    /// Cache persistence is best-effort: a failure to write the file is
    /// logged and does not invalidate the in-memory update.
    pub fn write(&self, tokens: TokenSet) {
        {
            *self.tokens.lock().unwrap() = Some(tokens.clone());
        }

        match serde_json::to_string_pretty(&tokens) {
            Ok(json) => {
                let tmp_path = self.cache_path.with_extension("json.tmp");
                let result = std::fs::write(&tmp_path, json)
                    .and_then(|()| std::fs::rename(&tmp_path, &self.cache_path));
                match result {
                    Ok(()) => log::debug!("Tokens cached to {:?}", self.cache_path),
                    Err(e) => log::error!("Unable to cache tokens to {:?}: {e}", self.cache_path),
                }
            }
            Err(e) => log::error!("Unable to serialize tokens: {e}"),
        }
    }

    /// Returns a copy of the current tokens.
    #[must_use]
    pub fn snapshot(&self) -> Option<TokenSet> {
        self.tokens.lock().unwrap().clone()
    }

    /// Returns a copy of the current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join(".tokens.json"))
    }

    fn sample_tokens() -> TokenSet {
        TokenSet {
            access_token: "A1".to_string(),
            access_token_ts: 1_700_000_000_000_000_000,
            refresh_token: "R1".to_string(),
            refresh_token_ts: 1_700_000_000_000_000_000,
        }
    }

    #[rstest]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let tokens = sample_tokens();

        store.write(tokens.clone());

        // A fresh store reading the same file decodes the identical tuple
        let reloaded = store_in(&dir);
        assert_eq!(reloaded.load_from_cache(), CacheLoad::Loaded);
        assert_eq!(reloaded.snapshot(), Some(tokens));
    }

    #[rstest]
    fn test_missing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load_from_cache(), CacheLoad::Missing);
        assert!(store.snapshot().is_none());
    }

    #[rstest]
    fn test_unparsable_cache_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = TokenStore::new(path);
        assert_eq!(store.load_from_cache(), CacheLoad::Corrupted);
    }

    #[rstest]
    #[case("access_token")]
    #[case("access_token_ts")]
    #[case("refresh_token")]
    #[case("refresh_token_ts")]
    fn test_missing_field_is_corrupted(#[case] field: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tokens.json");

        let mut value = serde_json::to_value(sample_tokens()).unwrap();
        value.as_object_mut().unwrap().remove(field);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let store = TokenStore::new(path);
        assert_eq!(store.load_from_cache(), CacheLoad::Corrupted);
    }

    #[rstest]
    fn test_write_replaces_previous_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.write(sample_tokens());
        let updated = TokenSet {
            access_token: "A2".to_string(),
            ..sample_tokens()
        };
        store.write(updated.clone());

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.load_from_cache(), CacheLoad::Loaded);
        assert_eq!(reloaded.snapshot(), Some(updated));
    }

    #[rstest]
    fn test_access_token_reads_current_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.access_token().is_none());

        store.write(sample_tokens());
        assert_eq!(store.access_token().as_deref(), Some("A1"));
    }
}
