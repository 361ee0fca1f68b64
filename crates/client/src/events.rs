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

//! Events delivered to the user's event callback.
//!
//! Events are emitted synchronously on the emitting thread. They are only
//! valid for the duration of the callback invocation; handlers must not
//! retain them.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

/// Why the client is requesting authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthRequestReason {
    /// No cached tokens exist (first run or corrupted cache).
    InitialSetup,
    /// The refresh token's lifetime has elapsed.
    RefreshTokenExpired,
    /// The previous authorization attempt failed.
    PreviousAuthFailed,
}

/// Outcome of an authorization flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Tokens were obtained or refreshed.
    Succeeded,
    /// All chances were exhausted without obtaining tokens.
    Failed,
    /// Cached tokens were still valid.
    NotRequired,
}

/// Request for the user to complete the OAuth flow in a browser.
///
/// The handler should direct the user to [`authorization_url`] and supply the
/// URL the browser was redirected to via [`reply`]. An empty reply counts as
/// unhandled and falls back to the built-in terminal prompt.
///
/// [`authorization_url`]: OAuthUrlRequestEvent::authorization_url
/// [`reply`]: OAuthUrlRequestEvent::reply
#[derive(Debug)]
pub struct OAuthUrlRequestEvent {
    url: String,
    reason: AuthRequestReason,
    chances: u32,
    reply: Mutex<Option<String>>,
}

impl OAuthUrlRequestEvent {
    pub(crate) fn new(url: String, reason: AuthRequestReason, chances: u32) -> Self {
        Self {
            url,
            reason,
            chances,
            reply: Mutex::new(None),
        }
    }

    /// Returns the authorization URL the user must visit.
    #[must_use]
    pub fn authorization_url(&self) -> &str {
        &self.url
    }

    /// Returns why authorization is being requested.
    #[must_use]
    pub fn reason(&self) -> AuthRequestReason {
        self.reason
    }

    /// Returns how many chances are left (including this one).
    #[must_use]
    pub fn chances(&self) -> u32 {
        self.chances
    }

    /// Supplies the redirected URL; consumed immediately after the callback
    /// returns.
    pub fn reply(&self, redirected_url: impl Into<String>) {
        *self.reply.lock().unwrap() = Some(redirected_url.into());
    }

    pub(crate) fn has_reply(&self) -> bool {
        self.reply
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|reply| !reply.is_empty())
    }

    pub(crate) fn take_reply(&self) -> Option<String> {
        self.reply
            .lock()
            .unwrap()
            .take()
            .filter(|reply| !reply.is_empty())
    }
}

/// Notification that an authorization flow finished.
#[derive(Debug)]
pub struct OAuthCompleteEvent {
    status: AuthStatus,
    handled: AtomicBool,
}

impl OAuthCompleteEvent {
    pub(crate) fn new(status: AuthStatus) -> Self {
        Self {
            status,
            handled: AtomicBool::new(false),
        }
    }

    /// Returns the outcome of the flow.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    /// Marks the event handled, suppressing the built-in logging handler.
    pub fn mark_handled(&self) {
        self.handled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Relaxed)
    }
}

/// An event delivered to the user's callback.
#[derive(Debug)]
pub enum ClientEvent {
    /// The client needs the user to complete the OAuth flow.
    OAuthUrlRequest(OAuthUrlRequestEvent),
    /// An authorization flow finished.
    OAuthComplete(OAuthCompleteEvent),
}

/// The user's event sink.
pub type EventCallback = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_reply_round_trip() {
        let event = OAuthUrlRequestEvent::new(
            "https://vendor/authorize".to_string(),
            AuthRequestReason::InitialSetup,
            3,
        );
        assert!(event.take_reply().is_none());

        event.reply("https://127.0.0.1/?code=ABC&session=XYZ");
        assert_eq!(
            event.take_reply().as_deref(),
            Some("https://127.0.0.1/?code=ABC&session=XYZ")
        );
        // Consumed
        assert!(event.take_reply().is_none());
    }

    #[rstest]
    fn test_empty_reply_counts_as_unhandled() {
        let event = OAuthUrlRequestEvent::new(
            "https://vendor/authorize".to_string(),
            AuthRequestReason::PreviousAuthFailed,
            1,
        );
        event.reply("");
        assert!(event.take_reply().is_none());
    }

    #[rstest]
    fn test_complete_event_handled_flag() {
        let event = OAuthCompleteEvent::new(AuthStatus::Succeeded);
        assert!(!event.is_handled());
        event.mark_handled();
        assert!(event.is_handled());
    }
}
