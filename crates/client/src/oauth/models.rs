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

//! Token endpoint response models.

use serde::Deserialize;

/// A successful token grant.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenGrant {
    /// Access-token lifetime in seconds, as reported by the vendor.
    pub expires_in: i64,
    /// Token type (always `Bearer`).
    pub token_type: String,
    /// Granted scope.
    pub scope: String,
    /// The refresh token.
    pub refresh_token: String,
    /// The access token.
    pub access_token: String,
    /// OpenID token, when issued.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// An error payload from the token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenError {
    /// Vendor error code.
    pub error: String,
    /// Human-readable description, when present.
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Response of the token endpoint: a grant or an error payload.
///
/// The two shapes never overlap: an error payload carries `error`, a grant
/// carries the token fields.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenResponse {
    /// The vendor rejected the request.
    Error(TokenError),
    /// The vendor issued tokens.
    Grant(TokenGrant),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_parse_grant() {
        let body = r#"{
            "expires_in": 1800,
            "token_type": "Bearer",
            "scope": "api",
            "refresh_token": "R1",
            "access_token": "A1",
            "id_token": "I1"
        }"#;

        let response: TokenResponse = serde_json::from_str(body).unwrap();
        match response {
            TokenResponse::Grant(grant) => {
                assert_eq!(grant.access_token, "A1");
                assert_eq!(grant.refresh_token, "R1");
                assert_eq!(grant.expires_in, 1800);
            }
            TokenResponse::Error(_) => panic!("expected grant"),
        }
    }

    #[rstest]
    fn test_parse_error_payload() {
        let body = r#"{"error": "unsupported_token_type", "error_description": "bad request"}"#;

        let response: TokenResponse = serde_json::from_str(body).unwrap();
        match response {
            TokenResponse::Error(error) => {
                assert_eq!(error.error, "unsupported_token_type");
                assert_eq!(error.error_description.as_deref(), Some("bad request"));
            }
            TokenResponse::Grant(_) => panic!("expected error"),
        }
    }

    #[rstest]
    fn test_incomplete_grant_fails_to_parse() {
        // Neither a valid grant (missing fields) nor an error payload
        let body = r#"{"access_token": "A1"}"#;
        assert!(serde_json::from_str::<TokenResponse>(body).is_err());
    }
}
