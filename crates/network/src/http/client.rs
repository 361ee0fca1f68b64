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

//! HTTP client implementation.

use std::{collections::HashMap, str::FromStr, time::Duration};

use reqwest::{
    Method, Response, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};

use super::{HttpClientError, HttpResponse, HttpStatus};

/// An HTTP client with default headers and per-request timeouts.
///
/// Backed by a [`reqwest::Client`] which keeps connections alive and can be
/// cloned cheaply. Query parameters are passed as key/value pairs and encoded
/// into the URL; existing query strings are preserved.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Creates a new [`HttpClient`] instance.
    ///
    /// `headers` become default headers attached to every request;
    /// `timeout_secs` is the client-wide default deadline (individual
    /// requests may override it).
    ///
    /// # Errors
    ///
    /// Returns `ClientBuildError` if a header is malformed or building the
    /// underlying `reqwest::Client` fails.
    pub fn new(
        headers: HashMap<String, String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, HttpClientError> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let header_name = HeaderName::from_str(&key).map_err(|e| {
                HttpClientError::ClientBuildError(format!("Invalid header name '{key}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                HttpClientError::ClientBuildError(format!("Invalid header value '{value}': {e}"))
            })?;
            header_map.insert(header_name, header_value);
        }

        let mut client_builder = reqwest::Client::builder()
            .default_headers(header_map)
            .tcp_nodelay(true);

        if let Some(timeout_secs) = timeout_secs {
            client_builder = client_builder.timeout(Duration::from_secs(timeout_secs));
        }

        let client = client_builder
            .build()
            .map_err(|e| HttpClientError::ClientBuildError(e.to_string()))?;

        Ok(Self { client })
    }

    /// Sends an HTTP request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or times out. Non-2xx
    /// responses are returned as successful [`HttpResponse`] values; status
    /// classification is left to the caller.
    pub async fn request(
        &self,
        method: Method,
        url: String,
        params: Option<&[(String, String)]>,
        headers: Option<HashMap<String, String>>,
        body: Option<Vec<u8>>,
        timeout_secs: Option<u64>,
    ) -> Result<HttpResponse, HttpClientError> {
        let full_url = encode_url_params(&url, params);
        let reqwest_url = Url::parse(&full_url)
            .map_err(|e| HttpClientError::from(format!("URL parse error: {e}")))?;

        let mut header_map = HeaderMap::new();
        if let Some(headers) = headers {
            for (key, value) in &headers {
                let header_name = HeaderName::from_str(key)
                    .map_err(|e| HttpClientError::from(format!("Invalid header name: {e}")))?;
                let header_value = HeaderValue::from_str(value)
                    .map_err(|e| HttpClientError::from(format!("Invalid header value: {e}")))?;
                header_map.insert(header_name, header_value);
            }
        }

        let mut request_builder = self.client.request(method, reqwest_url).headers(header_map);

        if let Some(timeout_secs) = timeout_secs {
            request_builder = request_builder.timeout(Duration::from_secs(timeout_secs));
        }

        let request = match body {
            Some(b) => request_builder
                .body(b)
                .build()
                .map_err(HttpClientError::from)?,
            None => request_builder.build().map_err(HttpClientError::from)?,
        };

        log::trace!("{request:?}");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(HttpClientError::from)?;

        to_response(response).await
    }

    /// Sends an HTTP GET request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or times out.
    pub async fn get(
        &self,
        url: String,
        params: Option<&[(String, String)]>,
        headers: Option<HashMap<String, String>>,
        timeout_secs: Option<u64>,
    ) -> Result<HttpResponse, HttpClientError> {
        self.request(Method::GET, url, params, headers, None, timeout_secs)
            .await
    }

    /// Sends an HTTP POST request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or times out.
    pub async fn post(
        &self,
        url: String,
        params: Option<&[(String, String)]>,
        headers: Option<HashMap<String, String>>,
        body: Option<Vec<u8>>,
        timeout_secs: Option<u64>,
    ) -> Result<HttpResponse, HttpClientError> {
        self.request(Method::POST, url, params, headers, body, timeout_secs)
            .await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

/// Converts a `reqwest::Response` into an [`HttpResponse`].
async fn to_response(response: Response) -> Result<HttpResponse, HttpClientError> {
    log::trace!("{response:?}");

    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(key, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (key.as_str().to_string(), v.to_string()))
        })
        .collect();
    let status = HttpStatus::new(response.status());
    let body = response
        .bytes()
        .await
        .map_err(HttpClientError::from)?
        .to_vec();

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Encodes query parameters onto a URL, appending with `&` when the URL
/// already carries a query string.
fn encode_url_params(url: &str, params: Option<&[(String, String)]>) -> String {
    let Some(params) = params else {
        return url.to_string();
    };

    if params.is_empty() {
        return url.to_string();
    }

    let query_string =
        serde_urlencoded::to_string(params).expect("string pairs always URL-encode");

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query_string}")
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{Router, routing::get, serve};
    use rstest::rstest;

    use super::*;

    fn create_router() -> Router {
        Router::new()
            .route("/get", get(|| async { "hello-world!" }))
            .route(
                "/notfound",
                get(|| async { axum::http::StatusCode::NOT_FOUND }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "Eventually responded"
                }),
            )
    }

    async fn start_test_server() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            serve(listener, create_router()).await.unwrap();
        });

        addr
    }

    #[rstest]
    #[case(None, "http://host/path")]
    #[case(Some(vec![]), "http://host/path")]
    #[case(
        Some(vec![("a".to_string(), "1".to_string()), ("b".to_string(), "x y".to_string())]),
        "http://host/path?a=1&b=x+y"
    )]
    fn test_encode_url_params(
        #[case] params: Option<Vec<(String, String)>>,
        #[case] expected: &str,
    ) {
        assert_eq!(
            encode_url_params("http://host/path", params.as_deref()),
            expected
        );
    }

    #[rstest]
    fn test_encode_url_params_preserves_existing_query() {
        let params = vec![("b".to_string(), "2".to_string())];
        assert_eq!(
            encode_url_params("http://host/path?a=1", Some(&params)),
            "http://host/path?a=1&b=2"
        );
    }

    #[tokio::test]
    async fn test_get() {
        let addr = start_test_server().await;
        let client = HttpClient::default();

        let response = client
            .get(format!("http://{addr}/get"), None, None, None)
            .await
            .unwrap();

        assert!(response.status.is_success());
        assert_eq!(response.text(), "hello-world!");
    }

    #[tokio::test]
    async fn test_not_found_is_not_an_error() {
        let addr = start_test_server().await;
        let client = HttpClient::default();

        let response = client
            .get(format!("http://{addr}/notfound"), None, None, None)
            .await
            .unwrap();

        assert!(response.status.is_client_error());
        assert_eq!(response.status.as_u16(), 404);
    }

    #[tokio::test]
    async fn test_timeout() {
        let addr = start_test_server().await;
        let client = HttpClient::default();

        let result = client
            .get(format!("http://{addr}/slow"), None, None, Some(1))
            .await;

        assert!(matches!(result, Err(HttpClientError::TimeoutError(_))));
    }

    #[tokio::test]
    async fn test_default_headers() {
        let addr = start_test_server().await;
        let client = HttpClient::new(
            HashMap::from([("x-test".to_string(), "1".to_string())]),
            Some(5),
        )
        .unwrap();

        let response = client
            .get(format!("http://{addr}/get"), None, None, None)
            .await
            .unwrap();

        assert!(response.status.is_success());
    }

    #[rstest]
    fn test_invalid_header_rejected() {
        let result = HttpClient::new(
            HashMap::from([("bad header".to_string(), "1".to_string())]),
            None,
        );
        assert!(matches!(result, Err(HttpClientError::ClientBuildError(_))));
    }
}
