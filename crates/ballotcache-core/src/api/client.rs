//! API client for the FEC open data REST API.
//!
//! Every call is a GET with the API key attached as the `api_key` query
//! parameter. Failures are sorted into configuration, upstream and transport
//! errors; nothing is retried here.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::QueryParams;

use super::ApiError;

/// Public FEC API root.
pub const DEFAULT_BASE_URL: &str = "https://api.open.fec.gov/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for interactive use.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const API_KEY_PARAM: &str = "api_key";

/// Anything that can answer `GET endpoint?params` with JSON.
pub trait RemoteSource: Send + Sync {
    fn request(
        &self,
        endpoint: &str,
        params: &QueryParams,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// API client for api.open.fec.gov.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FecClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FecClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Create a client with a different key, sharing the connection pool.
    pub fn with_api_key(&self, api_key: Option<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn build_url(&self, endpoint: &str, api_key: &str, params: &QueryParams) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint);
        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::Configuration(format!("Invalid API URL {}: {}", raw, e)))?;

        // Caller-supplied parameters win over the key, as with an object spread.
        let mut query = QueryParams::new().with(API_KEY_PARAM, api_key);
        for (k, v) in params.iter() {
            query.insert(k, v);
        }
        url.set_query(Some(&query.to_query_string()));
        Ok(url)
    }

    /// GET `{base}{endpoint}?api_key=..&params` and parse the body as JSON.
    pub async fn fetch_json(&self, endpoint: &str, params: &QueryParams) -> Result<Value, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ApiError::Configuration("FEC API key is not configured".to_string()))?;

        let url = self.build_url(endpoint, api_key, params)?;
        debug!(endpoint, params = %loggable_params(params), "Sending FEC request");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                // The URL carries the API key.
                let e = e.without_url();
                warn!(endpoint, error = %e, "FEC request failed to send");
                ApiError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint, status = status.as_u16(), "FEC request rejected");
            return Err(ApiError::from_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.without_url()))?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("{} in {}", e, ApiError::truncate_body(&body)))
        })
    }
}

/// Query string for logs, minus any caller-supplied key.
fn loggable_params(params: &QueryParams) -> String {
    params
        .iter()
        .filter(|(k, _)| *k != API_KEY_PARAM)
        .collect::<QueryParams>()
        .to_query_string()
}

impl RemoteSource for FecClient {
    async fn request(&self, endpoint: &str, params: &QueryParams) -> Result<Value, ApiError> {
        self.fetch_json(endpoint, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned HTTP response on a loopback port and report the
    /// request line it received.
    async fn serve_once(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let request_line = request.lines().next().unwrap_or_default().to_string();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(request_line);
        });

        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // Port 9 on loopback would refuse; the key check must come first.
        let client = FecClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.fetch_json("/candidate/X", &QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));

        let client = client.with_api_key(Some(String::new()));
        let err = client.fetch_json("/candidate/X", &QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_success_parses_json_and_sends_key() {
        let body = r#"{"results":[{"total_receipts":100.5}]}"#;
        let response: &'static str = Box::leak(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .into_boxed_str(),
        );
        let (base, request_line) = serve_once(response).await;

        let client = FecClient::new(base, Some("KEY123".to_string())).unwrap();
        let params = QueryParams::new().with("election_year", 2020);
        let value = client.fetch_json("/candidate/P1/totals", &params).await.unwrap();
        assert_eq!(value["results"][0]["total_receipts"], 100.5);

        let line = request_line.await.unwrap();
        assert!(line.starts_with("GET /candidate/P1/totals?"));
        assert!(line.contains("api_key=KEY123"));
        assert!(line.contains("election_year=2020"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let (base, _) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let client = FecClient::new(base, Some("KEY".to_string())).unwrap();
        let err = client.fetch_json("/committee/C1", &QueryParams::new()).await.unwrap_err();
        match err {
            ApiError::Upstream { status, status_text } => {
                assert_eq!(status, 503);
                assert_eq!(status_text, "Service Unavailable");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = FecClient::new(format!("http://{}", addr), Some("KEY".to_string())).unwrap();
        let err = client.fetch_json("/committee/C1", &QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let (base, _) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot json!",
        )
        .await;

        let client = FecClient::new(base, Some("KEY".to_string())).unwrap();
        let err = client.fetch_json("/committee/C1", &QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_logged_params_omit_api_key() {
        let params = QueryParams::new().with("api_key", "caller-secret").with("cycle", 2020);
        let logged = loggable_params(&params);
        assert_eq!(logged, "cycle=2020");
        assert!(!logged.contains("caller-secret"));
    }

    #[test]
    fn test_caller_params_override_key() {
        let client = FecClient::new(DEFAULT_BASE_URL, Some("K".to_string())).unwrap();
        let params = QueryParams::new().with("api_key", "OTHER").with("cycle", 2016);
        let url = client.build_url("/schedules/schedule_e", "K", &params).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.open.fec.gov/v1/schedules/schedule_e?api_key=OTHER&cycle=2016"
        );
    }
}
