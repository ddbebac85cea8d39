//! HTTP client abstraction used by the measurements


use crate::{
    error::{AppError, Result},
    models::Config,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Url};
use std::time::Duration;

/// Streamed response body; each item is one chunk as it arrives
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// HTTP client trait for abstraction and testing
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute a HEAD request; any completed exchange is `Ok`, whatever its status
    async fn head(&self, url: &str) -> Result<HttpResponse>;

    /// Start a GET request and hand back the body as a stream of chunks
    async fn fetch(&self, url: &str) -> Result<StreamedResponse>;

    /// POST a binary body and wait for the full response
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpResponse>;
}

/// Response to a request whose body is not needed
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub final_url: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Response whose body is consumed incrementally
pub struct StreamedResponse {
    pub status_code: u16,
    /// Declared body length, when the server sent one
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl StreamedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl std::fmt::Debug for StreamedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedResponse")
            .field("status_code", &self.status_code)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// reqwest-backed client
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: Client,
    request_timeout: Duration,
}

impl NetworkClient {
    /// `request_timeout` bounds connection setup, HEAD and POST exchanges.
    /// Streamed downloads are bounded by the run watchdog instead.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .user_agent(format!("network-speed-tester/{}", crate::VERSION))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.request_timeout())
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn parse(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| AppError::parse(format!("Invalid URL '{}': {}", url, e)))
    }
}

#[async_trait]
impl HttpClient for NetworkClient {
    async fn head(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .head(Self::parse(url)?)
            .timeout(self.request_timeout)
            .send()
            .await?;

        Ok(HttpResponse {
            status_code: response.status().as_u16(),
            final_url: response.url().to_string(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<StreamedResponse> {
        let response = self
            .client
            .get(Self::parse(url)?)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AppError::from))
            .boxed();

        Ok(StreamedResponse {
            status_code,
            content_length,
            body,
        })
    }

    async fn post(&self, url: &str, body: Bytes) -> Result<HttpResponse> {
        let response = self
            .client
            .post(Self::parse(url)?)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(self.request_timeout)
            .body(body)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        // Drain the echo so the connection can be reused
        let _ = response.bytes().await;

        Ok(HttpResponse {
            status_code,
            final_url,
        })
    }
}

/// Utility functions for HTTP operations
pub struct HttpUtils;

impl HttpUtils {
    /// Validate that a URL is absolute http(s) with a host
    pub fn validate_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::validation(format!("Invalid URL format: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::validation(format!(
                    "Unsupported URL scheme: {}",
                    scheme
                )))
            }
        }

        if parsed.host().is_none() {
            return Err(AppError::validation("URL must have a host"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_status_classes() {
        let ok = HttpResponse {
            status_code: 204,
            final_url: "https://a.test/".to_string(),
        };
        assert!(ok.is_success());

        let moved = HttpResponse {
            status_code: 301,
            final_url: "https://a.test/".to_string(),
        };
        assert!(!moved.is_success());
    }

    #[test]
    fn test_streamed_response_debug_hides_body() {
        let response = StreamedResponse {
            status_code: 200,
            content_length: Some(10),
            body: futures::stream::empty().boxed(),
        };
        assert!(response.is_success());
        let debug = format!("{:?}", response);
        assert!(debug.contains("content_length: Some(10)"));
    }

    #[test]
    fn test_network_client_creation() {
        let client = NetworkClient::new(Duration::from_secs(5)).unwrap();
        assert_eq!(client.request_timeout(), Duration::from_secs(5));

        let from_config = NetworkClient::from_config(&Config::default()).unwrap();
        assert_eq!(from_config.request_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_invalid_url_is_parse_error() {
        let client = NetworkClient::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(client.head("not a url").await, Err(AppError::Parse(_))));
        assert!(matches!(client.fetch("").await, Err(AppError::Parse(_))));
    }

    #[test]
    fn test_http_utils_validate_url() {
        assert!(HttpUtils::validate_url("https://speed.cloudflare.com/__down").is_ok());
        assert!(HttpUtils::validate_url("http://127.0.0.1:8080/post").is_ok());
        assert!(HttpUtils::validate_url("ftp://example.com").is_err());
        assert!(HttpUtils::validate_url("not-a-url").is_err());
    }
}
