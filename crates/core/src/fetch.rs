//! Content fetching over HTTP and from local files.
//!
//! Sources never talk to the network directly. They describe what they need
//! as a [`Request`] and hand it to a [`Fetcher`]. [`HttpFetcher`] is the real
//! implementation; [`StaticFetcher`] serves canned bodies.

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::{FeedgenError, Result};

/// HTTP client configuration for fetching pages and APIs.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (compatible; feedgen/1.0)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single fetch, described independently of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), headers: Vec::new(), body: None }
    }

    /// A POST with a JSON body and matching content type.
    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Anything that can turn a [`Request`] into a response body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs the request and returns the body of a successful response.
    ///
    /// # Errors
    ///
    /// Transport failures, timeouts and non-2xx statuses are errors.
    async fn fetch(&self, request: &Request) -> Result<String>;
}

/// Fetches over HTTP(S) with `reqwest`; `file://` URLs are read from disk.
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

#[cfg(feature = "fetch")]
impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FeedgenError::HttpError)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[cfg(feature = "fetch")]
#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<String> {
        let url = Url::parse(&request.url).map_err(|e| FeedgenError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            "file" => return fetch_file(&url),
            other => {
                return Err(FeedgenError::InvalidUrl(format!("unsupported scheme `{}` in {}", other, request.url)));
            }
        }

        tracing::debug!(method = ?request.method, url = %url, "fetching");

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let timeout = self.config.timeout_secs;
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() { FeedgenError::Timeout { timeout } } else { FeedgenError::HttpError(e) }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedgenError::HttpStatus { status: status.as_u16(), url: request.url.clone() });
        }

        response
            .text()
            .await
            .map_err(|e| if e.is_timeout() { FeedgenError::Timeout { timeout } } else { FeedgenError::HttpError(e) })
    }
}

/// Reads the file a `file://` URL points to.
pub fn fetch_file(url: &Url) -> Result<String> {
    let path = url
        .to_file_path()
        .map_err(|_| FeedgenError::InvalidUrl(format!("{} does not name a local file", url)))?;
    tracing::debug!(path = %path.display(), "reading local file");
    Ok(fs::read_to_string(path)?)
}

/// Serves fixed bodies keyed by URL and remembers what was asked for.
///
/// Unknown URLs answer with a 404 [`FeedgenError::HttpStatus`].
#[derive(Debug, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
    requests: Mutex<Vec<Request>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Every request served so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: &Request) -> Result<String> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        self.bodies
            .get(&request.url)
            .cloned()
            .ok_or_else(|| FeedgenError::HttpStatus { status: 404, url: request.url.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert!(config.user_agent.contains("feedgen"));
    }

    #[test]
    fn test_post_json_sets_content_type() {
        let req = Request::post_json("https://example.com/api", "{}").header("X-Xsrf-Token", "abc");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body.as_deref(), Some("{}"));
        assert!(req.headers.iter().any(|(k, v)| k == "Content-Type" && v == "application/json"));
        assert!(req.headers.iter().any(|(k, v)| k == "X-Xsrf-Token" && v == "abc"));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_http_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let body = fetcher.fetch(&Request::get(format!("{}/list", server.uri()))).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_http_post_sends_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(header("x-xsrf-token", "tok"))
            .and(body_string("{\"a\":1}"))
            .respond_with(ResponseTemplate::new(200).set_body_string(")]}'\n{}"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let request = Request::post_json(format!("{}/api", server.uri()), "{\"a\":1}").header("X-Xsrf-Token", "tok");
        assert_eq!(fetcher.fetch(&request).await.unwrap(), ")]}'\n{}");
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch(&Request::get(format!("{}/missing", server.uri()))).await.unwrap_err();
        assert!(matches!(err, FeedgenError::HttpStatus { status: 503, .. }));
        assert!(err.to_string().contains("503"));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2500)).set_body_string("slow"))
            .mount(&server)
            .await;

        let config = FetchConfig { timeout_secs: 1, ..Default::default() };
        let fetcher = HttpFetcher::new(config).unwrap();
        let err = fetcher.fetch(&Request::get(format!("{}/slow", server.uri()))).await.unwrap_err();
        assert!(matches!(err, FeedgenError::Timeout { timeout: 1 }));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_file_urls_are_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<p>local</p>").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();

        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        assert_eq!(fetcher.fetch(&Request::get(url.as_str())).await.unwrap(), "<p>local</p>");
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch(&Request::get("not-a-url")).await.unwrap_err();
        assert!(matches!(err, FeedgenError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_static_fetcher_serves_and_records() {
        let fetcher = StaticFetcher::new().with("https://example.com/a", "A");

        assert_eq!(fetcher.fetch(&Request::get("https://example.com/a")).await.unwrap(), "A");
        let err = fetcher.fetch(&Request::get("https://example.com/b")).await.unwrap_err();
        assert!(matches!(err, FeedgenError::HttpStatus { status: 404, .. }));
        assert_eq!(fetcher.requests().len(), 2);
    }
}
