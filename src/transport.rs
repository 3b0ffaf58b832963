use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{CorpusError, Result};

/// User agent sent with every request; GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!("github-corpus/", env!("CARGO_PKG_VERSION"));

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Header value as text, if present and valid
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Issues GET requests on behalf of the searcher and downloader.
///
/// Implementations return `Err` only for transport-level failures; HTTP error
/// statuses come back as ordinary responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CorpusError::fetch("<client>", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CorpusError::InvalidArgument(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CorpusError::InvalidArgument(format!("header {}: {}", name, e)))?;
            header_map.insert(name, value);
        }

        debug!("Requesting URL: {}", url);
        let response = self
            .client
            .get(url)
            .headers(header_map)
            .send()
            .await
            .map_err(|e| CorpusError::fetch(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| CorpusError::fetch(url, e))?
            .to_vec();

        debug!("{} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
