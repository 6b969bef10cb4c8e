// src/services/fetcher.rs

//! Network fetch primitive shared by the crawler and download workers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;

/// A fully read response body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchedPage {
    /// Whether the body should be treated as markup.
    ///
    /// A missing content type is assumed to be HTML.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_none_or(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/html") || ct.starts_with("application/xhtml")
        })
    }
}

/// Lazy chunks of a response body. Dropping it releases the connection.
pub type ChunkStream = BoxStream<'static, std::result::Result<Bytes, FetchError>>;

/// A response whose body has not been read yet.
pub struct FetchedStream {
    pub final_url: Url,
    pub content_length: Option<u64>,
    pub chunks: ChunkStream,
}

impl std::fmt::Debug for FetchedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedStream")
            .field("final_url", &self.final_url)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Single HTTP GET, either whole-body or streamed. Never retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_whole(&self, url: &Url) -> std::result::Result<FetchedPage, FetchError>;

    async fn fetch_stream(&self, url: &Url) -> std::result::Result<FetchedStream, FetchError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a fetcher with a client configured from `config`.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?, config.timeout()))
    }

    fn check_status(url: &Url, response: Response) -> std::result::Result<Response, FetchError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(FetchError::status(url, status.as_u16()))
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_whole(&self, url: &Url) -> std::result::Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        let response = Self::check_status(url, response)?;

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        Ok(FetchedPage {
            final_url,
            content_type,
            body,
        })
    }

    async fn fetch_stream(&self, url: &Url) -> std::result::Result<FetchedStream, FetchError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::timeout(url))?
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        let response = Self::check_status(url, response)?;

        let final_url = response.url().clone();
        let content_length = response.content_length();
        let idle = self.timeout;
        let source = url.clone();
        let body = Box::pin(response.bytes_stream());

        // The first error ends the stream.
        let chunks = stream::unfold(Some(body), move |state| {
            let source = source.clone();
            async move {
                let mut body = state?;
                match tokio::time::timeout(idle, body.next()).await {
                    Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                    Ok(Some(Err(e))) => Some((Err(FetchError::from_reqwest(&source, &e)), None)),
                    Ok(None) => None,
                    Err(_) => Some((Err(FetchError::timeout(&source)), None)),
                }
            }
        })
        .boxed();

        Ok(FetchedStream {
            final_url,
            content_length,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(content_type: Option<&str>) -> FetchedPage {
        FetchedPage {
            final_url: Url::parse("https://example.com/").unwrap(),
            content_type: content_type.map(str::to_string),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_is_html() {
        assert!(page(None).is_html());
        assert!(page(Some("text/html; charset=utf-8")).is_html());
        assert!(page(Some("application/xhtml+xml")).is_html());
        assert!(!page(Some("image/png")).is_html());
        assert!(!page(Some("application/pdf")).is_html());
    }

    #[test]
    fn test_from_default_config() {
        assert!(HttpFetcher::from_config(&CrawlerConfig::default()).is_ok());
    }
}
