// src/services/testing.rs

//! In-memory `Fetcher` for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use url::Url;

use crate::error::{FetchCause, FetchError};
use crate::services::fetcher::{FetchedPage, FetchedStream, Fetcher};

#[derive(Clone)]
enum Page {
    Html { final_url: Option<String>, body: String },
    Fail(FetchCause),
}

#[derive(Clone)]
struct Resource {
    chunks: Vec<Bytes>,
    delay: Duration,
    fail_after: Option<usize>,
    declare_length: bool,
}

/// Tracks how many streams are open at once.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(Arc::clone(self))
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct GaugeGuard(Arc<Gauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fake site: HTML pages for crawling, chunked resources for downloading.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Page>,
    resources: HashMap<String, Resource>,
    hits: Mutex<HashMap<String, usize>>,
    pub gauge: Arc<Gauge>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page::Html {
                final_url: None,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn redirect(mut self, url: &str, final_url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page::Html {
                final_url: Some(final_url.to_string()),
                body: body.to_string(),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str, cause: FetchCause) -> Self {
        self.pages.insert(url.to_string(), Page::Fail(cause));
        self
    }

    pub fn resource(mut self, url: &str, chunks: usize, chunk_len: usize, delay: Duration) -> Self {
        let chunks = (0..chunks)
            .map(|i| Bytes::from(vec![b'a' + (i % 26) as u8; chunk_len]))
            .collect();
        self.resources.insert(
            url.to_string(),
            Resource {
                chunks,
                delay,
                fail_after: None,
                declare_length: true,
            },
        );
        self
    }

    /// Resource whose stream errors after `ok_chunks` chunks.
    pub fn broken_resource(mut self, url: &str, ok_chunks: usize, chunk_len: usize) -> Self {
        self = self.resource(url, ok_chunks + 1, chunk_len, Duration::ZERO);
        if let Some(resource) = self.resources.get_mut(url) {
            resource.fail_after = Some(ok_chunks);
        }
        self
    }

    /// Resource served without a content length.
    pub fn unsized_resource(mut self, url: &str, chunks: usize, chunk_len: usize, delay: Duration) -> Self {
        self = self.resource(url, chunks, chunk_len, delay);
        if let Some(resource) = self.resources.get_mut(url) {
            resource.declare_length = false;
        }
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    fn hit(&self, url: &Url) {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_whole(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.hit(url);
        match self.pages.get(url.as_str()) {
            Some(Page::Html { final_url, body }) => Ok(FetchedPage {
                final_url: match final_url {
                    Some(u) => Url::parse(u).unwrap(),
                    None => url.clone(),
                },
                content_type: Some("text/html".to_string()),
                body: Bytes::from(body.clone()),
            }),
            Some(Page::Fail(cause)) => Err(FetchError::new(url, cause.clone())),
            None => Err(FetchError::status(url, 404)),
        }
    }

    async fn fetch_stream(&self, url: &Url) -> Result<FetchedStream, FetchError> {
        self.hit(url);
        let Some(resource) = self.resources.get(url.as_str()).cloned() else {
            return Err(FetchError::status(url, 404));
        };

        let guard = self.gauge.enter();
        let content_length = resource
            .declare_length
            .then(|| resource.chunks.iter().map(|c| c.len() as u64).sum());
        let source = url.clone();
        let fail_after = resource.fail_after;
        let delay = resource.delay;

        let chunks = stream::iter(resource.chunks.into_iter().enumerate())
            .then(move |(i, chunk)| {
                let source = source.clone();
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    match fail_after {
                        Some(n) if i >= n => Err(FetchError::network(&source, "connection reset")),
                        _ => Ok(chunk),
                    }
                }
            })
            .map(move |item| {
                let _open = &guard;
                item
            })
            .boxed();

        Ok(FetchedStream {
            final_url: url.clone(),
            content_length,
            chunks,
        })
    }
}
