//! Scripted `HttpClient` double for deterministic measurement tests.
//!
//! Replies sleep on the tokio clock, so tests running with
//! `start_paused = true` observe exact elapsed times.

use crate::client::{HttpClient, HttpResponse, StreamedResponse};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of one scripted request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reply {
    delay: Duration,
    status: Option<u16>,
}

impl Reply {
    pub(crate) fn ok(delay_ms: u64) -> Self {
        Self::status(200, delay_ms)
    }

    pub(crate) fn status(status: u16, delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            status: Some(status),
        }
    }

    /// Transport error after the delay
    pub(crate) fn error(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            status: None,
        }
    }

    /// Never answers within any sane test horizon
    pub(crate) fn hang() -> Self {
        Self::ok(3_600_000)
    }

    async fn play(self) -> Result<u16> {
        tokio::time::sleep(self.delay).await;
        self.status
            .ok_or_else(|| AppError::network("scripted connection reset"))
    }
}

/// A GET body delivered as `(delay_ms, size)` chunks
#[derive(Debug, Clone)]
pub(crate) struct DownloadScript {
    pub status: u16,
    pub content_length: Option<u64>,
    pub chunks: Vec<(u64, usize)>,
    /// Yield a transport error after the last chunk
    pub break_after: bool,
}

impl DownloadScript {
    pub(crate) fn chunks(chunks: Vec<(u64, usize)>) -> Self {
        let total = chunks.iter().map(|(_, size)| *size as u64).sum();
        Self {
            status: 200,
            content_length: Some(total),
            chunks,
            break_after: false,
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Self {
            status,
            content_length: None,
            chunks: Vec::new(),
            break_after: false,
        }
    }
}

type HeadScript = Box<dyn Fn(&str, usize) -> Reply + Send + Sync>;
type PostScript = Box<dyn Fn(usize) -> Reply + Send + Sync>;

pub(crate) struct ScriptedClient {
    head: HeadScript,
    post: PostScript,
    downloads: HashMap<String, DownloadScript>,
    head_calls: Mutex<HashMap<String, usize>>,
    post_calls: AtomicUsize,
    posted_bytes: AtomicU64,
}

impl ScriptedClient {
    /// Every request fails immediately
    pub(crate) fn new() -> Self {
        Self {
            head: Box::new(|_, _| Reply::error(0)),
            post: Box::new(|_| Reply::error(0)),
            downloads: HashMap::new(),
            head_calls: Mutex::new(HashMap::new()),
            post_calls: AtomicUsize::new(0),
            posted_bytes: AtomicU64::new(0),
        }
    }

    /// `script(url, attempt_index)` decides each HEAD
    pub(crate) fn with_head<F>(mut self, script: F) -> Self
    where
        F: Fn(&str, usize) -> Reply + Send + Sync + 'static,
    {
        self.head = Box::new(script);
        self
    }

    /// `script(chunk_index)` decides each POST
    pub(crate) fn with_post<F>(mut self, script: F) -> Self
    where
        F: Fn(usize) -> Reply + Send + Sync + 'static,
    {
        self.post = Box::new(script);
        self
    }

    pub(crate) fn with_download(mut self, url: &str, script: DownloadScript) -> Self {
        self.downloads.insert(url.to_string(), script);
        self
    }

    pub(crate) fn post_calls(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn posted_bytes(&self) -> u64 {
        self.posted_bytes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn head(&self, url: &str) -> Result<HttpResponse> {
        let attempt = {
            let mut calls = self.head_calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let status_code = (self.head)(url, attempt).play().await?;
        Ok(HttpResponse {
            status_code,
            final_url: url.to_string(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<StreamedResponse> {
        let script = self
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::network(format!("scripted host unreachable: {}", url)))?;

        let chunks = futures::stream::iter(script.chunks).then(|(delay_ms, size)| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(Bytes::from(vec![0u8; size]))
        });
        let tail = futures::stream::iter(
            script
                .break_after
                .then(|| Err(AppError::network("scripted stream broken"))),
        );

        Ok(StreamedResponse {
            status_code: script.status,
            content_length: script.content_length,
            body: chunks.chain(tail).boxed(),
        })
    }

    async fn post(&self, url: &str, body: Bytes) -> Result<HttpResponse> {
        let index = self.post_calls.fetch_add(1, Ordering::SeqCst);
        let status_code = (self.post)(index).play().await?;
        if (200..300).contains(&status_code) {
            self.posted_bytes
                .fetch_add(body.len() as u64, Ordering::SeqCst);
        }
        Ok(HttpResponse {
            status_code,
            final_url: url.to_string(),
        })
    }
}
