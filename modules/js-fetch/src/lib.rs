//! Bounded concurrent download of script URLs into index-prefixed files.

use anyhow::{Context, Result};
use jsgrab_core::slots::SlotPool;
use jsgrab_core::strip_query;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Name used when a URL has no usable last path segment.
pub const DEFAULT_FILE_NAME: &str = "script.js";
pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub concurrency: usize,
    /// Per-request timeout, covering connect through the last body byte.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("jsgrab/{}", jsgrab_core::version()),
        }
    }
}

/// Terminal failure for a single URL. None of these stop the other downloads.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("failed to create {}: {source}", .path.display())]
    Create { path: PathBuf, source: std::io::Error },
    #[error("body read failed after {written} bytes: {source}")]
    Read { written: u64, source: reqwest::Error },
    #[error("write to {} failed: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

impl FetchError {
    /// Network side failures, as opposed to local file errors.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Request(_) | FetchError::Read { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// URLs that reached a terminal outcome.
    pub attempted: usize,
    /// URLs whose body was fully written.
    pub downloaded: usize,
    pub bytes: u64,
}

/// Last path segment of `url` once the query string is gone, or [`DEFAULT_FILE_NAME`].
pub fn derive_file_name(url: &str) -> String {
    let base = strip_query(url);
    let segment = match Url::parse(base).ok().and_then(|u| {
        u.path_segments().and_then(|mut s| s.next_back().map(str::to_string))
    }) {
        Some(s) => s,
        None => {
            let no_frag = base.split('#').next().unwrap_or("");
            no_frag.rsplit('/').next().unwrap_or("").to_string()
        }
    };
    match segment.as_str() {
        "" | "." | ".." => DEFAULT_FILE_NAME.to_string(),
        _ => segment,
    }
}

/// `{dir}/{index+1}_{name}`. The position prefix keeps same-named scripts apart.
pub fn destination_path(dir: &Path, index: usize, url: &str) -> PathBuf {
    dir.join(format!("{}_{}", index + 1, derive_file_name(url)))
}

/// Create the download directory (and parents). Failure here aborts a run.
pub fn prepare_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create download directory {}", dir.display()))
}

pub fn build_client(opts: &FetchOptions) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(opts.timeout_ms))
        .user_agent(opts.user_agent.clone())
        .brotli(true)
        .gzip(true)
        .deflate(true)
        .build()
        .context("failed to build HTTP client")
}

/// GET `url` and stream the body into `path`. Returns bytes written.
/// A partial file is left in place when the transfer breaks off.
pub async fn fetch_one(client: &Client, url: &str, path: &Path) -> Result<u64, FetchError> {
    let mut resp = client.get(url).send().await.map_err(FetchError::Request)?;
    let status = resp.status();
    if !status.is_success() {
        debug!(%url, status = status.as_u16(), "non-success status, storing body anyway");
    }

    let mut file = File::create(path)
        .await
        .map_err(|source| FetchError::Create { path: path.to_path_buf(), source })?;

    let mut written = 0u64;
    loop {
        let chunk = match resp.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(source) => {
                // keep whatever arrived on disk
                let _ = file.flush().await;
                return Err(FetchError::Read { written, source });
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|source| FetchError::Write { path: path.to_path_buf(), source })?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|source| FetchError::Write { path: path.to_path_buf(), source })?;
    Ok(written)
}

/// Download every URL into `dest` with at most `opts.concurrency` requests in flight.
/// Returns once all of them reached a terminal outcome. Per-URL failures are logged
/// and only reflected in the summary counts.
pub async fn fetch_all(urls: Vec<String>, dest: &Path, opts: FetchOptions) -> Result<FetchSummary> {
    let client = build_client(&opts)?;
    let pool = SlotPool::new(opts.concurrency);
    let downloaded = Arc::new(AtomicUsize::new(0));
    let bytes = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::with_capacity(urls.len());
    for (i, url) in urls.into_iter().enumerate() {
        let slot = pool.acquire().await?;
        let client = client.clone();
        let path = destination_path(dest, i, &url);
        let downloaded = downloaded.clone();
        let bytes = bytes.clone();
        handles.push(tokio::spawn(async move {
            match fetch_one(&client, &url, &path).await {
                Ok(n) => {
                    downloaded.fetch_add(1, Ordering::SeqCst);
                    bytes.fetch_add(n, Ordering::SeqCst);
                    debug!(%url, path = %path.display(), bytes = n, "downloaded");
                }
                Err(e) => {
                    warn!(%url, path = %path.display(), network = e.is_network(), error = %e, "download failed");
                }
            }
            drop(slot);
        }));
    }

    let attempted = handles.len();
    for h in handles {
        if let Err(e) = h.await {
            warn!(error = %e, "download task aborted");
        }
    }

    let summary = FetchSummary {
        attempted,
        downloaded: downloaded.load(Ordering::SeqCst),
        bytes: bytes.load(Ordering::SeqCst),
    };
    info!(
        dest = %dest.display(),
        concurrency = pool.capacity(),
        attempted,
        downloaded = summary.downloaded,
        "fetch finished"
    );
    Ok(summary)
}
