//! Merge then fetch, handing off through the merged link file.

use anyhow::Result;
use js_fetch::{FetchOptions, FetchSummary};
use link_merge::MergeSummary;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub merge: MergeSummary,
    /// `None` when the fetch stage did not run.
    pub fetch: Option<FetchSummary>,
}

/// Merge `inputs` into `links`. When `downloads` is set and at least one link was
/// merged, fetch every link into that directory.
pub async fn run(
    inputs: &[PathBuf],
    links: &Path,
    downloads: Option<&Path>,
    opts: FetchOptions,
) -> Result<PipelineReport> {
    let merge = link_merge::merge_links(inputs, links)?;
    let Some(dir) = downloads else {
        return Ok(PipelineReport { merge, fetch: None });
    };
    if merge.unique == 0 {
        info!("no script links merged, skipping fetch");
        return Ok(PipelineReport { merge, fetch: None });
    }

    js_fetch::prepare_dir(dir)?;
    let urls = link_merge::read_links(links)?;
    let fetch = js_fetch::fetch_all(urls, dir, opts).await?;
    Ok(PipelineReport { merge, fetch: Some(fetch) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn empty_merge_skips_fetch() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, "http://x/style.css\n").unwrap();
        let links = dir.path().join("links.txt");
        let downloads = dir.path().join("dl");

        let r = run(&[src], &links, Some(&downloads), FetchOptions::default()).await.unwrap();
        assert_eq!(r.merge.unique, 0);
        assert!(r.fetch.is_none());
        assert!(!downloads.exists(), "download dir must not be created when nothing merged");
        assert_eq!(fs::read_to_string(&links).unwrap(), "");
    }

    #[tokio::test]
    async fn merge_only_without_download_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, "http://127.0.0.1:1/a.js\n").unwrap();
        let links = dir.path().join("links.txt");

        let r = run(&[src], &links, None, FetchOptions::default()).await.unwrap();
        assert_eq!(r.merge.unique, 1);
        assert!(r.fetch.is_none());
    }

    #[tokio::test]
    async fn merged_links_feed_the_fetcher() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "http://127.0.0.1:1/a.js?v=1\n").unwrap();
        fs::write(&b, "http://127.0.0.1:1/a.js?v=2\nhttp://127.0.0.1:1/b.js\n").unwrap();
        let links = dir.path().join("links.txt");
        let downloads = dir.path().join("dl");
        let opts = FetchOptions { concurrency: 2, timeout_ms: 2_000, ..FetchOptions::default() };

        let r = run(&[a, b], &links, Some(&downloads), opts).await.unwrap();
        assert_eq!(r.merge.unique, 2);
        let f = r.fetch.unwrap();
        assert_eq!(f.attempted, 2);
        assert_eq!(f.downloaded, 0);
        assert!(downloads.is_dir());
    }
}
