//! File conventions for a per-domain recon workspace. Discovery tools (run outside
//! jsgrab) drop one link file each under `js_raw_sources/`.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

pub const RAW_SOURCES_DIR: &str = "js_raw_sources";
pub const DOWNLOAD_DIR: &str = "downloaded_jsfiles";
pub const DEFAULT_LINKS_FILE: &str = "final-js-links.txt";

/// Per-tool file suffixes, in merge order. Earlier sources win on duplicates.
pub const SOURCE_SUFFIXES: [&str; 5] = ["katanajs", "getjs", "gaujs", "wbujs", "hakrawlerjs"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainLayout {
    pub sources: Vec<PathBuf>,
    pub links: PathBuf,
    pub downloads: PathBuf,
}

impl DomainLayout {
    pub fn new(workdir: &Path, domain: &str) -> Result<Self> {
        let domain = domain.trim();
        if domain.is_empty() || domain.contains('/') || domain.contains('\\') || domain == "." || domain == ".." {
            bail!("invalid domain: {:?}", domain);
        }
        let raw = workdir.join(RAW_SOURCES_DIR);
        let sources = SOURCE_SUFFIXES
            .iter()
            .map(|s| raw.join(format!("{}_{}.txt", domain, s)))
            .collect();
        Ok(DomainLayout {
            sources,
            links: workdir.join(format!("{}_final-js-links.txt", domain)),
            downloads: workdir.join(DOWNLOAD_DIR),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_paths() {
        let l = DomainLayout::new(Path::new("work"), "example.com").unwrap();
        assert_eq!(l.sources.len(), 5);
        assert_eq!(l.sources[0], Path::new("work/js_raw_sources/example.com_katanajs.txt"));
        assert_eq!(l.sources[4], Path::new("work/js_raw_sources/example.com_hakrawlerjs.txt"));
        assert_eq!(l.links, Path::new("work/example.com_final-js-links.txt"));
        assert_eq!(l.downloads, Path::new("work/downloaded_jsfiles"));
    }

    #[test]
    fn rejects_path_like_domains() {
        assert!(DomainLayout::new(Path::new("."), "").is_err());
        assert!(DomainLayout::new(Path::new("."), "../etc").is_err());
        assert!(DomainLayout::new(Path::new("."), "..").is_err());
    }
}
