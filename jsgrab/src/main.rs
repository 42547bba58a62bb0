use anyhow::Result;
#[cfg(all(feature = "merge", feature = "fetch"))]
use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
#[cfg(any(feature = "merge", feature = "fetch"))]
use std::time::Instant;
#[cfg(any(feature = "merge", feature = "fetch"))]
use time::format_description::well_known::Rfc3339;
#[cfg(any(feature = "merge", feature = "fetch"))]
use time::OffsetDateTime;

mod config;
mod layout;
mod logging;
#[cfg(all(feature = "merge", feature = "fetch"))]
mod pipeline;

#[cfg(any(feature = "merge", feature = "fetch"))]
fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[cfg(any(feature = "merge", feature = "fetch"))]
fn resolve_format(flag: Option<OutputFormat>, cfg: Option<&str>) -> Result<OutputFormat> {
    if let Some(f) = flag {
        return Ok(f);
    }
    match cfg {
        None => Ok(OutputFormat::Text),
        Some(s) => OutputFormat::from_str(s, true)
            .map_err(|e| anyhow::anyhow!("invalid format {:?} in config: {}", s, e)),
    }
}

#[cfg(feature = "fetch")]
fn fetch_options(
    cfg: &config::FetchConfig,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
) -> js_fetch::FetchOptions {
    let defaults = js_fetch::FetchOptions::default();
    js_fetch::FetchOptions {
        concurrency: concurrency.or(cfg.concurrency).unwrap_or(defaults.concurrency).max(1),
        timeout_ms: timeout_secs
            .or(cfg.timeout_secs)
            .map(|s| s.saturating_mul(1000))
            .unwrap_or(defaults.timeout_ms),
        user_agent: user_agent.or_else(|| cfg.user_agent.clone()).unwrap_or(defaults.user_agent),
    }
}

#[cfg(feature = "merge")]
fn merge_json(out: &std::path::Path, s: &link_merge::MergeSummary) -> serde_json::Value {
    serde_json::json!({
        "output": out,
        "unique": s.unique,
        "candidates": s.candidates,
        "sources_read": s.sources_read,
        "sources_skipped": s.sources_skipped,
    })
}

#[cfg(feature = "fetch")]
fn fetch_json(dir: &std::path::Path, s: &js_fetch::FetchSummary) -> serde_json::Value {
    serde_json::json!({
        "dir": dir,
        "attempted": s.attempted,
        "downloaded": s.downloaded,
        "bytes": s.bytes,
    })
}

#[cfg(feature = "merge")]
fn merge_line(out: &std::path::Path, s: &link_merge::MergeSummary) -> String {
    format!("[+] Wrote {} unique JS links (ignoring query params) to {}", s.unique, out.display())
}

#[cfg(feature = "fetch")]
fn fetch_line(s: &js_fetch::FetchSummary) -> String {
    format!("[+] Downloaded {} JS files.", s.downloaded)
}

#[cfg(feature = "fetch")]
const NOTHING_FOUND: &str = "[!] No JS files found. Exiting.";

#[derive(Debug, Parser)]
#[command(name = "jsgrab", version, about = "Merge, deduplicate and download discovered JavaScript URLs")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./jsgrab.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter (e.g. info, debug, link_merge=trace). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Merge link files into one list, deduplicated by URL without query string
    #[cfg(feature = "merge")]
    Merge {
        /// Link files, one URL per line. Earlier files win on duplicates.
        inputs: Vec<PathBuf>,
        /// Output file (overwritten). Default: final-js-links.txt
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Output format: text or json
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Download every URL of a link file into index-prefixed files
    #[cfg(feature = "fetch")]
    Fetch {
        /// Link file, one URL per line
        #[arg(long, value_name = "FILE")]
        links: PathBuf,
        /// Download directory (created if missing). Default: downloaded_jsfiles
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Max concurrent downloads (default 20)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-request timeout in seconds (default 20)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// User-Agent header
        #[arg(long)]
        user_agent: Option<String>,
        /// Output format: text or json
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Merge discovered link files, then optionally download the merged set
    #[cfg(all(feature = "merge", feature = "fetch"))]
    Run {
        /// Target domain; selects the js_raw_sources/ layout under --workdir
        #[arg(long)]
        domain: Option<String>,
        /// Working directory for the domain layout
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
        /// Explicit link files (repeatable). Overrides the domain sources.
        #[arg(long = "input", value_name = "FILE")]
        inputs: Vec<PathBuf>,
        /// Merged link file (overwritten)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Download directory (created if missing)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Download the merged links after merging
        #[arg(short = 'i', long, default_value_t = false)]
        download: bool,
        /// Max concurrent downloads (default 20)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-request timeout in seconds (default 20)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// User-Agent header
        #[arg(long)]
        user_agent: Option<String>,
        /// Output format: text or json
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded_cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let log_cfg = loaded_cfg.log();
    logging::init(
        cli.log_file.as_deref().or(log_cfg.file.as_deref()),
        cli.log_level.as_deref().or(log_cfg.level.as_deref()),
    );

    match cli.command {
        Commands::Version => {
            println!("jsgrab {} (core {})", env!("CARGO_PKG_VERSION"), jsgrab_core::version());
        }
        #[cfg(feature = "merge")]
        Commands::Merge { inputs, out, format } => {
            let mcfg = loaded_cfg.merge();
            let format = resolve_format(format, mcfg.format.as_deref())?;
            let out = out.or(mcfg.output).unwrap_or_else(|| PathBuf::from(layout::DEFAULT_LINKS_FILE));
            let started = Instant::now();
            let started_at = now_rfc3339();
            let summary = link_merge::merge_links(&inputs, &out)?;
            let duration_ms = started.elapsed().as_millis();
            match format {
                OutputFormat::Text => println!("{}", merge_line(&out, &summary)),
                OutputFormat::Json => {
                    let mut obj = merge_json(&out, &summary);
                    obj["started_at"] = serde_json::json!(started_at);
                    obj["ended_at"] = serde_json::json!(now_rfc3339());
                    obj["duration_ms"] = serde_json::json!(duration_ms);
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
        }
        #[cfg(feature = "fetch")]
        Commands::Fetch { links, dir, concurrency, timeout_secs, user_agent, format } => {
            let fcfg = loaded_cfg.fetch();
            let format = resolve_format(format, fcfg.format.as_deref())?;
            let dir = dir.or_else(|| fcfg.dir.clone()).unwrap_or_else(|| PathBuf::from(layout::DOWNLOAD_DIR));
            let opts = fetch_options(&fcfg, concurrency, timeout_secs, user_agent);

            let urls = link_merge::read_links(&links)?;
            if urls.is_empty() {
                match format {
                    OutputFormat::Text => println!("{}", NOTHING_FOUND),
                    OutputFormat::Json => println!("{}", serde_json::to_string(&fetch_json(&dir, &js_fetch::FetchSummary::default()))?),
                }
                return Ok(());
            }
            js_fetch::prepare_dir(&dir)?;
            let started = Instant::now();
            let started_at = now_rfc3339();
            let rt = tokio::runtime::Runtime::new()?;
            let dir_for_fetch = dir.clone();
            let summary = rt.block_on(async move { js_fetch::fetch_all(urls, &dir_for_fetch, opts).await })?;
            let duration_ms = started.elapsed().as_millis();
            match format {
                OutputFormat::Text => println!("{}", fetch_line(&summary)),
                OutputFormat::Json => {
                    let mut obj = fetch_json(&dir, &summary);
                    obj["started_at"] = serde_json::json!(started_at);
                    obj["ended_at"] = serde_json::json!(now_rfc3339());
                    obj["duration_ms"] = serde_json::json!(duration_ms);
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
        }
        #[cfg(all(feature = "merge", feature = "fetch"))]
        Commands::Run { domain, workdir, inputs, out, dir, download, concurrency, timeout_secs, user_agent, format } => {
            let mcfg = loaded_cfg.merge();
            let fcfg = loaded_cfg.fetch();
            let format = resolve_format(format, mcfg.format.as_deref().or(fcfg.format.as_deref()))?;
            let domain_layout = match domain.as_deref() {
                Some(d) => Some(layout::DomainLayout::new(&workdir, d)?),
                None => None,
            };
            let inputs = match (&domain_layout, inputs.is_empty()) {
                (_, false) => inputs,
                (Some(l), true) => l.sources.clone(),
                (None, true) => bail!("provide --domain or at least one --input <file>"),
            };
            let out = out
                .or_else(|| domain_layout.as_ref().map(|l| l.links.clone()))
                .or(mcfg.output)
                .unwrap_or_else(|| workdir.join(layout::DEFAULT_LINKS_FILE));
            let downloads = dir
                .or_else(|| domain_layout.as_ref().map(|l| l.downloads.clone()))
                .or_else(|| fcfg.dir.clone())
                .unwrap_or_else(|| workdir.join(layout::DOWNLOAD_DIR));
            let opts = fetch_options(&fcfg, concurrency, timeout_secs, user_agent);

            let started = Instant::now();
            let started_at = now_rfc3339();
            let rt = tokio::runtime::Runtime::new()?;
            let out_for_run = out.clone();
            let downloads_for_run = downloads.clone();
            let report = rt.block_on(async move {
                let dl = if download { Some(downloads_for_run.as_path()) } else { None };
                pipeline::run(&inputs, &out_for_run, dl, opts).await
            })?;
            let duration_ms = started.elapsed().as_millis();
            match format {
                OutputFormat::Text => {
                    println!("{}", merge_line(&out, &report.merge));
                    if report.merge.unique == 0 {
                        println!("{}", NOTHING_FOUND);
                    } else if let Some(f) = &report.fetch {
                        println!("{}", fetch_line(f));
                    }
                }
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "domain": domain,
                        "merge": merge_json(&out, &report.merge),
                        "fetch": report.fetch.as_ref().map(|f| fetch_json(&downloads, f)),
                        "started_at": started_at,
                        "ended_at": now_rfc3339(),
                        "duration_ms": duration_ms,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(feature = "merge", feature = "fetch"))]
    #[test]
    fn format_flag_beats_config() {
        assert_eq!(resolve_format(Some(OutputFormat::Text), Some("json")).unwrap(), OutputFormat::Text);
        assert_eq!(resolve_format(None, Some("json")).unwrap(), OutputFormat::Json);
        assert_eq!(resolve_format(None, Some("JSON")).unwrap(), OutputFormat::Json);
        assert_eq!(resolve_format(None, None).unwrap(), OutputFormat::Text);
    }

    #[cfg(any(feature = "merge", feature = "fetch"))]
    #[test]
    fn unknown_config_format_is_rejected() {
        assert!(resolve_format(None, Some("jsn")).is_err());
        assert!(resolve_format(Some(OutputFormat::Json), Some("jsn")).is_ok());
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn fetch_flags_beat_config() {
        let cfg = config::FetchConfig {
            concurrency: Some(4),
            timeout_secs: Some(5),
            user_agent: Some("from-config".into()),
            ..Default::default()
        };
        let o = fetch_options(&cfg, Some(8), Some(2), Some("from-flag".into()));
        assert_eq!(o.concurrency, 8);
        assert_eq!(o.timeout_ms, 2_000);
        assert_eq!(o.user_agent, "from-flag");
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn config_beats_defaults() {
        let cfg = config::FetchConfig {
            concurrency: Some(4),
            timeout_secs: Some(5),
            user_agent: Some("from-config".into()),
            ..Default::default()
        };
        let o = fetch_options(&cfg, None, None, None);
        assert_eq!(o.concurrency, 4);
        assert_eq!(o.timeout_ms, 5_000);
        assert_eq!(o.user_agent, "from-config");

        let d = fetch_options(&config::FetchConfig::default(), None, None, None);
        assert_eq!(d.concurrency, js_fetch::DEFAULT_CONCURRENCY);
        assert_eq!(d.timeout_ms, js_fetch::DEFAULT_TIMEOUT_MS);
        assert!(d.user_agent.starts_with("jsgrab/"));
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn zero_concurrency_is_clamped() {
        let cfg = config::FetchConfig { concurrency: Some(0), ..Default::default() };
        assert_eq!(fetch_options(&cfg, None, None, None).concurrency, 1);
        assert_eq!(fetch_options(&config::FetchConfig::default(), Some(0), None, None).concurrency, 1);
    }

    #[cfg(all(feature = "merge", feature = "fetch"))]
    #[test]
    fn run_accepts_short_download_flag() {
        let cli = Cli::try_parse_from(["jsgrab", "run", "--domain", "example.com", "-i"]).unwrap();
        match cli.command {
            Commands::Run { domain, download, .. } => {
                assert_eq!(domain.as_deref(), Some("example.com"));
                assert!(download);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
