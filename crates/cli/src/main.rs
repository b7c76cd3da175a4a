use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use feedgen_core::{
    FeedSource, FetchConfig, HackerOneSource, HttpFetcher, ItemHooks, OutputFormat, RcaSource, RunContext, SourceConfig,
    StateStore, SyzbotSource, TrackerSource, build_feed,
};
use owo_colors::OwoColorize;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which feed(s) to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    All,
    Css,
    Rss,
    HackerOne,
    ProjectZero,
    ProjectZeroRca,
    Syzbot,
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "css" => Ok(Self::Css),
            "rss" => Ok(Self::Rss),
            "h1" => Ok(Self::HackerOne),
            "p0" => Ok(Self::ProjectZero),
            "p0rca" => Ok(Self::ProjectZeroRca),
            "syzbot" => Ok(Self::Syzbot),
            _ => Err(format!("Invalid feed: {}. Valid options: all, css, rss, h1, p0, p0rca, syzbot", s)),
        }
    }
}

/// Generate RSS, Atom and JSON feeds from web pages and trackers
#[derive(Parser, Debug)]
#[command(name = "feedgen")]
#[command(author = "Feedgen Contributors")]
#[command(version = VERSION)]
#[command(about = "Generate feeds from web pages and trackers", long_about = None)]
struct Args {
    /// Feed to build (all, css, rss, h1, p0, p0rca, syzbot)
    #[arg(short, long, default_value = "all", value_name = "FEED")]
    feed: FeedKind,

    /// Output format (rss, atom, json)
    #[arg(short = 't', long, default_value = "rss", value_name = "FORMAT")]
    format: OutputFormat,

    /// Output file for a single feed (default: <OUTPUT_DIR>/<name>.<ext>)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory feeds are written to
    #[arg(long, default_value = "./rss_output", value_name = "DIR")]
    output_dir: PathBuf,

    /// Directory holding per-source reconciliation state
    #[arg(short, long, default_value = "./workdir", value_name = "DIR")]
    workdir: PathBuf,

    /// Source configuration file (required for css and rss)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory scanned for *.json source configurations when building all feeds
    #[arg(long, default_value = "./configs", value_name = "DIR")]
    config_dir: PathBuf,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "15", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Where a job's source comes from. Sources are built lazily so that a broken
/// configuration only fails its own job.
#[derive(Debug, Clone)]
enum JobSource {
    HackerOne,
    Tracker,
    Rca,
    Syzbot,
    Config { path: PathBuf, expect: Option<&'static str> },
}

#[derive(Debug, Clone)]
struct Job {
    name: String,
    source: JobSource,
    output: PathBuf,
}

impl Job {
    fn build_source(&self) -> anyhow::Result<Box<dyn FeedSource>> {
        let source: Box<dyn FeedSource> = match &self.source {
            JobSource::HackerOne => Box::new(HackerOneSource::new(ItemHooks::new())),
            JobSource::Tracker => Box::new(TrackerSource::new(ItemHooks::new().resurface_updated())),
            JobSource::Rca => Box::new(RcaSource::new(ItemHooks::new())?),
            JobSource::Syzbot => Box::new(SyzbotSource::new(ItemHooks::new())?),
            JobSource::Config { path, expect } => {
                let config = SourceConfig::from_file(path)
                    .with_context(|| format!("Failed to load config: {}", path.display()))?;
                if let Some(expect) = expect
                    && config.kind() != *expect
                {
                    anyhow::bail!("{} is a {} config, expected {}", path.display(), config.kind(), expect);
                }
                config.into_source(&self.name).with_context(|| format!("Invalid config: {}", path.display()))?
            }
        };
        Ok(source)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn default_output(args: &Args, name: &str) -> PathBuf {
    args.output_dir.join(format!("{}.{}", name, args.format.extension()))
}

fn config_name(path: &Path) -> anyhow::Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("Config file has no usable name: {}", path.display()))
}

/// Config files in `dir`, sorted by name so runs are reproducible.
fn discover_configs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read config directory: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn plan_jobs(args: &Args) -> anyhow::Result<Vec<Job>> {
    let single = |name: &str, source: JobSource| {
        let output = args.output.clone().unwrap_or_else(|| default_output(args, name));
        Job { name: name.to_string(), source, output }
    };

    let configured = |expect: &'static str| -> anyhow::Result<Job> {
        let path = args.config.clone().with_context(|| format!("--config is required for --feed {}", expect))?;
        let name = config_name(&path)?;
        Ok(single(&name, JobSource::Config { path, expect: Some(expect) }))
    };

    Ok(match args.feed {
        FeedKind::HackerOne => vec![single("hackerone", JobSource::HackerOne)],
        FeedKind::ProjectZero => vec![single("projectzero", JobSource::Tracker)],
        FeedKind::ProjectZeroRca => vec![single("projectzerorca", JobSource::Rca)],
        FeedKind::Syzbot => vec![single("syzbot", JobSource::Syzbot)],
        FeedKind::Css => vec![configured("css")?],
        FeedKind::Rss => vec![configured("rss")?],
        FeedKind::All => {
            if args.output.is_some() {
                anyhow::bail!("--output names a single file; use --output-dir with --feed all");
            }

            let mut jobs = vec![
                Job {
                    name: "hackerone".to_string(),
                    source: JobSource::HackerOne,
                    output: default_output(args, "hackerone"),
                },
                Job {
                    name: "projectzero".to_string(),
                    source: JobSource::Tracker,
                    output: default_output(args, "projectzero"),
                },
                Job {
                    name: "projectzerorca".to_string(),
                    source: JobSource::Rca,
                    output: default_output(args, "projectzerorca"),
                },
                Job { name: "syzbot".to_string(), source: JobSource::Syzbot, output: default_output(args, "syzbot") },
            ];
            for path in discover_configs(&args.config_dir)? {
                let name = config_name(&path)?;
                let output = default_output(args, &name);
                jobs.push(Job { name, source: JobSource::Config { path, expect: None }, output });
            }
            jobs
        }
    })
}

async fn run_job(job: &Job, ctx: &RunContext<'_>, format: OutputFormat) -> anyhow::Result<usize> {
    let source = job.build_source()?;
    let feed = build_feed(source.as_ref(), ctx).await.with_context(|| format!("Failed to build feed {}", job.name))?;
    let rendered = format.render(&feed).with_context(|| format!("Failed to render {} as {}", job.name, format))?;

    if let Some(parent) = job.output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&job.output, &rendered).with_context(|| format!("Failed to write to file: {}", job.output.display()))?;

    tracing::debug!(feed = %job.name, items = feed.items.len(), path = %job.output.display(), "wrote feed");
    Ok(rendered.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let jobs = plan_jobs(&args)?;
    if jobs.is_empty() {
        echo::print_warning("No feeds to build");
        return Ok(());
    }

    let config = FetchConfig {
        timeout_secs: args.timeout,
        user_agent: args.user_agent.clone().unwrap_or_else(|| FetchConfig::default().user_agent),
    };
    let fetcher = HttpFetcher::new(config).context("Failed to create HTTP client")?;
    let store = StateStore::open(&args.workdir)
        .with_context(|| format!("Failed to open state directory: {}", args.workdir.display()))?;
    let ctx = RunContext::new(&fetcher, OffsetDateTime::now_utc()).with_store(&store);

    let total = jobs.len();
    let mut outcomes = Vec::with_capacity(total);
    for (i, job) in jobs.iter().enumerate() {
        echo::print_step(i + 1, total, &format!("Building {}", job.name.bright_white()));

        match run_job(job, &ctx, args.format).await {
            Ok(bytes) => {
                echo::print_success(&format!(
                    "{} written to {} ({})",
                    job.name,
                    job.output.display().bright_white(),
                    echo::format_size(bytes)
                ));
                outcomes.push((job.name.clone(), Ok(bytes)));
            }
            Err(err) => {
                echo::print_error(&format!("{}: {:#}", job.name, err));
                outcomes.push((job.name.clone(), Err(format!("{:#}", err))));
            }
        }
    }

    if args.verbose || total > 1 {
        echo::print_summary(&outcomes);
    }

    let failed: Vec<&str> = outcomes.iter().filter(|(_, o)| o.is_err()).map(|(n, _)| n.as_str()).collect();
    if !failed.is_empty() {
        anyhow::bail!("{} of {} feeds failed: {}", failed.len(), total, failed.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("feedgen").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_feed_kind_from_str() {
        assert_eq!(FeedKind::from_str("P0").unwrap(), FeedKind::ProjectZero);
        assert_eq!(FeedKind::from_str("p0rca").unwrap(), FeedKind::ProjectZeroRca);
        assert_eq!(FeedKind::from_str("h1").unwrap(), FeedKind::HackerOne);
        assert!(FeedKind::from_str("apple").is_err());
    }

    #[test]
    fn test_single_feed_output_defaults_to_output_dir() {
        let args = parse(&["-f", "syzbot", "-t", "atom", "--output-dir", "out"]);
        let jobs = plan_jobs(&args).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].output, PathBuf::from("out/syzbot.atom"));
    }

    #[test]
    fn test_css_requires_config() {
        let args = parse(&["-f", "css"]);
        assert!(plan_jobs(&args).is_err());
    }

    #[test]
    fn test_css_job_named_after_config() {
        let args = parse(&["-f", "css", "-c", "configs/changelog.json"]);
        let jobs = plan_jobs(&args).unwrap();
        assert_eq!(jobs[0].name, "changelog");
        assert_eq!(jobs[0].output, PathBuf::from("./rss_output/changelog.rss"));
    }

    #[test]
    fn test_all_includes_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let args = parse(&["--config-dir", dir.path().to_str().unwrap()]);
        let names: Vec<_> = plan_jobs(&args).unwrap().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["hackerone", "projectzero", "projectzerorca", "syzbot", "a", "b"]);
    }

    #[test]
    fn test_all_rejects_single_output() {
        let args = parse(&["-o", "feed.xml"]);
        assert!(plan_jobs(&args).is_err());
    }
}
