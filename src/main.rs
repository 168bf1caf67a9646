use chrono::{DateTime, Utc};
use clap::Parser;
use eyre::{Context, Result, eyre};
use granola_export::{ExportConfig, ExportObserver, ProcessResult, filter, importer};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Export Granola meetings (notes, attendees, transcripts) to Markdown files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to export markdown files.
    /// Defaults to ./granola-export if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Path to Granola's cache file (cache-v3.json).
    /// Auto-detected if omitted.
    #[arg(long, value_name = "PATH")]
    cache: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/granola-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only export meetings created on or after this day (local time).
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_since_arg, conflicts_with = "days")]
    since: Option<DateTime<Utc>>,

    /// Only export meetings created in the last N days.
    #[arg(long, value_name = "N")]
    days: Option<u32>,

    /// Overwrite files that already exist.
    #[arg(short, long)]
    force: bool,

    /// Print each file written or skipped.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress bars).
    #[arg(short, long)]
    quiet: bool,

    /// Number of worker threads used to render and write files.
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Prefix each file with YAML frontmatter (id, title, attendees, ...).
    #[arg(long)]
    frontmatter: bool,

    /// Comma-separated tags to add to frontmatter (e.g. "meeting,granola").
    /// Implies --frontmatter.
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    cache_path: Option<PathBuf>,
    tags: Option<Vec<String>>,
    frontmatter: Option<bool>,
    jobs: Option<usize>,
}

fn parse_since_arg(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    filter::parse_since(raw).ok_or_else(|| format!("expected a date like 2024-03-01, got {raw:?}"))
}

fn expand_tilde(path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("granola-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Drives an indicatif bar from export progress.
struct ProgressReporter {
    bar: ProgressBar,
    verbose: bool,
}

impl ProgressReporter {
    fn new(quiet: bool, verbose: bool) -> Result<Self> {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
                )
                .wrap_err("Invalid progress template")?
                .progress_chars("=>-"),
            );
            bar
        };
        Ok(Self { bar, verbose })
    }
}

impl ExportObserver for ProgressReporter {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        if total > 0 {
            self.bar.println(format!("Found {} meetings.", total));
        }
    }

    fn processed(&self, filename: &str, result: ProcessResult) {
        if self.verbose {
            match result {
                ProcessResult::Created => self.bar.println(format!("Created:  {}", filename)),
                ProcessResult::Updated => self.bar.println(format!("Updated:  {}", filename)),
                ProcessResult::Skipped => self.bar.println(format!("Skipped:  {}", filename)),
            }
        }
        self.bar.inc(1);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve target_dir (CLI > Config > Default)
    let target_dir = expand_tilde(
        cli.target_dir
            .or(file_cfg.output_dir)
            .unwrap_or_else(|| PathBuf::from("granola-export")),
    );

    // 3. Resolve cache path (CLI > Config > Auto-detect)
    let cache_path = cli
        .cache
        .or(file_cfg.cache_path)
        .map(expand_tilde)
        .or_else(importer::default_cache_path)
        .ok_or_else(|| {
            eyre!("Could not determine the cache path.\nUse --cache to specify it manually, or set cache_path in config.toml.")
        })?;

    // 4. Date window, anchored to a single `now` for the whole run
    let now = Utc::now();
    let start = cli
        .since
        .or_else(|| cli.days.map(|d| filter::start_from_days(now, d)));

    fs::create_dir_all(&target_dir).wrap_err_with(|| {
        format!(
            "Failed to create target directory: {}",
            target_dir.display()
        )
    })?;

    // 5. Build the Export Config
    let config = ExportConfig {
        output_dir: target_dir,
        force: cli.force,
        start,
        jobs: cli.jobs.or(file_cfg.jobs).unwrap_or(1),
        frontmatter: cli.frontmatter || file_cfg.frontmatter.unwrap_or(false),
        tags: cli.tags.or(file_cfg.tags),
    };

    // 6. Run the Business Logic
    let cache = importer::read_cache(&cache_path).wrap_err(
        "Could not load the Granola cache. Check that Granola is installed and has been opened at least once",
    )?;
    let reporter = ProgressReporter::new(cli.quiet, cli.verbose)?;
    let summary = granola_export::export(&cache, &config, now, &reporter)?;
    reporter.bar.finish_and_clear();

    if !cli.quiet {
        if summary.is_empty() {
            eprintln!("No meetings found.");
        } else {
            eprintln!(
                "Done. {} exported ({} created, {} updated), {} skipped.",
                summary.exported(),
                summary.created,
                summary.updated,
                summary.skipped()
            );
        }
    }
    if cli.verbose && !summary.skipped_files.is_empty() {
        eprintln!("Skipped (use --force to overwrite):");
        for name in &summary.skipped_files {
            eprintln!("  {}", name);
        }
    }

    Ok(())
}
