//! # granola-export
//!
//! Exports meetings from the [Granola](https://granola.ai) desktop app's local cache to
//! standalone Markdown files, one per meeting.
//!
//! ## What it does
//!
//! Granola keeps documents, transcripts and per-meeting metadata in a single JSON cache
//! file (`cache-v3.json`) whose payload is itself a JSON string. This crate decodes that
//! payload, joins the three record sets by document id, keeps the valid, undeleted
//! meetings (optionally only those created since a given date) and writes each one as
//! `YYYY-MM-DD-<title-slug>.md` with its time, attendees, notes and transcript.
//!
//! The cache is opened **read-only**; your data is never modified.
//!
//! ## Re-running
//!
//! Files that already exist in the output directory are left alone and reported as
//! skipped. Pass `--force` to rewrite them.
//!
//! ## Usage
//!
//! ```sh
//! # Export everything
//! granola-export ~/notes/meetings
//!
//! # Only meetings from the last two weeks, rewriting existing files
//! granola-export ~/notes/meetings --days 14 --force
//! ```
//!
//! Preferences can be persisted in `~/.config/granola-export/config.toml`.
pub mod error;
pub mod filter;
pub mod importer;
pub mod parallel;
pub mod renderer;
pub mod resolve;
pub mod sequential;
pub mod utils;

pub use error::{Error, ParseStage, Result};
pub use utils::{ExportConfig, ExportObserver, ExportSummary, ProcessResult};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Export an already parsed cache. `now` closes the date window and is fixed for the run.
pub fn export(
    cache: &importer::ParsedCache,
    config: &ExportConfig,
    now: DateTime<Utc>,
    observer: &dyn ExportObserver,
) -> Result<ExportSummary> {
    if config.jobs > 1 {
        parallel::execute(cache, config, now, observer)
    } else {
        sequential::execute(cache, config, now, observer)
    }
}

/// One full run: load and parse the cache file, then export.
pub fn run(
    cache_path: &Path,
    config: &ExportConfig,
    observer: &dyn ExportObserver,
) -> Result<ExportSummary> {
    let cache = importer::read_cache(cache_path)?;
    export(&cache, config, Utc::now(), observer)
}
