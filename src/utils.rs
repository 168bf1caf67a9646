use crate::error::{Error, Result};
use crate::importer::{Document, ParsedCache};
use crate::renderer::{self, RenderOptions};
use crate::resolve::JoinedMeeting;
use chrono::{DateTime, Local, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Already resolved and existing.
    pub output_dir: PathBuf,
    pub force: bool,
    /// Lower bound of the creation-time window; the upper bound is the run's `now`.
    pub start: Option<DateTime<Utc>>,
    /// Worker threads for rendering and writing. `1` keeps everything on the calling thread.
    pub jobs: usize,
    pub frontmatter: bool,
    pub tags: Option<Vec<String>>,
}

impl ExportConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            force: false,
            start: None,
            jobs: 1,
            frontmatter: false,
            tags: None,
        }
    }

    fn render_options(&self) -> RenderOptions<'_> {
        RenderOptions {
            frontmatter: self.frontmatter,
            tags: self.tags.as_deref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    Created,
    /// An existing file was replaced because `force` was set.
    Updated,
    Skipped,
}

/// Outcome of a run, reported once every document has been handled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped_files: Vec<String>,
}

impl ExportSummary {
    pub fn record(&mut self, filename: String, result: ProcessResult) {
        match result {
            ProcessResult::Created => self.created += 1,
            ProcessResult::Updated => self.updated += 1,
            ProcessResult::Skipped => self.skipped_files.push(filename),
        }
    }

    pub fn exported(&self) -> usize {
        self.created + self.updated
    }

    pub fn skipped(&self) -> usize {
        self.skipped_files.len()
    }

    /// No document passed the filter.
    pub fn is_empty(&self) -> bool {
        self.exported() == 0 && self.skipped() == 0
    }
}

/// Progress hooks for a presentation layer. Called from worker threads in parallel runs.
pub trait ExportObserver: Sync {
    fn started(&self, _total: usize) {}
    fn processed(&self, _filename: &str, _result: ProcessResult) {}
}

impl ExportObserver for () {}

/// Lower-case, runs of anything outside `[a-z0-9]` become one hyphen, no leading or trailing hyphens.
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// `YYYY-MM-DD-<slug>.md`, dated by the UTC creation day.
pub fn output_filename(doc: &Document) -> String {
    let date = doc
        .created()
        .map(|c| c.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let untitled = || slugify(&format!("untitled-meeting-{}", doc.id));
    let slug = match doc.title.as_deref() {
        Some(t) if doc.has_title() => {
            let s = slugify(t);
            if s.is_empty() { untitled() } else { s }
        }
        _ => untitled(),
    };
    format!("{date}-{slug}.md")
}

/// Render and write one document unless its file exists and `force` is off.
pub fn export_document(
    doc: &Document,
    filename: &str,
    cache: &ParsedCache,
    config: &ExportConfig,
) -> Result<ProcessResult> {
    let path = config.output_dir.join(filename);
    let exists = path.try_exists().map_err(|source| Error::WriteFailure {
        path: path.clone(),
        source,
    })?;
    if exists && !config.force {
        debug!(id = %doc.id, file = filename, "skipped existing");
        return Ok(ProcessResult::Skipped);
    }

    let meeting = JoinedMeeting::join(doc, cache);
    let content = renderer::render_meeting(&meeting, &Local, config.render_options());
    write_file(&path, &content)?;

    let result = if exists {
        ProcessResult::Updated
    } else {
        ProcessResult::Created
    };
    debug!(id = %doc.id, file = filename, ?result, "wrote");
    Ok(result)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    let wrap = |source| Error::WriteFailure {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(wrap)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes()).map_err(wrap)?;
    writer.flush().map_err(wrap)
}
