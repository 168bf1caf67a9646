use crate::error::Result;
use crate::filter::select_documents;
use crate::importer::ParsedCache;
use crate::utils::{ExportConfig, ExportObserver, ExportSummary, export_document, output_filename};
use chrono::{DateTime, Utc};
use tracing::info;

/// Export every included document on the calling thread, one file at a time.
/// The first write failure aborts the run.
pub fn execute(
    cache: &ParsedCache,
    config: &ExportConfig,
    now: DateTime<Utc>,
    observer: &dyn ExportObserver,
) -> Result<ExportSummary> {
    let docs = select_documents(cache, now, config.start);
    info!(included = docs.len(), "selected documents");
    observer.started(docs.len());

    let mut summary = ExportSummary::default();
    for doc in docs {
        let filename = output_filename(doc);
        let result = export_document(doc, &filename, cache, config)?;
        observer.processed(&filename, result);
        summary.record(filename, result);
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped(),
        "export finished"
    );
    Ok(summary)
}
