use crate::error::{Error, Result};
use crate::filter::select_documents;
use crate::importer::{Document, ParsedCache};
use crate::utils::{
    ExportConfig, ExportObserver, ExportSummary, ProcessResult, export_document, output_filename,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::{SendTimeoutError, bounded};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Documents sharing one output filename, in processing order.
struct Job<'a> {
    index: usize,
    filename: String,
    docs: Vec<&'a Document>,
}

/// Same results as [`crate::sequential::execute`], with rendering and writing
/// spread over `config.jobs` worker threads.
///
/// Each filename is owned by exactly one job, so no two workers ever check or
/// write the same path.
pub fn execute(
    cache: &ParsedCache,
    config: &ExportConfig,
    now: DateTime<Utc>,
    observer: &dyn ExportObserver,
) -> Result<ExportSummary> {
    let docs = select_documents(cache, now, config.start);
    info!(included = docs.len(), workers = config.jobs, "selected documents");
    observer.started(docs.len());

    let jobs = group_by_filename(docs);
    let n_workers = config.jobs.max(1);
    let (tx, rx) = bounded::<Job<'_>>(n_workers * 2);
    let outcomes: Mutex<Vec<(usize, String, Vec<ProcessResult>)>> = Mutex::new(Vec::new());
    let first_error: Mutex<Option<Error>> = Mutex::new(None);
    let should_stop = AtomicBool::new(false);

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let rx = rx.clone();
            let (outcomes, first_error, should_stop) = (&outcomes, &first_error, &should_stop);

            s.spawn(move || {
                while let Ok(job) = rx.recv() {
                    if should_stop.load(Ordering::Relaxed) {
                        break;
                    }

                    let mut results = Vec::with_capacity(job.docs.len());
                    for doc in &job.docs {
                        match export_document(doc, &job.filename, cache, config) {
                            Ok(result) => {
                                observer.processed(&job.filename, result);
                                results.push(result);
                            }
                            Err(e) => {
                                should_stop.store(true, Ordering::Relaxed);
                                let mut slot =
                                    first_error.lock().unwrap_or_else(PoisonError::into_inner);
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                                return;
                            }
                        }
                    }

                    outcomes
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((job.index, job.filename, results));
                }
            });
        }

        drop(rx);

        'outer: for job in jobs {
            let mut pending = job;
            loop {
                if should_stop.load(Ordering::Relaxed) {
                    break 'outer;
                }
                match tx.send_timeout(pending, Duration::from_millis(50)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Disconnected(_)) => break 'outer,
                    Err(SendTimeoutError::Timeout(j)) => pending = j,
                }
            }
        }

        drop(tx);
    });

    if let Some(e) = first_error
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        debug!(error = %e, "worker failed, aborting run");
        return Err(e);
    }

    let mut outcomes = outcomes
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut summary = ExportSummary::default();
    for (_, filename, results) in outcomes {
        for result in results {
            summary.record(filename.clone(), result);
        }
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped(),
        "export finished"
    );
    Ok(summary)
}

fn group_by_filename(docs: Vec<&Document>) -> Vec<Job<'_>> {
    let mut jobs: Vec<Job<'_>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let filename = output_filename(doc);
        match by_name.get(&filename) {
            Some(&i) => jobs[i].docs.push(doc),
            None => {
                by_name.insert(filename.clone(), jobs.len());
                jobs.push(Job {
                    index: jobs.len(),
                    filename,
                    docs: vec![doc],
                });
            }
        }
    }
    jobs
}
