//! Client-side counters and timings.
//!
//! Recorded through the `metrics` facade; a binary installs whatever
//! recorder it wants, and without one these calls are no-ops.

use std::time::Duration;

/// Terminal outcome of one upload: `ready`, `error`.
pub fn record_upload_outcome(outcome: &'static str) {
    metrics::counter!("docqa_uploads_total", "outcome" => outcome).increment(1);
}

/// Files refused before any upload started.
pub fn record_uploads_rejected(count: usize) {
    metrics::counter!("docqa_uploads_rejected_total").increment(count as u64);
}

/// An upload task's cancel handle was invoked: `completed`, `removed`, `shutdown`.
pub fn record_upload_task_cancelled(reason: &'static str) {
    metrics::counter!("docqa_upload_tasks_cancelled_total", "reason" => reason).increment(1);
}

/// Outcome of loading the document listing: `loaded`, `unavailable`.
pub fn record_documents_load(outcome: &'static str) {
    metrics::counter!("docqa_document_loads_total", "outcome" => outcome).increment(1);
}

/// Outcome of one insight fetch: `applied`, `failed`, `discarded`.
pub fn record_insight_fetch(outcome: &'static str) {
    metrics::counter!("docqa_insight_fetches_total", "outcome" => outcome).increment(1);
}

/// Outcome of one question: `answered`, `failed`, `discarded`.
pub fn record_answer(outcome: &'static str) {
    metrics::counter!("docqa_answers_total", "outcome" => outcome).increment(1);
}

/// Latency of a collaborator call, labelled by operation and status class.
pub fn record_call_duration(operation: &'static str, success: bool, elapsed: Duration) {
    let status = if success { "ok" } else { "error" };
    metrics::histogram!(
        "docqa_collaborator_call_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(elapsed.as_secs_f64());
}
