//! Structured logging integration for events
//!
//! Every event that reaches the CLI is also written to the tracing
//! subscriber with its metadata as structured fields.

use sprig_events::{
    AcquisitionEvent, AppEvent, CacheEvent, EventMessage, GeneralEvent, PipelineEvent,
};
use tracing::{debug, error, info, warn};

/// Log an event at its level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref().unwrap_or("-");

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(source, correlation, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, correlation, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, correlation, context = ?context, "{message}");
            }
        },

        AppEvent::Acquisition(event) => match event {
            AcquisitionEvent::Started {
                package,
                url,
                mirror,
            } => {
                info!(
                    source,
                    event_id = %meta.event_id,
                    package = %package,
                    url = %url,
                    mirror = ?mirror,
                    "Download started"
                );
            }
            AcquisitionEvent::Retrying {
                url,
                attempt,
                delay_ms,
                reason,
            } => {
                warn!(
                    source,
                    correlation,
                    url = %url,
                    attempt,
                    delay_ms,
                    reason = %reason,
                    "Retrying download"
                );
            }
            AcquisitionEvent::Completed {
                package,
                url,
                size,
                sha256,
            } => {
                info!(
                    source,
                    package = %package,
                    url = %url,
                    size,
                    sha256 = %sha256,
                    "Download completed"
                );
            }
            AcquisitionEvent::Failed {
                package,
                url,
                failure,
            } => {
                error!(
                    source,
                    package = %package,
                    url = %url,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Download failed"
                );
            }
        },

        AppEvent::Cache(event) => match event {
            CacheEvent::Hit { package, path } => {
                debug!(source, package = %package, path = %path, "Cache hit");
            }
            CacheEvent::Miss { package, reason } => {
                debug!(source, package = %package, reason = ?reason, "Cache miss");
            }
            CacheEvent::CorruptionDetected {
                package,
                path,
                signature,
            } => {
                warn!(
                    source,
                    package = %package,
                    path = %path,
                    signature = %signature,
                    "Corrupted cache record"
                );
            }
            CacheEvent::RecordWritten {
                package,
                path,
                provenance,
            } => {
                info!(
                    source,
                    package = %package,
                    path = %path,
                    provenance = %provenance,
                    "Record written"
                );
            }
            CacheEvent::VerificationCompleted {
                healthy,
                corrupted,
                missing,
                unreadable,
            } => {
                info!(
                    source,
                    healthy, corrupted, missing, unreadable, "Cache verification completed"
                );
            }
        },

        AppEvent::Pipeline(event) => match event {
            PipelineEvent::Started { total, concurrency } => {
                info!(source, total, concurrency, "Fetch started");
            }
            PipelineEvent::PackageReady {
                package,
                cached,
                provenance,
            } => {
                info!(
                    source,
                    package = %package,
                    cached,
                    provenance = %provenance,
                    "Package ready"
                );
            }
            PipelineEvent::PackageFailed { package, failure } => {
                error!(
                    source,
                    package = %package,
                    code = ?failure.code,
                    message = %failure.message,
                    retryable = failure.retryable,
                    "Package failed"
                );
            }
            PipelineEvent::Cancelled { scheduled, pending } => {
                warn!(source, scheduled, pending, "Fetch cancelled");
            }
            PipelineEvent::Completed {
                fetched,
                cached,
                failed,
                duration_ms,
            } => {
                info!(source, fetched, cached, failed, duration_ms, "Fetch completed");
            }
        },
    }
}
