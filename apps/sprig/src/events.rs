//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::style;
use sprig_events::{
    AcquisitionEvent, AppEvent, CacheEvent, EventMessage, GeneralEvent, PipelineEvent,
};

/// Turns events into status lines on stderr and structured log records
pub struct EventHandler {
    /// Print status lines; off in JSON mode
    show_progress: bool,
    /// Also print debug-level events
    debug_enabled: bool,
}

impl EventHandler {
    pub fn new(show_progress: bool, debug_enabled: bool) -> Self {
        Self {
            show_progress,
            debug_enabled,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if !self.show_progress {
            return;
        }

        match message.event {
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                let context = context.map(|c| format!(" ({c})")).unwrap_or_default();
                self.show_warning(&format!("{message}{context}"));
            }
            AppEvent::General(GeneralEvent::Error { message, details }) => {
                let details = details.map(|d| format!(": {d}")).unwrap_or_default();
                self.show_error(&format!("{message}{details}"));
            }
            AppEvent::General(GeneralEvent::DebugLog { message, .. }) if self.debug_enabled => {
                self.show_status(&format!("debug: {message}"));
            }

            AppEvent::Acquisition(AcquisitionEvent::Started { package, mirror, .. }) => {
                match mirror {
                    Some(mirror) => self.show_status(&format!("Fetching {package} via {mirror}")),
                    None => self.show_status(&format!("Fetching {package}")),
                }
            }
            AppEvent::Acquisition(AcquisitionEvent::Retrying {
                url,
                attempt,
                delay_ms,
                reason,
            }) => {
                self.show_warning(&format!(
                    "Retrying {url} (attempt {attempt}, in {delay_ms}ms): {reason}"
                ));
            }
            AppEvent::Acquisition(AcquisitionEvent::Failed {
                package, failure, ..
            }) => {
                self.show_error(&format!("Download of {package} failed: {}", failure.message));
            }

            AppEvent::Cache(CacheEvent::CorruptionDetected {
                package, signature, ..
            }) => {
                self.show_warning(&format!(
                    "Cached record of {package} is corrupted ({signature}); fetching again"
                ));
            }
            AppEvent::Cache(CacheEvent::Hit { package, .. }) if self.debug_enabled => {
                self.show_status(&format!("{package} is cached"));
            }

            AppEvent::Pipeline(PipelineEvent::Started { total, concurrency }) => {
                self.show_status(&format!(
                    "Fetching {total} package(s), {concurrency} at a time"
                ));
            }
            AppEvent::Pipeline(PipelineEvent::PackageReady {
                package, cached, ..
            }) => {
                let how = if cached { "cached" } else { "fetched" };
                self.show_success(&format!("{package} {how}"));
            }
            AppEvent::Pipeline(PipelineEvent::PackageFailed { package, failure }) => {
                let hint = failure
                    .hint
                    .map(|hint| format!("\n    hint: {hint}"))
                    .unwrap_or_default();
                self.show_error(&format!("{package}: {}{hint}", failure.message));
            }
            AppEvent::Pipeline(PipelineEvent::Cancelled { pending, .. }) => {
                self.show_warning(&format!("Interrupted; {pending} package(s) not started"));
            }

            _ => {}
        }
    }

    fn show_status(&self, message: &str) {
        eprintln!("{} {message}", style("::").cyan());
    }

    fn show_success(&self, message: &str) {
        eprintln!("{} {message}", style("ok").green());
    }

    fn show_warning(&self, message: &str) {
        eprintln!("{} {message}", style("warning:").yellow().bold());
    }

    fn show_error(&self, message: &str) {
        eprintln!("{} {message}", style("error:").red().bold());
    }
}
