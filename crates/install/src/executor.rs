//! Bounded parallel executor over the fetch-extract pipeline

use crate::context::{FetchContext, PackageScope};
use crate::pipeline::{PackageFetcher, PackageOutcome};
use sprig_errors::{Error, InstallError};
use sprig_events::{AppEvent, EventEmitter, FailureContext, PipelineEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result for one scheduled package
#[derive(Debug)]
pub struct PackageResult {
    /// Package identity
    pub package: String,
    pub outcome: Result<PackageOutcome, Error>,
}

/// Outcome of a whole batch, in input order
#[derive(Debug, Default)]
pub struct FetchReport {
    pub results: Vec<PackageResult>,
    /// Packages never scheduled because of cancellation
    pub skipped: Vec<String>,
    pub cancelled: bool,
    pub duration: Duration,
}

impl FetchReport {
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.count(|outcome| matches!(outcome, Ok(PackageOutcome { cached: false, .. })))
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.count(|outcome| matches!(outcome, Ok(PackageOutcome { cached: true, .. })))
    }

    /// Packages that failed; abandoned-on-cancel ones are not counted
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Err(e) if !matches!(e, Error::Cancelled)))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&Result<PackageOutcome, Error>) -> bool) -> usize {
        self.results
            .iter()
            .filter(|result| predicate(&result.outcome))
            .count()
    }
}

/// Runs one pipeline per package with at most `concurrency` in flight
#[derive(Debug)]
pub struct FetchExecutor {
    fetcher: Arc<PackageFetcher>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl FetchExecutor {
    #[must_use]
    pub fn new(fetcher: Arc<PackageFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn fetcher(&self) -> &Arc<PackageFetcher> {
        &self.fetcher
    }

    /// Token that stops scheduling when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bring every package in `context` into the cache
    ///
    /// Failures are per package and collected in the report. After
    /// cancellation no new pipeline starts; running ones finish or clean up
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::NoPackagesSpecified` for an empty context and
    /// `InstallError::ConcurrencyError` if the worker permits are closed.
    pub async fn execute(&self, context: &FetchContext) -> Result<FetchReport, Error> {
        if context.packages.is_empty() {
            return Err(InstallError::NoPackagesSpecified.into());
        }

        let start = Instant::now();
        let total = context.packages.len();
        context.emit(AppEvent::Pipeline(PipelineEvent::Started {
            total,
            concurrency: self.concurrency,
        }));
        info!(total, concurrency = self.concurrency, "starting fetch pipeline");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut scheduled = 0;

        for (index, model) in context.packages.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                permit = acquire_permit(semaphore.clone()) => permit?,
            };

            let fetcher = self.fetcher.clone();
            let cancel = self.cancel.clone();
            let scope = context.package_scope(model);
            let model = model.clone();
            let force = context.force;

            debug!(package = %scope.package(), "scheduling package");
            tasks.spawn(async move {
                let _permit: OwnedSemaphorePermit = permit;
                let outcome = fetcher.process(&model, force, &scope, &cancel).await;
                report_package(&scope, &outcome);
                (index, scope.package().to_string(), outcome)
            });
            scheduled += 1;
        }

        let cancelled = self.cancel.is_cancelled();
        let skipped: Vec<String> = context.packages[scheduled..]
            .iter()
            .map(sprig_types::PackageInfo::identity)
            .collect();
        if cancelled {
            warn!(pending = skipped.len(), "cancelled, not scheduling remaining packages");
            context.emit(AppEvent::Pipeline(PipelineEvent::Cancelled {
                scheduled,
                pending: skipped.len(),
            }));
        }

        let mut results = Vec::with_capacity(scheduled);
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| InstallError::TaskError {
                message: e.to_string(),
            })?;
            results.push(result);
        }
        results.sort_by_key(|(index, _, _)| *index);

        let report = FetchReport {
            results: results
                .into_iter()
                .map(|(_, package, outcome)| PackageResult { package, outcome })
                .collect(),
            skipped,
            cancelled,
            duration: start.elapsed(),
        };

        context.emit(AppEvent::Pipeline(PipelineEvent::Completed {
            fetched: report.fetched(),
            cached: report.cached(),
            failed: report.failed(),
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        }));
        info!(
            fetched = report.fetched(),
            cached = report.cached(),
            failed = report.failed(),
            "fetch pipeline finished"
        );

        Ok(report)
    }
}

async fn acquire_permit(semaphore: Arc<Semaphore>) -> Result<OwnedSemaphorePermit, Error> {
    semaphore.acquire_owned().await.map_err(|_| {
        InstallError::ConcurrencyError {
            message: "fetch worker permits closed".to_string(),
        }
        .into()
    })
}

fn report_package(scope: &PackageScope, outcome: &Result<PackageOutcome, Error>) {
    match outcome {
        Ok(outcome) => {
            scope.emit(AppEvent::Pipeline(PipelineEvent::PackageReady {
                package: scope.package().to_string(),
                cached: outcome.cached,
                provenance: outcome.provenance.clone(),
            }));
        }
        Err(Error::Cancelled) => {
            debug!(package = %scope.package(), "package abandoned after cancellation");
        }
        Err(error) => {
            warn!(package = %scope.package(), error = %error, "package failed");
            scope.emit(AppEvent::Pipeline(PipelineEvent::PackageFailed {
                package: scope.package().to_string(),
                failure: FailureContext::from_error(error),
            }));
        }
    }
}
