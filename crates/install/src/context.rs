//! Fetch context and per-package event scope

use sprig_events::{EventEmitter, EventSender};
use sprig_types::PackageInfo;

/// Packages to bring into the cache, plus how to report on them
#[derive(Clone, Debug, Default)]
pub struct FetchContext {
    /// Package models, in the order they should be scheduled
    pub packages: Vec<PackageInfo>,

    /// Fetch again even when a healthy record is cached
    pub force: bool,

    /// Event sender for progress reporting
    pub event_sender: Option<EventSender>,
}

impl FetchContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_package(mut self, package: PackageInfo) -> Self {
        self.packages.push(package);
        self
    }

    #[must_use]
    pub fn with_packages(mut self, packages: Vec<PackageInfo>) -> Self {
        self.packages = packages;
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Event scope for one package, correlated by its identity
    #[must_use]
    pub fn package_scope(&self, package: &PackageInfo) -> PackageScope {
        PackageScope::new(self.event_sender.clone(), package.identity())
    }
}

impl EventEmitter for FetchContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// Emitter whose events all carry the package identity as correlation id
#[derive(Clone, Debug)]
pub struct PackageScope {
    sender: Option<EventSender>,
    package: String,
}

impl PackageScope {
    #[must_use]
    pub fn new(sender: Option<EventSender>, package: impl Into<String>) -> Self {
        Self {
            sender,
            package: package.into(),
        }
    }

    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }
}

impl EventEmitter for PackageScope {
    fn event_sender(&self) -> Option<&EventSender> {
        self.sender.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        Some(&self.package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_events::channel;
    use sprig_types::{Provenance, SourceKind};

    #[test]
    fn scope_correlates_by_package() {
        let (tx, mut rx) = channel();
        let package = PackageInfo::new(
            "zlib",
            SourceKind::ChannelIndex,
            Provenance::ChannelAuthoritative,
        );
        let context = FetchContext::new()
            .add_package(package.clone())
            .with_event_sender(tx);

        let scope = context.package_scope(&package);
        scope.emit_debug("hello");

        let message = rx.try_recv().unwrap();
        assert_eq!(
            message.meta.correlation_id.as_deref(),
            Some(package.identity().as_str())
        );
        assert_eq!(scope.package(), package.identity());
    }
}
