//! Diagnostic observers for shared composables.
//!
//! This module provides hooks for observing entry construction, sharing and
//! teardown, enabling structured logging, metrics and debugging of which
//! consumers keep which values alive.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{BoxError, ShareError, ShareResult};
use crate::internal::panic_message;
use crate::key::ParamKey;
use crate::scope::ScopeId;

/// Identifies the cache entry an observer event is about.
#[derive(Debug, Clone, Copy)]
pub struct EntryEvent<'a> {
    /// Name of the composable
    pub composable: &'a str,
    /// Scope owning the entry
    pub scope: ScopeId,
    /// Parameter key of the entry
    pub key: &'a ParamKey,
}

impl fmt::Display for EntryEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[{}]", self.composable, self.scope, self.key)
    }
}

/// Observer trait for shared entry lifecycle events.
///
/// Observer calls are made synchronously on the calling thread, never while
/// a cache lock is held. Keep implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_compose::{ComposableBuilder, EntryEvent, Scope, Shared, ShareObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     built: AtomicUsize,
/// }
///
/// impl ShareObserver for CountingObserver {
///     fn constructed(&self, _event: &EntryEvent<'_>, _duration: Duration) {
///         self.built.fetch_add(1, Ordering::SeqCst);
///     }
///
///     fn factory_panic(&self, event: &EntryEvent<'_>, message: &str) {
///         eprintln!("PANIC in {}: {}", event, message);
///     }
/// }
///
/// let observer = Arc::new(CountingObserver::default());
/// let size = ComposableBuilder::new()
///     .name("window-size")
///     .observer(observer.clone())
///     .shared(|_: &()| Shared::new((1024u32, 768u32)));
///
/// let scope = Scope::new();
/// size.get(&scope, &()).unwrap();
/// size.get(&scope, &()).unwrap();
/// assert_eq!(observer.built.load(Ordering::SeqCst), 1);
/// ```
pub trait ShareObserver: Send + Sync {
    /// Called before the factory runs for a new entry.
    fn constructing(&self, _event: &EntryEvent<'_>) {}

    /// Called after the factory produced the entry's value.
    fn constructed(&self, event: &EntryEvent<'_>, duration: Duration);

    /// Called when a call is served by an already constructed value.
    fn reused(&self, _event: &EntryEvent<'_>) {}

    /// Called after a consumer took a reference; `refs` is the new count.
    fn acquired(&self, _event: &EntryEvent<'_>, _refs: usize) {}

    /// Called after a consumer let go while others remain; `refs` is the new count.
    ///
    /// Also called with `refs == 0` when a failed construction is rolled back.
    fn released(&self, _event: &EntryEvent<'_>, _refs: usize) {}

    /// Called after the entry was removed and its cleanup ran.
    fn cleaned_up(&self, _event: &EntryEvent<'_>) {}

    /// Called when a fallible factory returned an error.
    fn factory_failed(&self, _event: &EntryEvent<'_>, _message: &str) {}

    /// Called when a factory panicked. The panic resumes after this call.
    fn factory_panic(&self, event: &EntryEvent<'_>, message: &str);
}

/// Container for registered observers.
///
/// Designed to have minimal overhead when no observers are registered.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ShareObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ShareObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Runs a factory, reporting its outcome.
    ///
    /// Errors become [`ShareError::Factory`]; panics are reported and resumed.
    pub(crate) fn run_factory<T>(
        &self,
        event: &EntryEvent<'_>,
        factory: impl FnOnce() -> Result<T, BoxError>,
    ) -> ShareResult<T> {
        self.constructing(event);
        let started = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(factory)) {
            Ok(Ok(value)) => {
                self.constructed(event, started.elapsed());
                Ok(value)
            }
            Ok(Err(source)) => {
                self.factory_failed(event, &source.to_string());
                Err(ShareError::Factory {
                    composable: event.composable.to_string(),
                    key: event.key.clone(),
                    source: Arc::from(source),
                })
            }
            Err(payload) => {
                self.factory_panic(event, &panic_message(payload.as_ref()));
                panic::resume_unwind(payload)
            }
        }
    }

    #[inline]
    pub(crate) fn constructing(&self, event: &EntryEvent<'_>) {
        for observer in &self.observers {
            observer.constructing(event);
        }
    }

    #[inline]
    pub(crate) fn constructed(&self, event: &EntryEvent<'_>, duration: Duration) {
        for observer in &self.observers {
            observer.constructed(event, duration);
        }
    }

    #[inline]
    pub(crate) fn reused(&self, event: &EntryEvent<'_>) {
        for observer in &self.observers {
            observer.reused(event);
        }
    }

    #[inline]
    pub(crate) fn acquired(&self, event: &EntryEvent<'_>, refs: usize) {
        for observer in &self.observers {
            observer.acquired(event, refs);
        }
    }

    #[inline]
    pub(crate) fn released(&self, event: &EntryEvent<'_>, refs: usize) {
        for observer in &self.observers {
            observer.released(event, refs);
        }
    }

    #[inline]
    pub(crate) fn cleaned_up(&self, event: &EntryEvent<'_>) {
        for observer in &self.observers {
            observer.cleaned_up(event);
        }
    }

    #[inline]
    pub(crate) fn factory_failed(&self, event: &EntryEvent<'_>, message: &str) {
        for observer in &self.observers {
            observer.factory_failed(event, message);
        }
    }

    #[inline]
    pub(crate) fn factory_panic(&self, event: &EntryEvent<'_>, message: &str) {
        for observer in &self.observers {
            observer.factory_panic(event, message);
        }
    }
}

/// Built-in observer that logs events through the `log` facade.
///
/// Lifecycle events are logged at `debug`, reuse at `trace`, failures at
/// `warn` and `error`. Install any `log` backend to see them.
///
/// ```
/// use ferrous_compose::{ComposableBuilder, LoggingObserver, Shared};
/// use std::sync::Arc;
///
/// let mouse = ComposableBuilder::new()
///     .name("mouse")
///     .observer(Arc::new(LoggingObserver::new()))
///     .shared(|_: &()| Shared::new((0i32, 0i32)));
/// # let _ = mouse;
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-compose]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareObserver for LoggingObserver {
    fn constructing(&self, event: &EntryEvent<'_>) {
        log::debug!("{} Constructing: {}", self.prefix, event);
    }

    fn constructed(&self, event: &EntryEvent<'_>, duration: Duration) {
        log::debug!("{} Constructed: {} in {:?}", self.prefix, event, duration);
    }

    fn reused(&self, event: &EntryEvent<'_>) {
        log::trace!("{} Reused: {}", self.prefix, event);
    }

    fn acquired(&self, event: &EntryEvent<'_>, refs: usize) {
        log::trace!("{} Acquired: {} (refs={})", self.prefix, event, refs);
    }

    fn released(&self, event: &EntryEvent<'_>, refs: usize) {
        log::debug!("{} Released: {} (refs={})", self.prefix, event, refs);
    }

    fn cleaned_up(&self, event: &EntryEvent<'_>) {
        log::debug!("{} Cleaned up: {}", self.prefix, event);
    }

    fn factory_failed(&self, event: &EntryEvent<'_>, message: &str) {
        log::warn!("{} FACTORY FAILED in {}: {}", self.prefix, event, message);
    }

    fn factory_panic(&self, event: &EntryEvent<'_>, message: &str) {
        log::error!("{} FACTORY PANIC in {}: {}", self.prefix, event, message);
    }
}

/// Observer that counts lifecycle events.
///
/// Useful for asserting construction and cleanup counts, and for spotting
/// values that are rebuilt more often than expected.
pub struct MetricsObserver {
    constructions: AtomicU64,
    construction_time: AtomicU64,
    reuses: AtomicU64,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    cleanups: AtomicU64,
    failures: AtomicU64,
    panics: AtomicU64,
}

impl MetricsObserver {
    /// Creates a new metrics observer.
    pub fn new() -> Self {
        Self {
            constructions: AtomicU64::new(0),
            construction_time: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            acquisitions: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            cleanups: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            panics: AtomicU64::new(0),
        }
    }

    /// Number of factory runs that produced a value.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Number of calls served by an existing value.
    pub fn reuses(&self) -> u64 {
        self.reuses.load(Ordering::Relaxed)
    }

    /// Number of references taken.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Number of references dropped without tearing down a value.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Number of entries torn down.
    pub fn cleanups(&self) -> u64 {
        self.cleanups.load(Ordering::Relaxed)
    }

    /// Number of factory errors.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of factory panics.
    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    /// Total time spent in factories.
    pub fn total_construction_time(&self) -> Duration {
        Duration::from_nanos(self.construction_time.load(Ordering::Relaxed))
    }

    /// Average factory time, if anything was constructed.
    pub fn average_construction_time(&self) -> Option<Duration> {
        let count = self.constructions();
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.construction_time.load(Ordering::Relaxed) / count))
    }

    /// Resets all counters.
    pub fn reset(&self) {
        for counter in [
            &self.constructions,
            &self.construction_time,
            &self.reuses,
            &self.acquisitions,
            &self.releases,
            &self.cleanups,
            &self.failures,
            &self.panics,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareObserver for MetricsObserver {
    fn constructed(&self, _event: &EntryEvent<'_>, duration: Duration) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
        self.construction_time.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn reused(&self, _event: &EntryEvent<'_>) {
        self.reuses.fetch_add(1, Ordering::Relaxed);
    }

    fn acquired(&self, _event: &EntryEvent<'_>, _refs: usize) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    fn released(&self, _event: &EntryEvent<'_>, _refs: usize) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    fn cleaned_up(&self, _event: &EntryEvent<'_>) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }

    fn factory_failed(&self, _event: &EntryEvent<'_>, _message: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn factory_panic(&self, _event: &EntryEvent<'_>, _message: &str) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }
}
