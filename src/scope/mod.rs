//! Scopes: lifetime boundaries that key the shared caches.
//!
//! This module contains the [`Scope`] and [`Consumer`] handles and the
//! thread-local ambient context used by `get_current`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{ShareError, ShareResult};
use crate::internal::sync::Mutex;
use crate::internal::{DisposeBag, Hook};
use crate::traits::ScopeContext;

mod ambient;
mod consumer;

pub use ambient::{current, run_in, with_current, AmbientGuard};
pub use consumer::Consumer;
pub(crate) use consumer::ConsumerInner;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scope or consumer. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// A lifetime boundary with a destruction hook registrar.
///
/// A `Scope` is a cheap-clone handle; clones refer to the same scope. Shared
/// composables cache one value per scope (and per argument key) and release
/// their references when the scope is destroyed.
///
/// # Lifetime Behavior
///
/// - [`destroy`](Scope::destroy) destroys live consumers, then fires this
///   scope's hooks in LIFO order, exactly once.
/// - Dropping the last handle without `destroy` discards the hooks without
///   running them. Caches only hold the scope weakly, so their buckets for it
///   are swept later and cleanups never run.
///
/// # Examples
///
/// ```
/// use ferrous_compose::Scope;
/// use std::sync::{Arc, Mutex};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let scope = Scope::labeled("request");
///
/// let l = log.clone();
/// scope.on_destroy(move || l.lock().unwrap().push("first")).unwrap();
/// let l = log.clone();
/// scope.on_destroy(move || l.lock().unwrap().push("second")).unwrap();
///
/// scope.destroy().unwrap();
/// assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
/// assert!(scope.is_destroyed());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

pub(crate) struct ScopeInner {
    id: ScopeId,
    label: Option<String>,
    hooks: Mutex<DisposeBag>,
    consumers: Mutex<Vec<Weak<ConsumerInner>>>,
    destroyed: AtomicBool,
}

/// Weak handle to a [`Scope`]; does not keep the scope alive.
#[derive(Clone)]
pub struct WeakScope {
    id: ScopeId,
    inner: Weak<ScopeInner>,
}

impl Scope {
    /// Creates a new, live scope.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a new scope with a label used in logs.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::build(Some(label.into()))
    }

    fn build(label: Option<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::next(),
                label,
                hooks: Mutex::new(DisposeBag::default()),
                consumers: Mutex::new(Vec::new()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns this scope's identity.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Returns the label, if any.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Returns true once [`destroy`](Scope::destroy) has started.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Returns true if both handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a weak handle.
    pub fn downgrade(&self) -> WeakScope {
        WeakScope { id: self.inner.id, inner: Arc::downgrade(&self.inner) }
    }

    /// Registers a hook fired once when this scope is destroyed.
    pub fn on_destroy<F>(&self, hook: F) -> ShareResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_destroy_boxed(Box::new(hook))
    }

    /// Number of hooks waiting for destruction.
    pub fn pending_hooks(&self) -> usize {
        self.inner.hooks.lock().len()
    }

    /// Creates a consumer of this scope.
    ///
    /// The consumer shares this scope's cached entries but holds its own
    /// references to them.
    pub fn consumer(&self) -> ShareResult<Consumer> {
        let mut consumers = self.inner.consumers.lock();
        if self.is_destroyed() {
            return Err(ShareError::ScopeDestroyed(self.id()));
        }
        let consumer = Consumer::new(self.clone());
        consumers.retain(|weak| weak.strong_count() > 0);
        consumers.push(consumer.downgrade_inner());
        Ok(consumer)
    }

    /// Destroys the scope.
    ///
    /// Live consumers are destroyed first (most recent first), then this
    /// scope's own hooks run in LIFO order. A panicking hook does not stop the
    /// others; the panics are reported as [`ShareError::HookPanicked`].
    /// Destroying an already destroyed scope is a no-op.
    pub fn destroy(&self) -> ShareResult<()> {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let consumers = std::mem::take(&mut *self.inner.consumers.lock());
        let mut panicked = 0;
        for consumer in consumers.iter().rev().filter_map(Weak::upgrade) {
            panicked += consumer.destroy_hooks();
        }

        let mut bag = std::mem::take(&mut *self.inner.hooks.lock());
        panicked += bag.run_all_reverse();

        log::debug!("destroyed {}", self);
        if panicked > 0 {
            return Err(ShareError::HookPanicked { scope: self.id(), count: panicked });
        }
        Ok(())
    }

    /// Runs `f` with this scope as the ambient context.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        run_in(self, f)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.label {
            Some(label) => write!(f, "{} ({})", self.inner.id, label),
            None => write!(f, "{}", self.inner.id),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ScopeContext for Scope {
    fn scope(&self) -> &Scope {
        self
    }

    fn on_destroy_boxed(&self, hook: Hook) -> ShareResult<()> {
        let mut hooks = self.inner.hooks.lock();
        // Checked under the lock so no hook slips in after destroy took the bag
        if self.is_destroyed() {
            return Err(ShareError::ScopeDestroyed(self.id()));
        }
        hooks.push(hook);
        Ok(())
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let bag = self.hooks.get_mut();
        if !self.destroyed.load(Ordering::Acquire) && !bag.is_empty() {
            log::debug!(
                "{} dropped without destroy; discarding {} destruction hook(s)",
                self.id,
                bag.len()
            );
        }
    }
}

impl WeakScope {
    /// Identity of the referenced scope, valid even after it is dropped.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Upgrades to a strong handle if the scope is still alive.
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }

    /// Returns true while some strong handle exists.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScope")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ids_are_unique() {
        let a = Scope::new();
        let b = Scope::new();
        assert_ne!(a.id(), b.id());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn destroy_runs_hooks_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let scope = Scope::new();
        let c = count.clone();
        scope.on_destroy(move || { c.fetch_add(1, Ordering::SeqCst); }).unwrap();
        assert_eq!(scope.pending_hooks(), 1);

        scope.destroy().unwrap();
        scope.destroy().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scope.pending_hooks(), 0);
    }

    #[test]
    fn registering_after_destroy_fails() {
        let scope = Scope::new();
        scope.destroy().unwrap();
        assert!(matches!(
            scope.on_destroy(|| {}),
            Err(ShareError::ScopeDestroyed(id)) if id == scope.id()
        ));
        assert!(scope.consumer().is_err());
    }

    #[test]
    fn dropping_without_destroy_skips_hooks() {
        let count = Arc::new(AtomicUsize::new(0));
        let weak = {
            let scope = Scope::new();
            let c = count.clone();
            scope.on_destroy(move || { c.fetch_add(1, Ordering::SeqCst); }).unwrap();
            scope.downgrade()
        };
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn display_includes_label() {
        let scope = Scope::labeled("window");
        assert_eq!(scope.to_string(), format!("{} (window)", scope.id()));
        assert_eq!(scope.label(), Some("window"));
    }
}
