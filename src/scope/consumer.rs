//! Consumers: independently released users of a scope's shared entries.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::{run_in, Scope, ScopeId};
use crate::error::{ShareError, ShareResult};
use crate::internal::sync::Mutex;
use crate::internal::{DisposeBag, Hook};
use crate::traits::ScopeContext;

/// A child lifetime of a [`Scope`].
///
/// Composables called with a consumer cache against the consumer's scope, but
/// register their release hooks on the consumer. Three consumers of one scope
/// therefore share a single entry, and its cleanup runs once the third of
/// them is destroyed.
///
/// Dropping the last handle to a consumer destroys it. Destroying the owning
/// scope destroys all of its live consumers.
///
/// # Examples
///
/// ```
/// use ferrous_compose::{Scope, Shared, SharedComposable};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let cleanups = Arc::new(AtomicUsize::new(0));
/// let c = cleanups.clone();
/// let tracker = SharedComposable::new(move |_: &()| {
///     let c = c.clone();
///     Shared::new(0u32).with_cleanup(move || { c.fetch_add(1, Ordering::SeqCst); })
/// });
///
/// let scope = Scope::new();
/// let a = scope.consumer().unwrap();
/// let b = scope.consumer().unwrap();
/// tracker.get(&a, &()).unwrap();
/// tracker.get(&b, &()).unwrap();
///
/// a.destroy().unwrap();
/// assert_eq!(cleanups.load(Ordering::SeqCst), 0);
/// drop(b);
/// assert_eq!(cleanups.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

pub(crate) struct ConsumerInner {
    id: ScopeId,
    scope: Scope,
    hooks: Mutex<DisposeBag>,
    destroyed: AtomicBool,
}

impl Consumer {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            inner: Arc::new(ConsumerInner {
                id: ScopeId::next(),
                scope,
                hooks: Mutex::new(DisposeBag::default()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<ConsumerInner> {
        Arc::downgrade(&self.inner)
    }

    /// This consumer's own identity.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Returns true once the consumer has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Registers a hook fired once when this consumer is destroyed.
    pub fn on_destroy<F>(&self, hook: F) -> ShareResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_destroy_boxed(Box::new(hook))
    }

    /// Destroys the consumer, firing its hooks in LIFO order.
    ///
    /// Destroying an already destroyed consumer is a no-op.
    pub fn destroy(&self) -> ShareResult<()> {
        match self.inner.destroy_hooks() {
            0 => Ok(()),
            count => Err(ShareError::HookPanicked { scope: self.id(), count }),
        }
    }

    /// Runs `f` with this consumer as the ambient context.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        run_in(self, f)
    }
}

impl ConsumerInner {
    /// Fires the hooks unless already destroyed. Returns the panic count.
    pub(crate) fn destroy_hooks(&self) -> usize {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let mut bag = std::mem::take(&mut *self.hooks.lock());
        bag.run_all_reverse()
    }
}

impl Drop for ConsumerInner {
    fn drop(&mut self) {
        let panicked = self.destroy_hooks();
        if panicked > 0 {
            log::error!("{} hook(s) panicked while dropping consumer {}", panicked, self.id);
        }
    }
}

impl ScopeContext for Consumer {
    fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    fn on_destroy_boxed(&self, hook: Hook) -> ShareResult<()> {
        let mut hooks = self.inner.hooks.lock();
        if self.is_destroyed() {
            return Err(ShareError::ScopeDestroyed(self.id()));
        }
        hooks.push(hook);
        Ok(())
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.inner.id)
            .field("scope", &self.inner.scope.id())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn consumer_shares_scope_identity() {
        let scope = Scope::new();
        let consumer = scope.consumer().unwrap();
        assert!(consumer.scope().ptr_eq(&scope));
        assert_ne!(consumer.id(), scope.id());
    }

    #[test]
    fn scope_destroy_cascades() {
        let count = Arc::new(AtomicUsize::new(0));
        let scope = Scope::new();
        let consumer = scope.consumer().unwrap();
        let c = count.clone();
        consumer.on_destroy(move || { c.fetch_add(1, Ordering::SeqCst); }).unwrap();

        scope.destroy().unwrap();
        assert!(consumer.is_destroyed());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        consumer.destroy().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_destroys() {
        let count = Arc::new(AtomicUsize::new(0));
        let scope = Scope::new();
        {
            let consumer = scope.consumer().unwrap();
            let c = count.clone();
            consumer.on_destroy(move || { c.fetch_add(1, Ordering::SeqCst); }).unwrap();
            let _clone = consumer.clone();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scope.is_destroyed());
    }

    #[test]
    fn panicking_hook_is_reported() {
        let scope = Scope::new();
        let consumer = scope.consumer().unwrap();
        consumer.on_destroy(|| panic!("listener gone")).unwrap();
        assert!(matches!(
            consumer.destroy(),
            Err(ShareError::HookPanicked { count: 1, .. })
        ));
    }
}
