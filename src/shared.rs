//! Scoped shared composables with reference-counted teardown.
//!
//! A [`SharedComposable`] hands out one value per (scope, argument key). The
//! factory runs on the first call for a pair; later calls share the value and
//! take another reference. Each call registers a release hook on its context,
//! and the entry's cleanup runs once the last reference is released.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::builder::ComposableBuilder;
use crate::config::ComposeConfig;
use crate::error::{BoxError, ShareError, ShareResult};
use crate::internal::sync::Mutex;
use crate::internal::{ConstructionGuard, ScopeBuckets};
use crate::key::ParamKey;
use crate::observer::{EntryEvent, Observers};
use crate::scope::{with_current, Scope, ScopeId};
use crate::traits::{Dispose, ScopeContext};

/// Teardown callback of a shared value.
pub type Cleanup = Box<dyn FnOnce() + Send>;

type SharedFactory<A, V> = dyn Fn(&A) -> Result<Shared<V>, BoxError> + Send + Sync;

/// What a factory produces: the shared value plus optional teardown.
///
/// ```
/// use ferrous_compose::Shared;
///
/// let shared = Shared::new(vec![1, 2, 3]).with_cleanup(|| println!("listener removed"));
/// assert_eq!(shared.value().len(), 3);
/// assert!(shared.has_cleanup());
/// ```
pub struct Shared<V> {
    value: Arc<V>,
    cleanup: Option<Cleanup>,
}

impl<V> Shared<V> {
    /// Wraps a value with no teardown.
    pub fn new(value: V) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an existing `Arc`.
    pub fn from_arc(value: Arc<V>) -> Self {
        Self { value, cleanup: None }
    }

    /// Sets the teardown callback, replacing any previous one.
    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// The value that will be shared.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// Returns true if a teardown callback is set.
    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    pub(crate) fn into_parts(self) -> (Arc<V>, Option<Cleanup>) {
        (self.value, self.cleanup)
    }
}

impl<V: Dispose> Shared<V> {
    /// Wraps a value whose [`Dispose::dispose`] is the teardown.
    pub fn disposable(value: V) -> Self {
        let value = Arc::new(value);
        let handle = value.clone();
        Self { value, cleanup: Some(Box::new(move || handle.dispose())) }
    }
}

impl<V: fmt::Debug> fmt::Debug for Shared<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("value", &self.value)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

struct Slot<V> {
    cell: OnceCell<Arc<V>>,
    cleanup: Mutex<Option<Cleanup>>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self { cell: OnceCell::new(), cleanup: Mutex::new(None) }
    }
}

struct EntryRecord<V> {
    slot: Arc<Slot<V>>,
    refs: usize,
}

/// A factory whose values are shared per scope and argument key.
///
/// # Guarantees
///
/// - Calls with structurally equal arguments in one scope return the same
///   `Arc` and run the factory once.
/// - Different argument keys, or different scopes, never share an entry.
/// - Cleanup runs at most once per entry, after the last consumer released
///   it. A later call reconstructs.
///
/// Construction of one entry is serialized across threads; different entries
/// construct independently. A factory re-entering its own entry on the same
/// thread gets [`ShareError::Circular`]. Two factories waiting on each other
/// from different threads deadlock, as with any pair of locks.
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
/// let debounced = SharedComposable::new(move |delay_ms: &u64| {
///     let c = c.clone();
///     Shared::new(*delay_ms).with_cleanup(move || { c.fetch_add(1, Ordering::SeqCst); })
/// });
///
/// let scope = Scope::new();
/// let a = debounced.get(&scope, &100).unwrap();
/// let b = debounced.get(&scope, &100).unwrap();
/// let c = debounced.get(&scope, &200).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(!Arc::ptr_eq(&a, &c));
///
/// scope.destroy().unwrap();
/// assert_eq!(cleanups.load(Ordering::SeqCst), 2);
/// ```
pub struct SharedComposable<A: ?Sized, V> {
    inner: Arc<SharedInner<A, V>>,
}

struct SharedInner<A: ?Sized, V> {
    name: String,
    factory: Box<SharedFactory<A, V>>,
    cache: Mutex<ScopeBuckets<EntryRecord<V>>>,
    observers: Observers,
    config: ComposeConfig,
}

impl<A, V> SharedComposable<A, V>
where
    A: Serialize + ?Sized + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a composable from an infallible factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&A) -> Shared<V> + Send + Sync + 'static,
    {
        ComposableBuilder::new().shared(factory)
    }

    /// Creates a composable from a fallible factory.
    ///
    /// A factory error reaches the caller as [`ShareError::Factory`] and
    /// leaves nothing cached.
    pub fn try_new<F>(factory: F) -> Self
    where
        F: Fn(&A) -> Result<Shared<V>, BoxError> + Send + Sync + 'static,
    {
        ComposableBuilder::new().try_shared(factory)
    }

    pub(crate) fn from_parts(
        name: String,
        factory: Box<SharedFactory<A, V>>,
        observers: Observers,
        config: ComposeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                name,
                factory,
                cache: Mutex::new(ScopeBuckets::default()),
                observers,
                config,
            }),
        }
    }

    /// Returns the shared value for `args` in `ctx`'s scope.
    ///
    /// Takes a reference that is released when `ctx` is destroyed.
    pub fn get<C>(&self, ctx: &C, args: &A) -> ShareResult<Arc<V>>
    where
        C: ScopeContext + ?Sized,
    {
        let key = ParamKey::of(args)?;
        let scope = ctx.scope();
        if scope.is_destroyed() {
            return Err(ShareError::ScopeDestroyed(scope.id()));
        }

        let inner = &*self.inner;
        let (slot, refs) = inner.reserve(scope, &key);
        let reservation = Reservation { inner, scope: scope.id(), key: &key, armed: true };

        let value = inner.construct(&slot, scope.id(), &key, args)?;

        // The hook keeps the composable alive until its cleanup has run
        let owner = Arc::clone(&self.inner);
        let (scope_id, hook_key) = (scope.id(), key.clone());
        ctx.on_destroy_boxed(Box::new(move || owner.release(scope_id, &hook_key)))?;
        reservation.disarm();

        if inner.observers.has_observers() {
            inner.observers.acquired(&inner.event(scope.id(), &key), refs);
        }
        Ok(value)
    }

    /// Like [`get`](Self::get), resolving the context from the ambient stack.
    pub fn get_current(&self, args: &A) -> ShareResult<Arc<V>> {
        with_current(|ctx| self.get(ctx, args))
    }

    /// Number of live references to the entry for `args` in `scope`.
    pub fn ref_count(&self, scope: &Scope, args: &A) -> ShareResult<usize> {
        let key = ParamKey::of(args)?;
        let cache = self.inner.cache.lock();
        Ok(cache.get(scope.id(), &key).map_or(0, |record| record.refs))
    }

    /// Returns true if a constructed value for `args` is cached in `scope`.
    pub fn is_cached(&self, scope: &Scope, args: &A) -> ShareResult<bool> {
        let key = ParamKey::of(args)?;
        let cache = self.inner.cache.lock();
        Ok(cache
            .get(scope.id(), &key)
            .is_some_and(|record| record.slot.cell.get().is_some()))
    }
}

impl<A: ?Sized, V> SharedComposable<A, V> {
    /// The composable's name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of entries cached for `scope`.
    pub fn live_entries(&self, scope: &Scope) -> usize {
        self.inner.cache.lock().entry_count(scope.id())
    }

    /// Number of scopes with cached entries, including dropped but unswept ones.
    pub fn scope_count(&self) -> usize {
        self.inner.cache.lock().scope_count()
    }

    /// Drops entries of scopes that no longer exist. Their cleanups do not run.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let removed = self.inner.cache.lock().sweep_dead();
        let count = removed.len();
        drop(removed);
        count
    }
}

impl<A: ?Sized, V> SharedInner<A, V> {
    fn event<'a>(&'a self, scope: ScopeId, key: &'a ParamKey) -> EntryEvent<'a> {
        EntryEvent { composable: &self.name, scope, key }
    }

    /// Takes a reference before construction so concurrent teardown cannot
    /// remove an entry that is still being built.
    fn reserve(&self, scope: &Scope, key: &ParamKey) -> (Arc<Slot<V>>, usize) {
        let mut swept = Vec::new();
        let reserved = {
            let mut cache = self.cache.lock();
            let (entries, created) = cache.bucket_mut(scope);
            let record = entries
                .entry(key.clone())
                .or_insert_with(|| EntryRecord { slot: Arc::new(Slot::new()), refs: 0 });
            record.refs += 1;
            let reserved = (record.slot.clone(), record.refs);
            if created && self.config.sweep_dead_scopes {
                swept = cache.sweep_dead();
            }
            reserved
        };
        if !swept.is_empty() {
            log::trace!("{}: swept {} entries of dropped scopes", self.name, swept.len());
        }
        reserved
    }

    fn construct(&self, slot: &Slot<V>, scope: ScopeId, key: &ParamKey, args: &A) -> ShareResult<Arc<V>> {
        let event = self.event(scope, key);
        if let Some(value) = slot.cell.get() {
            self.observers.reused(&event);
            return Ok(value.clone());
        }

        let _guard = ConstructionGuard::enter(event.to_string(), self.config.max_construction_depth)?;
        let mut built = false;
        let value = slot.cell.get_or_try_init(|| {
            built = true;
            let shared = self.observers.run_factory(&event, || (self.factory)(args))?;
            let (value, cleanup) = shared.into_parts();
            *slot.cleanup.lock() = cleanup;
            Ok::<_, ShareError>(value)
        })?;
        if !built {
            self.observers.reused(&event);
        }
        Ok(value.clone())
    }

    /// Drops one reference; at zero the entry is removed, then cleaned up.
    fn release(&self, scope: ScopeId, key: &ParamKey) {
        let (remaining, removed) = {
            let mut cache = self.cache.lock();
            let remaining = cache.get_mut(scope, key).map(|record| {
                record.refs = record.refs.saturating_sub(1);
                record.refs
            });
            let removed = match remaining {
                Some(0) => cache.remove(scope, key),
                _ => None,
            };
            (remaining, removed)
        };

        let event = self.event(scope, key);
        match (remaining, removed) {
            (None, _) => log::warn!("{}: release for an entry that is no longer cached", event),
            (Some(0), Some(record)) => self.teardown(record, &event),
            (Some(refs), _) => self.observers.released(&event, refs),
        }
    }

    fn teardown(&self, record: EntryRecord<V>, event: &EntryEvent<'_>) {
        let constructed = record.slot.cell.get().is_some();
        let cleanup = record.slot.cleanup.lock().take();
        drop(record);
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        if constructed {
            self.observers.cleaned_up(event);
        } else {
            // Rolled-back reservation of a failed construction
            self.observers.released(event, 0);
        }
    }
}

/// Rolls back a reservation unless the call completed.
struct Reservation<'a, A: ?Sized, V> {
    inner: &'a SharedInner<A, V>,
    scope: ScopeId,
    key: &'a ParamKey,
    armed: bool,
}

impl<A: ?Sized, V> Reservation<'_, A, V> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<A: ?Sized, V> Drop for Reservation<'_, A, V> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release(self.scope, self.key);
        }
    }
}

impl<A: ?Sized, V> Clone for SharedComposable<A, V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<A: ?Sized, V> fmt::Debug for SharedComposable<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedComposable")
            .field("name", &self.inner.name)
            .field("scopes", &self.scope_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (SharedComposable<u32, u32>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));
        let (b, c) = (built.clone(), cleaned.clone());
        let composable = SharedComposable::new(move |n: &u32| {
            b.fetch_add(1, Ordering::SeqCst);
            let c = c.clone();
            Shared::new(*n).with_cleanup(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        });
        (composable, built, cleaned)
    }

    #[test]
    fn reservation_rollback_on_failed_registration() {
        let (composable, built, cleaned) = counting();
        let scope = Scope::new();
        let consumer = scope.consumer().unwrap();
        consumer.destroy().unwrap();

        // The consumer refuses the hook after construction succeeded
        assert!(matches!(
            composable.get(&consumer, &1),
            Err(ShareError::ScopeDestroyed(id)) if id == consumer.id()
        ));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert_eq!(composable.live_entries(&scope), 0);
    }

    #[test]
    fn ref_count_tracks_consumers() {
        let (composable, _, _) = counting();
        let scope = Scope::new();
        let a = scope.consumer().unwrap();
        let b = scope.consumer().unwrap();
        composable.get(&a, &7).unwrap();
        composable.get(&b, &7).unwrap();
        assert_eq!(composable.ref_count(&scope, &7).unwrap(), 2);
        assert!(composable.is_cached(&scope, &7).unwrap());

        a.destroy().unwrap();
        assert_eq!(composable.ref_count(&scope, &7).unwrap(), 1);
        b.destroy().unwrap();
        assert_eq!(composable.ref_count(&scope, &7).unwrap(), 0);
        assert!(!composable.is_cached(&scope, &7).unwrap());
    }

    #[test]
    fn default_name_is_value_type() {
        let (composable, _, _) = counting();
        assert_eq!(composable.name(), "u32");
        assert!(format!("{:?}", composable).contains("u32"));
    }
}
