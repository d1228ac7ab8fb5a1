//! Per-scope singletons.
//!
//! The simplified variant: no arguments, no reference counting, no teardown.
//! The value lives as long as the scope's bucket, which goes away with
//! [`SingletonComposable::forget`] or when a dropped scope is swept.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::builder::ComposableBuilder;
use crate::config::ComposeConfig;
use crate::error::{BoxError, ShareError, ShareResult};
use crate::internal::sync::Mutex;
use crate::internal::{ConstructionGuard, ScopeBuckets};
use crate::key::ParamKey;
use crate::observer::{EntryEvent, Observers};
use crate::scope::{with_current, Scope};
use crate::traits::ScopeContext;

type SingletonFactory<V> = dyn Fn() -> Result<V, BoxError> + Send + Sync;

/// A zero-argument factory memoized once per scope.
///
/// # Examples
///
/// ```
/// use ferrous_compose::{Scope, SingletonComposable};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let r = runs.clone();
/// let breakpoints = SingletonComposable::new(move || {
///     r.fetch_add(1, Ordering::SeqCst);
///     vec![640u32, 1024, 1440]
/// });
///
/// let scope = Scope::new();
/// let first = breakpoints.get(&scope).unwrap();
/// for _ in 0..100 {
///     assert!(Arc::ptr_eq(&first, &breakpoints.get(&scope).unwrap()));
/// }
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct SingletonComposable<V> {
    inner: Arc<SingletonInner<V>>,
}

struct SingletonInner<V> {
    name: String,
    factory: Box<SingletonFactory<V>>,
    cache: Mutex<ScopeBuckets<Arc<OnceCell<Arc<V>>>>>,
    observers: Observers,
    config: ComposeConfig,
}

impl<V> SingletonComposable<V>
where
    V: Send + Sync + 'static,
{
    /// Creates a singleton from an infallible factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        ComposableBuilder::new().singleton(factory)
    }

    /// Creates a singleton from a fallible factory.
    pub fn try_new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<V, BoxError> + Send + Sync + 'static,
    {
        ComposableBuilder::new().try_singleton(factory)
    }

    pub(crate) fn from_parts(
        name: String,
        factory: Box<SingletonFactory<V>>,
        observers: Observers,
        config: ComposeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SingletonInner {
                name,
                factory,
                cache: Mutex::new(ScopeBuckets::default()),
                observers,
                config,
            }),
        }
    }

    /// Returns the value for `ctx`'s scope, constructing it on first use.
    ///
    /// A failed construction caches nothing; the next call tries again.
    pub fn get<C>(&self, ctx: &C) -> ShareResult<Arc<V>>
    where
        C: ScopeContext + ?Sized,
    {
        let scope = ctx.scope();
        if scope.is_destroyed() {
            return Err(ShareError::ScopeDestroyed(scope.id()));
        }

        let key = ParamKey::no_params();
        let inner = &*self.inner;
        let cell = inner.cell_for(scope, &key);
        let event = EntryEvent { composable: &inner.name, scope: scope.id(), key: &key };

        if let Some(value) = cell.get() {
            inner.observers.reused(&event);
            return Ok(value.clone());
        }

        let _guard = ConstructionGuard::enter(event.to_string(), inner.config.max_construction_depth)?;
        let mut built = false;
        let value = cell.get_or_try_init(|| {
            built = true;
            inner.observers.run_factory(&event, || (inner.factory)()).map(Arc::new)
        })?;
        if !built {
            inner.observers.reused(&event);
        }
        Ok(value.clone())
    }

    /// Like [`get`](Self::get), resolving the context from the ambient stack.
    pub fn get_current(&self) -> ShareResult<Arc<V>> {
        with_current(|ctx| self.get(ctx))
    }
}

impl<V> SingletonComposable<V> {
    /// The composable's name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns true if a value has been constructed for `scope`.
    pub fn is_cached(&self, scope: &Scope) -> bool {
        self.inner
            .cache
            .lock()
            .get(scope.id(), &ParamKey::no_params())
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Removes the value cached for `scope`, returning it if constructed.
    ///
    /// The next call in that scope constructs a fresh value.
    pub fn forget(&self, scope: &Scope) -> Option<Arc<V>> {
        let removed = self.inner.cache.lock().remove_scope(scope.id())?;
        removed.into_iter().find_map(|cell| cell.get().cloned())
    }

    /// Number of scopes with a bucket, including dropped but unswept ones.
    pub fn scope_count(&self) -> usize {
        self.inner.cache.lock().scope_count()
    }

    /// Drops values of scopes that no longer exist. Returns how many.
    pub fn sweep(&self) -> usize {
        let removed = self.inner.cache.lock().sweep_dead();
        let count = removed.len();
        drop(removed);
        count
    }
}

impl<V> SingletonInner<V> {
    // Empty cells stay in place after a failure: a concurrent caller may be
    // waiting on the same cell and will initialize it.
    fn cell_for(&self, scope: &Scope, key: &ParamKey) -> Arc<OnceCell<Arc<V>>> {
        let mut swept = Vec::new();
        let cell = {
            let mut cache = self.cache.lock();
            let (entries, created) = cache.bucket_mut(scope);
            let cell = entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();
            if created && self.config.sweep_dead_scopes {
                swept = cache.sweep_dead();
            }
            cell
        };
        if !swept.is_empty() {
            log::trace!("{}: swept {} values of dropped scopes", self.name, swept.len());
        }
        cell
    }
}

impl<V> Clone for SingletonComposable<V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<V> fmt::Debug for SingletonComposable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonComposable")
            .field("name", &self.inner.name)
            .field("scopes", &self.scope_count())
            .finish()
    }
}
