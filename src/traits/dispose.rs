//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this trait for shared values that need structured teardown (e.g.
/// removing a listener, stopping a timer). A value built with
/// [`Shared::disposable`](crate::Shared::disposable) has `dispose` called
/// once, when its last consumer goes away.
///
/// # Examples
///
/// ```
/// use ferrous_compose::{Dispose, Scope, Shared, SharedComposable};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct Listener {
///     removed: Arc<AtomicBool>,
/// }
///
/// impl Dispose for Listener {
///     fn dispose(&self) {
///         self.removed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let removed = Arc::new(AtomicBool::new(false));
/// let flag = removed.clone();
/// let listener = SharedComposable::new(move |_: &()| {
///     Shared::disposable(Listener { removed: flag.clone() })
/// });
///
/// let scope = Scope::new();
/// listener.get(&scope, &()).unwrap();
/// scope.destroy().unwrap();
/// assert!(removed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
