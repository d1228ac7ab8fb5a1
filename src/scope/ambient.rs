//! Thread-local ambient scope context.
//!
//! Composables normally take their [`ScopeContext`] as an argument. Code that
//! mirrors a framework's implicit "current component" can instead install a
//! context for the duration of a closure and call `get_current`.

use std::cell::RefCell;
use std::sync::Arc;

use crate::error::{ShareError, ShareResult};
use crate::traits::ScopeContext;

thread_local! {
    static AMBIENT: RefCell<Vec<Arc<dyn ScopeContext>>> = const { RefCell::new(Vec::new()) };
}

/// Restores the previous ambient context when dropped.
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct AmbientGuard {
    depth: usize,
}

impl AmbientGuard {
    /// Pushes `ctx` as the ambient context of this thread.
    pub fn enter<C>(ctx: &C) -> Self
    where
        C: ScopeContext + Clone + 'static,
    {
        let depth = AMBIENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(Arc::new(ctx.clone()));
            stack.len()
        });
        Self { depth }
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        let popped = AMBIENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "ambient guards dropped out of order");
            stack.pop()
        });
        // Dropped outside the borrow: the last consumer handle may run hooks
        drop(popped);
    }
}

/// Runs `f` with `ctx` as the ambient context of this thread.
///
/// ```
/// use ferrous_compose::{run_in, Scope, SingletonComposable};
///
/// let settings = SingletonComposable::new(|| String::from("dark"));
/// let scope = Scope::new();
///
/// let theme = run_in(&scope, || settings.get_current().unwrap());
/// assert_eq!(*theme, "dark");
/// ```
pub fn run_in<C, R>(ctx: &C, f: impl FnOnce() -> R) -> R
where
    C: ScopeContext + Clone + 'static,
{
    let _guard = AmbientGuard::enter(ctx);
    f()
}

/// Returns the innermost ambient context, if any.
pub fn current() -> Option<Arc<dyn ScopeContext>> {
    AMBIENT.with(|stack| stack.borrow().last().cloned())
}

/// Calls `f` with the innermost ambient context.
///
/// Fails with [`ShareError::NoAmbientScope`] outside of [`run_in`].
pub fn with_current<R>(f: impl FnOnce(&dyn ScopeContext) -> ShareResult<R>) -> ShareResult<R> {
    // Cloned out so `f` may enter nested contexts
    let ctx = current().ok_or(ShareError::NoAmbientScope)?;
    f(ctx.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scope;

    #[test]
    fn no_context_outside_run_in() {
        assert!(current().is_none());
        assert!(matches!(
            with_current(|_| Ok(())),
            Err(ShareError::NoAmbientScope)
        ));
    }

    #[test]
    fn nested_contexts_restore() {
        let outer = Scope::new();
        let inner = Scope::new();

        run_in(&outer, || {
            assert_eq!(current().unwrap().scope().id(), outer.id());
            run_in(&inner, || {
                assert_eq!(current().unwrap().scope().id(), inner.id());
            });
            assert_eq!(current().unwrap().scope().id(), outer.id());
        });
        assert!(current().is_none());
    }

    #[test]
    fn context_is_popped_on_panic() {
        let scope = Scope::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_in(&scope, || panic!("render failed"));
        }));
        assert!(result.is_err());
        assert!(current().is_none());
    }
}
