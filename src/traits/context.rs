//! The calling context a composable resolves against.

use std::sync::Arc;

use crate::error::ShareResult;
use crate::internal::Hook;
use crate::scope::Scope;

/// Supplies the cache scope and the destruction registrar for a call.
///
/// [`Scope`] serves both roles itself. A [`Consumer`](crate::Consumer) uses
/// its owning scope for caching and its own hooks for release, so several
/// consumers of one scope share entries but let go of them independently.
pub trait ScopeContext: Send + Sync {
    /// The scope whose cache partition serves this context.
    fn scope(&self) -> &Scope;

    /// Registers a hook fired once when this context ends.
    ///
    /// Fails with [`ShareError::ScopeDestroyed`](crate::ShareError::ScopeDestroyed)
    /// if the context has already ended.
    fn on_destroy_boxed(&self, hook: Hook) -> ShareResult<()>;
}

impl<T: ScopeContext + ?Sized> ScopeContext for &T {
    fn scope(&self) -> &Scope {
        (**self).scope()
    }

    fn on_destroy_boxed(&self, hook: Hook) -> ShareResult<()> {
        (**self).on_destroy_boxed(hook)
    }
}

impl<T: ScopeContext + ?Sized> ScopeContext for Arc<T> {
    fn scope(&self) -> &Scope {
        (**self).scope()
    }

    fn on_destroy_boxed(&self, hook: Hook) -> ShareResult<()> {
        (**self).on_destroy_boxed(hook)
    }
}
