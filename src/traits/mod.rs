//! Core traits for shared composables.

mod context;
mod dispose;

pub use context::ScopeContext;
pub use dispose::Dispose;
