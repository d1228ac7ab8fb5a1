//! # ferrous-compose
//!
//! Scoped shared composables: per-scope memoization with reference-counted
//! teardown.
//!
//! ## Features
//!
//! - **Exactly-once construction**: one value per (scope, argument key), built lazily
//! - **Ref-counted teardown**: cleanup runs once, after the last consumer is destroyed
//! - **Weak scope keys**: caches never keep a scope alive
//! - **Thread-safe**: `Arc`-based sharing, construction serialized per entry
//! - **Reentrancy detection**: a factory re-entering its own entry gets an error, not a deadlock
//! - **Observable**: lifecycle observers with `log` and metrics implementations
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_compose::{Scope, Shared, SharedComposable};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! // A listener-backed value: registering is the side effect, removal the cleanup
//! let listeners = Arc::new(AtomicUsize::new(0));
//! let l = listeners.clone();
//! let mouse = SharedComposable::new(move |_: &()| {
//!     l.fetch_add(1, Ordering::SeqCst);
//!     let l = l.clone();
//!     Shared::new((0i32, 0i32)).with_cleanup(move || { l.fetch_sub(1, Ordering::SeqCst); })
//! });
//!
//! let scope = Scope::new();
//! let first = scope.consumer().unwrap();
//! let second = scope.consumer().unwrap();
//! let a = mouse.get(&first, &()).unwrap();
//! let b = mouse.get(&second, &()).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(listeners.load(Ordering::SeqCst), 1);
//!
//! first.destroy().unwrap();
//! assert_eq!(listeners.load(Ordering::SeqCst), 1);
//! second.destroy().unwrap();
//! assert_eq!(listeners.load(Ordering::SeqCst), 0);
//! ```
//!
//! ## Variants
//!
//! - [`SharedComposable`]: arguments, reference counting, cleanup
//! - [`SingletonComposable`]: no arguments, one value per scope, no teardown
//!
//! ## Ambient Scope
//!
//! ```rust
//! use ferrous_compose::{Scope, SingletonComposable};
//!
//! let locale = SingletonComposable::new(|| String::from("en-GB"));
//! let scope = Scope::new();
//! scope.run(|| {
//!     assert_eq!(*locale.get_current().unwrap(), "en-GB");
//! });
//! assert!(locale.get_current().is_err());
//! ```

// Module declarations
pub mod builder;
pub mod config;
pub mod error;
pub mod key;
pub mod observer;
pub mod scope;
pub mod shared;
pub mod singleton;
pub mod traits;

// Internal modules
mod internal;

// Re-export core types
pub use builder::ComposableBuilder;
pub use config::ComposeConfig;
pub use error::{BoxError, ShareError, ShareResult};
pub use internal::Hook;
pub use key::{ParamKey, NO_PARAMS};
pub use observer::{EntryEvent, LoggingObserver, MetricsObserver, ShareObserver};
pub use scope::{current, run_in, with_current, AmbientGuard, Consumer, Scope, ScopeId, WeakScope};
pub use shared::{Cleanup, Shared, SharedComposable};
pub use singleton::SingletonComposable;
pub use traits::{Dispose, ScopeContext};
