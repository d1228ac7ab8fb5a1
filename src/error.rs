//! Error types for shared composables.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::key::ParamKey;
use crate::scope::ScopeId;

/// Errors raised while resolving, constructing or tearing down shared values.
///
/// # Examples
///
/// ```rust
/// use ferrous_compose::{ShareError, SharedComposable, Scope, Shared};
///
/// let counter = SharedComposable::new(|start: &u32| Shared::new(*start));
/// let scope = Scope::new();
/// scope.destroy().unwrap();
///
/// match counter.get(&scope, &1) {
///     Err(ShareError::ScopeDestroyed(id)) => assert_eq!(id, scope.id()),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub enum ShareError {
    /// Arguments could not be turned into a parameter key
    Unserializable {
        type_name: &'static str,
        reason: String,
    },
    /// A fallible factory returned an error; nothing was cached
    Factory {
        composable: String,
        key: ParamKey,
        source: Arc<dyn Error + Send + Sync>,
    },
    /// Construction of an entry re-entered itself (includes path)
    Circular(Vec<String>),
    /// Nested construction exceeded the configured depth
    DepthExceeded(usize),
    /// The scope or consumer has already been destroyed
    ScopeDestroyed(ScopeId),
    /// No ambient scope is active on this thread
    NoAmbientScope,
    /// One or more destruction hooks panicked
    HookPanicked { scope: ScopeId, count: usize },
    /// A configuration value could not be parsed
    InvalidConfig { key: String, value: String },
}

impl fmt::Display for ShareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareError::Unserializable { type_name, reason } => {
                write!(f, "Cannot derive parameter key from {}: {}", type_name, reason)
            }
            ShareError::Factory { composable, key, source } => {
                write!(f, "Factory `{}` failed for {}: {}", composable, key, source)
            }
            ShareError::Circular(path) => {
                write!(f, "Circular construction: {}", path.join(" -> "))
            }
            ShareError::DepthExceeded(depth) => write!(f, "Max construction depth {} exceeded", depth),
            ShareError::ScopeDestroyed(id) => write!(f, "{} is already destroyed", id),
            ShareError::NoAmbientScope => write!(f, "No ambient scope is active on this thread"),
            ShareError::HookPanicked { scope, count } => {
                write!(f, "{} destruction hook(s) panicked while destroying {}", count, scope)
            }
            ShareError::InvalidConfig { key, value } => {
                write!(f, "Invalid configuration value for {}: {:?}", key, value)
            }
        }
    }
}

impl Error for ShareError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ShareError::Factory { source, .. } => Some(source.as_ref() as &(dyn Error + 'static)),
            _ => None,
        }
    }
}

/// Result type for composable operations
///
/// A convenience alias for `Result<T, ShareError>`.
///
/// ```rust
/// use ferrous_compose::{ShareResult, ShareError};
///
/// fn ambient_only() -> ShareResult<()> {
///     Err(ShareError::NoAmbientScope)
/// }
///
/// assert!(ambient_only().is_err());
/// ```
pub type ShareResult<T> = Result<T, ShareError>;

/// Boxed error returned by fallible factories.
pub type BoxError = Box<dyn Error + Send + Sync>;
