//! Parameter keys derived from composable arguments.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ShareError, ShareResult};

/// Sentinel key used when a call carries no arguments.
pub const NO_PARAMS: &str = "no-params";

/// Deterministic cache key for one set of composable arguments.
///
/// The key is the canonical JSON form of the arguments: compact, with object
/// keys sorted at every depth. Structurally equal arguments always produce the
/// same key, regardless of map insertion order. Arguments that serialize to
/// `null` (`()`, `None`) map to [`NO_PARAMS`].
///
/// Sequences keep their order, so unordered sets should be passed as
/// `BTreeSet` rather than `HashSet`.
///
/// # Examples
///
/// ```rust
/// use ferrous_compose::{ParamKey, NO_PARAMS};
/// use std::collections::HashMap;
///
/// assert_eq!(ParamKey::of(&()).unwrap().as_str(), NO_PARAMS);
/// assert_eq!(ParamKey::of(&(100, "px")).unwrap().as_str(), r#"[100,"px"]"#);
///
/// let mut a = HashMap::new();
/// a.insert("y", 2);
/// a.insert("x", 1);
/// assert_eq!(ParamKey::of(&a).unwrap().as_str(), r#"{"x":1,"y":2}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey(Arc<str>);

impl ParamKey {
    /// The sentinel key for argument-less calls.
    pub fn no_params() -> Self {
        ParamKey(Arc::from(NO_PARAMS))
    }

    /// Derives the key for `args`.
    ///
    /// Fails with [`ShareError::Unserializable`] when serde cannot represent
    /// the arguments as JSON, e.g. a map whose keys are not strings.
    pub fn of<A>(args: &A) -> ShareResult<Self>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args).map_err(|err| ShareError::Unserializable {
            type_name: std::any::type_name::<A>(),
            reason: err.to_string(),
        })?;

        if value.is_null() {
            return Ok(Self::no_params());
        }
        Ok(ParamKey(Arc::from(canonicalize(value).to_string())))
    }

    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the argument-less sentinel.
    pub fn is_no_params(&self) -> bool {
        &*self.0 == NO_PARAMS
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// serde_json keeps insertion order when `preserve_order` is enabled anywhere in
// the build graph, so objects are rebuilt with sorted keys.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
