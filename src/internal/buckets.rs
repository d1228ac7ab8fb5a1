//! Weak-scope-keyed storage shared by both composable variants.

use crate::internal::sync::FastMap;
use crate::key::ParamKey;
use crate::scope::{Scope, ScopeId, WeakScope};

/// Entries for one scope.
pub(crate) struct Bucket<E> {
    scope: WeakScope,
    entries: FastMap<ParamKey, E>,
}

/// Two-level map: scope identity, then parameter key.
///
/// Scopes are held weakly. Buckets of dropped scopes linger until
/// [`ScopeBuckets::sweep_dead`] removes them; removed values are handed back so
/// callers can drop them after releasing their lock.
pub(crate) struct ScopeBuckets<E> {
    buckets: FastMap<ScopeId, Bucket<E>>,
}

impl<E> Default for ScopeBuckets<E> {
    fn default() -> Self {
        Self { buckets: FastMap::default() }
    }
}

impl<E> ScopeBuckets<E> {
    /// Returns the entry map for `scope`, creating the bucket if needed.
    ///
    /// The flag is true when a new bucket was created.
    pub(crate) fn bucket_mut(&mut self, scope: &Scope) -> (&mut FastMap<ParamKey, E>, bool) {
        let mut created = false;
        let bucket = self.buckets.entry(scope.id()).or_insert_with(|| {
            created = true;
            Bucket { scope: scope.downgrade(), entries: FastMap::default() }
        });
        (&mut bucket.entries, created)
    }

    pub(crate) fn get(&self, scope: ScopeId, key: &ParamKey) -> Option<&E> {
        self.buckets.get(&scope)?.entries.get(key)
    }

    pub(crate) fn get_mut(&mut self, scope: ScopeId, key: &ParamKey) -> Option<&mut E> {
        self.buckets.get_mut(&scope)?.entries.get_mut(key)
    }

    /// Removes one entry, dropping its bucket when it becomes empty.
    pub(crate) fn remove(&mut self, scope: ScopeId, key: &ParamKey) -> Option<E> {
        let bucket = self.buckets.get_mut(&scope)?;
        let removed = bucket.entries.remove(key);
        if bucket.entries.is_empty() {
            self.buckets.remove(&scope);
        }
        removed
    }

    /// Removes a whole bucket.
    pub(crate) fn remove_scope(&mut self, scope: ScopeId) -> Option<Vec<E>> {
        self.buckets
            .remove(&scope)
            .map(|bucket| bucket.entries.into_values().collect())
    }

    /// Removes buckets whose scope has been dropped.
    pub(crate) fn sweep_dead(&mut self) -> Vec<E> {
        let dead: Vec<ScopeId> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| !bucket.scope.is_alive())
            .map(|(id, _)| *id)
            .collect();

        let mut removed = Vec::new();
        for id in dead {
            if let Some(bucket) = self.buckets.remove(&id) {
                removed.extend(bucket.entries.into_values());
            }
        }
        removed
    }

    pub(crate) fn entry_count(&self, scope: ScopeId) -> usize {
        self.buckets.get(&scope).map_or(0, |bucket| bucket.entries.len())
    }

    pub(crate) fn scope_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bucket_is_removed_with_last_entry() {
        let scope = Scope::new();
        let mut buckets = ScopeBuckets::default();
        let (entries, created) = buckets.bucket_mut(&scope);
        assert!(created);
        entries.insert(ParamKey::no_params(), 1);

        let (_, created) = buckets.bucket_mut(&scope);
        assert!(!created);
        assert_eq!(buckets.get(scope.id(), &ParamKey::no_params()), Some(&1));

        assert_eq!(buckets.remove(scope.id(), &ParamKey::no_params()), Some(1));
        assert_eq!(buckets.scope_count(), 0);
    }

    #[test]
    fn sweep_drops_only_dead_scopes() {
        let alive = Scope::new();
        let mut buckets = ScopeBuckets::default();
        buckets.bucket_mut(&alive).0.insert(ParamKey::no_params(), "alive");
        {
            let dropped = Scope::new();
            buckets.bucket_mut(&dropped).0.insert(ParamKey::no_params(), "dead");
        }

        assert_eq!(buckets.scope_count(), 2);
        assert_eq!(buckets.sweep_dead(), vec!["dead"]);
        assert_eq!(buckets.scope_count(), 1);
        assert_eq!(buckets.entry_count(alive.id()), 1);
    }
}
