//! Builder shared by both composable variants.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ComposeConfig;
use crate::error::BoxError;
use crate::observer::{Observers, ShareObserver};
use crate::shared::{Shared, SharedComposable};
use crate::singleton::SingletonComposable;

/// Configures name, observers and settings before building a composable.
///
/// # Examples
///
/// ```
/// use ferrous_compose::{ComposableBuilder, ComposeConfig, MetricsObserver, Scope, Shared};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let bounding = ComposableBuilder::new()
///     .name("element-bounding")
///     .observer(metrics.clone())
///     .config(ComposeConfig::default().with_max_construction_depth(8))
///     .shared(|id: &str| Shared::new(id.len()));
///
/// let scope = Scope::new();
/// bounding.get(&scope, "header").unwrap();
/// bounding.get(&scope, "header").unwrap();
/// assert_eq!(bounding.name(), "element-bounding");
/// assert_eq!(metrics.constructions(), 1);
/// assert_eq!(metrics.reuses(), 1);
/// ```
#[derive(Default, Clone)]
pub struct ComposableBuilder {
    name: Option<String>,
    observers: Observers,
    config: ComposeConfig,
}

impl ComposableBuilder {
    /// Creates a builder with default settings and no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name used in logs, observer events and errors.
    ///
    /// Defaults to the value's type name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an observer.
    pub fn observer(mut self, observer: Arc<dyn ShareObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Replaces the settings.
    pub fn config(mut self, config: ComposeConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds a shared composable from an infallible factory.
    pub fn shared<A, V, F>(self, factory: F) -> SharedComposable<A, V>
    where
        A: Serialize + ?Sized + 'static,
        V: Send + Sync + 'static,
        F: Fn(&A) -> Shared<V> + Send + Sync + 'static,
    {
        self.try_shared(move |args: &A| Ok(factory(args)))
    }

    /// Builds a shared composable from a fallible factory.
    pub fn try_shared<A, V, F>(self, factory: F) -> SharedComposable<A, V>
    where
        A: Serialize + ?Sized + 'static,
        V: Send + Sync + 'static,
        F: Fn(&A) -> Result<Shared<V>, BoxError> + Send + Sync + 'static,
    {
        let name = self.resolve_name::<V>();
        SharedComposable::from_parts(name, Box::new(factory), self.observers, self.config)
    }

    /// Builds a per-scope singleton from an infallible factory.
    pub fn singleton<V, F>(self, factory: F) -> SingletonComposable<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.try_singleton(move || Ok(factory()))
    }

    /// Builds a per-scope singleton from a fallible factory.
    pub fn try_singleton<V, F>(self, factory: F) -> SingletonComposable<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Result<V, BoxError> + Send + Sync + 'static,
    {
        let name = self.resolve_name::<V>();
        SingletonComposable::from_parts(name, Box::new(factory), self.observers, self.config)
    }

    fn resolve_name<V>(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| std::any::type_name::<V>().to_string())
    }
}
