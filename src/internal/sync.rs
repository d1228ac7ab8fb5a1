//! Lock and map aliases selected by feature flags.

#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::Mutex;

#[cfg(not(feature = "parking-lot"))]
pub(crate) use self::std_mutex::Mutex;

#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V>;

#[cfg(not(feature = "parking-lot"))]
mod std_mutex {
    use std::sync::{MutexGuard, PoisonError};

    /// `std::sync::Mutex` with the `parking_lot` calling convention.
    ///
    /// Poisoning is recovered: cache state is only mutated in short sections
    /// that never call user code.
    #[derive(Default)]
    pub(crate) struct Mutex<T>(std::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) const fn new(value: T) -> Self {
            Mutex(std::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub(crate) fn get_mut(&mut self) -> &mut T {
            self.0.get_mut().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
