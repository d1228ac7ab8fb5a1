//! Internal implementation details.

pub(crate) mod buckets;
pub(crate) mod circular;
pub(crate) mod dispose_bag;
pub(crate) mod sync;

pub(crate) use buckets::ScopeBuckets;
pub(crate) use circular::ConstructionGuard;
pub use dispose_bag::Hook;
pub(crate) use dispose_bag::{panic_message, DisposeBag};
