/// Sharing integration tests
///
/// These tests verify that shared composables hand out one value per
/// (scope, argument key) and keep separate keys and scopes apart.

use ferrous_compose::{Scope, Shared, SharedComposable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Values =====

#[derive(Debug)]
struct Debounced {
    delay_ms: u64,
    serial: usize,
}

#[derive(Serialize)]
struct BoundingOptions {
    reset: bool,
    window_resize: bool,
}

#[derive(Serialize)]
struct BoundingOptionsReordered {
    window_resize: bool,
    reset: bool,
}

fn debounced() -> (SharedComposable<u64, Debounced>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = runs.clone();
    let composable = SharedComposable::new(move |delay_ms: &u64| {
        let serial = r.fetch_add(1, Ordering::SeqCst);
        Shared::new(Debounced { delay_ms: *delay_ms, serial })
    });
    (composable, runs)
}

// ===== Same Key =====

#[test]
fn same_args_share_one_value() {
    let (composable, runs) = debounced();
    let scope = Scope::new();

    let a = composable.get(&scope, &100).unwrap();
    let b = composable.get(&scope, &100).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.delay_ms, 100);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn different_args_get_distinct_values() {
    let (composable, runs) = debounced();
    let scope = Scope::new();

    let a = composable.get(&scope, &100).unwrap();
    let b = composable.get(&scope, &100).unwrap();
    let c = composable.get(&scope, &200).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.delay_ms, 200);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(composable.live_entries(&scope), 2);
}

#[test]
fn consumers_of_one_scope_share() {
    let (composable, runs) = debounced();
    let scope = Scope::new();
    let first = scope.consumer().unwrap();
    let second = scope.consumer().unwrap();

    let a = composable.get(&first, &50).unwrap();
    let b = composable.get(&second, &50).unwrap();
    let c = composable.get(&scope, &50).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(composable.ref_count(&scope, &50).unwrap(), 3);
}

// ===== Scope Isolation =====

#[test]
fn scopes_never_share() {
    let (composable, runs) = debounced();
    let left = Scope::labeled("left");
    let right = Scope::labeled("right");

    let a = composable.get(&left, &100).unwrap();
    let b = composable.get(&right, &100).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.serial, b.serial);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(composable.scope_count(), 2);
}

#[test]
fn destroyed_scope_is_rejected() {
    let (composable, runs) = debounced();
    let scope = Scope::new();
    scope.destroy().unwrap();

    assert!(composable.get(&scope, &100).is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(composable.scope_count(), 0);
}

// ===== Structural Keys =====

#[test]
fn field_order_does_not_matter() {
    let composable = SharedComposable::new(|opts: &serde_json::Value| Shared::new(opts.to_string()));
    let scope = Scope::new();

    let a = serde_json::to_value(BoundingOptions { reset: true, window_resize: false }).unwrap();
    let b = serde_json::to_value(BoundingOptionsReordered { window_resize: false, reset: true }).unwrap();

    let first = composable.get(&scope, &a).unwrap();
    let second = composable.get(&scope, &b).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn structurally_equal_maps_share() {
    let composable = SharedComposable::new(|m: &BTreeMap<String, u32>| Shared::new(m.len()));
    let scope = Scope::new();

    let mut a = BTreeMap::new();
    a.insert("x".to_string(), 1);
    a.insert("y".to_string(), 2);
    let b = a.clone();

    let first = composable.get(&scope, &a).unwrap();
    let second = composable.get(&scope, &b).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn unit_and_none_use_no_params_entry() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = runs.clone();
    let composable = SharedComposable::new(move |_: &Option<u8>| {
        r.fetch_add(1, Ordering::SeqCst);
        Shared::new("mouse")
    });
    let scope = Scope::new();

    composable.get(&scope, &None).unwrap();
    composable.get(&scope, &None).unwrap();
    composable.get(&scope, &Some(1)).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(composable.live_entries(&scope), 2);
}

#[test]
fn unsized_str_args() {
    let composable = SharedComposable::new(|id: &str| Shared::new(id.to_uppercase()));
    let scope = Scope::new();

    let header = composable.get(&scope, "header").unwrap();
    let again = composable.get(&scope, "header").unwrap();
    let footer = composable.get(&scope, "footer").unwrap();

    assert_eq!(*header, "HEADER");
    assert!(Arc::ptr_eq(&header, &again));
    assert!(!Arc::ptr_eq(&header, &footer));
}

// ===== Failures =====

#[test]
fn factory_error_caches_nothing() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();
    let composable = SharedComposable::try_new(move |n: &u32| {
        if a.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err("listener target not ready".into());
        }
        Ok(Shared::new(*n))
    });
    let scope = Scope::new();

    let err = composable.get(&scope, &3).unwrap_err();
    assert!(err.to_string().contains("listener target not ready"));
    assert_eq!(composable.live_entries(&scope), 0);
    assert_eq!(scope.pending_hooks(), 0);

    let value = composable.get(&scope, &3).unwrap();
    assert_eq!(*value, 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(composable.ref_count(&scope, &3).unwrap(), 1);
}

#[test]
fn factory_panic_caches_nothing() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();
    let composable = SharedComposable::new(move |n: &u32| {
        if a.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("boom");
        }
        Shared::new(*n)
    });
    let scope = Scope::new();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| composable.get(&scope, &9)));
    assert!(caught.is_err());
    assert_eq!(composable.live_entries(&scope), 0);

    let value = composable.get(&scope, &9).unwrap();
    assert_eq!(*value, 9);
    assert_eq!(composable.ref_count(&scope, &9).unwrap(), 1);
}

#[test]
fn clones_share_the_cache() {
    let (composable, runs) = debounced();
    let twin = composable.clone();
    let scope = Scope::new();

    let a = composable.get(&scope, &10).unwrap();
    let b = twin.get(&scope, &10).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
