#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_compose::{Consumer, Scope, Shared, SharedComposable};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let built = Arc::new(AtomicUsize::new(0));
    let cleaned = Arc::new(AtomicUsize::new(0));
    let (b, c) = (built.clone(), cleaned.clone());
    let composable = SharedComposable::new(move |n: &u8| {
        b.fetch_add(1, Ordering::SeqCst);
        let c = c.clone();
        Shared::new(*n).with_cleanup(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    });

    let scope = Scope::new();
    let mut consumers: Vec<Consumer> = Vec::new();

    // Each byte is one operation: acquire a key in a new consumer, or destroy one
    for &byte in data {
        let key = byte % 4;
        if byte & 0x80 == 0 {
            let consumer = scope.consumer().unwrap();
            composable.get(&consumer, &key).unwrap();
            consumers.push(consumer);
        } else if !consumers.is_empty() {
            let index = byte as usize % consumers.len();
            consumers.swap_remove(index).destroy().unwrap();
        }

        let live = composable.live_entries(&scope);
        let alive = built.load(Ordering::SeqCst) - cleaned.load(Ordering::SeqCst);
        assert_eq!(live, alive);
    }

    scope.destroy().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), cleaned.load(Ordering::SeqCst));
    assert_eq!(composable.live_entries(&scope), 0);
});
