//! Internal disposal bag for destruction hooks.

use std::panic::{self, AssertUnwindSafe};

/// A destruction hook.
pub type Hook = Box<dyn FnOnce() + Send>;

/// Container for destruction hooks with LIFO execution order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<Hook>,
}

impl DisposeBag {
    /// Add a hook.
    pub(crate) fn push(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Execute all hooks in reverse order (LIFO).
    ///
    /// A panicking hook does not stop the others. Returns the number of hooks
    /// that panicked.
    pub(crate) fn run_all_reverse(&mut self) -> usize {
        let mut panicked = 0;
        while let Some(hook) = self.hooks.pop() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(hook)) {
                log::error!("destruction hook panicked: {}", panic_message(payload.as_ref()));
                panicked += 1;
            }
        }
        panicked
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
