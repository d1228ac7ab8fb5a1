//! Reentrant construction detection.

use std::cell::RefCell;

use crate::error::{ShareError, ShareResult};

// Thread-local construction state: entries currently being built on this thread
thread_local! {
    static CONSTRUCTION_TLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Guard marking an entry as under construction on the current thread.
///
/// Entering a label that is already on the stack means a factory is trying to
/// construct its own entry, which would block forever on the entry's cell.
pub(crate) struct ConstructionGuard {
    label: String,
}

impl ConstructionGuard {
    pub(crate) fn enter(label: String, max_depth: usize) -> ShareResult<Self> {
        CONSTRUCTION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();

            // Circular detection BEFORE pushing the new label
            if stack.iter().any(|l| *l == label) {
                let mut path = stack.clone();
                path.push(label.clone());
                return Err(ShareError::Circular(path));
            }

            // Depth guard
            if stack.len() >= max_depth {
                return Err(ShareError::DepthExceeded(stack.len()));
            }

            stack.push(label.clone());
            Ok(())
        })?;

        Ok(Self { label })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.label);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_distinct_labels_are_allowed() {
        let _a = ConstructionGuard::enter("a".into(), 8).unwrap();
        let _b = ConstructionGuard::enter("b".into(), 8).unwrap();
    }

    #[test]
    fn reentering_a_label_reports_the_path() {
        let _a = ConstructionGuard::enter("a".into(), 8).unwrap();
        let _b = ConstructionGuard::enter("b".into(), 8).unwrap();
        match ConstructionGuard::enter("a".into(), 8) {
            Err(ShareError::Circular(path)) => assert_eq!(path, vec!["a", "b", "a"]),
            _ => panic!("expected circular error"),
        }
    }

    #[test]
    fn guard_pops_on_drop() {
        {
            let _a = ConstructionGuard::enter("a".into(), 8).unwrap();
        }
        let _again = ConstructionGuard::enter("a".into(), 8).unwrap();
    }

    #[test]
    fn depth_is_bounded() {
        let _a = ConstructionGuard::enter("a".into(), 1).unwrap();
        assert!(matches!(
            ConstructionGuard::enter("b".into(), 1),
            Err(ShareError::DepthExceeded(1))
        ));
    }
}
