//! Per-frame callback lists
//!
//! Each callback runs in its own failure boundary: an error is logged with
//! the callback's position and the next callback still runs. The list is
//! snapshotted before a pass, so a callback may register further callbacks;
//! those first run on the following pass.

use std::cell::RefCell;
use std::fmt::Display;

/// Ordered callbacks of one kind (update or late update)
#[derive(Debug)]
pub struct CallbackList<F> {
    label: &'static str,
    callbacks: RefCell<Vec<F>>,
}

impl<F: Clone> CallbackList<F> {
    /// Create an empty list; `label` names the pass in error logs
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            callbacks: RefCell::new(Vec::new()),
        }
    }

    /// Append a callback; it runs after those already registered
    pub fn push(&self, callback: F) {
        self.callbacks.borrow_mut().push(callback);
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Whether no callback is registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.borrow().is_empty()
    }

    /// Drop every callback
    pub fn clear(&self) {
        self.callbacks.borrow_mut().clear();
    }

    /// Invoke every callback; returns how many failed
    ///
    /// `origin` prefixes error logs, typically the adapter name.
    pub fn run<E: Display>(&self, origin: &str, mut invoke: impl FnMut(&F) -> Result<(), E>) -> usize {
        let snapshot: Vec<F> = self.callbacks.borrow().clone();
        let mut failures = 0;
        for (index, callback) in snapshot.iter().enumerate() {
            if let Err(err) = invoke(callback) {
                failures += 1;
                log::error!("[{}] {} callback #{} failed: {}", origin, self.label, index + 1, err);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_failure_does_not_stop_later_callbacks() {
        let list: CallbackList<u32> = CallbackList::new("update");
        list.push(1);
        list.push(2);
        list.push(3);

        let ran = Cell::new(0);
        let failures = list.run("test", |id| {
            ran.set(ran.get() + 1);
            if *id == 2 {
                Err("boom")
            } else {
                Ok(())
            }
        });
        assert_eq!(failures, 1);
        assert_eq!(ran.get(), 3);
    }

    #[test]
    fn test_callbacks_added_during_run_wait_for_next_pass() {
        let list: Rc<CallbackList<u32>> = Rc::new(CallbackList::new("update"));
        list.push(0);

        let inner = Rc::clone(&list);
        let mut seen = Vec::new();
        list.run::<String>("test", |id| {
            seen.push(*id);
            inner.push(id + 1);
            Ok(())
        });
        assert_eq!(seen, vec![0]);
        assert_eq!(list.len(), 2);
    }
}
