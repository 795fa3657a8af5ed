//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Shared mutable state for session and call fields.
//!
//! Every mutation of session or call state runs serialized on the
//! session executor, so a lock here is only ever contended briefly by
//! readers on host threads.  A poisoned lock means a handler panicked
//! mid-frame; the fields guarded here are single assignments (a state
//! enum, an id, a flag set), so the value underneath is still coherent.
//! Rather than failing every later operation on the session, `lock`
//! recovers the value and logs which piece of state was involved.

use std::sync::{Mutex, MutexGuard};

/// A labeled lock around one piece of session or call state.
pub struct StateLock<T> {
    /// Which piece of state this is, for the recovery log line.
    label: &'static str,
    value: Mutex<T>,
}

impl<T> StateLock<T> {
    pub fn new(value: T, label: &'static str) -> Self {
        Self {
            label,
            value: Mutex::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        match self.value.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("state {}: recovering from a poisoned lock", self.label);
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lock_recovers_after_a_panicked_holder() {
        let lock = Arc::new(StateLock::new(7u32, "test_value"));

        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(*lock.lock(), 7);
        *lock.lock() = 8;
        assert_eq!(*lock.lock(), 8);
    }
}
