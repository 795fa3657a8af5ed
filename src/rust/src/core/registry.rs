//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The registry of live calls.
//!
//! Mutation goes through `add`/`remove` only, which keep the session's
//! ongoing-call flag in lockstep with the map: `ongoing_call` is true
//! exactly when the registry is non-empty.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::common::state::StateLock;
use crate::common::CallId;
use crate::core::call::Call;
use crate::core::platform::Platform;

pub struct CallRegistry<T>
where
    T: Platform,
{
    calls: Arc<StateLock<HashMap<CallId, Call<T>>>>,
    ongoing_call: Arc<AtomicBool>,
}

impl<T> Clone for CallRegistry<T>
where
    T: Platform,
{
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
            ongoing_call: Arc::clone(&self.ongoing_call),
        }
    }
}

impl<T> CallRegistry<T>
where
    T: Platform,
{
    pub fn new() -> Self {
        Self {
            calls: Arc::new(StateLock::new(HashMap::new(), "call_registry")),
            ongoing_call: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add(&self, call: Call<T>) {
        let mut calls = self.calls.lock();
        let call_id = call.call_id();
        if calls.insert(call_id, call).is_some() {
            warn!("registry: replaced existing call: {}", call_id);
        }
        self.ongoing_call.store(!calls.is_empty(), Ordering::Release);
    }

    pub fn remove(&self, call_id: CallId) -> Option<Call<T>> {
        let mut calls = self.calls.lock();
        let removed = calls.remove(&call_id);
        self.ongoing_call.store(!calls.is_empty(), Ordering::Release);
        removed
    }

    pub fn get(&self, call_id: CallId) -> Option<Call<T>> {
        self.calls.lock().get(&call_id).cloned()
    }

    pub fn contains(&self, call_id: CallId) -> bool {
        self.calls.lock().contains_key(&call_id)
    }

    /// A snapshot of the live calls, for iteration that mutates the
    /// registry (teardown ends each call, which removes it).
    pub fn snapshot(&self) -> Vec<Call<T>> {
        self.calls.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ongoing_call(&self) -> bool {
        self.ongoing_call.load(Ordering::Acquire)
    }
}

impl<T> Default for CallRegistry<T>
where
    T: Platform,
{
    fn default() -> Self {
        Self::new()
    }
}
