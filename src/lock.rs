//! Per-key mutual exclusion
//!
//! A chunked write touches several physical keys in sequence. Holding the
//! logical key's lock for the whole sequence keeps concurrent readers and
//! writers of that key from seeing a sentinel that disagrees with its slices.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`
    pub fn with_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let entry = {
            let mut locks = self.table();
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        let result = {
            let _guard = entry.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        let mut locks = self.table();
        // One reference in the table plus ours means nobody else is waiting
        if Arc::strong_count(&entry) == 2 {
            locks.remove(key);
        }

        result
    }

    /// Number of keys with a live lock entry
    pub fn active(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
