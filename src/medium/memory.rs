//! In-process medium backed by an ordered map

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::Medium;
use crate::error::MediumError;

/// Non-transactional in-memory medium
///
/// Mirrors a browser-style local storage area: writes land one at a time,
/// an optional hard capacity rejects writes past it, and the whole medium
/// can be switched off to exercise unavailability.
#[derive(Debug)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
    available: AtomicBool,
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMedium {
    /// Create an empty medium with no hard capacity
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity: None,
            available: AtomicBool::new(true),
        }
    }

    /// Create an empty medium that refuses writes beyond `capacity` bytes of values
    pub fn with_capacity(capacity: usize) -> Self {
        debug!(capacity, "MemoryMedium::with_capacity: called");
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Switch the medium on or off
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of physical entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), MediumError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MediumError::Unavailable("memory medium disabled".to_string()))
        }
    }
}

impl Medium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        self.check_available()?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        self.check_available()?;
        let mut entries = self.lock();

        if let Some(capacity) = self.capacity {
            let used: usize = entries.values().map(String::len).sum();
            let replaced = entries.get(key).map_or(0, String::len);
            if used - replaced + value.len() > capacity {
                return Err(MediumError::Full {
                    key: key.to_string(),
                    capacity,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        self.check_available()?;
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        self.check_available()?;
        Ok(self.lock().keys().cloned().collect())
    }

    fn total_size(&self) -> Result<usize, MediumError> {
        self.check_available()?;
        Ok(self.lock().values().map(String::len).sum())
    }
}
