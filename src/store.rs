//! Core ChunkedStore implementation

use std::collections::{BTreeSet, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MediumError, StoreError};
use crate::eviction::{EvictionPolicy, MarkerEviction};
use crate::layout::{self, Derived, WRITE_CHECK_KEY};
use crate::lock::KeyLocks;
use crate::medium::{Medium, Op};

/// How medium failures surface to callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Log and skip: writes become no-ops, reads return `None`
    #[default]
    Soft,
    /// Return [`StoreError::Unavailable`]
    Strict,
}

/// Tuning for a [`ChunkedStore`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Values whose serialized length reaches this many bytes are split
    pub chunk_size: usize,
    /// Budget for the sum of all value lengths in the medium
    pub max_total_size: usize,
    /// Substrings marking keys that may be evicted under quota pressure
    pub eviction_markers: Vec<String>,
    pub failure_mode: FailureMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            max_total_size: crate::DEFAULT_MAX_TOTAL_SIZE,
            eviction_markers: crate::eviction::DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            failure_mode: FailureMode::Soft,
        }
    }
}

/// Space accounting for the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// Bytes held in values across all physical keys
    pub used_bytes: usize,
    /// Configured budget
    pub limit_bytes: usize,
    /// Number of physical keys, including slices and sentinels
    pub physical_keys: usize,
}

/// Key-value store that splits large values across several medium entries
pub struct ChunkedStore<M: Medium> {
    medium: M,
    options: StoreOptions,
    eviction: Box<dyn EvictionPolicy>,
    locks: KeyLocks,
}

impl<M: Medium> ChunkedStore<M> {
    /// Create a store over `medium`
    pub fn new(medium: M, options: StoreOptions) -> Self {
        let eviction = Box::new(MarkerEviction::new(options.eviction_markers.iter().cloned()));
        debug!(
            chunk_size = options.chunk_size,
            max_total_size = options.max_total_size,
            transactional = medium.is_transactional(),
            "Opened chunked store"
        );
        Self {
            medium,
            options,
            eviction,
            locks: KeyLocks::new(),
        }
    }

    /// Replace the eviction policy used under quota pressure
    pub fn with_eviction(mut self, policy: impl EvictionPolicy + 'static) -> Self {
        self.eviction = Box::new(policy);
        self
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Serialize `value` and store it under `key`
    ///
    /// Fails with [`StoreError::Serialization`] or [`StoreError::QuotaExceeded`]
    /// without touching the medium. Medium failures follow the configured
    /// [`FailureMode`].
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        validate_key(key)?;
        let serialized = serde_json::to_string(value).map_err(StoreError::Serialization)?;

        match self.locks.with_lock(key, || self.set_locked(key, &serialized)) {
            Err(StoreError::Unavailable(err)) => self.soften(key, "set", err),
            result => result,
        }
    }

    /// Read and deserialize the value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        validate_key(key)?;

        let text = match self.locks.with_lock(key, || self.read_locked(key)) {
            Ok(text) => text,
            Err(StoreError::Unavailable(err)) => return self.soften(key, "get", err),
            Err(err) => return Err(err),
        };

        match text {
            Some(text) => decode(key, &text).map(Some),
            None => Ok(None),
        }
    }

    /// Read-modify-write `key` under a single hold of its lock
    ///
    /// `f` receives the current value and returns the replacement, or `None`
    /// to leave the stored value untouched.
    pub(crate) fn update<T, F>(&self, key: &str, f: F) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        validate_key(key)?;

        let result = self.locks.with_lock(key, || {
            let current = match self.read_locked(key)? {
                Some(text) => Some(decode(key, &text)?),
                None => None,
            };
            let Some(next) = f(current) else {
                return Ok(());
            };
            let serialized = serde_json::to_string(&next).map_err(StoreError::Serialization)?;
            self.set_locked(key, &serialized)
        });

        match result {
            Err(StoreError::Unavailable(err)) => self.soften(key, "update", err),
            result => result,
        }
    }

    /// Delete `key` in whichever representation it is stored
    ///
    /// Removing a missing key is a no-op.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;

        let result = self.locks.with_lock(key, || -> Result<usize, MediumError> {
            let sentinel = layout::sentinel_key(key);
            let physical = self.medium.keys()?;
            let mut ops = vec![Op::remove(sentinel.as_str()), Op::remove(key)];
            ops.extend(
                layout::owned_by(key, &physical)
                    .into_iter()
                    .filter(|k| *k != sentinel)
                    .map(Op::remove),
            );
            self.medium.apply(&ops)?;
            Ok(ops.len())
        });

        match result {
            Ok(removed) => {
                debug!(key, removed, "Removed key");
                Ok(())
            }
            Err(err) => self.soften(key, "remove", err),
        }
    }

    /// Check whether a value is stored under `key`
    pub fn contains(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;

        let result = self.locks.with_lock(key, || -> Result<bool, MediumError> {
            Ok(self.medium.get(&layout::sentinel_key(key))?.is_some() || self.medium.get(key)?.is_some())
        });

        match result {
            Ok(found) => Ok(found),
            Err(err) => self.soften(key, "contains", err),
        }
    }

    /// List logical keys, folding slices and sentinels into their base key
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let physical = match self.medium.keys() {
            Ok(keys) => keys,
            Err(err) => return self.soften("*", "keys", err),
        };

        let chunked: BTreeSet<&str> = physical
            .iter()
            .filter_map(|k| match layout::classify(k) {
                Some(Derived::Sentinel(base)) => Some(base),
                _ => None,
            })
            .collect();

        let mut logical: BTreeSet<String> = chunked.iter().map(|base| base.to_string()).collect();
        for key in &physical {
            match layout::classify(key) {
                Some(Derived::Sentinel(_)) | Some(Derived::Staging(..)) => {}
                Some(Derived::Slice(base, _)) if chunked.contains(base) => {}
                _ if key == WRITE_CHECK_KEY => {}
                _ => {
                    logical.insert(key.clone());
                }
            }
        }

        Ok(logical.into_iter().collect())
    }

    /// Report space used in the medium against the budget
    pub fn usage(&self) -> Result<Usage, StoreError> {
        Ok(Usage {
            used_bytes: self.medium.total_size()?,
            limit_bytes: self.options.max_total_size,
            physical_keys: self.medium.keys()?.len(),
        })
    }

    /// Run the eviction policy now, returning how many keys were removed
    pub fn cleanup(&self) -> Result<usize, StoreError> {
        match self.evict() {
            Ok(removed) => Ok(removed),
            Err(err) => self.soften("*", "cleanup", err),
        }
    }

    /// Flush the medium and release the store
    pub fn close(self) -> Result<(), StoreError> {
        self.medium.flush()?;
        debug!("Closed chunked store");
        Ok(())
    }

    fn set_locked(&self, key: &str, serialized: &str) -> Result<(), StoreError> {
        if !self.medium.check_writable() {
            return Err(MediumError::Unavailable("write check failed".to_string()).into());
        }

        self.ensure_capacity(key, serialized.len())?;

        if let Err(err) = self.write_layout(key, serialized) {
            // A transaction rolled back cleanly; anything else may be half written
            if !self.medium.is_transactional() {
                self.purge(key);
            }
            return Err(err.into());
        }

        Ok(())
    }

    fn ensure_capacity(&self, key: &str, required: usize) -> Result<(), StoreError> {
        let limit = self.options.max_total_size;
        let used = self.medium.total_size()?;
        if used + required <= limit {
            return Ok(());
        }

        let evicted = self.evict()?;
        let used = self.medium.total_size()?;
        if used + required > limit {
            warn!(key, required, used, limit, evicted, "Storage quota would be exceeded");
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                required,
                used,
                limit,
            });
        }

        Ok(())
    }

    fn evict(&self) -> Result<usize, MediumError> {
        let keys = self.medium.keys()?;
        let selected = self.eviction.select(&keys);
        for key in &selected {
            self.medium.remove(key)?;
        }
        info!(evicted = selected.len(), "Cleanup pass complete");
        Ok(selected.len())
    }

    fn write_layout(&self, key: &str, serialized: &str) -> Result<(), MediumError> {
        let sentinel = layout::sentinel_key(key);
        let physical = self.medium.keys()?;
        let stale: Vec<String> = layout::owned_by(key, &physical)
            .into_iter()
            .filter(|k| *k != sentinel)
            .map(String::from)
            .collect();

        if serialized.len() < self.options.chunk_size {
            // Direct value lands first so a sentinel never points at nothing
            let mut ops = vec![Op::set(key, serialized), Op::remove(sentinel.as_str())];
            ops.extend(stale.into_iter().map(Op::remove));
            self.medium.apply(&ops)?;
            debug!(key, bytes = serialized.len(), "Stored value directly");
            return Ok(());
        }

        let slices = layout::split(serialized, self.options.chunk_size);
        let count = slices.len();
        // Staging keys of `a` are the slice keys of `a_temp`; never stage over live ones
        let staged = !self.medium.is_transactional()
            && !physical.contains(&layout::sentinel_key(&format!("{key}_temp")));

        let mut keep: HashSet<String> = (0..count).map(|i| layout::slice_key(key, i)).collect();
        let mut ops = Vec::with_capacity(count * 3 + stale.len() + 3);

        if staged {
            for (index, slice) in slices.iter().enumerate() {
                let staging = layout::staging_key(key, index);
                ops.push(Op::set(staging.as_str(), *slice));
                keep.insert(staging);
            }
        }

        ops.push(Op::remove(sentinel.as_str()));
        ops.push(Op::remove(key));
        ops.extend(stale.into_iter().filter(|k| !keep.contains(k)).map(Op::remove));

        // Promote from memory rather than re-reading staged slices, which an
        // eviction pass may already have removed
        for (index, slice) in slices.iter().enumerate() {
            ops.push(Op::set(layout::slice_key(key, index), *slice));
            if staged {
                ops.push(Op::remove(layout::staging_key(key, index)));
            }
        }

        ops.push(Op::set(sentinel, count.to_string()));
        self.medium.apply(&ops)?;

        debug!(key, bytes = serialized.len(), count, staged, "Stored value in chunks");
        Ok(())
    }

    fn read_locked(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(raw) = self.medium.get(&layout::sentinel_key(key))? else {
            return Ok(self.medium.get(key)?);
        };

        let count = match raw.trim().parse::<usize>() {
            Ok(count) if count > 0 => count,
            _ => {
                return Err(StoreError::CorruptedSentinel {
                    key: key.to_string(),
                    raw,
                });
            }
        };

        let mut text = String::new();
        for index in 0..count {
            let slice = self
                .medium
                .get(&layout::slice_key(key, index))?
                .ok_or_else(|| StoreError::CorruptedChunk {
                    key: key.to_string(),
                    index,
                    count,
                })?;
            text.push_str(&slice);
        }

        debug!(key, count, bytes = text.len(), "Reassembled chunked value");
        Ok(Some(text))
    }

    /// Best-effort removal of every physical key belonging to `key`
    fn purge(&self, key: &str) {
        let mut keys = vec![key.to_string()];
        if let Ok(physical) = self.medium.keys() {
            keys.extend(layout::owned_by(key, &physical).into_iter().map(String::from));
        }
        for physical in keys {
            if let Err(err) = self.medium.remove(&physical) {
                debug!(key = %physical, %err, "ChunkedStore::purge: remove failed");
            }
        }
    }

    fn soften<T: Default>(&self, key: &str, op: &str, err: MediumError) -> Result<T, StoreError> {
        match self.options.failure_mode {
            FailureMode::Soft => {
                warn!(key, op, error = %err, "Storage medium failure, operation skipped");
                Ok(T::default())
            }
            FailureMode::Strict => Err(err.into()),
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|source| StoreError::Deserialization {
        key: key.to_string(),
        source,
    })
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key must not be empty".to_string()));
    }
    if key == WRITE_CHECK_KEY {
        return Err(StoreError::InvalidKey(format!("{key} is reserved")));
    }
    Ok(())
}
