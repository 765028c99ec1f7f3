//! Backing media for the chunked store
//!
//! A medium is a flat string-to-string map. The store only relies on the
//! operations of the [`Medium`] trait, so anything from an in-process map to
//! an embedded database can sit underneath it.

mod memory;
mod sqlite;

pub use memory::MemoryMedium;
pub use sqlite::SqliteMedium;

use crate::error::MediumError;
use crate::layout::WRITE_CHECK_KEY;

/// A single mutation applied through [`Medium::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Set { key: String, value: String },
    Remove { key: String },
}

impl Op {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Op::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Op::Remove { key: key.into() }
    }
}

/// String-keyed, string-valued storage underneath a [`crate::ChunkedStore`]
pub trait Medium: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), MediumError>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), MediumError>;

    /// List every key currently stored
    fn keys(&self) -> Result<Vec<String>, MediumError>;

    /// Sum of the byte lengths of all stored values
    fn total_size(&self) -> Result<usize, MediumError> {
        let mut total = 0;
        for key in self.keys()? {
            total += self.get(&key)?.map_or(0, |v| v.len());
        }
        Ok(total)
    }

    /// Check that the medium currently accepts writes
    fn check_writable(&self) -> bool {
        self.set(WRITE_CHECK_KEY, WRITE_CHECK_KEY).is_ok() && self.remove(WRITE_CHECK_KEY).is_ok()
    }

    /// Apply `ops` in order
    ///
    /// The default applies them one at a time and stops at the first error,
    /// leaving earlier ops in place. Transactional media override this to
    /// apply all or nothing.
    fn apply(&self, ops: &[Op]) -> Result<(), MediumError> {
        for op in ops {
            match op {
                Op::Set { key, value } => self.set(key, value)?,
                Op::Remove { key } => self.remove(key)?,
            }
        }
        Ok(())
    }

    /// Whether [`Medium::apply`] is atomic
    fn is_transactional(&self) -> bool {
        false
    }

    /// Persist any buffered state
    fn flush(&self) -> Result<(), MediumError> {
        Ok(())
    }
}

impl<M: Medium + ?Sized> Medium for &M {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        (**self).keys()
    }

    fn total_size(&self) -> Result<usize, MediumError> {
        (**self).total_size()
    }

    fn check_writable(&self) -> bool {
        (**self).check_writable()
    }

    fn apply(&self, ops: &[Op]) -> Result<(), MediumError> {
        (**self).apply(ops)
    }

    fn is_transactional(&self) -> bool {
        (**self).is_transactional()
    }

    fn flush(&self) -> Result<(), MediumError> {
        (**self).flush()
    }
}
