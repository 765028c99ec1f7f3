//! Eviction policies run when a write would exceed the size budget

use crate::layout::WRITE_CHECK_KEY;

/// Default markers identifying disposable keys
pub const DEFAULT_MARKERS: &[&str] = &["_temp_", "_old_"];

/// Chooses which physical keys to delete under quota pressure
pub trait EvictionPolicy: Send + Sync {
    /// Return the subset of `keys` to delete
    fn select(&self, keys: &[String]) -> Vec<String>;
}

/// Evicts every key containing one of a fixed set of substrings
///
/// This is a naming heuristic with no notion of recency or age. A user key
/// that happens to contain a marker is evicted along with staging keys.
#[derive(Debug, Clone)]
pub struct MarkerEviction {
    markers: Vec<String>,
}

impl MarkerEviction {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).filter(|m: &String| !m.is_empty()).collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for MarkerEviction {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().copied())
    }
}

impl EvictionPolicy for MarkerEviction {
    fn select(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter(|key| key.as_str() != WRITE_CHECK_KEY)
            .filter(|key| self.markers.iter().any(|m| key.contains(m.as_str())))
            .cloned()
            .collect()
    }
}
