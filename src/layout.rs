//! Physical key layout for chunked values
//!
//! A logical key `k` maps onto the medium as either a single direct entry
//! `k`, or a set of slices `k_0 .. k_(n-1)` plus a sentinel `k_chunks`
//! holding `n`. Non-transactional writes stage slices under `k_temp_i`
//! before promoting them.

use std::collections::HashSet;

/// Suffix of the entry recording how many slices a value was split into
pub const SENTINEL_SUFFIX: &str = "_chunks";

/// Marker inserted into staging keys during a chunked write
pub const STAGING_MARKER: &str = "_temp_";

/// Key written and removed to check that the medium accepts writes
pub const WRITE_CHECK_KEY: &str = "__storage_test__";

/// Key of slice `index` for `key`
pub fn slice_key(key: &str, index: usize) -> String {
    format!("{key}_{index}")
}

/// Staging key of slice `index` for `key`
pub fn staging_key(key: &str, index: usize) -> String {
    format!("{key}{STAGING_MARKER}{index}")
}

/// Sentinel key for `key`
pub fn sentinel_key(key: &str) -> String {
    format!("{key}{SENTINEL_SUFFIX}")
}

/// Role a physical key plays relative to its logical base key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derived<'a> {
    /// `base_chunks`
    Sentinel(&'a str),
    /// `base_<n>`
    Slice(&'a str, usize),
    /// `base_temp_<n>`
    Staging(&'a str, usize),
}

impl<'a> Derived<'a> {
    /// Logical key this physical key belongs to
    pub fn base(&self) -> &'a str {
        match *self {
            Derived::Sentinel(base) | Derived::Slice(base, _) | Derived::Staging(base, _) => base,
        }
    }
}

/// Classify a physical key as sentinel, slice, or staging key
///
/// Returns `None` for keys that cannot have been produced by a chunked
/// write. A key like `cart_3` is ambiguous on its own; callers decide by
/// checking whether `cart` has a sentinel.
pub fn classify(physical: &str) -> Option<Derived<'_>> {
    if let Some(base) = physical.strip_suffix(SENTINEL_SUFFIX)
        && !base.is_empty()
    {
        return Some(Derived::Sentinel(base));
    }

    let (head, digits) = physical.rsplit_once('_')?;
    let index = parse_index(digits)?;
    if head.is_empty() {
        return None;
    }

    match head.strip_suffix("_temp") {
        Some(base) if !base.is_empty() => Some(Derived::Staging(base, index)),
        _ => Some(Derived::Slice(head, index)),
    }
}

/// Check whether `physical` is a sentinel, slice, or staging key of `key`
///
/// Only exact derived forms match, so `cart_items` is not derived from `cart`.
pub fn is_derived_from(key: &str, physical: &str) -> bool {
    let Some(rest) = physical.strip_prefix(key).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };

    rest == "chunks"
        || parse_index(rest).is_some()
        || rest.strip_prefix("temp_").and_then(parse_index).is_some()
}

/// Physical keys in `physical` that belong to `key`
///
/// A candidate such as `a_temp_0` looks derived from `a`, but when
/// `a_temp_chunks` exists it is a live slice of `a_temp` and is left out.
pub fn owned_by<'a>(key: &str, physical: &'a [String]) -> Vec<&'a str> {
    let chunked: HashSet<&str> = physical
        .iter()
        .filter_map(|k| match classify(k) {
            Some(Derived::Sentinel(base)) => Some(base),
            _ => None,
        })
        .collect();

    physical
        .iter()
        .map(String::as_str)
        .filter(|k| is_derived_from(key, k))
        .filter(|k| {
            !k.rsplit_once('_')
                .is_some_and(|(head, _)| head != key && chunked.contains(head))
        })
        .collect()
}

fn parse_index(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Split `text` into slices of at most `chunk_size` bytes
///
/// Slices end on char boundaries so every slice is valid UTF-8. A slice is
/// never empty, even when a single character is wider than `chunk_size`.
pub fn split(text: &str, chunk_size: usize) -> Vec<&str> {
    let mut slices = Vec::with_capacity(text.len().div_ceil(chunk_size.max(1)));
    let mut rest = text;

    while !rest.is_empty() {
        let mut end = chunk_size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (head, tail) = rest.split_at(end);
        slices.push(head);
        rest = tail;
    }

    slices
}
