//! Integration tests for ChunkedStore
//!
//! These tests exercise the store end-to-end over both media.

use std::sync::Arc;
use std::thread;

use chunkstore::{ChunkedStore, Medium, MemoryMedium, SqliteMedium, StoreError, StoreOptions};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tempfile::TempDir;

fn options(chunk_size: usize) -> StoreOptions {
    StoreOptions {
        chunk_size,
        ..Default::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    favorites: Vec<u32>,
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_large_profile_end_to_end() {
    let store = ChunkedStore::new(MemoryMedium::new(), options(65536));
    let name = "A".repeat(200_000);

    store.set("profile", &json!({ "name": name })).unwrap();

    let medium = store.medium();
    assert_eq!(medium.get("profile_chunks").unwrap(), Some("4".to_string()));
    for index in 0..4 {
        assert!(medium.get(&format!("profile_{index}")).unwrap().is_some());
    }
    assert_eq!(medium.get("profile_4").unwrap(), None);
    assert_eq!(medium.get("profile").unwrap(), None);

    let value: Value = store.get("profile").unwrap().unwrap();
    assert_eq!(value["name"].as_str().unwrap().len(), 200_000);
}

#[test]
fn test_sqlite_chunked_write_skips_staging() {
    let temp = TempDir::new().unwrap();
    let store = ChunkedStore::new(SqliteMedium::open(temp.path().join("store.db")).unwrap(), options(16));

    let profile = Profile {
        name: "B".repeat(100),
        favorites: vec![1, 2, 3],
    };
    store.set("profile", &profile).unwrap();

    let keys = store.medium().keys().unwrap();
    assert!(keys.iter().all(|k| !k.contains("_temp_")));
    assert!(keys.contains(&"profile_chunks".to_string()));
    assert_eq!(store.get::<Profile>("profile").unwrap(), Some(profile));
}

#[test]
fn test_sqlite_state_transitions() {
    let store = ChunkedStore::new(SqliteMedium::in_memory().unwrap(), options(16));

    store.set("cart", &"x".repeat(100)).unwrap();
    store.set("cart", &"small").unwrap();
    assert_eq!(store.medium().keys().unwrap(), vec!["cart".to_string()]);

    store.set("cart", &"y".repeat(40)).unwrap();
    assert_eq!(store.medium().get("cart").unwrap(), None);
    assert_eq!(store.medium().get("cart_chunks").unwrap(), Some("3".to_string()));

    store.remove("cart").unwrap();
    store.remove("cart").unwrap();
    assert!(store.medium().keys().unwrap().is_empty());
}

#[test]
fn test_store_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let profile = Profile {
        name: "C".repeat(300),
        favorites: vec![7],
    };

    let store = ChunkedStore::new(SqliteMedium::open(&path).unwrap(), options(64));
    store.set("profile", &profile).unwrap();
    store.close().unwrap();

    let store = ChunkedStore::new(SqliteMedium::open(&path).unwrap(), options(64));
    assert_eq!(store.get::<Profile>("profile").unwrap(), Some(profile));
}

#[test]
fn test_chunk_size_change_reads_by_sentinel() {
    let medium = MemoryMedium::new();
    let value = "D".repeat(50);

    {
        let writer = ChunkedStore::new(&medium, options(8));
        writer.set("k", &value).unwrap();
    }
    assert_eq!(medium.get("k_chunks").unwrap(), Some("7".to_string()));

    let reader = ChunkedStore::new(&medium, options(4096));
    assert_eq!(reader.get::<String>("k").unwrap(), Some(value));

    // Rewriting under the new size collapses to a direct entry
    reader.set("k", &"E".repeat(50)).unwrap();
    assert_eq!(medium.keys().unwrap(), vec!["k".to_string()]);
}

#[test]
fn test_quota_scenario() {
    let store = ChunkedStore::new(
        MemoryMedium::new(),
        StoreOptions {
            max_total_size: 1000,
            ..Default::default()
        },
    );
    store.medium().set("img_temp_3", &"t".repeat(50)).unwrap();
    store.set("a", &"x".repeat(848)).unwrap();

    let err = store.set("b", &"y".repeat(198)).unwrap_err();

    assert!(err.is_quota());
    assert_eq!(store.medium().get("img_temp_3").unwrap(), None);
    assert_eq!(store.get::<String>("b").unwrap(), None);
    assert_eq!(store.get::<String>("a").unwrap(), Some("x".repeat(848)));
}

#[test]
fn test_corruption_distinct_from_missing() {
    let store = ChunkedStore::new(MemoryMedium::new(), options(8));
    store.set("k", &"z".repeat(20)).unwrap();
    store.medium().remove("k_1").unwrap();

    assert!(matches!(store.get::<String>("k"), Err(StoreError::CorruptedChunk { index: 1, .. })));
    assert!(matches!(store.get::<String>("other"), Ok(None)));
}

#[test]
fn test_concurrent_writers_never_tear() {
    let store = Arc::new(ChunkedStore::new(MemoryMedium::new(), options(8)));
    let small = "s".to_string();
    let large = "L".repeat(64);
    store.set("shared", &small).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            let small = small.clone();
            let large = large.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    let value = if (worker + round) % 2 == 0 { &large } else { &small };
                    store.set("shared", value).unwrap();

                    let read: String = store.get("shared").unwrap().unwrap();
                    assert!(read == small || read == large);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let last: String = store.get("shared").unwrap().unwrap();
    let keys = store.medium().keys().unwrap();
    if last == small {
        assert_eq!(keys, vec!["shared".to_string()]);
    } else {
        assert!(!keys.contains(&"shared".to_string()));
        assert!(keys.iter().all(|k| !k.contains("_temp_")));
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_round_trip_memory(text in ".{0,300}", numbers in prop::collection::vec(any::<i64>(), 0..20), chunk_size in 4usize..64) {
        let store = ChunkedStore::new(MemoryMedium::new(), options(chunk_size));
        let value = json!({ "text": text, "numbers": numbers });

        store.set("entry", &value).unwrap();
        prop_assert_eq!(store.get::<Value>("entry").unwrap(), Some(value));
    }

    #[test]
    fn prop_round_trip_sqlite(text in ".{0,300}", chunk_size in 4usize..64) {
        let store = ChunkedStore::new(SqliteMedium::in_memory().unwrap(), options(chunk_size));

        store.set("entry", &text).unwrap();
        prop_assert_eq!(store.get::<String>("entry").unwrap(), Some(text));
    }

    #[test]
    fn prop_rewrite_leaves_no_orphans(first in 0usize..200, second in 0usize..200, chunk_size in 4usize..32) {
        let store = ChunkedStore::new(MemoryMedium::new(), options(chunk_size));
        store.set("k", &"a".repeat(first)).unwrap();
        store.set("k", &"b".repeat(second)).unwrap();

        let serialized_len = second + 2;
        let keys = store.medium().keys().unwrap();
        if serialized_len < chunk_size {
            prop_assert_eq!(keys, vec!["k".to_string()]);
        } else {
            let count = serialized_len.div_ceil(chunk_size);
            prop_assert_eq!(keys.len(), count + 1);
            prop_assert_eq!(store.medium().get("k_chunks").unwrap(), Some(count.to_string()));
        }
    }
}
