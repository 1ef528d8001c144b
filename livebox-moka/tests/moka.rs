//! TTL and capacity behaviour of the Moka backend.

use std::time::Duration;

use livebox_backend::{CacheBackend, DeleteStatus};
use livebox_core::ResourceKey;
use livebox_moka::{EvictionPolicy, MokaBackend};

fn key(id: u32) -> ResourceKey {
    ResourceKey::new("profile", id.to_string())
}

#[tokio::test(start_paused = true)]
async fn entries_expire_exactly_at_ttl() {
    let ttl = Duration::from_secs(60);
    let backend = MokaBackend::<String>::builder(ttl).max_entries(100).build();
    backend.set(&key(1), "ada".to_string()).await;

    tokio::time::advance(ttl - Duration::from_millis(1)).await;
    assert_eq!(backend.get(&key(1)).await.as_deref(), Some("ada"));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(backend.get(&key(1)).await, None);
}

#[tokio::test]
async fn invalidate_reports_presence() {
    let backend = MokaBackend::<u8>::builder(Duration::from_secs(60))
        .max_entries(100)
        .build();
    backend.set(&key(1), 1u8).await;

    assert_eq!(backend.invalidate(&key(1)).await, DeleteStatus::Deleted(1));
    assert_eq!(backend.invalidate(&key(1)).await, DeleteStatus::Missing);
    assert_eq!(backend.get(&key(1)).await, None);
}

#[tokio::test]
async fn entry_cap_bounds_the_cache() {
    let backend = MokaBackend::<u32>::builder(Duration::from_secs(60))
        .max_entries(3)
        .eviction_policy(EvictionPolicy::lru())
        .build();

    for id in 1..=3 {
        backend.set(&key(id), id).await;
    }
    backend.run_pending_tasks().await;
    for id in 1..=3 {
        assert_eq!(backend.get(&key(id)).await, Some(id), "entry {id} should fit");
    }

    backend.set(&key(4), 4).await;
    backend.run_pending_tasks().await;

    assert_eq!(backend.entry_count(), 3);
    assert_eq!(backend.get(&key(4)).await, Some(4));
    let mut present = 0;
    for id in 1..=4 {
        if backend.get(&key(id)).await.is_some() {
            present += 1;
        }
    }
    assert_eq!(present, 3, "exactly one entry should have been evicted");
}

#[tokio::test]
async fn label_and_ttl_are_reported() {
    let backend = MokaBackend::<u8>::builder(Duration::from_secs(5))
        .label("feed")
        .max_entries(10)
        .build();

    assert_eq!(backend.label().as_str(), "feed");
    assert_eq!(backend.ttl(), Duration::from_secs(5));
}
