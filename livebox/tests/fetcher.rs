//! Cache-first fetching and in-flight deduplication.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeLoader, TTL, key, note};
use futures::future::join_all;
use livebox::{
    FetchError, FetchOptions, FetchSource, LoadError, MemoryBackend, ResourceFetcher,
};
use livebox_moka::MokaBackend;

fn fetcher() -> ResourceFetcher<Vec<common::Note>> {
    ResourceFetcher::new(MemoryBackend::new(TTL))
}

#[tokio::test(start_paused = true)]
async fn fresh_entry_is_served_without_loader() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "a", 1)]);

    let first = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(first.source, FetchSource::Loader);

    tokio::time::advance(TTL - Duration::from_millis(1)).await;
    let second = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(second.source, FetchSource::Cache);
    assert_eq!(second.value, first.value);
    assert_eq!(loader.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_a_new_load() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "a", 1)]);

    fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    tokio::time::advance(TTL).await;
    loader.serve(vec![note(1, "b", 2)]);

    let fetched = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(fetched.source, FetchSource::Loader);
    assert_eq!(fetched.value[0].body, "b");
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_loader_call() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "a", 1)]).with_delay(Duration::from_millis(100));

    let results = join_all((0..8).map(|_| {
        let fetcher = fetcher.clone();
        let loader = loader.clone();
        tokio::spawn(async move {
            fetcher
                .fetch(&key("1"), &loader, FetchOptions::default())
                .await
        })
    }))
    .await;

    assert_eq!(loader.calls(), 1);
    let mut sources = Vec::new();
    for result in results {
        let fetched = result.unwrap().unwrap();
        assert_eq!(fetched.value, vec![note(1, "a", 1)]);
        sources.push(fetched.source);
    }
    assert_eq!(sources.iter().filter(|s| **s == FetchSource::Loader).count(), 1);
    assert_eq!(sources.iter().filter(|s| **s == FetchSource::Shared).count(), 7);
}

#[tokio::test(start_paused = true)]
async fn distinct_keys_are_loaded_independently() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![]).with_delay(Duration::from_millis(10));

    let (key_a, key_b) = (key("a"), key("b"));
    let (a, b) = tokio::join!(
        fetcher.fetch(&key_a, &loader, FetchOptions::default()),
        fetcher.fetch(&key_b, &loader, FetchOptions::default()),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_the_next_fetch_to_load() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "a", 1)]);

    fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    fetcher.invalidate(&key("1")).await;
    let fetched = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();

    assert_eq!(fetched.source, FetchSource::Loader);
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidation_during_a_load_is_not_lost() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "before push", 1)]).with_delay(Duration::from_secs(1));

    let slow = {
        let fetcher = fetcher.clone();
        let loader = loader.clone();
        tokio::spawn(async move {
            fetcher
                .fetch(&key("1"), &loader, FetchOptions::default())
                .await
        })
    };
    tokio::task::yield_now().await;
    assert!(fetcher.guard().is_in_flight(&key("1")));

    loader.serve(vec![note(1, "after push", 2)]);
    fetcher.invalidate(&key("1")).await;
    assert!(!fetcher.guard().is_in_flight(&key("1")));

    let stale = slow.await.unwrap().unwrap();
    assert_eq!(stale.value[0].body, "before push");

    let next = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(next.source, FetchSource::Loader);
    assert_eq!(next.value[0].body, "after push");
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn caller_after_an_invalidation_does_not_join_the_stale_load() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "old", 1)]).with_delay(Duration::from_secs(1));

    let slow = {
        let fetcher = fetcher.clone();
        let loader = loader.clone();
        tokio::spawn(async move {
            fetcher
                .fetch(&key("1"), &loader, FetchOptions::default())
                .await
        })
    };
    tokio::task::yield_now().await;
    loader.serve(vec![note(1, "new", 2)]);
    fetcher.invalidate(&key("1")).await;

    let fresh = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(fresh.source, FetchSource::Loader);
    assert_eq!(fresh.value[0].body, "new");
    slow.await.unwrap().unwrap();

    let cached = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(cached.source, FetchSource::Cache);
    assert_eq!(cached.value[0].body, "new");
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn forced_refresh_bypasses_a_fresh_entry() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "a", 1)]);

    fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    let fetched = fetcher.fetch(&key("1"), &loader, FetchOptions::refresh()).await.unwrap();

    assert_eq!(fetched.source, FetchSource::Loader);
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failures_are_shared_but_not_cached() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![]).with_delay(Duration::from_millis(50));
    loader.fail();

    let shared = key("1");
    let (a, b) = tokio::join!(
        fetcher.fetch(&shared, &loader, FetchOptions::default()),
        fetcher.fetch(&shared, &loader, FetchOptions::default()),
    );
    assert!(matches!(a, Err(FetchError::Load(LoadError::Remote(_)))));
    assert!(matches!(b, Err(FetchError::Load(LoadError::Remote(_)))));
    assert_eq!(loader.calls(), 1);

    loader.serve(vec![note(1, "back", 1)]);
    let fetched = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    assert_eq!(fetched.source, FetchSource::Loader);
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_leader_abandons_waiters_and_frees_the_key() {
    let fetcher = fetcher();
    let loader = FakeLoader::new(vec![note(1, "a", 1)]).with_delay(Duration::from_secs(1));

    let leader = {
        let fetcher = fetcher.clone();
        let loader = loader.clone();
        tokio::spawn(async move {
            fetcher
                .fetch(&key("1"), &loader, FetchOptions::default())
                .await
        })
    };
    tokio::task::yield_now().await;
    assert!(fetcher.guard().is_in_flight(&key("1")));

    let waiter = {
        let fetcher = fetcher.clone();
        let loader = loader.clone();
        tokio::spawn(async move {
            fetcher
                .fetch(&key("1"), &loader, FetchOptions::default())
                .await
        })
    };
    tokio::task::yield_now().await;

    leader.abort();
    assert!(matches!(
        waiter.await.unwrap(),
        Err(FetchError::Abandoned(_))
    ));
    assert!(!fetcher.guard().is_in_flight(&key("1")));
}

#[tokio::test(start_paused = true)]
async fn works_over_a_bounded_moka_backend() {
    let backend = MokaBackend::<Vec<common::Note>>::builder(TTL)
        .max_entries(2)
        .build();
    let fetcher = ResourceFetcher::from_shared(Arc::new(backend));
    let loader = FakeLoader::new(vec![note(1, "a", 1)]);

    fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();
    let fetched = fetcher.fetch(&key("1"), &loader, FetchOptions::default()).await.unwrap();

    assert_eq!(fetched.source, FetchSource::Cache);
    assert_eq!(loader.calls(), 1);
}
