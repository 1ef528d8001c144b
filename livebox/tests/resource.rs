//! Mounting, realtime patching and unmount semantics of live resources.

mod common;

use std::time::Duration;

use common::{
    FakeLoader, Notes, NotesWithPlaceholder, TTL, harness, key, note, settle,
    small_buffer_harness,
};
use livebox::{
    Change, ChannelState, Degraded, FetchSource, LiveResource, LiveState, LoadPhase,
    MemoryBackend, MutationError, MutationOutcome, RemoteError, ResourceContext,
    ResourceFetcher, ResourcePolicy, RollbackPolicy,
};
use pretty_assertions::assert_eq;
use tokio::sync::watch;

async fn wait_for<S: Clone>(rx: &mut watch::Receiver<S>, f: impl FnMut(&S) -> bool) -> S {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out")
        .expect("sender dropped")
        .clone()
}

async fn live<St: LiveState>(resource: &LiveResource<St>) {
    let mut status = resource.watch_status();
    wait_for(&mut status, |s| s.channel == ChannelState::Subscribed).await;
}

#[tokio::test]
async fn mount_loads_snapshot_and_applies_pushes() {
    let h = harness(
        FakeLoader::new(vec![note(2, "second", 1), note(1, "first", 1)]),
        ResourcePolicy::default(),
    );
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;

    assert_eq!(resource.state().bodies(), vec!["second", "first"]);
    let status = resource.status();
    assert_eq!(status.phase, LoadPhase::Ready);
    assert_eq!(status.source, Some(FetchSource::Loader));
    live(&resource).await;

    h.transport.publish(&key("a"), Change::Insert(note(3, "third", 1)));
    h.transport.publish(&key("a"), Change::Update(note(1, "first, edited", 2)));
    h.transport.publish(&key("a"), Change::Delete(2));

    let mut state = resource.watch();
    let notes = wait_for(&mut state, |n: &Notes| n.0.len() == 2 && !n.0.contains(&2)).await;
    assert_eq!(notes.bodies(), vec!["third", "first, edited"]);
}

#[tokio::test]
async fn duplicate_and_stale_pushes_leave_state_untouched() {
    let h = harness(FakeLoader::new(vec![note(1, "v5", 5)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    live(&resource).await;

    h.transport.publish(&key("a"), Change::Insert(note(1, "dup", 9)));
    h.transport.publish(&key("a"), Change::Update(note(1, "v3", 3)));
    h.transport.publish(&key("a"), Change::Insert(note(2, "marker", 1)));

    let mut state = resource.watch();
    let notes = wait_for(&mut state, |n: &Notes| n.0.contains(&2)).await;
    assert_eq!(notes.bodies(), vec!["marker", "v5"]);
}

#[tokio::test]
async fn push_invalidates_the_cached_snapshot() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    live(&resource).await;
    assert_eq!(h.loader.calls(), 1);

    h.transport.publish(&key("a"), Change::Insert(note(2, "b", 1)));
    let mut state = resource.watch();
    wait_for(&mut state, |n: &Notes| n.0.len() == 2).await;

    let mut other = h.context.resource();
    other.mount(Some(key("a"))).await;
    assert_eq!(h.loader.calls(), 2);
    assert_eq!(other.status().source, Some(FetchSource::Loader));
}

#[tokio::test]
async fn two_owners_of_one_key_share_cache_and_channel() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut first = h.context.resource();
    let mut second = h.context.resource();

    first.mount(Some(key("a"))).await;
    second.mount(Some(key("a"))).await;

    assert_eq!(h.loader.calls(), 1);
    assert_eq!(second.status().source, Some(FetchSource::Cache));
    assert_eq!(h.transport.open_channels(&key("a")), 1);

    first.unmount();
    assert_eq!(h.transport.open_channels(&key("a")), 1);
    second.unmount();
    assert_eq!(h.transport.open_channels(&key("a")), 0);
}

#[tokio::test]
async fn key_change_closes_old_channel_and_resets_state() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    live(&resource).await;

    h.loader.serve(vec![]);
    resource.set_key(Some(key("b"))).await;

    assert_eq!(h.transport.open_channels(&key("a")), 0);
    assert_eq!(h.transport.open_channels(&key("b")), 1);
    assert_eq!(resource.key(), Some(&key("b")));
    assert!(resource.state().0.is_empty());

    h.transport.publish(&key("a"), Change::Insert(note(9, "old key", 1)));
    settle().await;
    assert!(resource.state().0.is_empty());
}

#[tokio::test]
async fn remounting_the_same_key_is_a_noop() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    resource.mount(Some(key("a"))).await;

    assert_eq!(h.loader.calls(), 1);
    assert_eq!(h.transport.open_channels(&key("a")), 1);
}

#[tokio::test]
async fn mounting_without_a_key_stays_idle() {
    let h = harness(FakeLoader::new(vec![]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(None).await;

    assert!(!resource.is_mounted());
    assert_eq!(resource.status().phase, LoadPhase::Idle);
    assert_eq!(h.loader.calls(), 0);
    assert_eq!(h.transport.total_open_channels(), 0);
}

#[tokio::test(start_paused = true)]
async fn unmount_discards_in_flight_fetch() {
    let loader = FakeLoader::new(vec![note(1, "a", 1)]).with_delay(Duration::from_secs(2));
    let h = harness(loader, ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    let before = resource.state();

    h.loader.serve(vec![note(7, "late", 1)]);
    let refresh = resource.spawn_refresh().expect("mounted");
    tokio::task::yield_now().await;
    resource.unmount();

    refresh.await.unwrap().unwrap();
    assert_eq!(h.loader.calls(), 2);
    assert_eq!(resource.state(), before);
    assert_eq!(resource.status().phase, LoadPhase::Idle);
    assert_eq!(resource.status().channel, ChannelState::Closed);
}

#[tokio::test]
async fn queued_pushes_after_unmount_are_ignored() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    live(&resource).await;
    let before = resource.state();

    h.transport.publish(&key("a"), Change::Insert(note(2, "queued", 1)));
    resource.unmount();
    settle().await;

    assert_eq!(resource.state(), before);
    assert_eq!(h.transport.open_channels(&key("a")), 0);
}

#[tokio::test]
async fn failed_first_fetch_leaves_empty_state() {
    let loader = FakeLoader::new(vec![]);
    loader.fail();
    let h = harness(loader, ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;

    let status = resource.status();
    assert_eq!(status.phase, LoadPhase::Failed);
    assert_eq!(status.degraded, Some(Degraded::Empty));
    assert!(status.error.is_some());
    assert!(resource.state().0.is_empty());
    assert_eq!(h.transport.open_channels(&key("a")), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_stale_state() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;

    h.loader.fail();
    assert!(resource.refresh().await.is_err());

    assert_eq!(resource.state().bodies(), vec!["a"]);
    assert_eq!(resource.status().degraded, Some(Degraded::Stale));

    h.loader.serve(vec![note(1, "b", 2)]);
    resource.refresh().await.unwrap();
    assert_eq!(resource.state().bodies(), vec!["b"]);
    assert_eq!(resource.status().degraded, None);
}

#[tokio::test]
async fn failed_first_fetch_shows_fallback() {
    let loader = FakeLoader::new(vec![]);
    loader.fail();
    let context = ResourceContext::<NotesWithPlaceholder>::new(
        ResourceFetcher::new(MemoryBackend::new(TTL)),
        loader,
        ResourcePolicy::default(),
    );
    let mut resource = context.resource();
    resource.mount(Some(key("a"))).await;

    assert_eq!(resource.state().0.bodies(), vec!["placeholder"]);
    assert_eq!(resource.status().degraded, Some(Degraded::Fallback));
}

fn rename(id: u32, body: &'static str) -> impl FnOnce(&mut Notes) -> Option<String> {
    move |notes| {
        notes
            .0
            .modify(&id, |n| std::mem::replace(&mut n.body, body.to_string()))
    }
}

fn restore(id: u32) -> impl FnOnce(&mut Notes, String) {
    move |notes, previous| {
        notes.0.modify(&id, |n| n.body = previous);
    }
}

#[tokio::test]
async fn rejected_mutation_is_rolled_back_in_place() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;

    let result = resource
        .mutate(
            "rename",
            rename(1, "renamed"),
            async { Err::<(), _>(RemoteError::Rejected("forbidden".into())) },
            restore(1),
        )
        .await;

    assert!(matches!(result, Err(MutationError::RolledBack { .. })));
    assert_eq!(resource.state().bodies(), vec!["a"]);
}

#[tokio::test]
async fn rejected_mutation_under_refetch_policy_reloads() {
    let policy = ResourcePolicy::builder()
        .rollback(RollbackPolicy::Refetch)
        .build();
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), policy);
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    h.loader.serve(vec![note(1, "server", 2)]);

    let result = resource
        .mutate(
            "rename",
            rename(1, "renamed"),
            async { Err::<(), _>(RemoteError::Unavailable("timeout".into())) },
            restore(1),
        )
        .await;

    assert!(matches!(result, Err(MutationError::Reconciled { .. })));
    assert_eq!(resource.state().bodies(), vec!["server"]);
    assert_eq!(h.loader.calls(), 2);
}

#[tokio::test]
async fn refetch_policy_reverts_in_place_when_the_reload_fails() {
    let policy = ResourcePolicy::builder()
        .rollback(RollbackPolicy::Refetch)
        .build();
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), policy);
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    h.loader.fail();

    let result = resource
        .mutate(
            "rename",
            rename(1, "renamed"),
            async { Err::<(), _>(RemoteError::Rejected("forbidden".into())) },
            restore(1),
        )
        .await;

    assert!(matches!(result, Err(MutationError::RolledBack { operation: "rename", .. })));
    assert_eq!(resource.state().bodies(), vec!["a"]);
    assert_eq!(h.loader.calls(), 2);
}

#[tokio::test]
async fn confirmation_adopts_the_server_response() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;

    let outcome = resource
        .mutate_with(
            "rename",
            rename(1, "draft"),
            async { Ok::<_, RemoteError>("draft (edited)") },
            restore(1),
            |notes: &mut Notes, body: &&str, _previous| {
                notes.0.modify(&1, |n| n.body = body.to_string()).is_some()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Confirmed("draft (edited)"));
    assert_eq!(resource.state().bodies(), vec!["draft (edited)"]);
}

#[tokio::test]
async fn lagging_lease_reloads_the_snapshot() {
    let h = small_buffer_harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default(), 1);
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;
    live(&resource).await;
    assert_eq!(h.loader.calls(), 1);

    h.loader.serve(vec![
        note(4, "d", 1),
        note(3, "c", 1),
        note(2, "b", 1),
        note(1, "a", 1),
    ]);
    h.transport.publish(&key("a"), Change::Insert(note(2, "b", 1)));
    h.transport.publish(&key("a"), Change::Insert(note(3, "c", 1)));
    h.transport.publish(&key("a"), Change::Insert(note(4, "d", 1)));

    let mut state = resource.watch();
    let notes = wait_for(&mut state, |n: &Notes| n.0.len() == 4).await;
    assert_eq!(notes.bodies(), vec!["d", "c", "b", "a"]);
    assert_eq!(h.loader.calls(), 2);
    assert_eq!(resource.status().degraded, None);
}

#[tokio::test]
async fn confirmed_mutation_keeps_patch_and_invalidates_cache() {
    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    resource.mount(Some(key("a"))).await;

    let outcome = resource
        .mutate(
            "rename",
            rename(1, "renamed"),
            async { Ok::<_, RemoteError>(42) },
            restore(1),
        )
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Confirmed(42));
    assert_eq!(resource.state().bodies(), vec!["renamed"]);

    let mut other = h.context.resource();
    other.mount(Some(key("a"))).await;
    assert_eq!(other.status().source, Some(FetchSource::Loader));
}

#[tokio::test]
async fn mutation_on_unmounted_resource_is_rejected() {
    let h = harness(FakeLoader::new(vec![]), ResourcePolicy::default());
    let resource = h.context.resource();

    let result = resource
        .mutate("rename", rename(1, "x"), async { Ok::<_, RemoteError>(()) }, restore(1))
        .await;
    assert!(matches!(result, Err(MutationError::NotMounted { .. })));
}

#[tokio::test]
async fn observer_sees_applied_changes() {
    use std::sync::{Arc, Mutex};

    let h = harness(FakeLoader::new(vec![note(1, "a", 1)]), ResourcePolicy::default());
    let mut resource = h.context.resource();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    resource.on_change(move |change, applied| {
        sink.lock().unwrap().push((change.kind(), applied));
    });
    resource.mount(Some(key("a"))).await;
    live(&resource).await;

    h.transport.publish(&key("a"), Change::Insert(note(1, "dup", 1)));
    h.transport.publish(&key("a"), Change::Insert(note(2, "b", 1)));
    let mut state = resource.watch();
    wait_for(&mut state, |n: &Notes| n.0.len() == 2).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("insert", livebox::Applied::Duplicate),
            ("insert", livebox::Applied::Inserted)
        ]
    );
}
