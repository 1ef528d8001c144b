#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use livebox::{
    Applied, Change, LiveState, LoadError, Loader, MemoryBackend, MemoryTransport, Placement,
    Record, RecordList, RecordVersion, RemoteError, ResourceContext, ResourceFetcher,
    ResourceKey, ResourcePolicy, SubscriptionManager,
};

pub const TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: u32,
    pub body: String,
    pub version: i64,
}

impl Record for Note {
    type Id = u32;

    fn id(&self) -> &u32 {
        &self.id
    }

    fn version(&self) -> Option<RecordVersion> {
        Some(RecordVersion::new(self.version))
    }
}

pub fn note(id: u32, body: &str, version: i64) -> Note {
    Note {
        id,
        body: body.to_string(),
        version,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notes(pub RecordList<Note>);

impl Default for Notes {
    fn default() -> Self {
        Self(RecordList::new(Placement::Prepend))
    }
}

impl Notes {
    pub fn bodies(&self) -> Vec<String> {
        self.0.iter().map(|n| n.body.clone()).collect()
    }
}

impl LiveState for Notes {
    type Snapshot = Vec<Note>;
    type Item = Note;

    fn load(&mut self, snapshot: Vec<Note>) {
        self.0.replace_all(snapshot);
    }

    fn apply(&mut self, change: Change<Note>) -> Applied {
        self.0.apply(change)
    }
}

/// Like [`Notes`], with a placeholder shown when the first fetch fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesWithPlaceholder(pub Notes);

impl LiveState for NotesWithPlaceholder {
    type Snapshot = Vec<Note>;
    type Item = Note;

    fn load(&mut self, snapshot: Vec<Note>) {
        self.0.load(snapshot);
    }

    fn apply(&mut self, change: Change<Note>) -> Applied {
        self.0.apply(change)
    }

    fn fallback(_key: &ResourceKey) -> Option<Vec<Note>> {
        Some(vec![note(0, "placeholder", 0)])
    }
}

/// Loader serving a mutable snapshot and counting its calls.
#[derive(Clone)]
pub struct FakeLoader {
    calls: Arc<AtomicUsize>,
    snapshot: Arc<Mutex<Result<Vec<Note>, LoadError>>>,
    delay: Option<Duration>,
}

impl FakeLoader {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            calls: Arc::default(),
            snapshot: Arc::new(Mutex::new(Ok(notes))),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn serve(&self, notes: Vec<Note>) {
        *self.snapshot.lock().unwrap() = Ok(notes);
    }

    pub fn fail(&self) {
        *self.snapshot.lock().unwrap() =
            Err(RemoteError::Unavailable("backend down".into()).into());
    }
}

#[async_trait]
impl Loader<Vec<Note>> for FakeLoader {
    async fn load(&self, _key: &ResourceKey) -> Result<Vec<Note>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.snapshot.lock().unwrap().clone();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        snapshot
    }
}

pub fn key(id: &str) -> ResourceKey {
    ResourceKey::new("notes", id)
}

pub struct Harness {
    pub loader: FakeLoader,
    pub transport: MemoryTransport<Note>,
    pub context: ResourceContext<Notes>,
}

pub fn harness(loader: FakeLoader, policy: ResourcePolicy) -> Harness {
    let transport = MemoryTransport::new();
    with_subscriptions(loader, policy, transport.clone(), SubscriptionManager::new(transport))
}

/// Harness whose channels buffer only `buffer` changes per lease.
pub fn small_buffer_harness(loader: FakeLoader, policy: ResourcePolicy, buffer: usize) -> Harness {
    let transport = MemoryTransport::new();
    let subscriptions = SubscriptionManager::with_buffer(transport.clone(), buffer);
    with_subscriptions(loader, policy, transport, subscriptions)
}

fn with_subscriptions(
    loader: FakeLoader,
    policy: ResourcePolicy,
    transport: MemoryTransport<Note>,
    subscriptions: SubscriptionManager<Note>,
) -> Harness {
    let fetcher = ResourceFetcher::new(MemoryBackend::new(policy.ttl));
    let context = ResourceContext::new(fetcher, loader.clone(), policy).with_realtime(subscriptions);
    Harness {
        loader,
        transport,
        context,
    }
}

/// Lets spawned tasks drain their queues.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
