//! Notification center.
//!
//! Notifications are created server-side (a comment, a like, a new
//! connection) and pushed to the recipient. The client only marks them
//! read. The center keeps an unread counter that is adjusted from the
//! before and after state of each change instead of recounted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use livebox::{
    Applied, Change, FetchError, LiveResource, LiveState, LoadError, Loader, MutationError,
    MutationOutcome, Placement, Record, RecordList, RemoteError, ResourceContext, ResourceKey,
    ResourceStatus,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tokio::sync::watch;
use tracing::debug;

use crate::ids::{NotificationId, UserId};
use crate::notifier::{DesktopNotifier, NotificationPermission};
use crate::profile::ProfileSummary;

/// Resource namespace of notification lists.
pub const NAMESPACE: &str = "notifications";

/// Default number of notifications fetched.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Resource key of `user`'s notifications.
pub fn key(user: &UserId) -> ResourceKey {
    ResourceKey::new(NAMESPACE, user.as_str())
}

/// Broad notification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Platform announcements, booking confirmations.
    System,
    /// Activity of other users.
    Social,
}

/// A notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Row id.
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    /// Broad type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Fine-grained category (`like`, `comment`, `connection`, ...).
    pub category: SmolStr,
    /// Headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set iff `is_read`.
    pub read_at: Option<DateTime<Utc>>,
    /// User whose action triggered the notification.
    pub actor_id: Option<UserId>,
    /// Name and avatar of the actor. Only present on fetched rows.
    pub actor: Option<ProfileSummary>,
    /// Free-form payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Kind of the entity the notification is about.
    pub related_entity_type: Option<SmolStr>,
    /// Id of the entity the notification is about.
    pub related_entity_id: Option<SmolStr>,
}

impl Notification {
    /// Marks read at `at`. Returns `false` if already read.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(at);
        true
    }

    /// Marks unread. Returns `false` if already unread.
    pub fn mark_unread(&mut self) -> bool {
        if !self.is_read {
            return false;
        }
        self.is_read = false;
        self.read_at = None;
        true
    }
}

impl Record for Notification {
    type Id = NotificationId;

    fn id(&self) -> &NotificationId {
        &self.id
    }

    fn merge(&mut self, incoming: Self) {
        let actor = self.actor.take();
        *self = incoming;
        if self.actor.is_none() {
            self.actor = actor;
        }
    }
}

/// Local state of a notification center.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFeed {
    items: RecordList<Notification>,
    unread: usize,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self {
            items: RecordList::new(Placement::Prepend),
            unread: 0,
        }
    }
}

impl NotificationFeed {
    /// Notifications, newest first.
    pub fn items(&self) -> &[Notification] {
        self.items.as_slice()
    }

    /// Looks a notification up.
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.get(id)
    }

    /// Number of unread notifications.
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    fn is_unread(&self, id: &NotificationId) -> Option<bool> {
        self.items.get(id).map(|n| !n.is_read)
    }

    fn adjust(&mut self, was_unread: bool, is_unread: bool) {
        match (was_unread, is_unread) {
            (false, true) => self.unread += 1,
            (true, false) => self.unread = self.unread.saturating_sub(1),
            _ => {}
        }
    }

    /// Marks one notification read at `at`. Returns `None` if it is
    /// missing or already read.
    pub fn mark_read(&mut self, id: &NotificationId, at: DateTime<Utc>) -> Option<()> {
        let changed = self.items.modify(id, |n| n.mark_read(at))?;
        changed.then(|| self.adjust(true, false))
    }

    /// Marks one notification unread.
    pub fn mark_unread(&mut self, id: &NotificationId) -> bool {
        let changed = self.items.modify(id, Notification::mark_unread).unwrap_or(false);
        if changed {
            self.adjust(false, true);
        }
        changed
    }

    /// Marks every unread notification read at `at`. Returns the ids that
    /// changed, or `None` if there were none.
    pub fn mark_all_read(&mut self, at: DateTime<Utc>) -> Option<Vec<NotificationId>> {
        let mut changed = Vec::new();
        self.items.modify_all(|n| {
            if n.mark_read(at) {
                changed.push(n.id.clone());
            }
        });
        self.unread = self.unread.saturating_sub(changed.len());
        (!changed.is_empty()).then_some(changed)
    }

    /// Replaces the `read_at` of read notifications among `ids` with the
    /// server timestamp.
    pub fn adopt_read_at(&mut self, ids: &[NotificationId], at: DateTime<Utc>) -> bool {
        let mut modified = false;
        for id in ids {
            modified |= self
                .items
                .modify(id, |n| {
                    if n.is_read && n.read_at != Some(at) {
                        n.read_at = Some(at);
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
        }
        modified
    }
}

impl LiveState for NotificationFeed {
    type Snapshot = Vec<Notification>;
    type Item = Notification;

    fn load(&mut self, snapshot: Vec<Notification>) {
        self.items.replace_all(snapshot);
        self.unread = self.items.iter().filter(|n| !n.is_read).count();
    }

    fn apply(&mut self, change: Change<Notification>) -> Applied {
        match change {
            Change::Insert(notification) => {
                let unread = !notification.is_read;
                let applied = self.items.insert(notification);
                if applied == Applied::Inserted {
                    self.adjust(false, unread);
                }
                applied
            }
            Change::Update(notification) => {
                let id = notification.id.clone();
                let before = self.is_unread(&id);
                let applied = self.items.merge(notification);
                if let (Applied::Updated, Some(before), Some(after)) =
                    (applied, before, self.is_unread(&id))
                {
                    self.adjust(before, after);
                }
                applied
            }
            Change::Delete(id) => match self.items.remove(&id) {
                Some(removed) => {
                    self.adjust(!removed.is_read, false);
                    Applied::Removed
                }
                None => Applied::Missing,
            },
        }
    }
}

/// Relational notification queries.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Most recent notifications of `user`, newest first.
    async fn list(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>, RemoteError>;

    /// Marks one notification read; returns the stored `read_at`.
    async fn mark_read(
        &self,
        user: &UserId,
        id: &NotificationId,
    ) -> Result<DateTime<Utc>, RemoteError>;

    /// Marks every notification of `user` read; returns the stored `read_at`.
    async fn mark_all_read(&self, user: &UserId) -> Result<DateTime<Utc>, RemoteError>;
}

/// Loads the notification page of the user in the resource key.
pub struct NotificationLoader {
    store: Arc<dyn NotificationStore>,
    page_size: usize,
}

impl NotificationLoader {
    /// Loader over `store`, fetching `page_size` rows.
    pub fn new(store: Arc<dyn NotificationStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }
}

#[async_trait]
impl Loader<Vec<Notification>> for NotificationLoader {
    async fn load(&self, key: &ResourceKey) -> Result<Vec<Notification>, LoadError> {
        let user = UserId::new(key.id());
        Ok(self.store.list(&user, self.page_size).await?)
    }
}

/// Payload of the server-side notification procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient.
    pub user_id: UserId,
    /// Broad type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Fine-grained category.
    pub category: SmolStr,
    /// Headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Free-form payload.
    pub metadata: serde_json::Value,
    /// User whose action triggered it.
    pub actor_id: Option<UserId>,
    /// Kind of the related entity.
    pub related_entity_type: Option<SmolStr>,
    /// Id of the related entity.
    pub related_entity_id: Option<SmolStr>,
}

/// Server-side procedure creating notification rows.
#[async_trait]
pub trait NotificationRpc: Send + Sync {
    /// Creates a notification and returns its id.
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationId, RemoteError>;
}

/// Mounted notification center of one user.
pub struct NotificationCenter {
    resource: LiveResource<NotificationFeed>,
    store: Arc<dyn NotificationStore>,
    user: Option<UserId>,
}

impl NotificationCenter {
    /// Creates an unmounted center. New unread notifications are shown
    /// through `notifier` when it has permission.
    pub fn new(
        context: &ResourceContext<NotificationFeed>,
        store: Arc<dyn NotificationStore>,
        notifier: Arc<dyn DesktopNotifier>,
    ) -> Self {
        let mut resource = context.resource();
        resource.on_change(move |change, applied| {
            if let (Change::Insert(notification), Applied::Inserted) = (change, applied) {
                if !notification.is_read {
                    show_desktop(&*notifier, notification);
                }
            }
        });
        Self {
            resource,
            store,
            user: None,
        }
    }

    /// Mounts the notifications of `user`; `None` unmounts.
    pub async fn mount(&mut self, user: Option<UserId>) {
        self.resource.mount(user.as_ref().map(key)).await;
        self.user = user;
    }

    /// Unmounts.
    pub fn unmount(&mut self) {
        self.resource.unmount();
        self.user = None;
    }

    /// Current notifications.
    pub fn feed(&self) -> NotificationFeed {
        self.resource.state()
    }

    /// Current unread count.
    pub fn unread_count(&self) -> usize {
        self.resource.with_state(NotificationFeed::unread_count)
    }

    /// Watches the notification list.
    pub fn watch(&self) -> watch::Receiver<NotificationFeed> {
        self.resource.watch()
    }

    /// Loading and channel status.
    pub fn status(&self) -> ResourceStatus {
        self.resource.status()
    }

    /// Watches the loading and channel status.
    pub fn watch_status(&self) -> watch::Receiver<ResourceStatus> {
        self.resource.watch_status()
    }

    /// Reloads from the store.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        self.resource.refresh().await
    }

    /// Marks one notification read. Skipped if it is already read.
    pub async fn mark_read(&self, id: &NotificationId) -> Result<MutationOutcome<()>, MutationError> {
        const OPERATION: &str = "mark_read";
        let Some(user) = &self.user else {
            return Err(MutationError::NotMounted { operation: OPERATION });
        };

        let outcome = self
            .resource
            .mutate_with(
                OPERATION,
                |feed| feed.mark_read(id, Utc::now()),
                self.store.mark_read(user, id),
                |feed, ()| {
                    feed.mark_unread(id);
                },
                |feed, read_at: &DateTime<Utc>, ()| {
                    feed.adopt_read_at(std::slice::from_ref(id), *read_at)
                },
            )
            .await?;

        Ok(match outcome {
            MutationOutcome::Confirmed(_) => MutationOutcome::Confirmed(()),
            MutationOutcome::Skipped => MutationOutcome::Skipped,
        })
    }

    /// Marks every notification read. Skipped if none is unread.
    pub async fn mark_all_read(&self) -> Result<MutationOutcome<()>, MutationError> {
        const OPERATION: &str = "mark_all_read";
        let Some(user) = &self.user else {
            return Err(MutationError::NotMounted { operation: OPERATION });
        };

        let outcome = self
            .resource
            .mutate_with(
                OPERATION,
                |feed| feed.mark_all_read(Utc::now()),
                self.store.mark_all_read(user),
                |feed, ids| {
                    for id in &ids {
                        feed.mark_unread(id);
                    }
                },
                |feed, read_at: &DateTime<Utc>, ids| feed.adopt_read_at(&ids, *read_at),
            )
            .await?;

        Ok(match outcome {
            MutationOutcome::Confirmed(_) => MutationOutcome::Confirmed(()),
            MutationOutcome::Skipped => MutationOutcome::Skipped,
        })
    }
}

fn show_desktop(notifier: &dyn DesktopNotifier, notification: &Notification) {
    if notifier.permission() != NotificationPermission::Granted {
        return;
    }
    if let Err(error) = notifier.show(&notification.title, &notification.message) {
        debug!(%error, id = %notification.id, "desktop notification failed");
    }
}
