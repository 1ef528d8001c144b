//! Social client walkthrough
//!
//! Wires the three live resources over in-memory backends and an
//! in-process realtime broker, then plays a short session:
//!
//! - two views mount the same profile and share one lookup;
//! - a notification arrives by push and is marked read optimistically;
//! - a like is shown immediately and confirmed by the store;
//! - a refused like is rolled back.
//!
//! Run:
//!   RUST_LOG=livebox=debug cargo run -p livebox-demos --example social

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use livebox::{Change, Config, MemoryTransport, RemoteError};
use livebox_social::{
    Collaborators, Comment, CommentId, DesktopNotifier, LikeReceipt, NewNotification,
    Notification, NotificationId, NotificationKind, NotificationPermission, NotificationRpc,
    NotificationStore, NotifierError, Post, PostId, PostStore, ProfileDirectory, SocialClient,
    UserId, UserProfile, ViewerFlags, notification,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = "
profile:
  ttl: 5m
  max_entries: 1000
notifications:
  ttl: 30s
feed:
  ttl: 1m
  page_size: 20
";

struct Directory(HashMap<UserId, UserProfile>);

#[async_trait]
impl ProfileDirectory for Directory {
    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        info!(%id, "directory lookup");
        Ok(self.0.get(id).cloned())
    }

    async fn profiles(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, RemoteError> {
        Ok(ids.iter().filter_map(|id| self.0.get(id).cloned()).collect())
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<Notification>>);

#[async_trait]
impl NotificationStore for Inbox {
    async fn list(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>, RemoteError> {
        let rows = self.0.lock().map_err(|e| RemoteError::Internal(e.to_string()))?;
        Ok(rows.iter().filter(|n| &n.user_id == user).take(limit).cloned().collect())
    }

    async fn mark_read(
        &self,
        _user: &UserId,
        _id: &NotificationId,
    ) -> Result<DateTime<Utc>, RemoteError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Utc::now())
    }

    async fn mark_all_read(&self, _user: &UserId) -> Result<DateTime<Utc>, RemoteError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Utc::now())
    }
}

struct Posts {
    likes: AtomicU32,
    refuse: AtomicBool,
    post: Post,
}

#[async_trait]
impl PostStore for Posts {
    async fn recent_posts(&self, _limit: usize) -> Result<Vec<Post>, RemoteError> {
        Ok(vec![self.post.clone()])
    }

    async fn viewer_flags(&self, _: &UserId, _: &[PostId]) -> Result<ViewerFlags, RemoteError> {
        Ok(ViewerFlags::default())
    }

    async fn like(&self, _: &UserId, _: &PostId) -> Result<LikeReceipt, RemoteError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected("rate limited".into()));
        }
        let likes_count = self.likes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LikeReceipt { likes_count })
    }

    async fn unlike(&self, _: &UserId, _: &PostId) -> Result<LikeReceipt, RemoteError> {
        let likes_count = self.likes.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        Ok(LikeReceipt { likes_count })
    }

    async fn save(&self, _: &UserId, _: &PostId) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn unsave(&self, _: &UserId, _: &PostId) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn add_comment(
        &self,
        viewer: &UserId,
        post: &PostId,
        content: &str,
    ) -> Result<Comment, RemoteError> {
        Ok(Comment {
            id: CommentId::from("c1"),
            post_id: post.clone(),
            author_id: viewer.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        })
    }
}

struct Rpc;

#[async_trait]
impl NotificationRpc for Rpc {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationId, RemoteError> {
        info!(
            to = %notification.user_id,
            message = %notification.message,
            "rpc: create_notification"
        );
        Ok(NotificationId::from("rpc-1"))
    }
}

struct Console;

impl DesktopNotifier for Console {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&self, title: &str, body: &str) -> Result<(), NotifierError> {
        println!("[desktop] {title}: {body}");
        Ok(())
    }
}

fn user(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        full_name: name.to_string(),
        avatar_url: None,
        email: None,
        bio: None,
        onboarding_completed: true,
        updated_at: Utc::now(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("livebox=info,social=info")),
        )
        .init();

    let me = UserId::from("grace");
    let directory = Directory(HashMap::from([
        (me.clone(), user("grace", "Grace Hopper")),
        (UserId::from("ada"), user("ada", "Ada Lovelace")),
    ]));
    let now = Utc::now();
    let posts = Arc::new(Posts {
        likes: AtomicU32::new(5),
        refuse: AtomicBool::new(false),
        post: Post {
            id: PostId::from("engine"),
            author_id: UserId::from("ada"),
            author: None,
            content: "Notes on the analytical engine".into(),
            media_urls: Vec::new(),
            likes_count: 5,
            comments_count: 0,
            shares_count: 0,
            is_liked: false,
            is_saved: false,
            created_at: now,
            updated_at: now,
        },
    });
    let notification_bus = MemoryTransport::<Notification>::new();
    let post_bus = MemoryTransport::<Post>::new();

    let collaborators = Collaborators::new(
        Arc::new(directory),
        Arc::new(Inbox::default()),
        posts.clone(),
        Arc::new(Rpc),
        Arc::new(notification_bus.clone()),
        Arc::new(post_bus),
    )
    .with_notifier(Arc::new(Console));
    let client = SocialClient::from_config(Config::from_yaml(CONFIG)?, collaborators)?;

    let mut header = client.profile();
    let mut menu = client.profile();
    header.mount(Some(livebox_social::profile::key(&me))).await;
    menu.mount(Some(livebox_social::profile::key(&me))).await;
    info!(source = ?menu.status().source, "second view of the same profile");

    let mut center = client.notification_center();
    center.mount(Some(me.clone())).await;
    let mut status = center.watch_status();
    status.wait_for(|s| s.is_live()).await?;

    notification_bus.publish(
        &notification::key(&me),
        Change::Insert(Notification {
            id: NotificationId::from("n1"),
            user_id: me.clone(),
            kind: NotificationKind::Social,
            category: "comment".into(),
            title: "New comment".into(),
            message: "Ada commented on your post".into(),
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
            actor_id: Some(UserId::from("ada")),
            actor: None,
            metadata: serde_json::Value::Null,
            related_entity_type: None,
            related_entity_id: None,
        }),
    );
    let mut feed_state = center.watch();
    feed_state.wait_for(|f| f.unread_count() == 1).await?;
    info!(unread = center.unread_count(), "notification pushed");

    center.mark_all_read().await?;
    info!(unread = center.unread_count(), "all read");

    let mut feed = client.activity_feed();
    feed.mount(Some(me.clone())).await;
    let engine = PostId::from("engine");
    feed.like(&engine).await?;
    if let Some(post) = feed.post(&engine) {
        info!(likes = post.likes_count, liked = post.is_liked, "liked");
    }

    feed.unlike(&engine).await?;
    posts.refuse.store(true, Ordering::SeqCst);
    if let Err(error) = feed.like(&engine).await {
        info!(operation = error.operation(), cause = ?error.remote(), "like refused");
    }
    if let Some(post) = feed.post(&engine) {
        info!(likes = post.likes_count, liked = post.is_liked, "after rollback");
    }

    feed.unmount();
    center.unmount();
    header.unmount();
    menu.unmount();
    Ok(())
}
