#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use livebox::{Config, MemoryTransport, RemoteError};
use livebox_social::{
    Collaborators, Comment, CommentId, DesktopNotifier, LikeReceipt, NewNotification,
    Notification, NotificationId, NotificationKind, NotificationPermission, NotificationRpc,
    NotificationStore, NotifierError, Post, PostId, PostStore, ProfileDirectory, SocialClient,
    UserId, UserProfile, ViewerFlags,
};

/// Latency of every fake mutation, so optimistic state can be observed
/// before the server answers.
pub const LATENCY: Duration = Duration::from_millis(100);

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn profile(id: &str, name: &str, updated: i64) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        full_name: name.to_string(),
        avatar_url: Some(format!("https://cdn.test/{id}.png")),
        email: None,
        bio: None,
        onboarding_completed: true,
        updated_at: at(updated),
    }
}

pub fn notification(id: &str, user: &str, is_read: bool) -> Notification {
    Notification {
        id: NotificationId::from(id),
        user_id: UserId::from(user),
        kind: NotificationKind::Social,
        category: "comment".into(),
        title: format!("Notification {id}"),
        message: format!("Something happened ({id})"),
        is_read,
        created_at: at(0),
        read_at: is_read.then(|| at(1)),
        actor_id: None,
        actor: None,
        metadata: serde_json::Value::Null,
        related_entity_type: None,
        related_entity_id: None,
    }
}

pub fn post(id: &str, author: &str, likes: u32, updated: i64) -> Post {
    Post {
        id: PostId::from(id),
        author_id: UserId::from(author),
        author: None,
        content: format!("post {id}"),
        media_urls: Vec::new(),
        likes_count: likes,
        comments_count: 0,
        shares_count: 0,
        is_liked: false,
        is_saved: false,
        created_at: at(0),
        updated_at: at(updated),
    }
}

fn rejected(operation: &str) -> RemoteError {
    RemoteError::Rejected(format!("{operation} refused"))
}

#[derive(Default)]
pub struct Directory {
    rows: Mutex<HashMap<UserId, UserProfile>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl Directory {
    pub fn put(&self, profile: UserProfile) {
        self.rows.lock().unwrap().insert(profile.id.clone(), profile);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileDirectory for Directory {
    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("directory down".into()));
        }
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn profiles(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("directory down".into()));
        }
        let rows = self.rows.lock().unwrap();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct Inbox {
    rows: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
    pub lists: AtomicUsize,
}

impl Inbox {
    pub fn put(&self, notification: Notification) {
        self.rows.lock().unwrap().push(notification);
    }

    /// Time the server stamps on rows it marks read.
    pub fn server_read_at() -> DateTime<Utc> {
        at(500)
    }
}

#[async_trait]
impl NotificationStore for Inbox {
    async fn list(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>, RemoteError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|n| &n.user_id == user)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(
        &self,
        _user: &UserId,
        id: &NotificationId,
    ) -> Result<DateTime<Utc>, RemoteError> {
        tokio::time::sleep(LATENCY).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(rejected("mark_read"));
        }
        let read_at = Self::server_read_at();
        for row in self.rows.lock().unwrap().iter_mut().filter(|n| &n.id == id) {
            row.mark_read(read_at);
        }
        Ok(read_at)
    }

    async fn mark_all_read(&self, user: &UserId) -> Result<DateTime<Utc>, RemoteError> {
        tokio::time::sleep(LATENCY).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(rejected("mark_all_read"));
        }
        let read_at = Self::server_read_at();
        for row in self
            .rows
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|n| &n.user_id == user)
        {
            row.mark_read(read_at);
        }
        Ok(read_at)
    }
}

#[derive(Default)]
pub struct Posts {
    rows: Mutex<Vec<Post>>,
    liked: Mutex<HashSet<PostId>>,
    saved: Mutex<HashSet<PostId>>,
    comments: AtomicUsize,
    pub fail: AtomicBool,
}

impl Posts {
    pub fn put(&self, post: Post) {
        self.rows.lock().unwrap().push(post);
    }

    pub fn set_likes(&self, id: &str, likes: u32) {
        let id = PostId::from(id);
        for row in self.rows.lock().unwrap().iter_mut().filter(|p| p.id == id) {
            row.likes_count = likes;
        }
    }

    pub fn mark_liked(&self, id: &str) {
        self.liked.lock().unwrap().insert(PostId::from(id));
    }

    fn adjust_likes(&self, post: &PostId, liked: bool) -> u32 {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|p| &p.id == post) else {
            return 0;
        };
        row.likes_count = if liked {
            row.likes_count + 1
        } else {
            row.likes_count.saturating_sub(1)
        };
        row.likes_count
    }

    fn check(&self, operation: &str) -> Result<(), RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(rejected(operation))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PostStore for Posts {
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, RemoteError> {
        Ok(self.rows.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn viewer_flags(
        &self,
        _viewer: &UserId,
        posts: &[PostId],
    ) -> Result<ViewerFlags, RemoteError> {
        let liked = self.liked.lock().unwrap();
        let saved = self.saved.lock().unwrap();
        Ok(ViewerFlags {
            liked: posts.iter().filter(|id| liked.contains(*id)).cloned().collect(),
            saved: posts.iter().filter(|id| saved.contains(*id)).cloned().collect(),
        })
    }

    async fn like(&self, _viewer: &UserId, post: &PostId) -> Result<LikeReceipt, RemoteError> {
        tokio::time::sleep(LATENCY).await;
        self.check("like")?;
        self.liked.lock().unwrap().insert(post.clone());
        Ok(LikeReceipt {
            likes_count: self.adjust_likes(post, true),
        })
    }

    async fn unlike(&self, _viewer: &UserId, post: &PostId) -> Result<LikeReceipt, RemoteError> {
        tokio::time::sleep(LATENCY).await;
        self.check("unlike")?;
        self.liked.lock().unwrap().remove(post);
        Ok(LikeReceipt {
            likes_count: self.adjust_likes(post, false),
        })
    }

    async fn save(&self, _viewer: &UserId, post: &PostId) -> Result<(), RemoteError> {
        tokio::time::sleep(LATENCY).await;
        self.check("save")?;
        self.saved.lock().unwrap().insert(post.clone());
        Ok(())
    }

    async fn unsave(&self, _viewer: &UserId, post: &PostId) -> Result<(), RemoteError> {
        tokio::time::sleep(LATENCY).await;
        self.check("unsave")?;
        self.saved.lock().unwrap().remove(post);
        Ok(())
    }

    async fn add_comment(
        &self,
        viewer: &UserId,
        post: &PostId,
        content: &str,
    ) -> Result<Comment, RemoteError> {
        tokio::time::sleep(LATENCY).await;
        self.check("add_comment")?;
        let n = self.comments.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Comment {
            id: CommentId::new(format!("c{n}")),
            post_id: post.clone(),
            author_id: viewer.clone(),
            content: content.to_string(),
            created_at: at(n as i64),
        })
    }
}

#[derive(Default)]
pub struct Rpc {
    pub created: Mutex<Vec<NewNotification>>,
    pub fail: AtomicBool,
}

impl Rpc {
    pub fn created(&self) -> Vec<NewNotification> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRpc for Rpc {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationId, RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Internal("rpc failed".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(notification);
        Ok(NotificationId::new(format!("n{}", created.len())))
    }
}

pub struct Desktop {
    pub permission: NotificationPermission,
    pub shown: Mutex<Vec<(String, String)>>,
}

impl Desktop {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }
}

impl DesktopNotifier for Desktop {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, title: &str, body: &str) -> Result<(), NotifierError> {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Fakes behind a [`SocialClient`], kept around so tests can drive them.
pub struct World {
    pub directory: Arc<Directory>,
    pub inbox: Arc<Inbox>,
    pub posts: Arc<Posts>,
    pub rpc: Arc<Rpc>,
    pub desktop: Arc<Desktop>,
    pub notification_bus: MemoryTransport<Notification>,
    pub post_bus: MemoryTransport<Post>,
    pub profile_bus: MemoryTransport<UserProfile>,
    pub client: SocialClient,
}

pub fn world() -> World {
    world_with(Config::default(), NotificationPermission::Granted)
}

pub fn world_with(config: Config, permission: NotificationPermission) -> World {
    let directory = Arc::new(Directory::default());
    let inbox = Arc::new(Inbox::default());
    let posts = Arc::new(Posts::default());
    let rpc = Arc::new(Rpc::default());
    let desktop = Arc::new(Desktop::new(permission));
    let notification_bus = MemoryTransport::new();
    let post_bus = MemoryTransport::new();
    let profile_bus = MemoryTransport::new();

    let collaborators = Collaborators::new(
        directory.clone(),
        inbox.clone(),
        posts.clone(),
        rpc.clone(),
        Arc::new(notification_bus.clone()),
        Arc::new(post_bus.clone()),
    )
    .with_notifier(desktop.clone())
    .with_profile_transport(Arc::new(profile_bus.clone()));

    let client = SocialClient::from_config(config, collaborators).unwrap();
    World {
        directory,
        inbox,
        posts,
        rpc,
        desktop,
        notification_bus,
        post_bus,
        profile_bus,
        client,
    }
}

/// Lets spawned pumps drain their queues.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
