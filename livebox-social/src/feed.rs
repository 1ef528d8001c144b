//! Activity feed.
//!
//! Posts live in the document store, profiles in the relational store:
//! the loader fetches a page of posts, then the authors' profiles and the
//! viewer's like/save flags, and merges them client-side. Counters are
//! denormalized and allowed to drift, except that a confirmed like or
//! unlike adopts the count reported by the server.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use livebox::{
    Applied, Change, FetchError, LiveResource, LiveState, LoadError, Loader, MutationError,
    MutationOutcome, Placement, Record, RecordList, RecordVersion, RemoteError, ResourceContext,
    ResourceKey, ResourceStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::ids::{CommentId, PostId, UserId};
use crate::notification::{NewNotification, NotificationKind, NotificationRpc};
use crate::profile::{ProfileDirectory, ProfileSummary};

/// Resource namespace of feeds.
pub const NAMESPACE: &str = "feed";

/// Default number of posts fetched.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Resource key of the feed seen by `viewer`.
pub fn key(viewer: &UserId) -> ResourceKey {
    ResourceKey::new(NAMESPACE, viewer.as_str())
}

/// A post document with its denormalized counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Document id.
    pub id: PostId,
    /// Author id.
    pub author_id: UserId,
    /// Author name and avatar, merged from the profile directory.
    #[serde(default)]
    pub author: Option<ProfileSummary>,
    /// Text content.
    pub content: String,
    /// Attached media.
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Likes counter.
    pub likes_count: u32,
    /// Comments counter.
    pub comments_count: u32,
    /// Shares counter.
    pub shares_count: u32,
    /// Whether the viewer liked the post.
    #[serde(default)]
    pub is_liked: bool,
    /// Whether the viewer saved the post.
    #[serde(default)]
    pub is_saved: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl Record for Post {
    type Id = PostId;

    fn id(&self) -> &PostId {
        &self.id
    }

    fn version(&self) -> Option<RecordVersion> {
        Some(self.updated_at.into())
    }

    /// Pushed documents carry neither the merged author nor the viewer's
    /// flags; both are kept from the held copy.
    fn merge(&mut self, incoming: Self) {
        let author = self.author.take();
        let (is_liked, is_saved) = (self.is_liked, self.is_saved);
        *self = incoming;
        if self.author.is_none() {
            self.author = author;
        }
        self.is_liked = is_liked;
        self.is_saved = is_saved;
    }
}

/// A comment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Document id.
    pub id: CommentId,
    /// Commented post.
    pub post_id: PostId,
    /// Author id.
    pub author_id: UserId,
    /// Text content.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Likes and saves of one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerFlags {
    /// Liked posts.
    pub liked: HashSet<PostId>,
    /// Saved posts.
    pub saved: HashSet<PostId>,
}

/// Server answer to a like or unlike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeReceipt {
    /// Likes counter after the operation.
    pub likes_count: u32,
}

/// Document-store access to posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Most recent posts, newest first.
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, RemoteError>;

    /// Which of `posts` the viewer liked or saved.
    async fn viewer_flags(
        &self,
        viewer: &UserId,
        posts: &[PostId],
    ) -> Result<ViewerFlags, RemoteError>;

    /// Records a like.
    async fn like(&self, viewer: &UserId, post: &PostId) -> Result<LikeReceipt, RemoteError>;

    /// Removes a like.
    async fn unlike(&self, viewer: &UserId, post: &PostId) -> Result<LikeReceipt, RemoteError>;

    /// Saves a post.
    async fn save(&self, viewer: &UserId, post: &PostId) -> Result<(), RemoteError>;

    /// Removes a saved post.
    async fn unsave(&self, viewer: &UserId, post: &PostId) -> Result<(), RemoteError>;

    /// Adds a comment.
    async fn add_comment(
        &self,
        viewer: &UserId,
        post: &PostId,
        content: &str,
    ) -> Result<Comment, RemoteError>;
}

/// Loads the feed of the viewer in the resource key.
pub struct FeedLoader {
    posts: Arc<dyn PostStore>,
    directory: Arc<dyn ProfileDirectory>,
    page_size: usize,
}

impl FeedLoader {
    /// Loader merging `posts` with authors from `directory`.
    pub fn new(
        posts: Arc<dyn PostStore>,
        directory: Arc<dyn ProfileDirectory>,
        page_size: usize,
    ) -> Self {
        Self {
            posts,
            directory,
            page_size,
        }
    }
}

#[async_trait]
impl Loader<Vec<Post>> for FeedLoader {
    async fn load(&self, key: &ResourceKey) -> Result<Vec<Post>, LoadError> {
        let viewer = UserId::new(key.id());
        let mut posts = self.posts.recent_posts(self.page_size).await?;

        let mut author_ids: Vec<UserId> = posts.iter().map(|p| p.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors: HashMap<UserId, ProfileSummary> =
            match self.directory.profiles(&author_ids).await {
                Ok(profiles) => profiles
                    .into_iter()
                    .map(|p| (p.id.clone(), p.summary()))
                    .collect(),
                Err(error) => {
                    warn!(%error, "author lookup failed, posts shown without authors");
                    HashMap::new()
                }
            };

        let post_ids: Vec<PostId> = posts.iter().map(|p| p.id.clone()).collect();
        let flags = self.posts.viewer_flags(&viewer, &post_ids).await?;

        for post in &mut posts {
            post.author = authors.get(&post.author_id).cloned();
            post.is_liked = flags.liked.contains(&post.id);
            post.is_saved = flags.saved.contains(&post.id);
        }
        Ok(posts)
    }
}

/// Undo token of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeUndo {
    was_liked: bool,
    likes_count: u32,
}

/// Local state of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    posts: RecordList<Post>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            posts: RecordList::new(Placement::Prepend),
        }
    }
}

impl FeedState {
    /// Posts, newest first.
    pub fn posts(&self) -> &[Post] {
        self.posts.as_slice()
    }

    /// Looks a post up.
    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.get(id)
    }

    /// Sets the viewer's like and moves the counter by one. `None` if the
    /// post is missing or already in that state.
    pub fn set_liked(&mut self, id: &PostId, liked: bool) -> Option<LikeUndo> {
        self.posts
            .modify(id, |post| {
                if post.is_liked == liked {
                    return None;
                }
                let undo = LikeUndo {
                    was_liked: post.is_liked,
                    likes_count: post.likes_count,
                };
                post.is_liked = liked;
                post.likes_count = if liked {
                    post.likes_count.saturating_add(1)
                } else {
                    post.likes_count.saturating_sub(1)
                };
                Some(undo)
            })
            .flatten()
    }

    /// Restores a like toggle.
    pub fn restore_like(&mut self, id: &PostId, undo: LikeUndo) {
        self.posts.modify(id, |post| {
            post.is_liked = undo.was_liked;
            post.likes_count = undo.likes_count;
        });
    }

    /// Adopts the server's likes counter.
    pub fn adopt_likes(&mut self, id: &PostId, likes_count: u32) -> bool {
        self.posts
            .modify(id, |post| {
                let changed = post.likes_count != likes_count;
                post.likes_count = likes_count;
                changed
            })
            .unwrap_or(false)
    }

    /// Sets the viewer's save flag. Returns the previous flag, or `None`
    /// if the post is missing or already in that state.
    pub fn set_saved(&mut self, id: &PostId, saved: bool) -> Option<bool> {
        self.posts
            .modify(id, |post| {
                (post.is_saved != saved).then(|| std::mem::replace(&mut post.is_saved, saved))
            })
            .flatten()
    }

    /// Moves the comments counter by `delta`. `None` if the post is missing.
    pub fn bump_comments(&mut self, id: &PostId, delta: i32) -> Option<()> {
        self.posts.modify(id, |post| {
            post.comments_count = post.comments_count.saturating_add_signed(delta);
        })
    }

    /// Fills in the author of posts written by `profile`.
    pub fn set_author(&mut self, profile: &ProfileSummary) -> bool {
        let mut modified = false;
        self.posts.modify_all(|post| {
            if post.author_id == profile.id && post.author.as_ref() != Some(profile) {
                post.author = Some(profile.clone());
                modified = true;
            }
        });
        modified
    }

    fn missing_authors(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .posts
            .iter()
            .filter(|p| p.author.is_none())
            .map(|p| p.author_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl LiveState for FeedState {
    type Snapshot = Vec<Post>;
    type Item = Post;

    fn load(&mut self, snapshot: Vec<Post>) {
        self.posts.replace_all(snapshot);
    }

    fn apply(&mut self, change: Change<Post>) -> Applied {
        self.posts.apply(change)
    }
}

/// Mounted activity feed of one viewer.
pub struct ActivityFeed {
    resource: LiveResource<FeedState>,
    posts: Arc<dyn PostStore>,
    directory: Arc<dyn ProfileDirectory>,
    rpc: Arc<dyn NotificationRpc>,
    viewer: Option<UserId>,
}

impl ActivityFeed {
    /// Creates an unmounted feed.
    pub fn new(
        context: &ResourceContext<FeedState>,
        posts: Arc<dyn PostStore>,
        directory: Arc<dyn ProfileDirectory>,
        rpc: Arc<dyn NotificationRpc>,
    ) -> Self {
        Self {
            resource: context.resource(),
            posts,
            directory,
            rpc,
            viewer: None,
        }
    }

    /// Mounts the feed seen by `viewer`; `None` unmounts.
    pub async fn mount(&mut self, viewer: Option<UserId>) {
        self.resource.mount(viewer.as_ref().map(key)).await;
        self.viewer = viewer;
    }

    /// Unmounts.
    pub fn unmount(&mut self) {
        self.resource.unmount();
        self.viewer = None;
    }

    /// Current posts.
    pub fn state(&self) -> FeedState {
        self.resource.state()
    }

    /// Copy of one post.
    pub fn post(&self, id: &PostId) -> Option<Post> {
        self.resource.with_state(|feed| feed.post(id).cloned())
    }

    /// Watches the feed.
    pub fn watch(&self) -> watch::Receiver<FeedState> {
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

    /// Reloads from the stores.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        self.resource.refresh().await
    }

    fn viewer(&self, operation: &'static str) -> Result<&UserId, MutationError> {
        self.viewer
            .as_ref()
            .ok_or(MutationError::NotMounted { operation })
    }

    /// Likes a post. Skipped if already liked.
    pub async fn like(&self, id: &PostId) -> Result<MutationOutcome<LikeReceipt>, MutationError> {
        self.toggle_like(id, true).await
    }

    /// Removes a like. Skipped if not liked.
    pub async fn unlike(&self, id: &PostId) -> Result<MutationOutcome<LikeReceipt>, MutationError> {
        self.toggle_like(id, false).await
    }

    async fn toggle_like(
        &self,
        id: &PostId,
        liked: bool,
    ) -> Result<MutationOutcome<LikeReceipt>, MutationError> {
        let operation = if liked { "like" } else { "unlike" };
        let viewer = self.viewer(operation)?;
        let remote = async {
            if liked {
                self.posts.like(viewer, id).await
            } else {
                self.posts.unlike(viewer, id).await
            }
        };

        let outcome = self
            .resource
            .mutate_with(
                operation,
                |feed| feed.set_liked(id, liked),
                remote,
                |feed, undo| feed.restore_like(id, undo),
                |feed, receipt: &LikeReceipt, _| feed.adopt_likes(id, receipt.likes_count),
            )
            .await?;

        if liked && matches!(outcome, MutationOutcome::Confirmed(_)) {
            self.notify_author(viewer, id, "like", "liked your post").await;
        }
        Ok(outcome)
    }

    /// Saves a post. Skipped if already saved.
    pub async fn save(&self, id: &PostId) -> Result<MutationOutcome<()>, MutationError> {
        self.toggle_save(id, true).await
    }

    /// Removes a saved post. Skipped if not saved.
    pub async fn unsave(&self, id: &PostId) -> Result<MutationOutcome<()>, MutationError> {
        self.toggle_save(id, false).await
    }

    async fn toggle_save(
        &self,
        id: &PostId,
        saved: bool,
    ) -> Result<MutationOutcome<()>, MutationError> {
        let operation = if saved { "save" } else { "unsave" };
        let viewer = self.viewer(operation)?;
        let remote = async {
            if saved {
                self.posts.save(viewer, id).await
            } else {
                self.posts.unsave(viewer, id).await
            }
        };

        self.resource
            .mutate(
                operation,
                |feed| feed.set_saved(id, saved),
                remote,
                |feed, previous| {
                    feed.set_saved(id, previous);
                },
            )
            .await
    }

    /// Comments on a post. The comments counter moves before the store
    /// answers.
    pub async fn add_comment(
        &self,
        id: &PostId,
        content: &str,
    ) -> Result<MutationOutcome<Comment>, MutationError> {
        const OPERATION: &str = "add_comment";
        let viewer = self.viewer(OPERATION)?;

        let outcome = self
            .resource
            .mutate(
                OPERATION,
                |feed| feed.bump_comments(id, 1),
                self.posts.add_comment(viewer, id, content),
                |feed, ()| {
                    feed.bump_comments(id, -1);
                },
            )
            .await?;

        if let MutationOutcome::Confirmed(_) = &outcome {
            self.notify_author(viewer, id, "comment", "commented on your post")
                .await;
        }
        Ok(outcome)
    }

    /// Looks up authors missing from the loaded posts, such as authors of
    /// posts that arrived by push.
    pub async fn resolve_authors(&self) -> Result<usize, RemoteError> {
        let missing = self.resource.with_state(FeedState::missing_authors);
        if missing.is_empty() {
            return Ok(0);
        }
        let profiles = self.directory.profiles(&missing).await?;
        let mut resolved = 0;
        for profile in &profiles {
            if self.resource.update(|feed| feed.set_author(&profile.summary())) {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    async fn notify_author(&self, viewer: &UserId, id: &PostId, category: &str, action: &str) {
        let Some(post) = self.post(id) else {
            return;
        };
        if &post.author_id == viewer {
            return;
        }

        let actor_name = match self.directory.profile(viewer).await {
            Ok(Some(profile)) => profile.full_name,
            _ => "Someone".to_string(),
        };
        let notification = NewNotification {
            user_id: post.author_id.clone(),
            kind: NotificationKind::Social,
            category: category.into(),
            title: format!("New {category}"),
            message: format!("{actor_name} {action}"),
            metadata: json!({ "post_id": id.as_str() }),
            actor_id: Some(viewer.clone()),
            related_entity_type: Some("post".into()),
            related_entity_id: Some(id.as_str().into()),
        };

        match self.rpc.create_notification(notification).await {
            Ok(created) => debug!(%created, author = %post.author_id, category, "author notified"),
            Err(error) => warn!(%error, category, "could not notify post author"),
        }
    }
}
