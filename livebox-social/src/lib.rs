#![warn(missing_docs)]
//! # livebox-social
//!
//! The three live resources of the social client, built on [`livebox`]:
//!
//! | Resource | Module | Realtime | Mutations |
//! |----------|--------|----------|-----------|
//! | User profile | [`profile`] | optional | none |
//! | Notification center | [`notification`] | yes | mark read, mark all read |
//! | Activity feed | [`feed`] | yes | like, save, comment |
//!
//! Backends are reached through collaborator traits ([`ProfileDirectory`],
//! [`NotificationStore`], [`PostStore`], [`NotificationRpc`]) and wired
//! together by [`SocialClient::from_config`].

pub mod client;
pub mod feed;
pub mod ids;
pub mod notification;
pub mod notifier;
pub mod profile;

pub use client::{Collaborators, SocialClient};
pub use feed::{
    ActivityFeed, Comment, FeedLoader, FeedState, LikeReceipt, Post, PostStore, ViewerFlags,
};
pub use ids::{CommentId, NotificationId, PostId, UserId};
pub use notification::{
    NewNotification, Notification, NotificationCenter, NotificationFeed, NotificationKind,
    NotificationLoader, NotificationRpc, NotificationStore,
};
pub use notifier::{DesktopNotifier, NoopNotifier, NotificationPermission, NotifierError};
pub use profile::{
    ProfileDirectory, ProfileLoader, ProfileResource, ProfileState, ProfileSummary, UserProfile,
};
