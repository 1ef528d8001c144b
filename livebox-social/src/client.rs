//! Wiring of the social resources from configuration.

use std::sync::Arc;

use livebox::{
    CacheBackend, Config, ConfigError, MemoryBackend, RealtimeTransport, ResourceContext,
    ResourceFetcher, ResourcePolicy, SubscriptionManager,
};
use livebox_moka::MokaBackend;
use tracing::debug;

use crate::feed::{self, ActivityFeed, FeedLoader, FeedState, Post, PostStore};
use crate::notification::{
    self, Notification, NotificationCenter, NotificationFeed, NotificationLoader,
    NotificationRpc, NotificationStore,
};
use crate::notifier::{DesktopNotifier, NoopNotifier};
use crate::profile::{
    self, ProfileDirectory, ProfileLoader, ProfileResource, ProfileState, UserProfile,
};

/// Backend collaborators of a [`SocialClient`].
#[derive(Clone)]
pub struct Collaborators {
    /// Relational profile lookups.
    pub profiles: Arc<dyn ProfileDirectory>,
    /// Relational notification rows.
    pub notifications: Arc<dyn NotificationStore>,
    /// Document-store posts.
    pub posts: Arc<dyn PostStore>,
    /// Server-side notification procedure.
    pub rpc: Arc<dyn NotificationRpc>,
    /// Desktop notifications.
    pub notifier: Arc<dyn DesktopNotifier>,
    /// Realtime channel of notification rows.
    pub notification_transport: Arc<dyn RealtimeTransport<Notification>>,
    /// Realtime channel of post documents.
    pub post_transport: Arc<dyn RealtimeTransport<Post>>,
    /// Realtime channel of profile rows. Profiles are fetch-only without it.
    pub profile_transport: Option<Arc<dyn RealtimeTransport<UserProfile>>>,
}

impl Collaborators {
    /// Collaborators without desktop notifications nor profile pushes.
    pub fn new(
        profiles: Arc<dyn ProfileDirectory>,
        notifications: Arc<dyn NotificationStore>,
        posts: Arc<dyn PostStore>,
        rpc: Arc<dyn NotificationRpc>,
        notification_transport: Arc<dyn RealtimeTransport<Notification>>,
        post_transport: Arc<dyn RealtimeTransport<Post>>,
    ) -> Self {
        Self {
            profiles,
            notifications,
            posts,
            rpc,
            notifier: Arc::new(NoopNotifier),
            notification_transport,
            post_transport,
            profile_transport: None,
        }
    }

    /// Shows desktop notifications through `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn DesktopNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Keeps mounted profiles live through `transport`.
    pub fn with_profile_transport(
        mut self,
        transport: Arc<dyn RealtimeTransport<UserProfile>>,
    ) -> Self {
        self.profile_transport = Some(transport);
        self
    }
}

/// Entry point of the social client: one shared cache, fetch guard and
/// channel registry per resource kind.
///
/// Resources created from the same client share cached snapshots and
/// realtime channels, so two views of one key cost a single fetch and a
/// single channel.
pub struct SocialClient {
    profiles: ResourceContext<ProfileState>,
    notifications: ResourceContext<NotificationFeed>,
    feed: ResourceContext<FeedState>,
    collaborators: Collaborators,
}

impl SocialClient {
    /// Validates `config` and wires the resources over `collaborators`.
    pub fn from_config(config: Config, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = config.realtime.event_buffer;

        let mut profiles = ResourceContext::new(
            fetcher(profile::NAMESPACE, &config.profile),
            ProfileLoader::new(collaborators.profiles.clone()),
            config.profile.clone(),
        );
        if let Some(transport) = &collaborators.profile_transport {
            profiles = profiles.with_realtime(SubscriptionManager::with_buffer(
                transport.clone(),
                buffer,
            ));
        }

        let notifications = ResourceContext::new(
            fetcher(notification::NAMESPACE, &config.notifications),
            NotificationLoader::new(
                collaborators.notifications.clone(),
                config
                    .notifications
                    .page_size_or(notification::DEFAULT_PAGE_SIZE),
            ),
            config.notifications.clone(),
        )
        .with_realtime(SubscriptionManager::with_buffer(
            collaborators.notification_transport.clone(),
            buffer,
        ));

        let feed = ResourceContext::new(
            fetcher(feed::NAMESPACE, &config.feed),
            FeedLoader::new(
                collaborators.posts.clone(),
                collaborators.profiles.clone(),
                config.feed.page_size_or(feed::DEFAULT_PAGE_SIZE),
            ),
            config.feed.clone(),
        )
        .with_realtime(SubscriptionManager::with_buffer(
            collaborators.post_transport.clone(),
            buffer,
        ));

        Ok(Self {
            profiles,
            notifications,
            feed,
            collaborators,
        })
    }

    /// A new, unmounted profile resource.
    pub fn profile(&self) -> ProfileResource {
        self.profiles.resource()
    }

    /// A new, unmounted notification center.
    pub fn notification_center(&self) -> NotificationCenter {
        NotificationCenter::new(
            &self.notifications,
            self.collaborators.notifications.clone(),
            self.collaborators.notifier.clone(),
        )
    }

    /// A new, unmounted activity feed.
    pub fn activity_feed(&self) -> ActivityFeed {
        ActivityFeed::new(
            &self.feed,
            self.collaborators.posts.clone(),
            self.collaborators.profiles.clone(),
            self.collaborators.rpc.clone(),
        )
    }

    /// Context shared by profile resources.
    pub fn profiles(&self) -> &ResourceContext<ProfileState> {
        &self.profiles
    }

    /// Context shared by notification centers.
    pub fn notifications(&self) -> &ResourceContext<NotificationFeed> {
        &self.notifications
    }

    /// Context shared by activity feeds.
    pub fn feed(&self) -> &ResourceContext<FeedState> {
        &self.feed
    }
}

fn fetcher<T>(namespace: &'static str, policy: &ResourcePolicy) -> ResourceFetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    let backend: Arc<dyn CacheBackend<T>> = match policy.max_entries {
        Some(max_entries) => {
            debug!(namespace, max_entries, ttl = ?policy.ttl, "bounded cache");
            Arc::new(
                MokaBackend::builder(policy.ttl)
                    .label(namespace)
                    .max_entries(max_entries)
                    .build(),
            )
        }
        None => {
            debug!(namespace, ttl = ?policy.ttl, "unbounded cache");
            Arc::new(MemoryBackend::new(policy.ttl).with_label(namespace))
        }
    };
    ResourceFetcher::from_shared(backend)
}
