//! User profiles.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use livebox::{
    Applied, Change, LiveResource, LiveState, LoadError, Loader, Record, RecordVersion,
    RemoteError, ResourceKey,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ids::UserId;

/// Resource namespace of profiles.
pub const NAMESPACE: &str = "profile";

/// Display name used when a profile row is missing.
pub const PLACEHOLDER_NAME: &str = "Unknown user";

/// Resource key of `user`'s profile.
pub fn key(user: &UserId) -> ResourceKey {
    ResourceKey::new(NAMESPACE, user.as_str())
}

/// A user profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Avatar image.
    pub avatar_url: Option<String>,
    /// Contact address, only visible to the user themselves.
    pub email: Option<String>,
    /// Free-form biography.
    pub bio: Option<String>,
    /// Whether the onboarding questionnaire was completed.
    pub onboarding_completed: bool,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Hand-built profile shown when the row is missing or unreachable.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            full_name: PLACEHOLDER_NAME.to_string(),
            avatar_url: None,
            email: None,
            bio: None,
            onboarding_completed: false,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Name and avatar, as embedded in posts and notifications.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

impl Record for UserProfile {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }

    fn version(&self) -> Option<RecordVersion> {
        Some(self.updated_at.into())
    }
}

/// Name and avatar of a user, denormalized into other records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Avatar image.
    pub avatar_url: Option<String>,
}

/// Relational profile lookups.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Profile of `id`; `None` when the row does not exist.
    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, RemoteError>;

    /// Profiles of every id that exists, in no particular order.
    async fn profiles(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, RemoteError>;
}

#[async_trait]
impl<D: ProfileDirectory + ?Sized> ProfileDirectory for Arc<D> {
    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        (**self).profile(id).await
    }

    async fn profiles(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, RemoteError> {
        (**self).profiles(ids).await
    }
}

/// Loads a profile by the id in its resource key.
pub struct ProfileLoader {
    directory: Arc<dyn ProfileDirectory>,
}

impl ProfileLoader {
    /// Loader over `directory`.
    pub fn new(directory: Arc<dyn ProfileDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Loader<UserProfile> for ProfileLoader {
    async fn load(&self, key: &ResourceKey) -> Result<UserProfile, LoadError> {
        let id = UserId::new(key.id());
        match self.directory.profile(&id).await? {
            Some(profile) => Ok(profile),
            None => {
                debug!(%key, "profile row missing");
                Err(LoadError::NotFound(key.clone()))
            }
        }
    }
}

/// Local state of a profile resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileState {
    profile: Option<UserProfile>,
}

impl ProfileState {
    /// The loaded profile.
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// `true` when the shown profile is the placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|p| p.updated_at == DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl LiveState for ProfileState {
    type Snapshot = UserProfile;
    type Item = UserProfile;

    fn load(&mut self, snapshot: UserProfile) {
        match &self.profile {
            Some(held) if held.id == snapshot.id && held.supersedes(&snapshot) => {}
            _ => self.profile = Some(snapshot),
        }
    }

    fn apply(&mut self, change: Change<UserProfile>) -> Applied {
        match change {
            Change::Insert(incoming) | Change::Update(incoming) => match &mut self.profile {
                Some(held) if held.id == incoming.id => {
                    if held.supersedes(&incoming) {
                        Applied::Stale
                    } else {
                        held.merge(incoming);
                        Applied::Updated
                    }
                }
                Some(_) => Applied::Missing,
                None => {
                    self.profile = Some(incoming);
                    Applied::Inserted
                }
            },
            Change::Delete(id) => match &self.profile {
                Some(held) if held.id == id => {
                    self.profile = None;
                    Applied::Removed
                }
                _ => Applied::Missing,
            },
        }
    }

    fn fallback(key: &ResourceKey) -> Option<UserProfile> {
        Some(UserProfile::placeholder(UserId::new(key.id())))
    }
}

/// A mounted profile.
pub type ProfileResource = LiveResource<ProfileState>;
