//! Identifier newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(SmolStr);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(id: impl Into<SmolStr>) -> Self {
                Self(id.into())
            }

            /// Raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }
    };
}

identifier!(
    /// Identifier of a user, shared by profiles, notifications and posts.
    UserId
);
identifier!(
    /// Identifier of a notification row.
    NotificationId
);
identifier!(
    /// Identifier of a post document.
    PostId
);
identifier!(
    /// Identifier of a comment document.
    CommentId
);
