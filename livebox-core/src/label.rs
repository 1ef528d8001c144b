//! Names for cache backends.

use std::fmt;

use smol_str::SmolStr;

/// Name a cache backend reports in logs and `Debug` output.
///
/// A backend starts out named after its kind (`"memory"`, `"moka"`); a
/// client usually renames it after the namespace it caches.
///
/// ```
/// use livebox_core::BackendLabel;
///
/// let label = BackendLabel::from("notifications");
/// assert_eq!(label.as_str(), "notifications");
/// assert_eq!(label.to_string(), "notifications");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendLabel(SmolStr);

impl BackendLabel {
    /// Label for a backend kind, usable in `const` position.
    pub const fn new_static(kind: &'static str) -> Self {
        Self(SmolStr::new_static(kind))
    }

    /// The name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendLabel {
    fn from(name: &str) -> Self {
        Self(SmolStr::new(name))
    }
}
