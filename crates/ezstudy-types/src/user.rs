use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace shared by everyone who is not signed in
pub const GUEST_KEY: &str = "guest";

/// Stable identifier that namespaces a user's persisted collections
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    /// Key for a user id; blank ids fall back to the guest namespace
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().trim();
        if id.is_empty() {
            Self::guest()
        } else {
            Self(id.to_string())
        }
    }

    pub fn guest() -> Self {
        Self(GUEST_KEY.to_string())
    }

    pub fn is_guest(&self) -> bool {
        self.0 == GUEST_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserKey {
    fn default() -> Self {
        Self::guest()
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signed-in user, as far as the console cares.
///
/// Only `id` is used for namespacing; `name` is display-only and never ends up
/// in a storage key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn signed_in(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: Some(id.into()),
            name,
        }
    }

    pub fn key(&self) -> UserKey {
        self.id.as_deref().map(UserKey::new).unwrap_or_default()
    }

    /// Opening assistant message of every new thread
    pub fn greeting(&self) -> String {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("there");
        format!(
            "Hello {name}! I'm your personalized study assistant. I can help you summarize notes, \
             explain complex topics, or quiz you on your materials. What should we focus on today?"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_key_for_anonymous_profile() {
        assert!(UserProfile::guest().key().is_guest());
        assert!(UserProfile::signed_in("  ", None).key().is_guest());
    }

    #[test]
    fn test_key_uses_id_not_name() {
        let profile = UserProfile::signed_in("u-42", Some("Ada".to_string()));
        assert_eq!(profile.key().as_str(), "u-42");
    }

    #[test]
    fn test_greeting_personalised() {
        let profile = UserProfile::signed_in("u-42", Some("Ada".to_string()));
        assert!(profile.greeting().starts_with("Hello Ada!"));
        assert!(UserProfile::guest().greeting().starts_with("Hello there!"));
    }
}
