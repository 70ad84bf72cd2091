//! Canonical domain shapes shared by all providers.
//!
//! Every provider implementation must produce and consume these normalized
//! types regardless of its backend's native wire format. The member `email`
//! is the cross-provider join key and is always validated and lower-cased
//! before use; see [`normalize_email`].

use crate::error::{GroupSyncError, GroupSyncResult};
use serde::{Deserialize, Serialize};

/// Role a member holds within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    #[default]
    Member,
    Manager,
    Owner,
}

/// Provider-neutral representation of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGroup {
    /// Provider-side group identifier.
    pub id: String,
    /// Display name of the group.
    pub name: String,
    /// Group email address, when the backend models one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Name of the provider that owns this group.
    pub provider: String,
    /// Members in provider-reported order.
    #[serde(default)]
    pub members: Vec<NormalizedMember>,
}

/// Provider-neutral representation of a group member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMember {
    /// Normalized email address; the cross-provider join key.
    pub email: String,
    /// Stable identifier within this engine.
    pub id: String,
    /// Role within the group.
    #[serde(default)]
    pub role: MemberRole,
    /// The backend's native member identifier.
    pub provider_member_id: String,
}

/// Validate and normalize an email address for use as a join key.
///
/// Accepts the pragmatic shape `local@domain` where both parts are
/// non-empty, the domain contains a dot, and the address carries no
/// whitespace or control characters. The result is lower-cased so that
/// lookups against different providers compare equal.
///
/// # Errors
///
/// Returns [`GroupSyncError::InvalidEmail`] when the address fails
/// validation; callers at the provider boundary convert this into a
/// PERMANENT_ERROR result without contacting any backend.
pub fn normalize_email(raw: &str) -> GroupSyncResult<String> {
    let trimmed = raw.trim();
    let invalid = || GroupSyncError::InvalidEmail {
        value: raw.to_string(),
    };

    if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }

    let mut parts = trimmed.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().ok_or_else(invalid)?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    // Bare hostnames are not routable addresses for our purposes.
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(trimmed.to_lowercase())
}
