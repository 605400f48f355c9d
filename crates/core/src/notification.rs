//! Tag-push notifications as delivered by the message broker.
//!
//! Decoding is structural only: missing fields decode as empty strings and no
//! field is checked for content. Deciding whether a notification is actionable
//! belongs to the deployment pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix a ref must carry to be deployed.
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// Payload could not be mapped onto a [`Notification`].
#[derive(Debug, Error)]
#[error("Failed to decode notification: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// A decoded repository push event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    /// Pushed git reference, e.g. `refs/tags/v1.2.3`.
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: Repository,
    pub pusher: Pusher,
    pub base_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
    pub url: String,
    pub git_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Owner {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pusher {
    pub name: String,
    pub email: String,
}

impl Notification {
    /// Decode a raw broker payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Whether the pushed ref is a tag.
    pub fn is_tag_push(&self) -> bool {
        self.git_ref.starts_with(TAG_REF_PREFIX)
    }

    /// The tag name: the third `/`-delimited segment of the ref.
    ///
    /// Returns `None` unless the ref starts with `refs/tags/`. A tag name that
    /// itself contains `/` is truncated to its first segment.
    pub fn tag(&self) -> Option<&str> {
        if !self.is_tag_push() {
            return None;
        }
        self.git_ref.split('/').nth(2)
    }

    /// Whether [`Notification::tag`] dropped part of the tag name.
    pub fn tag_is_truncated(&self) -> bool {
        self.is_tag_push() && self.git_ref[TAG_REF_PREFIX.len()..].contains('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "ref": "refs/tags/v0.0.2",
        "base_ref": "refs/heads/main",
        "repository": {
            "name": "tg-dispatcher",
            "owner": {"name": "Vsevololod", "email": "owner@example.com"},
            "url": "https://git.example.com/ops/tg-dispatcher",
            "git_url": "git://git.example.com/ops/tg-dispatcher.git"
        },
        "pusher": {"name": "Vsevololod", "email": "pusher@example.com"}
    }"#;

    #[test]
    fn test_decode_full_payload() {
        let n = Notification::decode(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(n.git_ref, "refs/tags/v0.0.2");
        assert_eq!(n.repository.name, "tg-dispatcher");
        assert_eq!(n.repository.owner.email, "owner@example.com");
        assert_eq!(n.repository.git_url, "git://git.example.com/ops/tg-dispatcher.git");
        assert_eq!(n.pusher.name, "Vsevololod");
        assert_eq!(n.base_ref, "refs/heads/main");
    }

    #[test]
    fn test_reencode_preserves_fields() {
        let n = Notification::decode(PAYLOAD.as_bytes()).unwrap();
        let encoded = serde_json::to_vec(&n).unwrap();
        let again = Notification::decode(&encoded).unwrap();
        assert_eq!(n, again);

        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value["ref"], "refs/tags/v0.0.2");
        assert_eq!(value["repository"]["owner"]["name"], "Vsevololod");
    }

    #[test]
    fn test_scalar_repository_is_rejected() {
        let result = Notification::decode(br#"{"ref": "refs/tags/v0.0.2", "repository": "invalid"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_not_json_is_rejected() {
        assert!(Notification::decode(b"ref=refs/tags/v1").is_err());
        assert!(Notification::decode(b"[1, 2, 3]").is_err());
    }

    #[test]
    fn test_missing_fields_decode_empty() {
        let n = Notification::decode(br#"{"ref": "refs/heads/main"}"#).unwrap();
        assert_eq!(n.repository.name, "");
        assert_eq!(n.pusher.email, "");
    }

    #[test]
    fn test_tag_extraction() {
        let n = Notification {
            git_ref: "refs/tags/v0.0.2".to_string(),
            ..Default::default()
        };
        assert!(n.is_tag_push());
        assert_eq!(n.tag(), Some("v0.0.2"));
        assert!(!n.tag_is_truncated());
    }

    #[test]
    fn test_branch_has_no_tag() {
        let n = Notification {
            git_ref: "refs/heads/main".to_string(),
            ..Default::default()
        };
        assert!(!n.is_tag_push());
        assert_eq!(n.tag(), None);
    }

    #[test]
    fn test_prefix_without_slash_is_not_a_tag() {
        let n = Notification {
            git_ref: "refs/tagsfoo/v1".to_string(),
            ..Default::default()
        };
        assert!(!n.is_tag_push());
    }

    #[test]
    fn test_nested_tag_is_truncated() {
        let n = Notification {
            git_ref: "refs/tags/release/1.0".to_string(),
            ..Default::default()
        };
        assert_eq!(n.tag(), Some("release"));
        assert!(n.tag_is_truncated());
    }

    #[test]
    fn test_empty_tag() {
        let n = Notification {
            git_ref: "refs/tags/".to_string(),
            ..Default::default()
        };
        assert_eq!(n.tag(), Some(""));
    }
}
