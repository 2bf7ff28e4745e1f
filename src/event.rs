//! Inbound "moderator action performed" event.
//!
//! The platform payload is loose: any field may be absent and the target can
//! arrive under three different names. It is decoded leniently here and
//! resolved into typed pieces at the pipeline boundary.

use serde::{Deserialize, Serialize};

/// Mod-log action for "removal reason attached".
pub const REMOVAL_REASON_ACTION: &str = "addremovalreason";
/// Platform automation account.
pub const AUTOMATION_ACTOR: &str = "automoderator";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunityRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModActionEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub moderator: Option<UserRef>,
    #[serde(default)]
    pub target_post: Option<IdRef>,
    #[serde(default)]
    pub target_comment: Option<IdRef>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub target_user: Option<UserRef>,
    #[serde(default)]
    pub subreddit: Option<CommunityRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    /// `t3_` is a post; everything else is treated as a comment.
    pub fn from_id(id: &str) -> Self {
        if id.starts_with("t3_") {
            TargetKind::Post
        } else {
            TargetKind::Comment
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Post => "post",
            TargetKind::Comment => "comment",
        }
    }
}

/// Where the target id was found on the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Post(String),
    Comment(String),
    Generic(String),
}

impl TargetRef {
    pub fn id(&self) -> &str {
        match self {
            TargetRef::Post(id) | TargetRef::Comment(id) | TargetRef::Generic(id) => id,
        }
    }

    /// Kind always follows the id namespace, never the field it came from.
    pub fn kind(&self) -> TargetKind {
        TargetKind::from_id(self.id())
    }
}

/// Author of the removed content, both parts present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
}

fn non_empty(s: Option<&String>) -> Option<&str> {
    s.map(String::as_str).filter(|s| !s.is_empty())
}

impl ModActionEvent {
    /// Lower-cased action name ("" when absent).
    pub fn action_lower(&self) -> String {
        self.action.as_deref().unwrap_or_default().to_lowercase()
    }

    pub fn is_removal_reason(&self) -> bool {
        self.action_lower() == REMOVAL_REASON_ACTION
    }

    /// Lower-cased acting moderator name ("" when absent).
    pub fn moderator_lower(&self) -> String {
        self.moderator
            .as_ref()
            .and_then(|m| m.name.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }

    pub fn is_automation_actor(&self) -> bool {
        self.moderator_lower() == AUTOMATION_ACTOR
    }

    /// First non-empty of post, comment, then generic target id.
    pub fn target(&self) -> Option<TargetRef> {
        if let Some(id) = non_empty(self.target_post.as_ref().and_then(|t| t.id.as_ref())) {
            return Some(TargetRef::Post(id.to_string()));
        }
        if let Some(id) = non_empty(self.target_comment.as_ref().and_then(|t| t.id.as_ref())) {
            return Some(TargetRef::Comment(id.to_string()));
        }
        non_empty(self.target_id.as_ref()).map(|id| TargetRef::Generic(id.to_string()))
    }

    pub fn author(&self) -> Option<Author> {
        let u = self.target_user.as_ref()?;
        let id = non_empty(u.id.as_ref())?;
        let name = non_empty(u.name.as_ref())?;
        Some(Author {
            id: id.to_string(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_platform_payload() {
        let ev: ModActionEvent = serde_json::from_str(
            r#"{
                "action": "AddRemovalReason",
                "moderator": {"name": "SomeMod"},
                "targetPost": {"id": "t3_abc"},
                "targetUser": {"id": "u1", "name": "bob"},
                "extra": 42
            }"#,
        )
        .unwrap();
        assert!(ev.is_removal_reason());
        assert_eq!(ev.target(), Some(TargetRef::Post("t3_abc".into())));
        assert_eq!(ev.target().unwrap().kind(), TargetKind::Post);
        assert_eq!(
            ev.author(),
            Some(Author {
                id: "u1".into(),
                name: "bob".into()
            })
        );
    }

    #[test]
    fn target_precedence_and_kind_from_prefix() {
        let ev = ModActionEvent {
            target_comment: Some(IdRef {
                id: Some("t1_c".into()),
            }),
            target_id: Some("t3_p".into()),
            ..Default::default()
        };
        assert_eq!(ev.target(), Some(TargetRef::Comment("t1_c".into())));

        // A generic id with a post prefix is a post.
        let ev = ModActionEvent {
            target_post: Some(IdRef { id: Some(String::new()) }),
            target_id: Some("t3_p".into()),
            ..Default::default()
        };
        let t = ev.target().unwrap();
        assert_eq!(t, TargetRef::Generic("t3_p".into()));
        assert_eq!(t.kind(), TargetKind::Post);
    }

    #[test]
    fn missing_pieces_resolve_to_none() {
        let ev = ModActionEvent::default();
        assert!(ev.target().is_none());
        assert!(ev.author().is_none());
        assert!(!ev.is_removal_reason());

        let ev = ModActionEvent {
            target_user: Some(UserRef {
                id: Some("u1".into()),
                name: None,
            }),
            ..Default::default()
        };
        assert!(ev.author().is_none());
    }

    #[test]
    fn automation_actor_is_case_insensitive() {
        let ev = ModActionEvent {
            moderator: Some(UserRef {
                id: None,
                name: Some("AutoModerator".into()),
            }),
            ..Default::default()
        };
        assert!(ev.is_automation_actor());
    }
}
