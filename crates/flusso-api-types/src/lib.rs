//! Shared request and response types for the Flusso timeline API.
//!
//! Mirrors the JSON wire contract of the Flusso backend. Field names are
//! camelCase on the wire; timestamps are RFC 3339.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Who may read a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineVisibility {
    /// Readable by anyone, including anonymous visitors.
    Public,
    /// Readable by any registered user.
    Register,
    /// Readable by members only.
    Private,
}

/// Administrative permissions a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserPermission {
    UserManagement,
    AllTimelineManagement,
    HighlightTimelineManagement,
}

/// A user as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpUser {
    pub unique_id: Uuid,
    pub username: String,
    pub nickname: String,
    #[serde(default)]
    pub permissions: Vec<UserPermission>,
}

/// A timeline as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTimeline {
    pub unique_id: Uuid,
    pub name: String,
    pub description: String,
    pub owner: HttpUser,
    pub visibility: TimelineVisibility,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub members: Vec<HttpUser>,
}

/// Post body content. Image posts carry their payload out of band; the
/// binary data is fetched through the per-post data endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HttpPostContent {
    Text { text: String },
    Image,
}

/// A post as returned by the API.
///
/// Deleted posts keep their id and timestamps but lose content and author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpPost {
    pub id: i64,
    #[serde(default)]
    pub content: Option<HttpPostContent>,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(default)]
    pub author: Option<HttpUser>,
    #[serde(default)]
    pub deleted: bool,
}

/// Partial update of a timeline's mutable properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTimelinePatchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<TimelineVisibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update of a user's mutable properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpUserPatchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample_user() -> HttpUser {
        HttpUser {
            unique_id: Uuid::nil(),
            username: "alice".to_string(),
            nickname: "Alice".to_string(),
            permissions: vec![UserPermission::UserManagement],
        }
    }

    #[test]
    fn user_wire_names_are_camel_case() {
        let json = serde_json::to_value(sample_user()).expect("serialize user");
        assert!(json.get("uniqueId").is_some());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["permissions"][0], "UserManagement");
    }

    #[test]
    fn timeline_round_trips() {
        let timeline = HttpTimeline {
            unique_id: Uuid::nil(),
            name: "journal".to_string(),
            description: "".to_string(),
            owner: sample_user(),
            visibility: TimelineVisibility::Register,
            last_modified: datetime!(2024-05-01 12:00 UTC),
            members: vec![],
        };

        let json = serde_json::to_string(&timeline).expect("serialize timeline");
        let back: HttpTimeline = serde_json::from_str(&json).expect("deserialize timeline");
        assert_eq!(back, timeline);
    }

    #[test]
    fn post_content_uses_type_tag() {
        let post = HttpPost {
            id: 7,
            content: Some(HttpPostContent::Text {
                text: "hello".to_string(),
            }),
            time: datetime!(2024-05-01 12:00 UTC),
            last_updated: datetime!(2024-05-01 12:00 UTC),
            author: Some(sample_user()),
            deleted: false,
        };

        let json = serde_json::to_value(&post).expect("serialize post");
        assert_eq!(json["content"]["type"], "text");
        assert_eq!(json["content"]["text"], "hello");
        assert_eq!(json["lastUpdated"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn deleted_post_parses_without_content_or_author() {
        let json = r#"{
            "id": 3,
            "time": "2024-05-01T12:00:00Z",
            "lastUpdated": "2024-05-02T12:00:00Z",
            "deleted": true
        }"#;

        let post: HttpPost = serde_json::from_str(json).expect("deserialize deleted post");
        assert!(post.deleted);
        assert!(post.content.is_none());
        assert!(post.author.is_none());
    }

    #[test]
    fn patch_requests_skip_absent_fields() {
        let patch = HttpTimelinePatchRequest {
            visibility: None,
            description: Some("updated".to_string()),
        };

        let json = serde_json::to_value(&patch).expect("serialize patch");
        assert!(json.get("visibility").is_none());
        assert_eq!(json["description"], "updated");
    }
}
