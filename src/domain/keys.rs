//! Composite hub keys for timeline entities.

use crate::hub::HubKey;

/// Identifies one post within one timeline.
///
/// Timeline names cannot contain `/`, so the joined form is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostKey {
    pub timeline_name: String,
    pub post_id: i64,
}

impl PostKey {
    pub fn new(timeline_name: impl Into<String>, post_id: i64) -> Self {
        Self {
            timeline_name: timeline_name.into(),
            post_id,
        }
    }
}

impl HubKey for PostKey {
    fn hub_key(&self) -> String {
        format!("{}/{}", self.timeline_name, self.post_id)
    }
}
