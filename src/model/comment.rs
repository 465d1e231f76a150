//! Comments on feed posts and their replies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{item::Item, post::Author};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub post_id: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub like_count: u32,
    /// Denormalized count; the server's value is authoritative on the next fetch
    #[serde(default)]
    pub reply_count: u32,
    /// Ids of replies already shown under the comment
    #[serde(default)]
    pub reply_ids: Vec<String>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Item for Comment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Comment {
    /// Best-effort copy after `reply_id` was deleted
    pub fn without_reply(&self, reply_id: &str) -> Self {
        let mut comment = self.clone();
        comment.reply_count = comment.reply_count.saturating_sub(1);
        comment.reply_ids.retain(|id| id != reply_id);
        comment
    }

    /// Best-effort copy after `reply_id` was posted
    pub fn with_reply(&self, reply_id: &str) -> Self {
        let mut comment = self.clone();
        if !comment.reply_ids.iter().any(|id| id == reply_id) {
            comment.reply_ids.push(reply_id.to_string());
            comment.reply_count += 1;
        }
        comment
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub comment_id: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Item for Reply {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[fixture]
    fn comment() -> Comment {
        serde_json::from_value(json!({
            "_id": "c1",
            "postId": "p1",
            "text": "same here",
            "replyCount": 2,
            "replyIds": ["r1", "r2"]
        }))
        .expect("valid comment")
    }

    #[rstest]
    fn test_without_reply(comment: Comment) {
        let updated = comment.without_reply("r1");
        assert_eq!(updated.reply_count, 1);
        assert_eq!(updated.reply_ids, vec!["r2".to_string()]);
        assert_eq!(updated.text, comment.text);
    }

    #[rstest]
    fn test_without_reply_saturates() {
        let comment: Comment =
            serde_json::from_value(json!({"id": "c2", "text": "hm"})).expect("valid comment");
        assert_eq!(comment.without_reply("r9").reply_count, 0);
    }

    #[rstest]
    fn test_with_reply_is_idempotent(comment: Comment) {
        let once = comment.with_reply("r3");
        let twice = once.with_reply("r3");
        assert_eq!(once.reply_count, 3);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_reply_wire_format() {
        let reply: Reply = serde_json::from_value(json!({
            "_id": "r1",
            "commentId": "c1",
            "text": "me too",
            "likeCount": 1
        }))
        .expect("valid reply");
        assert_eq!(reply.id(), "r1");
        assert_eq!(reply.comment_id, "c1");
        assert_eq!(reply.like_count, 1);
    }
}
