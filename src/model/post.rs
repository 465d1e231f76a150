//! Community feed posts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{
    dream::Dream,
    item::{Item, Nested},
    list::ListQuery,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A dream shared to the community feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub dream: Option<Dream>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub bookmarked: bool,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Item for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn nested(&self) -> Option<Nested<'_>> {
        self.dream.as_ref().map(|dream| Nested {
            field: "dream",
            id: &dream.id,
        })
    }
}

impl Post {
    /// Best-effort display counter after a comment was added or removed here
    pub fn with_comment_delta(&self, delta: i32) -> Self {
        Self {
            comment_count: self.comment_count.saturating_add_signed(delta),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FeedSort {
    #[default]
    Recent,
    Popular,
    Oldest,
}

/// Criteria of the community feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub sort: FeedSort,
    pub search: String,
    pub bookmarked_only: bool,
}

impl FeedFilter {
    pub fn to_query(&self) -> ListQuery {
        let bookmarked = if self.bookmarked_only { "true" } else { "" };
        ListQuery::new()
            .with_sort(self.sort.to_string())
            .with_search(&self.search)
            .with_filter("bookmarked", bookmarked)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_format() {
        let post: Post = serde_json::from_value(json!({
            "_id": "p1",
            "caption": "last night",
            "author": {"_id": "u1", "username": "luna"},
            "dream": {"_id": "d1", "title": "Tides"},
            "likeCount": 5,
            "commentCount": 2
        }))
        .expect("valid post");

        assert_eq!(post.id(), "p1");
        assert_eq!(post.like_count, 5);
        assert!(!post.liked);
        assert_eq!(
            post.nested(),
            Some(Nested {
                field: "dream",
                id: "d1"
            })
        );
        assert_eq!(post.author.map(|a| a.username), Some("luna".to_string()));
    }

    #[test]
    fn test_comment_delta_saturates() {
        let post: Post = serde_json::from_value(json!({"id": "p1"})).expect("valid post");
        assert_eq!(post.with_comment_delta(-1).comment_count, 0);
        assert_eq!(post.with_comment_delta(2).comment_count, 2);
    }

    #[test]
    fn test_filter_query() {
        let query = FeedFilter {
            sort: FeedSort::Popular,
            search: String::new(),
            bookmarked_only: true,
        }
        .to_query();
        assert_eq!(query.sort(), Some("popular"));
        assert_eq!(query.search(), None);
        assert_eq!(query.filter("bookmarked"), Some("true"));
        assert_eq!(FeedFilter::default().to_query().filter("bookmarked"), None);
    }
}
