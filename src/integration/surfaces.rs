//! The four list surfaces of the app
//!
//! Each surface is a `ListSurface` over one item type. Comments and replies are scoped to
//! their parent, so their page sources are built per parent id.

use crate::{
    infrastructure::api::{HttpApi, HttpPageSource, PageSource},
    integration::surface::ListSurface,
    model::{
        comment::{Comment, Reply},
        dream::{Dream, DreamFilter},
        list::ListQuery,
        post::{FeedFilter, Post},
    },
};

impl HttpApi {
    pub fn dream_pages(&self) -> HttpPageSource<Dream> {
        self.pages("dreams", "dreams")
    }

    pub fn feed_pages(&self) -> HttpPageSource<Post> {
        self.pages("posts", "posts")
    }

    pub fn comment_pages(&self, post_id: &str) -> HttpPageSource<Comment> {
        self.pages(format!("posts/{post_id}/comments"), "comments")
    }

    pub fn reply_pages(&self, comment_id: &str) -> HttpPageSource<Reply> {
        self.pages(format!("comments/{comment_id}/replies"), "replies")
    }
}

/// The signed-in user's dream journal
pub fn dreams<S: PageSource<Dream>>(
    source: S,
    filter: &DreamFilter,
    limit: u32,
) -> ListSurface<Dream, S> {
    ListSurface::new(source, filter.to_query(), limit)
}

/// The community feed of shared dreams
pub fn post_feed<S: PageSource<Post>>(
    source: S,
    filter: &FeedFilter,
    limit: u32,
) -> ListSurface<Post, S> {
    ListSurface::new(source, filter.to_query(), limit)
}

/// Comments under one post, newest first
pub fn comments<S: PageSource<Comment>>(source: S, limit: u32) -> ListSurface<Comment, S> {
    ListSurface::new(source, ListQuery::new().with_sort("recent"), limit)
}

/// Replies under one comment
pub fn replies<S: PageSource<Reply>>(source: S, limit: u32) -> ListSurface<Reply, S> {
    ListSurface::new(source, ListQuery::new(), limit)
}

/// Keep the parent comment's counter in step after a reply was deleted
pub fn reply_removed<S: PageSource<Comment>>(
    comments: &mut ListSurface<Comment, S>,
    comment_id: &str,
    reply_id: &str,
) -> bool {
    comments.patch(comment_id, |comment| comment.without_reply(reply_id))
}

/// Keep the parent comment's counter in step after a reply was posted
pub fn reply_added<S: PageSource<Comment>>(
    comments: &mut ListSurface<Comment, S>,
    comment_id: &str,
    reply_id: &str,
) -> bool {
    comments.patch(comment_id, |comment| comment.with_reply(reply_id))
}

/// Keep a post's comment counter in step after a comment was posted (`+1`) or deleted (`-1`)
pub fn comment_count_changed<S: PageSource<Post>>(
    feed: &mut ListSurface<Post, S>,
    post_id: &str,
    delta: i32,
) -> bool {
    feed.patch(post_id, |post| post.with_comment_delta(delta))
}
