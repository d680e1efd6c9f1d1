use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::api::{self, ApiError, Comment, Item, SortMode, VoteReceipt};

pub trait FeedService: Send + Sync {
    fn list_items(&self, sort: SortMode, limit: usize) -> Result<Vec<Item>, ApiError>;
}

pub trait CommentService: Send + Sync {
    fn list_comments(&self, item_id: &str) -> Result<Vec<Comment>, ApiError>;
}

pub trait InteractionService: Send + Sync {
    fn vote_item(&self, item_id: &str) -> Result<VoteReceipt, ApiError>;
    fn vote_comment(&self, comment_id: &str) -> Result<VoteReceipt, ApiError>;
    fn post_comment(
        &self,
        item_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, ApiError>;
    fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError>;
}

pub struct BoardFeedService {
    client: Arc<api::Client>,
}

impl BoardFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for BoardFeedService {
    fn list_items(&self, sort: SortMode, limit: usize) -> Result<Vec<Item>, ApiError> {
        self.client.list_items(sort, limit)
    }
}

pub struct BoardCommentService {
    client: Arc<api::Client>,
}

impl BoardCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for BoardCommentService {
    fn list_comments(&self, item_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.client.list_comments(item_id)
    }
}

pub struct BoardInteractionService {
    client: Arc<api::Client>,
}

impl BoardInteractionService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl InteractionService for BoardInteractionService {
    fn vote_item(&self, item_id: &str) -> Result<VoteReceipt, ApiError> {
        self.client.vote_item(item_id)
    }

    fn vote_comment(&self, comment_id: &str) -> Result<VoteReceipt, ApiError> {
        self.client.vote_comment(comment_id)
    }

    fn post_comment(
        &self,
        item_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, ApiError> {
        self.client.post_comment(item_id, body, parent_id)
    }

    fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.client.delete_comment(comment_id)
    }
}

#[derive(Default)]
pub struct MockFeedService;

impl FeedService for MockFeedService {
    fn list_items(&self, _sort: SortMode, _limit: usize) -> Result<Vec<Item>, ApiError> {
        Ok(vec![
            mock_item(
                "welcome",
                "Welcome to AN-TUI",
                "Sample papers provided for offline browsing.",
            ),
            mock_item(
                "shortcuts",
                "Keyboard shortcuts",
                "j/k navigate, Enter opens comments, v votes, 1/2/3 change sort.",
            ),
        ])
    }
}

#[derive(Default)]
pub struct MockCommentService;

impl CommentService for MockCommentService {
    fn list_comments(&self, _item_id: &str) -> Result<Vec<Comment>, ApiError> {
        Ok(vec![Comment {
            id: "mock".into(),
            parent_id: None,
            author: "an-tui".into(),
            body: "Comments are unavailable in this mock response.".into(),
            created_at: Utc::now(),
            vote_count: 0,
            replies: Vec::new(),
        }])
    }
}

#[derive(Default)]
pub struct MockInteractionService;

impl InteractionService for MockInteractionService {
    fn vote_item(&self, _item_id: &str) -> Result<VoteReceipt, ApiError> {
        Ok(VoteReceipt {
            vote_count: 1,
            user_voted: true,
        })
    }

    fn vote_comment(&self, _comment_id: &str) -> Result<VoteReceipt, ApiError> {
        Ok(VoteReceipt {
            vote_count: 1,
            user_voted: true,
        })
    }

    fn post_comment(
        &self,
        _item_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, ApiError> {
        Ok(Comment {
            id: "mock".into(),
            parent_id: parent_id.map(str::to_owned),
            author: "an-tui".into(),
            body: body.to_owned(),
            created_at: Utc::now(),
            vote_count: 0,
            replies: Vec::new(),
        })
    }

    fn delete_comment(&self, _comment_id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

fn mock_item(id: &str, title: &str, summary: &str) -> Item {
    Item {
        id: id.to_owned(),
        title: title.to_owned(),
        summary: summary.to_owned(),
        authors: vec!["an-tui".into()],
        categories: vec!["cs.AI".into()],
        created_at: Utc::now() - Duration::hours(1),
        vote_count: 1,
        comment_count: 0,
        submitter: "an-tui".into(),
        url: String::new(),
    }
}

pub fn sort_mode_from_key(key: &str) -> SortMode {
    match key {
        "new" | "recent" => SortMode::New,
        "discussed" | "comments" => SortMode::Discussed,
        _ => SortMode::Hot,
    }
}
