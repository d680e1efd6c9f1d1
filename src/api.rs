use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://arxiv-news.com/api/";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("login required")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("board api error {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub username: String,
    pub token: String,
}

pub trait CredentialProvider: Send + Sync {
    fn actor_id(&self) -> String;
    fn session(&self) -> Option<SessionAuth>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Discussed,
}

impl SortMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortMode::Hot => "votes",
            SortMode::New => "recent",
            SortMode::Discussed => "comments",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortMode::Hot => "Hot",
            SortMode::New => "New",
            SortMode::Discussed => "Discussed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
    pub comment_count: i64,
    pub submitter: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub parent_id: Option<String>,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_count: i64,
    #[serde(default)]
    pub user_voted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    credentials: Arc<dyn CredentialProvider>,
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        config: ClientConfig,
    ) -> anyhow::Result<Self> {
        if config.user_agent.trim().is_empty() {
            anyhow::bail!("board client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("board base url must be an http(s) url: {base}");
        }
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            credentials,
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn list_items(&self, sort: SortMode, limit: usize) -> Result<Vec<Item>, ApiError> {
        let mut url = self.endpoint(&["papers"]);
        url.query_pairs_mut()
            .append_pair("sort", sort.as_param())
            .append_pair("limit", &limit.to_string());
        let resp = self.request(Method::GET, url, None)?;
        let raw: Vec<RawItem> = resp.json()?;
        Ok(raw.into_iter().map(RawItem::into_item).collect())
    }

    pub fn get_item(&self, id: &str) -> Result<Item, ApiError> {
        let url = self.endpoint(&["papers", id]);
        let resp = self.request(Method::GET, url, None)?;
        let raw: RawItem = resp.json()?;
        Ok(raw.into_item())
    }

    pub fn vote_item(&self, id: &str) -> Result<VoteReceipt, ApiError> {
        let mut url = self.endpoint(&["papers", id, "vote"]);
        url.query_pairs_mut()
            .append_pair("user_identifier", &self.credentials.actor_id());
        let resp = self.request(Method::POST, url, None)?;
        Ok(resp.json()?)
    }

    pub fn list_comments(&self, item_id: &str) -> Result<Vec<Comment>, ApiError> {
        let url = self.endpoint(&["papers", item_id, "comments"]);
        let resp = self.request(Method::GET, url, None)?;
        let raw: Vec<RawComment> = resp.json()?;
        Ok(raw.into_iter().map(RawComment::into_comment).collect())
    }

    pub fn post_comment(
        &self,
        item_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, ApiError> {
        let session = self
            .credentials
            .session()
            .ok_or(ApiError::Unauthorized)?;
        if body.trim().is_empty() {
            return Err(ApiError::Validation("comment body is required".into()));
        }
        let url = self.endpoint(&["papers", item_id, "comments"]);
        let payload = serde_json::json!({
            "user_name": session.username,
            "content": body.trim(),
            "parent_id": parent_id,
        });
        let resp = self.request(Method::POST, url, Some(&payload))?;
        let raw: RawComment = resp.json()?;
        Ok(raw.into_comment())
    }

    pub fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        if self.credentials.session().is_none() {
            return Err(ApiError::Unauthorized);
        }
        let url = self.endpoint(&["comments", comment_id]);
        self.request(Method::DELETE, url, None)?;
        Ok(())
    }

    pub fn vote_comment(&self, comment_id: &str) -> Result<VoteReceipt, ApiError> {
        let mut url = self.endpoint(&["comments", comment_id, "vote"]);
        url.query_pairs_mut()
            .append_pair("user_identifier", &self.credentials.actor_id());
        let resp = self.request(Method::POST, url, None)?;
        Ok(resp.json()?)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone());
        if let Some(session) = self.credentials.session() {
            req = req.header(AUTHORIZATION, format!("Bearer {}", session.token));
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send()?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().unwrap_or_default();
            Err(classify_status(status.as_u16(), error_message(&body)))
        }
    }
}

fn classify_status(status: u16, message: String) -> ApiError {
    match status {
        401 => ApiError::Unauthorized,
        403 => ApiError::Forbidden(message),
        _ => ApiError::Api { status, message },
    }
}

// The board wraps error bodies as {"detail": "..."}.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

#[derive(Debug, Clone, Deserialize)]
struct RawItem {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    #[serde(default)]
    arxiv_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "abstract")]
    summary: String,
    #[serde(default, deserialize_with = "de_authors")]
    authors: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    primary_category: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    vote_count: i64,
    #[serde(default)]
    comment_count: i64,
    #[serde(default)]
    submitter: Option<String>,
    #[serde(default)]
    arxiv_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl RawItem {
    fn into_item(self) -> Item {
        let id = self
            .arxiv_id
            .or(self.id)
            .unwrap_or_default();
        let mut categories = self.categories;
        if categories.is_empty() {
            if let Some(primary) = self.primary_category {
                if !primary.is_empty() {
                    categories.push(primary);
                }
            }
        }
        let created_at = self
            .created_at
            .as_deref()
            .or(self.published.as_deref())
            .and_then(parse_timestamp)
            // unparsable timestamps sort as ancient rather than fresh
            .unwrap_or_else(epoch);
        Item {
            id,
            title: self.title,
            summary: self.summary,
            authors: self.authors,
            categories,
            created_at,
            vote_count: self.vote_count.max(0),
            comment_count: self.comment_count.max(0),
            submitter: self.submitter.unwrap_or_default(),
            url: self.url.or(self.arxiv_url).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawComment {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    parent_id: Option<String>,
    #[serde(default, alias = "author")]
    user_name: String,
    #[serde(default, alias = "body")]
    content: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    vote_count: i64,
    #[serde(default)]
    replies: Vec<RawComment>,
}

impl RawComment {
    fn into_comment(self) -> Comment {
        Comment {
            id: self.id.unwrap_or_default(),
            parent_id: self.parent_id,
            author: self.user_name,
            body: self.content,
            created_at: self
                .created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(epoch),
            vote_count: self.vote_count.max(0),
            replies: self
                .replies
                .into_iter()
                .map(RawComment::into_comment)
                .collect(),
        }
    }
}

// Accepts both numeric and string ids; the board's own ids are integers
// while arXiv ids are strings.
fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Number(i64),
    }

    let value = Option::<IdRepr>::deserialize(deserializer)?;
    Ok(value.map(|id| match id {
        IdRepr::Text(text) => text,
        IdRepr::Number(number) => number.to_string(),
    }))
}

// Author fields arrive either as a list or as one comma-separated string.
fn de_authors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AuthorsRepr {
        Many(Vec<String>),
        One(String),
    }

    let value = Option::<AuthorsRepr>::deserialize(deserializer)?;
    Ok(match value {
        Some(AuthorsRepr::Many(authors)) => authors,
        Some(AuthorsRepr::One(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect(),
        None => Vec::new(),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // The board serializes naive UTC datetimes without an offset.
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}
