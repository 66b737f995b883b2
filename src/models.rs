use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Records (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. The password digest lives here
/// and nowhere else; this type is deliberately not `Serialize`, so use `PublicUser`
/// or `AuthorSummary` for anything that leaves the process.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    // Always stored trimmed and lowercased.
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }

    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// NewUser
///
/// Insert payload for signup. The digest has already been computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// ArticleState
///
/// Lifecycle marker. Only `Draft -> Published` is reachable through the API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "article_state", rename_all = "lowercase")]
pub enum ArticleState {
    #[default]
    Draft,
    Published,
}

impl ArticleState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// Article
///
/// Raw row from the `articles` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    // FK to users.id. Set once at creation.
    pub author_id: Uuid,
    pub state: ArticleState,
    pub read_count: i64,
    // Minutes, derived from `body`.
    pub reading_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewArticle
///
/// Insert payload built by the lifecycle manager after validation.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub author_id: Uuid,
    pub reading_time: i32,
}

// --- Output Schemas ---

/// AuthorSummary
///
/// Public fields of an article's owner, denormalized into article responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// ArticleView
///
/// An article with its author populated. Returned by every endpoint that yields articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub author: AuthorSummary,
    pub state: ArticleState,
    pub read_count: i64,
    pub reading_time: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl ArticleView {
    pub fn from_parts(article: Article, author: AuthorSummary) -> Self {
        Self {
            id: article.id,
            title: article.title,
            description: article.description,
            body: article.body,
            tags: article.tags,
            author,
            state: article.state,
            read_count: article.read_count,
            reading_time: article.reading_time,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

/// Pagination
///
/// Summary attached to every public listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_matching: i64,
    pub limit: i64,
}

/// ArticleListResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleView>,
    pub pagination: Pagination,
}

/// PublicUser
///
/// The user as seen by clients after signup/signin. Never carries the digest.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AuthResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Missing fields deserialize as empty strings so the account service can report
/// them with a precise validation message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(default)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "a@x.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(default)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// CreateArticleRequest
///
/// Allow-listed creation payload. `author`, `state` and the counters are not
/// accepted from clients; unknown keys reject the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct CreateArticleRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// UpdateArticleRequest
///
/// Partial update payload. Only present fields are applied; an empty `description`
/// clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct UpdateArticleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}
