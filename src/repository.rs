use crate::{
    error::{StoreError, StoreResult, UniqueField},
    models::{Article, ArticleState, ArticleView, AuthorSummary, NewArticle, NewUser, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

// --- Query Criteria ---

/// Sortable article columns. Anything outside this list is rejected before it
/// reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    ReadCount,
    ReadingTime,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            "updated_at" | "updatedAt" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            "read_count" | "readCount" => Some(Self::ReadCount),
            "reading_time" | "readingTime" => Some(Self::ReadingTime),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Title => "title",
            Self::ReadCount => "read_count",
            Self::ReadingTime => "reading_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// ArticleFilter
///
/// Conjunction of optional predicates. `search` and `tags` are matched
/// case-insensitively; `tags` is expected lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    pub state: Option<ArticleState>,
    pub author_id: Option<Uuid>,
    pub search: Option<String>,
    pub tags: Vec<String>,
}

/// Offset/limit slice of an ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleQuery {
    pub filter: ArticleFilter,
    pub sort_by: SortField,
    pub order: SortOrder,
    // None returns every match.
    pub window: Option<PageWindow>,
}

/// ArticleChanges
///
/// Column-level patch produced by the lifecycle manager. `description` is doubly
/// optional: `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reading_time: Option<i32>,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers and services only ever
/// see `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
///
/// Owner-scoped mutations take the expected `author_id` and match zero rows when the
/// article is gone or owned by someone else; callers translate that into `NotFound`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    // --- Articles ---
    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article>;
    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>>;
    /// Atomically adds one to `read_count` and returns the updated article with its
    /// author populated.
    async fn record_read(&self, id: Uuid) -> StoreResult<Option<ArticleView>>;
    async fn find_articles(&self, query: &ArticleQuery) -> StoreResult<Vec<ArticleView>>;
    async fn count_articles(&self, filter: &ArticleFilter) -> StoreResult<i64>;
    async fn update_article(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>>;
    async fn set_article_state(
        &self,
        id: Uuid,
        author_id: Uuid,
        state: ArticleState,
    ) -> StoreResult<Option<Article>>;
    async fn delete_article(&self, id: Uuid, author_id: Uuid) -> StoreResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const ARTICLE_COLUMNS: &str = "id, title, description, body, tags, author_id, state, \
     read_count, reading_time, created_at, updated_at";

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, created_at, updated_at";

const VIEW_SELECT: &str = "SELECT a.id, a.title, a.description, a.body, a.tags, a.author_id, \
     a.state, a.read_count, a.reading_time, a.created_at, a.updated_at, \
     u.first_name AS author_first_name, u.last_name AS author_last_name, \
     u.email AS author_email";

/// Joined article + author row.
#[derive(FromRow)]
struct ArticleViewRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    body: String,
    tags: Vec<String>,
    author_id: Uuid,
    state: ArticleState,
    read_count: i64,
    reading_time: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_first_name: String,
    author_last_name: String,
    author_email: String,
}

impl From<ArticleViewRow> for ArticleView {
    fn from(row: ArticleViewRow) -> Self {
        ArticleView {
            id: row.id,
            title: row.title,
            description: row.description,
            body: row.body,
            tags: row.tags,
            author: AuthorSummary {
                id: row.author_id,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                email: row.author_email,
            },
            state: row.state,
            read_count: row.read_count,
            reading_time: row.reading_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Translates driver failures into the store taxonomy. Unique violations on the
/// known constraints become conflicts; everything else is logged and reported as
/// unavailable.
fn store_error(context: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("articles_title_key") => return StoreError::Conflict(UniqueField::Title),
                Some("users_email_key") => return StoreError::Conflict(UniqueField::Email),
                _ => {}
            }
        }
    }
    tracing::error!("{} error: {:?}", context, err);
    StoreError::Unavailable(err.to_string())
}

/// Escapes LIKE metacharacters so user input is matched literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Appends the WHERE clause for `filter`. Every value goes through `push_bind`.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(state) = filter.state {
        builder.push(" AND a.state = ");
        builder.push_bind(state);
    }

    if let Some(author_id) = filter.author_id {
        builder.push(" AND a.author_id = ");
        builder.push_bind(author_id);
    }

    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        builder.push(" AND (a.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR COALESCE(a.description, '') ILIKE ");
        builder.push_bind(pattern);
        builder.push(" OR EXISTS (SELECT 1 FROM unnest(a.tags) AS t(tag) WHERE lower(t.tag) = ");
        builder.push_bind(term.to_lowercase());
        builder.push("))");
    }

    if !filter.tags.is_empty() {
        builder.push(" AND EXISTS (SELECT 1 FROM unnest(a.tags) AS t(tag) WHERE lower(t.tag) = ANY(");
        builder.push_bind(filter.tags.clone());
        builder.push("))");
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.first_name)
            .bind(user.last_name)
            .bind(user.email)
            .bind(user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("create_user", e))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("find_user_by_id", e))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = lower($1)");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("find_user_by_email", e))
    }

    /// insert_article
    ///
    /// New articles always start as drafts with a zero read count.
    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article> {
        let sql = format!(
            "INSERT INTO articles (id, title, description, body, tags, author_id, state, read_count, reading_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8) RETURNING {ARTICLE_COLUMNS}"
        );
        sqlx::query_as::<_, Article>(&sql)
            .bind(Uuid::new_v4())
            .bind(article.title)
            .bind(article.description)
            .bind(article.body)
            .bind(article.tags)
            .bind(article.author_id)
            .bind(ArticleState::Draft)
            .bind(article.reading_time)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("insert_article", e))
    }

    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("find_article", e))
    }

    /// record_read
    ///
    /// The increment is computed by the database inside a single UPDATE, so
    /// concurrent readers never overwrite each other's count.
    async fn record_read(&self, id: Uuid) -> StoreResult<Option<ArticleView>> {
        let sql = format!(
            "WITH a AS (UPDATE articles SET read_count = read_count + 1 WHERE id = $1 \
             RETURNING {ARTICLE_COLUMNS}) \
             {VIEW_SELECT} FROM a JOIN users u ON u.id = a.author_id"
        );
        sqlx::query_as::<_, ArticleViewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(ArticleView::from))
            .map_err(|e| store_error("record_read", e))
    }

    /// find_articles
    ///
    /// Dynamic filter/sort/page query built with `QueryBuilder`. The sort column
    /// comes from the `SortField` allow-list, never from raw input.
    async fn find_articles(&self, query: &ArticleQuery) -> StoreResult<Vec<ArticleView>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(VIEW_SELECT);
        builder.push(" FROM articles a JOIN users u ON u.id = a.author_id");
        push_filter(&mut builder, &query.filter);

        let direction = query.order.keyword();
        builder.push(format!(
            " ORDER BY a.{} {direction}, a.id {direction}",
            query.sort_by.column()
        ));

        if let Some(window) = query.window {
            builder.push(" LIMIT ");
            builder.push_bind(window.limit);
            builder.push(" OFFSET ");
            builder.push_bind(window.offset);
        }

        builder
            .build_query_as::<ArticleViewRow>()
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(ArticleView::from).collect())
            .map_err(|e| store_error("find_articles", e))
    }

    async fn count_articles(&self, filter: &ArticleFilter) -> StoreResult<i64> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles a");
        push_filter(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("count_articles", e))
    }

    /// update_article
    ///
    /// Owner-scoped partial update. Uses `COALESCE` so absent fields keep their value.
    async fn update_article(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>> {
        let sql = format!(
            "UPDATE articles \
             SET title = COALESCE($3, title), \
                 description = CASE WHEN $4 THEN $5 ELSE description END, \
                 body = COALESCE($6, body), \
                 tags = COALESCE($7, tags), \
                 reading_time = COALESCE($8, reading_time), \
                 updated_at = NOW() \
             WHERE id = $1 AND author_id = $2 \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let (description_set, description) = match changes.description {
            Some(value) => (true, value),
            None => (false, None),
        };

        sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .bind(author_id)
            .bind(changes.title)
            .bind(description_set)
            .bind(description)
            .bind(changes.body)
            .bind(changes.tags)
            .bind(changes.reading_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("update_article", e))
    }

    async fn set_article_state(
        &self,
        id: Uuid,
        author_id: Uuid,
        state: ArticleState,
    ) -> StoreResult<Option<Article>> {
        let sql = format!(
            "UPDATE articles SET state = $3, updated_at = NOW() \
             WHERE id = $1 AND author_id = $2 RETURNING {ARTICLE_COLUMNS}"
        );
        sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .bind(author_id)
            .bind(state)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("set_article_state", e))
    }

    async fn delete_article(&self, id: Uuid, author_id: Uuid) -> StoreResult<bool> {
        sqlx::query("DELETE FROM articles WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| store_error("delete_article", e))
    }
}
