use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{ArticleListResponse, ArticleState, Pagination},
    repository::{ArticleFilter, ArticleQuery, PageWindow, RepositoryState, SortField, SortOrder},
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// ListArticlesParams
///
/// Query parameters accepted by the public listing (GET /articles). Everything is
/// taken as text and interpreted by `plan`, so a bad `page` falls back to the default
/// instead of failing the whole request.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListArticlesParams {
    /// `draft` or `published`. Defaults to `published`.
    pub state: Option<String>,
    /// Case-insensitive match on title, description, or an exact tag.
    pub search: Option<String>,
    /// Author id.
    pub author: Option<String>,
    /// Comma-separated tags; any overlap matches.
    pub tags: Option<String>,
    /// One of created_at, updated_at, title, read_count, reading_time.
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub order: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size, clamped to 1..=100.
    pub limit: Option<String>,
}

/// ListPlan
///
/// A validated listing request: the repository query plus the page coordinates
/// used to build the pagination summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    pub query: ArticleQuery,
    pub page: i64,
    pub limit: i64,
}

fn lenient_number(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

/// Page and limit after lenient parsing: bad input falls back to the defaults, then
/// `page >= 1` and `1 <= limit <= MAX_LIMIT`.
pub fn page_and_limit(page: Option<&str>, limit: Option<&str>) -> (i64, i64) {
    let page = lenient_number(page, DEFAULT_PAGE).max(1);
    let limit = lenient_number(limit, DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    (page, limit)
}

/// Offset/limit slice selecting the 1-based `page`.
pub fn page_window(page: i64, limit: i64) -> PageWindow {
    PageWindow {
        offset: (page - 1).saturating_mul(limit),
        limit,
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// plan
///
/// Translates raw listing parameters into a repository query.
pub fn plan(params: &ListArticlesParams) -> AppResult<ListPlan> {
    let state = match non_blank(params.state.as_deref()) {
        Some(raw) => ArticleState::parse(raw)
            .ok_or_else(|| AppError::validation(format!("unknown state '{raw}'")))?,
        None => ArticleState::Published,
    };

    let author_id = non_blank(params.author.as_deref())
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| AppError::validation(format!("author '{raw}' is not a valid id")))
        })
        .transpose()?;

    let tags: Vec<String> = params
        .tags
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let sort_by = match non_blank(params.sort_by.as_deref()) {
        Some(raw) => SortField::parse(raw)
            .ok_or_else(|| AppError::validation(format!("cannot sort by '{raw}'")))?,
        None => SortField::CreatedAt,
    };

    let order = match non_blank(params.order.as_deref()) {
        Some(raw) => SortOrder::parse(raw)
            .ok_or_else(|| AppError::validation(format!("order must be asc or desc, got '{raw}'")))?,
        None => SortOrder::Desc,
    };

    let (page, limit) = page_and_limit(params.page.as_deref(), params.limit.as_deref());

    Ok(ListPlan {
        query: ArticleQuery {
            filter: ArticleFilter {
                state: Some(state),
                author_id,
                search: non_blank(params.search.as_deref()).map(str::to_string),
                tags,
            },
            sort_by,
            order,
            window: Some(page_window(page, limit)),
        },
        page,
        limit,
    })
}

/// Number of pages needed for `total` rows; zero rows means zero pages.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// ArticleQueryService
///
/// Executes listing plans against the repository and assembles the response envelope.
/// List fetches never touch `read_count`.
#[derive(Clone)]
pub struct ArticleQueryService {
    repo: RepositoryState,
}

impl ArticleQueryService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn list(&self, params: &ListArticlesParams) -> AppResult<ArticleListResponse> {
        let listing = plan(params)?;

        let total_matching = self.repo.count_articles(&listing.query.filter).await?;
        let articles = if total_matching == 0 {
            Vec::new()
        } else {
            self.repo.find_articles(&listing.query).await?
        };

        tracing::debug!(
            page = listing.page,
            limit = listing.limit,
            total_matching,
            returned = articles.len(),
            "articles listed"
        );

        Ok(ArticleListResponse {
            articles,
            pagination: Pagination {
                current_page: listing.page,
                total_pages: total_pages(total_matching, listing.limit),
                total_matching,
                limit: listing.limit,
            },
        })
    }
}
