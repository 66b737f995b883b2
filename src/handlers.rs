use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    models::{
        ArticleListResponse, ArticleState, ArticleView, AuthResponse, CreateArticleRequest,
        MessageResponse, SigninRequest, SignupRequest, UpdateArticleRequest,
    },
    query::{ListArticlesParams, page_and_limit, page_window},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// MyArticlesParams
///
/// Query parameters for the author's own listing (GET /me/articles).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyArticlesParams {
    /// Optional `draft` or `published` filter. All states when omitted.
    pub state: Option<String>,
    /// 1-based page number. Paging applies only when `page` or `limit` is given.
    pub page: Option<String>,
    /// Page size, clamped to 1..=100.
    pub limit: Option<String>,
}

/// Ids that are not UUIDs cannot name an article.
fn parse_article_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found("article not found"))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

// --- Accounts ---

/// signup
///
/// [Public Route] Registers a user and returns a bearer token.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(payload) = payload?;
    let response = state.accounts.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// signin
///
/// [Public Route] Exchanges email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Bad credentials", body = ErrorBody)
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    Ok(Json(state.accounts.signin(payload).await?))
}

// --- Public Reads ---

/// list_articles
///
/// [Public Route] Paginated, filterable, searchable listing. Only published articles
/// unless `state` says otherwise.
#[utoipa::path(
    get,
    path = "/articles",
    params(ListArticlesParams),
    responses(
        (status = 200, description = "Page of articles", body = ArticleListResponse),
        (status = 422, description = "Invalid criteria", body = ErrorBody)
    )
)]
pub async fn list_articles(
    State(state): State<AppState>,
    query: Result<Query<ListArticlesParams>, QueryRejection>,
) -> AppResult<Json<ArticleListResponse>> {
    let params = query_params(query)?;
    Ok(Json(state.catalog.list(&params).await?))
}

/// get_article
///
/// [Public Route] Single article by id, drafts included. Increments the read count.
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = ArticleView),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ArticleView>> {
    let id = parse_article_id(&id)?;
    Ok(Json(state.articles.get(id).await?))
}

// --- Authenticated ---

/// create_article
///
/// [Authenticated Route] Creates a draft owned by the caller.
#[utoipa::path(
    post,
    path = "/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = ArticleView),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 409, description = "Duplicate title", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    )
)]
pub async fn create_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ArticleView>)> {
    let Json(payload) = payload?;
    let article = state.articles.create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// get_my_articles
///
/// [Authenticated Route] Articles owned by the caller, drafts included, newest first.
/// Unpaged unless `page` or `limit` is given.
#[utoipa::path(
    get,
    path = "/me/articles",
    params(MyArticlesParams),
    responses(
        (status = 200, description = "My Articles", body = [ArticleView]),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn get_my_articles(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    query: Result<Query<MyArticlesParams>, QueryRejection>,
) -> AppResult<Json<Vec<ArticleView>>> {
    let params = query_params(query)?;
    let filter = match params.state.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            ArticleState::parse(raw)
                .ok_or_else(|| AppError::validation(format!("unknown state '{raw}'")))?,
        ),
        None => None,
    };
    let window = (params.page.is_some() || params.limit.is_some()).then(|| {
        let (page, limit) = page_and_limit(params.page.as_deref(), params.limit.as_deref());
        page_window(page, limit)
    });
    Ok(Json(state.articles.list_mine(&user, filter, window).await?))
}

/// update_article
///
/// [Owner Route] Partial update of title, description, body and tags.
#[utoipa::path(
    patch,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = ArticleView),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> AppResult<Json<ArticleView>> {
    let id = parse_article_id(&id)?;
    let Json(payload) = payload?;
    Ok(Json(state.articles.update(id, &user, payload).await?))
}

/// publish_article
///
/// [Owner Route] Moves a draft to published. Idempotent.
#[utoipa::path(
    patch,
    path = "/articles/{id}/publish",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Published", body = ArticleView),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn publish_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ArticleView>> {
    let id = parse_article_id(&id)?;
    Ok(Json(state.articles.publish(id, &user).await?))
}

/// delete_article
///
/// [Owner Route] Permanently removes the article.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_article_id(&id)?;
    state.articles.delete(id, &user).await?;
    Ok(Json(MessageResponse {
        message: "article deleted successfully".to_string(),
    }))
}
