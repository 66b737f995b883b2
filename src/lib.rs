use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod accounts;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod query;
pub mod repository;

// Routing segregated by access level (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use accounts::AccountService;
pub use config::AppConfig;
pub use credentials::{CredentialState, JwtCredentialService};
pub use error::{AppError, AppResult};
pub use lifecycle::ArticleService;
pub use memory::InMemoryRepository;
pub use query::ArticleQueryService;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signup, handlers::signin, handlers::list_articles, handlers::get_article,
        handlers::create_article, handlers::get_my_articles, handlers::update_article,
        handlers::publish_article, handlers::delete_article
    ),
    components(
        schemas(
            models::ArticleView, models::AuthorSummary, models::ArticleState,
            models::ArticleListResponse, models::Pagination, models::CreateArticleRequest,
            models::UpdateArticleRequest, models::SignupRequest, models::SigninRequest,
            models::AuthResponse, models::PublicUser, models::MessageResponse,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "inkpress", description = "Article publishing API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Single shared container for every service and the immutable configuration.
/// The lifecycle manager, query planner and account service are built once from the
/// injected repository and credential service.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub credentials: CredentialState,
    pub articles: ArticleService,
    pub catalog: ArticleQueryService,
    pub accounts: AccountService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, credentials: CredentialState, config: AppConfig) -> Self {
        Self {
            articles: ArticleService::new(repo.clone()),
            catalog: ArticleQueryService::new(repo.clone()),
            accounts: AccountService::new(repo.clone(), credentials.clone()),
            repo,
            credentials,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CredentialState {
    fn from_ref(app_state: &AppState) -> CredentialState {
        app_state.credentials.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for `authenticated_routes`. A failed extraction rejects
/// with a structured 401 before the handler runs. The resolved user is stored in the
/// request extensions so the handler's own `AuthUser` reuses it.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies scoped and global middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
