use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/signup, POST /auth/signin
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/signin", post(handlers::signin))
        // GET /articles?state=&search=&author=&tags=&sortBy=&order=&page=&limit=
        // Published articles unless `state` is given.
        .route("/articles", get(handlers::list_articles))
        // GET /articles/{id}
        // Direct fetch; drafts are reachable here and every call counts as a read.
        .route("/articles/{id}", get(handlers::get_article))
}
