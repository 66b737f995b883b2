use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Every handler here receives a resolved `AuthUser`. Update, publish and delete
/// additionally require the caller to be the article's author.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me/articles
        // The caller's own articles in every state.
        .route("/me/articles", get(handlers::get_my_articles))
        // POST /articles
        .route("/articles", post(handlers::create_article))
        // PATCH|PUT|DELETE /articles/{id}
        .route(
            "/articles/{id}",
            patch(handlers::update_article)
                .put(handlers::update_article)
                .delete(handlers::delete_article),
        )
        // PATCH /articles/{id}/publish
        .route("/articles/{id}/publish", patch(handlers::publish_article))
}
