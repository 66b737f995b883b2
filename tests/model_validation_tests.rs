use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use inkpress::{
    error::{AppError, ErrorBody, StoreError, UniqueField},
    models::{
        ArticleState, CreateArticleRequest, Pagination, SignupRequest, UpdateArticleRequest, User,
    },
};
use serde_json::json;
use uuid::Uuid;

// --- Wire Shapes ---

#[test]
fn test_pagination_serializes_in_camel_case() {
    let pagination = Pagination {
        current_page: 2,
        total_pages: 3,
        total_matching: 45,
        limit: 20,
    };

    let value = serde_json::to_value(&pagination).unwrap();

    assert_eq!(
        value,
        json!({ "currentPage": 2, "totalPages": 3, "totalMatching": 45, "limit": 20 })
    );
}

#[test]
fn test_article_state_uses_lowercase_names() {
    assert_eq!(serde_json::to_value(ArticleState::Draft).unwrap(), json!("draft"));
    assert_eq!(
        serde_json::from_value::<ArticleState>(json!("published")).unwrap(),
        ArticleState::Published
    );
    assert_eq!(ArticleState::default(), ArticleState::Draft);
    assert_eq!(ArticleState::parse(" Published "), Some(ArticleState::Published));
    assert_eq!(ArticleState::parse("archived"), None);
}

#[test]
fn test_public_user_never_carries_the_digest() {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        password_hash: "$argon2id$secret".to_string(),
        created_at: now,
        updated_at: now,
    };

    let public = serde_json::to_value(user.public()).unwrap();
    let summary = serde_json::to_value(user.summary()).unwrap();

    assert!(public.get("password_hash").is_none());
    assert!(summary.get("password_hash").is_none());
    assert_eq!(public["email"], "ada@example.com");
    assert!(!public.to_string().contains("argon2"));
}

// --- Request Payloads ---

#[test]
fn test_create_request_rejects_server_owned_fields() {
    for forbidden in ["author", "state", "read_count", "reading_time", "author_id"] {
        let mut payload = json!({ "title": "T", "body": "B" });
        payload[forbidden] = json!("x");

        let result = serde_json::from_value::<CreateArticleRequest>(payload);
        assert!(result.is_err(), "{forbidden} must not be accepted");
    }
}

#[test]
fn test_create_request_defaults_optional_fields() {
    let req: CreateArticleRequest =
        serde_json::from_value(json!({ "title": "T", "body": "B" })).unwrap();

    assert_eq!(req.title, "T");
    assert_eq!(req.description, None);
    assert!(req.tags.is_empty());
}

#[test]
fn test_update_request_distinguishes_absent_from_empty() {
    let absent: UpdateArticleRequest = serde_json::from_value(json!({})).unwrap();
    let cleared: UpdateArticleRequest =
        serde_json::from_value(json!({ "description": "" })).unwrap();

    assert_eq!(absent.description, None);
    assert_eq!(cleared.description.as_deref(), Some(""));
    assert!(serde_json::from_value::<UpdateArticleRequest>(json!({ "state": "published" })).is_err());
}

#[test]
fn test_signup_request_tolerates_missing_fields() {
    let req: SignupRequest = serde_json::from_value(json!({ "email": "a@x.com" })).unwrap();

    assert_eq!(req.email, "a@x.com");
    assert!(req.first_name.is_empty());
    assert!(req.password.is_empty());
}

// --- Error Taxonomy ---

#[test]
fn test_error_kinds_map_to_statuses() {
    let cases = [
        (AppError::validation("x"), StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        (AppError::unauthenticated("x"), StatusCode::UNAUTHORIZED, "unauthenticated"),
        (AppError::forbidden("x"), StatusCode::FORBIDDEN, "forbidden"),
        (AppError::not_found("x"), StatusCode::NOT_FOUND, "not_found"),
        (AppError::DuplicateTitle("x".into()), StatusCode::CONFLICT, "duplicate_title"),
        (AppError::EmailTaken("x".into()), StatusCode::CONFLICT, "email_taken"),
        (
            AppError::StoreUnavailable("x".into()),
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
        ),
    ];

    for (err, status, kind) in cases {
        assert_eq!(err.status(), status);
        assert_eq!(err.kind(), kind);
    }
}

#[test]
fn test_store_errors_convert_without_leaking_detail() {
    let title: AppError = StoreError::Conflict(UniqueField::Title).into();
    let email: AppError = StoreError::Conflict(UniqueField::Email).into();
    let outage: AppError = StoreError::Unavailable("pool timed out on 10.0.0.5".into()).into();

    assert!(matches!(title, AppError::DuplicateTitle(_)));
    assert!(matches!(email, AppError::EmailTaken(_)));
    assert!(matches!(outage, AppError::StoreUnavailable(_)));
    assert!(!outage.to_string().contains("10.0.0.5"));
}

#[tokio::test]
async fn test_error_response_body_shape() {
    let response = AppError::not_found("article not found").into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body.error, "not_found");
    assert_eq!(body.message, "article not found");
}
