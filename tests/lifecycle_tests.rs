use async_trait::async_trait;
use inkpress::{
    AppError, ArticleService, InMemoryRepository,
    error::StoreResult,
    lifecycle::{normalize_tags, reading_time},
    models::{
        Article, ArticleState, ArticleView, CreateArticleRequest, NewArticle, NewUser,
        UpdateArticleRequest, User,
    },
    repository::{
        ArticleChanges, ArticleFilter, ArticleQuery, PageWindow, Repository, RepositoryState,
    },
};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Utilities ---

fn setup() -> (Arc<InMemoryRepository>, ArticleService) {
    let repo = Arc::new(InMemoryRepository::new());
    let service = ArticleService::new(repo.clone() as RepositoryState);
    (repo, service)
}

async fn create_user(repo: &InMemoryRepository, email: &str) -> User {
    repo.create_user(NewUser {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: email.to_string(),
        password_hash: "not-a-real-digest".to_string(),
    })
    .await
    .unwrap()
}

fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

fn draft(title: &str, body_words: usize) -> CreateArticleRequest {
    CreateArticleRequest {
        title: title.to_string(),
        description: Some("A short description".to_string()),
        body: words(body_words),
        tags: vec!["rust".to_string(), "web".to_string()],
    }
}

// --- Reading Time ---

#[test]
fn test_reading_time_rounds_up_per_200_words() {
    assert_eq!(reading_time(&words(1)), 1);
    assert_eq!(reading_time(&words(200)), 1);
    assert_eq!(reading_time(&words(201)), 2);
    assert_eq!(reading_time(&words(250)), 2);
    assert_eq!(reading_time(&words(400)), 2);
    assert_eq!(reading_time("one\ntwo\tthree   four"), 1);
}

#[test]
fn test_normalize_tags_trims_and_dedupes() {
    let tags = normalize_tags(vec![
        " rust ".to_string(),
        "".to_string(),
        "web".to_string(),
        "rust".to_string(),
    ]);
    assert_eq!(tags, vec!["rust".to_string(), "web".to_string()]);
}

// --- Create ---

#[tokio::test]
async fn test_create_starts_as_draft_with_zero_reads() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;

    let article = service.create(&author, draft("Hello", 250)).await.unwrap();

    assert_eq!(article.state, ArticleState::Draft);
    assert_eq!(article.read_count, 0);
    assert_eq!(article.reading_time, 2);
    assert_eq!(article.author.id, author.id);
    assert_eq!(article.author.email, "a@x.com");
}

#[tokio::test]
async fn test_create_rejects_blank_title_and_empty_body() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;

    let blank_title = CreateArticleRequest {
        title: "   ".to_string(),
        ..draft("ignored", 10)
    };
    let err = service.create(&author, blank_title).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let empty_body = CreateArticleRequest {
        body: String::new(),
        ..draft("Empty", 10)
    };
    let err = service.create(&author, empty_body).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_create_rejects_duplicate_title() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let other = create_user(&repo, "b@x.com").await;

    service.create(&author, draft("Hello", 10)).await.unwrap();
    let err = service.create(&other, draft("Hello", 10)).await.unwrap_err();

    assert!(matches!(err, AppError::DuplicateTitle(_)));
}

// --- Get ---

#[tokio::test]
async fn test_get_counts_each_read_and_allows_drafts() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let first = service.get(created.id).await.unwrap();
    let second = service.get(created.id).await.unwrap();

    assert_eq!(first.state, ArticleState::Draft);
    assert_eq!(first.read_count, 1);
    assert_eq!(second.read_count, 2);
    assert_eq!(second.author.first_name, "Test");
}

#[tokio::test]
async fn test_get_unknown_id_is_not_found() {
    let (_repo, service) = setup();
    let err = service.get(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_never_lose_increments() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let service = service.clone();
            let id = created.id;
            tokio::spawn(async move { service.get(id).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = repo.find_article(created.id).await.unwrap().unwrap();
    assert_eq!(stored.read_count, 64);
}

// --- Update ---

#[tokio::test]
async fn test_update_by_non_author_is_forbidden_and_changes_nothing() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let intruder = create_user(&repo, "b@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let before = repo.find_article(created.id).await.unwrap().unwrap();
    let patch = UpdateArticleRequest {
        title: Some("Hijacked".to_string()),
        body: Some(words(900)),
        ..UpdateArticleRequest::default()
    };
    let err = service.update(created.id, &intruder, patch).await.unwrap_err();
    let after = repo.find_article(created.id).await.unwrap().unwrap();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_update_applies_present_fields_and_recomputes_reading_time() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let patch = UpdateArticleRequest {
        body: Some(words(401)),
        tags: Some(vec!["news".to_string()]),
        ..UpdateArticleRequest::default()
    };
    let updated = service.update(created.id, &author, patch).await.unwrap();

    assert_eq!(updated.title, "Hello");
    assert_eq!(updated.description.as_deref(), Some("A short description"));
    assert_eq!(updated.reading_time, 3);
    assert_eq!(updated.tags, vec!["news".to_string()]);
    assert_eq!(updated.state, ArticleState::Draft);
    assert_eq!(updated.author.id, author.id);
}

#[tokio::test]
async fn test_update_with_empty_description_clears_it() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let patch = UpdateArticleRequest {
        description: Some(String::new()),
        ..UpdateArticleRequest::default()
    };
    let updated = service.update(created.id, &author, patch).await.unwrap();

    assert_eq!(updated.description, None);
}

#[tokio::test]
async fn test_update_rejects_blank_fields_and_taken_titles() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();
    service.create(&author, draft("Taken", 10)).await.unwrap();

    let blank = UpdateArticleRequest {
        body: Some("  ".to_string()),
        ..UpdateArticleRequest::default()
    };
    let err = service.update(created.id, &author, blank).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let duplicate = UpdateArticleRequest {
        title: Some("Taken".to_string()),
        ..UpdateArticleRequest::default()
    };
    let err = service.update(created.id, &author, duplicate).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateTitle(_)));

    let stored = repo.find_article(created.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Hello");
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;

    let err = service
        .update(Uuid::new_v4(), &author, UpdateArticleRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

// --- Publish ---

#[tokio::test]
async fn test_publish_is_owner_only_and_idempotent() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let intruder = create_user(&repo, "b@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let err = service.publish(created.id, &intruder).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let still_draft = repo.find_article(created.id).await.unwrap().unwrap();
    assert_eq!(still_draft.state, ArticleState::Draft);

    let published = service.publish(created.id, &author).await.unwrap();
    assert_eq!(published.state, ArticleState::Published);

    let again = service.publish(created.id, &author).await.unwrap();
    assert_eq!(again.state, ArticleState::Published);
    assert_eq!(again.updated_at, published.updated_at);
}

#[tokio::test]
async fn test_publish_unknown_id_is_not_found() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let err = service.publish(Uuid::new_v4(), &author).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// --- Delete ---

#[tokio::test]
async fn test_delete_is_owner_only_and_permanent() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let intruder = create_user(&repo, "b@x.com").await;
    let created = service.create(&author, draft("Hello", 10)).await.unwrap();

    let err = service.delete(created.id, &intruder).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(repo.find_article(created.id).await.unwrap().is_some());

    service.delete(created.id, &author).await.unwrap();

    let err = service.get(created.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = service.delete(created.id, &author).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// --- List Mine ---

#[tokio::test]
async fn test_list_mine_returns_own_articles_newest_first() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let other = create_user(&repo, "b@x.com").await;

    let first = service.create(&author, draft("First", 10)).await.unwrap();
    let second = service.create(&author, draft("Second", 10)).await.unwrap();
    service.create(&other, draft("Not Mine", 10)).await.unwrap();
    service.publish(first.id, &author).await.unwrap();

    let mine = service.list_mine(&author, None, None).await.unwrap();
    let ids: Vec<Uuid> = mine.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let drafts = service
        .list_mine(&author, Some(ArticleState::Draft), None)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, second.id);
}

// --- Store Failures ---

#[tokio::test]
async fn test_store_outage_surfaces_as_store_unavailable() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    repo.set_unavailable(true);

    let err = service.create(&author, draft("Hello", 10)).await.unwrap_err();

    assert!(matches!(err, AppError::StoreUnavailable(_)));
}

#[tokio::test]
async fn test_list_mine_pages_only_when_asked() {
    let (repo, service) = setup();
    let author = create_user(&repo, "a@x.com").await;
    let mut created = Vec::new();
    for title in ["One", "Two", "Three"] {
        created.push(service.create(&author, draft(title, 10)).await.unwrap().id);
    }

    let everything = service.list_mine(&author, None, None).await.unwrap();
    assert_eq!(everything.len(), 3);

    let second_page = service
        .list_mine(&author, None, Some(PageWindow { offset: 2, limit: 2 }))
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, created[0]);
}

// --- Rows Vanishing Mid-Operation ---

/// Deletes the targeted article just before every owner-scoped write, as a
/// concurrent delete landing after the ownership check would.
struct VanishingRepository {
    inner: InMemoryRepository,
}

impl VanishingRepository {
    async fn vanish(&self, id: Uuid, author_id: Uuid) {
        self.inner.delete_article(id, author_id).await.unwrap();
    }
}

#[async_trait]
impl Repository for VanishingRepository {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.inner.create_user(user).await
    }
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_user_by_id(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article> {
        self.inner.insert_article(article).await
    }
    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        self.inner.find_article(id).await
    }
    async fn record_read(&self, id: Uuid) -> StoreResult<Option<ArticleView>> {
        self.inner.record_read(id).await
    }
    async fn find_articles(&self, query: &ArticleQuery) -> StoreResult<Vec<ArticleView>> {
        self.inner.find_articles(query).await
    }
    async fn count_articles(&self, filter: &ArticleFilter) -> StoreResult<i64> {
        self.inner.count_articles(filter).await
    }
    async fn update_article(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>> {
        self.vanish(id, author_id).await;
        self.inner.update_article(id, author_id, changes).await
    }
    async fn set_article_state(
        &self,
        id: Uuid,
        author_id: Uuid,
        state: ArticleState,
    ) -> StoreResult<Option<Article>> {
        self.vanish(id, author_id).await;
        self.inner.set_article_state(id, author_id, state).await
    }
    async fn delete_article(&self, id: Uuid, author_id: Uuid) -> StoreResult<bool> {
        self.vanish(id, author_id).await;
        self.inner.delete_article(id, author_id).await
    }
}

#[tokio::test]
async fn test_mutations_report_not_found_when_the_row_disappears() {
    let repo = Arc::new(VanishingRepository {
        inner: InMemoryRepository::new(),
    });
    let service = ArticleService::new(repo.clone() as RepositoryState);
    let author = repo
        .create_user(NewUser {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "not-a-real-digest".to_string(),
        })
        .await
        .unwrap();

    let target = service.create(&author, draft("Update", 10)).await.unwrap();
    let patch = UpdateArticleRequest {
        title: Some("Renamed".to_string()),
        ..UpdateArticleRequest::default()
    };
    let err = service.update(target.id, &author, patch).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let target = service.create(&author, draft("Publish", 10)).await.unwrap();
    let err = service.publish(target.id, &author).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let target = service.create(&author, draft("Delete", 10)).await.unwrap();
    let err = service.delete(target.id, &author).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
