use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Article, ArticleState, ArticleView, CreateArticleRequest, NewArticle,
        UpdateArticleRequest, User,
    },
    repository::{ArticleChanges, ArticleFilter, ArticleQuery, PageWindow, RepositoryState},
};

/// Reading speed used for `reading_time`.
pub const WORDS_PER_MINUTE: usize = 200;

/// Minutes needed to read `body`, rounded up. Words are whitespace-separated runs.
pub fn reading_time(body: &str) -> i32 {
    let words = body.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE) as i32
}

/// Trims labels, drops blanks and keeps the first occurrence of each label.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|existing| existing == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn required_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(title.to_string())
}

fn required_body(body: String) -> AppResult<String> {
    if body.trim().is_empty() {
        return Err(AppError::validation("body is required"));
    }
    Ok(body)
}

/// ArticleService
///
/// The article lifecycle manager: state transitions, ownership checks, read
/// accounting and derived fields. Persistence is reached only through the injected
/// repository.
#[derive(Clone)]
pub struct ArticleService {
    repo: RepositoryState,
}

impl ArticleService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Loads the article and checks that `requester` owns it.
    async fn owned_article(&self, id: Uuid, requester: &User) -> AppResult<Article> {
        let article = self
            .repo
            .find_article(id)
            .await?
            .ok_or_else(|| AppError::not_found("article not found"))?;

        if article.author_id != requester.id {
            return Err(AppError::forbidden(
                "only the author may modify this article",
            ));
        }
        Ok(article)
    }

    /// create
    ///
    /// Builds a draft owned by `author` with `read_count = 0` and a computed reading time.
    pub async fn create(&self, author: &User, req: CreateArticleRequest) -> AppResult<ArticleView> {
        let title = required_title(&req.title)?;
        let body = required_body(req.body)?;

        let new_article = NewArticle {
            title,
            description: normalize_description(req.description),
            reading_time: reading_time(&body),
            body,
            tags: normalize_tags(req.tags),
            author_id: author.id,
        };

        let article = self.repo.insert_article(new_article).await?;
        tracing::info!(article_id = %article.id, author_id = %author.id, "article created");
        Ok(ArticleView::from_parts(article, author.summary()))
    }

    /// get
    ///
    /// Direct fetch by id, drafts included. Counts as one read.
    pub async fn get(&self, id: Uuid) -> AppResult<ArticleView> {
        self.repo
            .record_read(id)
            .await?
            .ok_or_else(|| AppError::not_found("article not found"))
    }

    /// update
    ///
    /// Applies only the fields present in `patch`. A new body recomputes the reading time.
    pub async fn update(
        &self,
        id: Uuid,
        requester: &User,
        patch: UpdateArticleRequest,
    ) -> AppResult<ArticleView> {
        let title = patch.title.as_deref().map(required_title).transpose()?;
        let body = patch.body.map(required_body).transpose()?;

        self.owned_article(id, requester).await?;

        let changes = ArticleChanges {
            title,
            description: patch.description.map(|d| normalize_description(Some(d))),
            reading_time: body.as_deref().map(reading_time),
            body,
            tags: patch.tags.map(normalize_tags),
        };

        // A concurrent delete between the ownership check and the write matches zero rows.
        let article = self
            .repo
            .update_article(id, requester.id, changes)
            .await?
            .ok_or_else(|| AppError::not_found("article not found"))?;

        tracing::info!(article_id = %id, author_id = %requester.id, "article updated");
        Ok(ArticleView::from_parts(article, requester.summary()))
    }

    /// publish
    ///
    /// `Draft -> Published`. Publishing an already published article succeeds without
    /// writing anything.
    pub async fn publish(&self, id: Uuid, requester: &User) -> AppResult<ArticleView> {
        let article = self.owned_article(id, requester).await?;

        if article.state == ArticleState::Published {
            return Ok(ArticleView::from_parts(article, requester.summary()));
        }

        let article = self
            .repo
            .set_article_state(id, requester.id, ArticleState::Published)
            .await?
            .ok_or_else(|| AppError::not_found("article not found"))?;

        tracing::info!(article_id = %id, author_id = %requester.id, "article published");
        Ok(ArticleView::from_parts(article, requester.summary()))
    }

    /// delete
    ///
    /// Permanent removal; there is no tombstone.
    pub async fn delete(&self, id: Uuid, requester: &User) -> AppResult<()> {
        self.owned_article(id, requester).await?;

        if !self.repo.delete_article(id, requester.id).await? {
            return Err(AppError::not_found("article not found"));
        }

        tracing::info!(article_id = %id, author_id = %requester.id, "article deleted");
        Ok(())
    }

    /// list_mine
    ///
    /// Articles owned by `author`, newest first, optionally narrowed to one state.
    /// Without a `window` every match is returned.
    pub async fn list_mine(
        &self,
        author: &User,
        state: Option<ArticleState>,
        window: Option<PageWindow>,
    ) -> AppResult<Vec<ArticleView>> {
        let query = ArticleQuery {
            filter: ArticleFilter {
                author_id: Some(author.id),
                state,
                ..ArticleFilter::default()
            },
            window,
            ..ArticleQuery::default()
        };
        Ok(self.repo.find_articles(&query).await?)
    }
}
