use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering as AtomicOrdering},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{StoreError, StoreResult, UniqueField},
    models::{Article, ArticleState, ArticleView, NewArticle, NewUser, User},
    repository::{ArticleChanges, ArticleFilter, ArticleQuery, Repository, SortField, SortOrder},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    articles: HashMap<Uuid, Article>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing clock so "newest first" is deterministic even when two
    /// writes land in the same microsecond.
    fn tick(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn view(&self, article: &Article) -> Option<ArticleView> {
        let author = self.users.get(&article.author_id)?;
        Some(ArticleView::from_parts(article.clone(), author.summary()))
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory behind a single lock. Every
/// operation takes the lock once, so each one is atomic with respect to the others,
/// matching the guarantees of the Postgres implementation.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    // When set, every call fails with `StoreError::Unavailable`.
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage of the backing store.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Removes a user and, like the foreign key cascade, their articles.
    pub async fn remove_user(&self, id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        tables.articles.retain(|_, article| article.author_id != id);
        tables.users.remove(&id).is_some()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn matches_filter(article: &Article, filter: &ArticleFilter) -> bool {
    if filter.state.is_some_and(|state| article.state != state) {
        return false;
    }
    if filter.author_id.is_some_and(|author| article.author_id != author) {
        return false;
    }
    if let Some(term) = &filter.search {
        let needle = term.to_lowercase();
        let in_title = article.title.to_lowercase().contains(&needle);
        let in_description = article
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle));
        let in_tags = article.tags.iter().any(|tag| tag.to_lowercase() == needle);
        if !(in_title || in_description || in_tags) {
            return false;
        }
    }
    if !filter.tags.is_empty()
        && !article
            .tags
            .iter()
            .any(|tag| filter.tags.contains(&tag.to_lowercase()))
    {
        return false;
    }
    true
}

fn compare(a: &Article, b: &Article, field: SortField) -> Ordering {
    let primary = match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        // Approximates a linguistic collation: case-folded first, bytes as tie-break.
        SortField::Title => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.title.cmp(&b.title)),
        SortField::ReadCount => a.read_count.cmp(&b.read_count),
        SortField::ReadingTime => a.reading_time.cmp(&b.reading_time),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        let now = tables.tick();
        let record = User {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check_available()?;
        let email = email.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.articles.values().any(|a| a.title == article.title) {
            return Err(StoreError::Conflict(UniqueField::Title));
        }
        if !tables.users.contains_key(&article.author_id) {
            return Err(StoreError::Unavailable(format!(
                "author {} does not exist",
                article.author_id
            )));
        }
        let now = tables.tick();
        let record = Article {
            id: Uuid::new_v4(),
            title: article.title,
            description: article.description,
            body: article.body,
            tags: article.tags,
            author_id: article.author_id,
            state: ArticleState::Draft,
            read_count: 0,
            reading_time: article.reading_time,
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        self.check_available()?;
        Ok(self.tables.read().await.articles.get(&id).cloned())
    }

    async fn record_read(&self, id: Uuid) -> StoreResult<Option<ArticleView>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(article) = tables.articles.get_mut(&id) else {
            return Ok(None);
        };
        article.read_count += 1;
        let snapshot = article.clone();
        Ok(tables.view(&snapshot))
    }

    async fn find_articles(&self, query: &ArticleQuery) -> StoreResult<Vec<ArticleView>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut matching: Vec<&Article> = tables
            .articles
            .values()
            .filter(|a| matches_filter(a, &query.filter))
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let selected: Vec<&Article> = match query.window {
            Some(window) => matching
                .into_iter()
                .skip(window.offset.max(0) as usize)
                .take(window.limit.max(0) as usize)
                .collect(),
            None => matching,
        };

        Ok(selected.into_iter().filter_map(|a| tables.view(a)).collect())
    }

    async fn count_articles(&self, filter: &ArticleFilter) -> StoreResult<i64> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .articles
            .values()
            .filter(|a| matches_filter(a, filter))
            .count() as i64)
    }

    async fn update_article(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: ArticleChanges,
    ) -> StoreResult<Option<Article>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if let Some(title) = &changes.title {
            let taken = tables
                .articles
                .values()
                .any(|a| a.id != id && &a.title == title);
            if taken {
                return Err(StoreError::Conflict(UniqueField::Title));
            }
        }

        let now = tables.tick();
        let Some(article) = tables
            .articles
            .get_mut(&id)
            .filter(|a| a.author_id == author_id)
        else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            article.title = title;
        }
        if let Some(description) = changes.description {
            article.description = description;
        }
        if let Some(body) = changes.body {
            article.body = body;
        }
        if let Some(tags) = changes.tags {
            article.tags = tags;
        }
        if let Some(reading_time) = changes.reading_time {
            article.reading_time = reading_time;
        }
        article.updated_at = now;
        Ok(Some(article.clone()))
    }

    async fn set_article_state(
        &self,
        id: Uuid,
        author_id: Uuid,
        state: ArticleState,
    ) -> StoreResult<Option<Article>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let Some(article) = tables
            .articles
            .get_mut(&id)
            .filter(|a| a.author_id == author_id)
        else {
            return Ok(None);
        };
        article.state = state;
        article.updated_at = now;
        Ok(Some(article.clone()))
    }

    async fn delete_article(&self, id: Uuid, author_id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let owned = tables
            .articles
            .get(&id)
            .is_some_and(|a| a.author_id == author_id);
        if owned {
            tables.articles.remove(&id);
        }
        Ok(owned)
    }
}
