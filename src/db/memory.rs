//! In-memory store for exercising business rules without PostgreSQL.
//!
//! Mirrors the schema constraints that matter to callers: unique usernames,
//! emails and slugs, the `reviews_author_title_key` constraint, set-null on
//! category delete and cascades from titles to reviews to comments. Every
//! operation yields to the scheduler first so that concurrent callers
//! interleave between a pre-check and the write that follows it.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    CommentExt, EMAIL_KEY, NewUser, REVIEW_AUTHOR_TITLE_KEY, ReviewExt, StoreError, TaxonomyExt,
    TitleExt, USERNAME_KEY, UserChanges, UserExt,
};
use crate::models::{
    Comment, Review, Taxon, Taxonomy, Title, TitleDraft, TitleFilter, User, UserRole,
};

struct StoredTitle {
    id: i64,
    draft: TitleDraft,
}

struct StoredReview {
    id: i64,
    title_id: i64,
    author_id: Uuid,
    text: String,
    score: i16,
    pub_date: DateTime<Utc>,
}

struct StoredComment {
    id: i64,
    review_id: i64,
    author_id: Uuid,
    text: String,
    pub_date: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    categories: Vec<Taxon>,
    genres: Vec<Taxon>,
    titles: Vec<StoredTitle>,
    reviews: Vec<StoredReview>,
    comments: Vec<StoredComment>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn taxa(&self, kind: Taxonomy) -> &Vec<Taxon> {
        match kind {
            Taxonomy::Category => &self.categories,
            Taxonomy::Genre => &self.genres,
        }
    }

    fn taxa_mut(&mut self, kind: Taxonomy) -> &mut Vec<Taxon> {
        match kind {
            Taxonomy::Category => &mut self.categories,
            Taxonomy::Genre => &mut self.genres,
        }
    }

    fn username(&self, user_id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn title(&self, stored: &StoredTitle) -> Title {
        let scores: Vec<f64> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == stored.id)
            .map(|r| f64::from(r.score))
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        let mut genres: Vec<Taxon> = self
            .genres
            .iter()
            .filter(|g| stored.draft.genre_ids.contains(&g.id))
            .cloned()
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Title {
            id: stored.id,
            name: stored.draft.name.clone(),
            year: stored.draft.year,
            description: stored.draft.description.clone(),
            category: stored
                .draft
                .category_id
                .and_then(|id| self.categories.iter().find(|c| c.id == id).cloned()),
            genres,
            rating,
        }
    }

    fn review(&self, stored: &StoredReview) -> Review {
        Review {
            id: stored.id,
            title_id: stored.title_id,
            author_id: stored.author_id,
            author: self.username(stored.author_id),
            text: stored.text.clone(),
            score: stored.score,
            pub_date: stored.pub_date,
        }
    }

    fn comment(&self, stored: &StoredComment) -> Comment {
        Comment {
            id: stored.id,
            review_id: stored.review_id,
            author_id: stored.author_id,
            author: self.username(stored.author_id),
            text: stored.text.clone(),
            pub_date: stored.pub_date,
        }
    }

    fn matches(&self, stored: &StoredTitle, filter: &TitleFilter) -> bool {
        let title = self.title(stored);
        filter
            .category
            .as_ref()
            .is_none_or(|slug| title.category.as_ref().is_some_and(|c| &c.slug == slug))
            && filter
                .genre
                .as_ref()
                .is_none_or(|slug| title.genres.iter().any(|g| &g.slug == slug))
            && filter.name.as_ref().is_none_or(|name| {
                title.name.to_lowercase().contains(&name.to_lowercase())
            })
            && filter.year.is_none_or(|year| title.year == year)
    }

    fn remove_reviews(&mut self, doomed: impl Fn(&StoredReview) -> bool) {
        let review_ids: Vec<i64> = self
            .reviews
            .iter()
            .filter(|r| doomed(r))
            .map(|r| r.id)
            .collect();
        self.reviews.retain(|r| !review_ids.contains(&r.id));
        self.comments.retain(|c| !review_ids.contains(&c.review_id));
    }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(page.saturating_sub(1) as usize * limit as usize)
        .take(limit as usize)
        .collect()
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    /// Insert an active account directly, bypassing signup
    pub fn seed_user(&self, username: &str, role: UserRole) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role,
            is_superuser: false,
            is_active: true,
            last_login: None,
            date_joined: Utc::now(),
        };
        self.lock().users.push(user.clone());
        user
    }

    pub fn seed_superuser(&self, username: &str) -> User {
        let mut user = self.seed_user(username, UserRole::User);
        user.is_superuser = true;
        let mut state = self.lock();
        if let Some(stored) = state.users.iter_mut().find(|u| u.id == user.id) {
            stored.is_superuser = true;
        }
        user
    }

    pub fn seed_taxon(&self, kind: Taxonomy, name: &str, slug: &str) -> Taxon {
        let mut state = self.lock();
        let taxon = Taxon {
            id: state.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.taxa_mut(kind).push(taxon.clone());
        taxon
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn review_count(&self) -> usize {
        self.lock().reviews.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }
}

impl UserExt for MemoryStore {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let found = if let Some(user_id) = user_id {
            state.users.iter().find(|u| u.id == user_id)
        } else if let Some(username) = username {
            state.users.iter().find(|u| u.username == username)
        } else if let Some(email) = email {
            state.users.iter().find(|u| u.email == email)
        } else {
            None
        };
        Ok(found.cloned())
    }

    async fn get_users(
        &self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Vec<User>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| contains_ci(&u.username, search))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(paginate(users, page, limit))
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .users
            .iter()
            .filter(|u| contains_ci(&u.username, search))
            .count() as i64)
    }

    async fn save_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(StoreError::UniqueViolation {
                constraint: USERNAME_KEY.to_string(),
            });
        }
        if state.users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::UniqueViolation {
                constraint: EMAIL_KEY.to_string(),
            });
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            bio: new_user.bio.clone(),
            role: new_user.role,
            is_superuser: false,
            is_active: new_user.is_active,
            last_login: None,
            date_joined: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, changes: &UserChanges) -> Result<User, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if let Some(username) = &changes.username {
            if state
                .users
                .iter()
                .any(|u| u.id != user_id && &u.username == username)
            {
                return Err(StoreError::UniqueViolation {
                    constraint: USERNAME_KEY.to_string(),
                });
            }
        }
        if let Some(email) = &changes.email {
            if state.users.iter().any(|u| u.id != user_id && &u.email == email) {
                return Err(StoreError::UniqueViolation {
                    constraint: EMAIL_KEY.to_string(),
                });
            }
        }
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &changes.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(bio) = &changes.bio {
            user.bio = bio.clone();
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        if state.users.len() == before {
            return Err(StoreError::NotFound);
        }
        state.remove_reviews(|r| r.author_id == user_id);
        state.comments.retain(|c| c.author_id != user_id);
        Ok(())
    }

    async fn confirm_user(&self, seen: &User) -> Result<Option<User>, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let Some(user) = state.users.iter_mut().find(|u| {
            u.id == seen.id && u.is_active == seen.is_active && u.last_login == seen.last_login
        }) else {
            return Ok(None);
        };
        user.is_active = true;
        // Strictly increasing so back-to-back confirmations still rotate codes
        let now = Utc::now();
        user.last_login = Some(match user.last_login {
            Some(previous) if previous >= now => previous + chrono::Duration::seconds(1),
            _ => now,
        });
        Ok(Some(user.clone()))
    }
}

impl TaxonomyExt for MemoryStore {
    async fn get_taxa(
        &self,
        kind: Taxonomy,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Vec<Taxon>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let mut taxa: Vec<Taxon> = state
            .taxa(kind)
            .iter()
            .filter(|t| contains_ci(&t.name, search))
            .cloned()
            .collect();
        taxa.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(taxa, page, limit))
    }

    async fn get_taxon_count(
        &self,
        kind: Taxonomy,
        search: Option<&str>,
    ) -> Result<i64, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .taxa(kind)
            .iter()
            .filter(|t| contains_ci(&t.name, search))
            .count() as i64)
    }

    async fn get_taxon(&self, kind: Taxonomy, slug: &str) -> Result<Option<Taxon>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state.taxa(kind).iter().find(|t| t.slug == slug).cloned())
    }

    async fn save_taxon(
        &self,
        kind: Taxonomy,
        name: &str,
        slug: &str,
    ) -> Result<Taxon, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if state.taxa(kind).iter().any(|t| t.slug == slug) {
            return Err(StoreError::UniqueViolation {
                constraint: kind.slug_constraint().to_string(),
            });
        }
        let taxon = Taxon {
            id: state.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.taxa_mut(kind).push(taxon.clone());
        Ok(taxon)
    }

    async fn delete_taxon(&self, kind: Taxonomy, slug: &str) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let id = state
            .taxa(kind)
            .iter()
            .find(|t| t.slug == slug)
            .map(|t| t.id)
            .ok_or(StoreError::NotFound)?;
        state.taxa_mut(kind).retain(|t| t.id != id);
        for title in state.titles.iter_mut() {
            match kind {
                Taxonomy::Category => {
                    if title.draft.category_id == Some(id) {
                        title.draft.category_id = None;
                    }
                }
                Taxonomy::Genre => title.draft.genre_ids.retain(|g| *g != id),
            }
        }
        Ok(())
    }
}

impl TitleExt for MemoryStore {
    async fn get_titles(
        &self,
        filter: &TitleFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Title>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let mut titles: Vec<Title> = state
            .titles
            .iter()
            .filter(|t| state.matches(t, filter))
            .map(|t| state.title(t))
            .collect();
        titles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(titles, page, limit))
    }

    async fn get_title_count(&self, filter: &TitleFilter) -> Result<i64, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .titles
            .iter()
            .filter(|t| state.matches(t, filter))
            .count() as i64)
    }

    async fn get_title(&self, title_id: i64) -> Result<Option<Title>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .titles
            .iter()
            .find(|t| t.id == title_id)
            .map(|t| state.title(t)))
    }

    async fn save_title(&self, draft: &TitleDraft) -> Result<Title, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let stored = StoredTitle {
            id: state.next_id(),
            draft: draft.clone(),
        };
        let title = state.title(&stored);
        state.titles.push(stored);
        Ok(title)
    }

    async fn update_title(&self, title_id: i64, draft: &TitleDraft) -> Result<Title, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let stored = state
            .titles
            .iter_mut()
            .find(|t| t.id == title_id)
            .ok_or(StoreError::NotFound)?;
        stored.draft = draft.clone();
        let state = &*state;
        let stored = state
            .titles
            .iter()
            .find(|t| t.id == title_id)
            .ok_or(StoreError::NotFound)?;
        Ok(state.title(stored))
    }

    async fn delete_title(&self, title_id: i64) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let before = state.titles.len();
        state.titles.retain(|t| t.id != title_id);
        if state.titles.len() == before {
            return Err(StoreError::NotFound);
        }
        state.remove_reviews(|r| r.title_id == title_id);
        Ok(())
    }
}

impl ReviewExt for MemoryStore {
    async fn get_reviews(
        &self,
        title_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Review>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let reviews = state
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| state.review(r))
            .collect();
        Ok(paginate(reviews, page, limit))
    }

    async fn get_title_review_count(&self, title_id: i64) -> Result<i64, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state.reviews.iter().filter(|r| r.title_id == title_id).count() as i64)
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .reviews
            .iter()
            .find(|r| r.id == review_id && r.title_id == title_id)
            .map(|r| state.review(r)))
    }

    async fn review_exists(&self, author_id: Uuid, title_id: i64) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .reviews
            .iter()
            .any(|r| r.author_id == author_id && r.title_id == title_id))
    }

    async fn save_review(
        &self,
        title_id: i64,
        author_id: Uuid,
        text: &str,
        score: i16,
    ) -> Result<Review, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if state
            .reviews
            .iter()
            .any(|r| r.author_id == author_id && r.title_id == title_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: REVIEW_AUTHOR_TITLE_KEY.to_string(),
            });
        }
        if !state.titles.iter().any(|t| t.id == title_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "reviews_title_id_fkey".to_string(),
            });
        }
        let stored = StoredReview {
            id: state.next_id(),
            title_id,
            author_id,
            text: text.to_string(),
            score,
            pub_date: Utc::now(),
        };
        let review = state.review(&stored);
        state.reviews.push(stored);
        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: &str,
        score: i16,
    ) -> Result<Review, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let stored = state
            .reviews
            .iter_mut()
            .find(|r| r.id == review_id)
            .ok_or(StoreError::NotFound)?;
        stored.text = text.to_string();
        stored.score = score;
        let state = &*state;
        let stored = state
            .reviews
            .iter()
            .find(|r| r.id == review_id)
            .ok_or(StoreError::NotFound)?;
        Ok(state.review(stored))
    }

    async fn delete_review(&self, review_id: i64) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if !state.reviews.iter().any(|r| r.id == review_id) {
            return Err(StoreError::NotFound);
        }
        state.remove_reviews(|r| r.id == review_id);
        Ok(())
    }
}

impl CommentExt for MemoryStore {
    async fn get_comments(
        &self,
        review_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Comment>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let comments = state
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| state.comment(c))
            .collect();
        Ok(paginate(comments, page, limit))
    }

    async fn get_review_comment_count(&self, review_id: i64) -> Result<i64, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .count() as i64)
    }

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(state
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .map(|c| state.comment(c)))
    }

    async fn save_comment(
        &self,
        review_id: i64,
        author_id: Uuid,
        text: &str,
    ) -> Result<Comment, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        if !state.reviews.iter().any(|r| r.id == review_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "comments_review_id_fkey".to_string(),
            });
        }
        let stored = StoredComment {
            id: state.next_id(),
            review_id,
            author_id,
            text: text.to_string(),
            pub_date: Utc::now(),
        };
        let comment = state.comment(&stored);
        state.comments.push(stored);
        Ok(comment)
    }

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let stored = state
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or(StoreError::NotFound)?;
        stored.text = text.to_string();
        let state = &*state;
        let stored = state
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .ok_or(StoreError::NotFound)?;
        Ok(state.comment(stored))
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let before = state.comments.len();
        state.comments.retain(|c| c.id != comment_id);
        if state.comments.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
