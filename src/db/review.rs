use super::{DBClient, StoreError, page_offset};
use crate::models::Review;
use uuid::Uuid;

/// Review database operations trait
pub trait ReviewExt {
    /// Get a page of a title's reviews, oldest first
    async fn get_reviews(
        &self,
        title_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Review>, StoreError>;

    async fn get_title_review_count(&self, title_id: i64) -> Result<i64, StoreError>;

    /// Get a review only if it belongs to the given title
    async fn get_review(&self, title_id: i64, review_id: i64)
    -> Result<Option<Review>, StoreError>;

    /// Fast pre-check for the one-review-per-title rule
    async fn review_exists(&self, author_id: Uuid, title_id: i64) -> Result<bool, StoreError>;

    /// Insert a review. A second review by the same author for the same title
    /// fails with `UniqueViolation` on `reviews_author_title_key`.
    async fn save_review(
        &self,
        title_id: i64,
        author_id: Uuid,
        text: &str,
        score: i16,
    ) -> Result<Review, StoreError>;

    async fn update_review(
        &self,
        review_id: i64,
        text: &str,
        score: i16,
    ) -> Result<Review, StoreError>;

    /// Delete a review and, by cascade, its comments
    async fn delete_review(&self, review_id: i64) -> Result<(), StoreError>;
}

impl ReviewExt for DBClient {
    async fn get_reviews(
        &self,
        title_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT r.id, r.title_id, r.author_id, u.username AS author, r.text, r.score, r.pub_date
            FROM reviews r
            INNER JOIN users u ON r.author_id = u.id
            WHERE r.title_id = $1
            ORDER BY r.pub_date, r.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(title_id)
        .bind(i64::from(limit))
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn get_title_review_count(&self, title_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = $1")
            .bind(title_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, StoreError> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            SELECT r.id, r.title_id, r.author_id, u.username AS author, r.text, r.score, r.pub_date
            FROM reviews r
            INNER JOIN users u ON r.author_id = u.id
            WHERE r.id = $1 AND r.title_id = $2
            "#,
        )
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn review_exists(&self, author_id: Uuid, title_id: i64) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE author_id = $1 AND title_id = $2)",
        )
        .bind(author_id)
        .bind(title_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save_review(
        &self,
        title_id: i64,
        author_id: Uuid,
        text: &str,
        score: i16,
    ) -> Result<Review, StoreError> {
        // CTE inserts and returns the row joined with the author's username
        let review = sqlx::query_as::<_, Review>(
            r#"
            WITH new_review AS (
                INSERT INTO reviews (title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT nr.id, nr.title_id, nr.author_id, u.username AS author, nr.text, nr.score, nr.pub_date
            FROM new_review nr
            JOIN users u ON nr.author_id = u.id
            "#,
        )
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: &str,
        score: i16,
    ) -> Result<Review, StoreError> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            WITH updated_review AS (
                UPDATE reviews
                SET text = $1, score = $2
                WHERE id = $3
                RETURNING *
            )
            SELECT ur.id, ur.title_id, ur.author_id, u.username AS author, ur.text, ur.score, ur.pub_date
            FROM updated_review ur
            JOIN users u ON ur.author_id = u.id
            "#,
        )
        .bind(text)
        .bind(score)
        .bind(review_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    async fn delete_review(&self, review_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
