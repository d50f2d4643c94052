use super::{DBClient, StoreError, page_offset};
use crate::models::Comment;
use uuid::Uuid;

/// Comment database operations trait
pub trait CommentExt {
    /// Get a page of a review's comments, oldest first
    async fn get_comments(
        &self,
        review_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Comment>, StoreError>;

    async fn get_review_comment_count(&self, review_id: i64) -> Result<i64, StoreError>;

    /// Get a comment only if it belongs to the given review
    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, StoreError>;

    async fn save_comment(
        &self,
        review_id: i64,
        author_id: Uuid,
        text: &str,
    ) -> Result<Comment, StoreError>;

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment, StoreError>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), StoreError>;
}

impl CommentExt for DBClient {
    async fn get_comments(
        &self,
        review_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Comment>, StoreError> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author, c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.review_id = $1
            ORDER BY c.pub_date, c.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(review_id)
        .bind(i64::from(limit))
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn get_review_comment_count(&self, review_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE review_id = $1")
            .bind(review_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, StoreError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author, c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.id = $1 AND c.review_id = $2
            "#,
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn save_comment(
        &self,
        review_id: i64,
        author_id: Uuid,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH new_comment AS (
                INSERT INTO comments (review_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT nc.id, nc.review_id, nc.author_id, u.username AS author, nc.text, nc.pub_date
            FROM new_comment nc
            JOIN users u ON nc.author_id = u.id
            "#,
        )
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment, StoreError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated_comment AS (
                UPDATE comments
                SET text = $1
                WHERE id = $2
                RETURNING *
            )
            SELECT uc.id, uc.review_id, uc.author_id, u.username AS author, uc.text, uc.pub_date
            FROM updated_comment uc
            JOIN users u ON uc.author_id = u.id
            "#,
        )
        .bind(text)
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
