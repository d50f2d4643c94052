use std::collections::HashMap;

use super::{DBClient, StoreError, page_offset};
use crate::models::{Taxon, Title, TitleDraft, TitleFilter};

/// Title operations; every read aggregates `rating` fresh from `reviews`
pub trait TitleExt {
    async fn get_titles(
        &self,
        filter: &TitleFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Title>, StoreError>;

    async fn get_title_count(&self, filter: &TitleFilter) -> Result<i64, StoreError>;

    async fn get_title(&self, title_id: i64) -> Result<Option<Title>, StoreError>;

    async fn save_title(&self, draft: &TitleDraft) -> Result<Title, StoreError>;

    /// Replace every column and the genre set of an existing title
    async fn update_title(&self, title_id: i64, draft: &TitleDraft) -> Result<Title, StoreError>;

    /// Delete a title; its reviews and their comments go with it
    async fn delete_title(&self, title_id: i64) -> Result<(), StoreError>;
}

#[derive(sqlx::FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i16,
    description: Option<String>,
    category_id: Option<i64>,
    category_name: Option<String>,
    category_slug: Option<String>,
    rating: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct TitleGenreRow {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

const TITLE_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug,
           (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

const TITLE_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR c.slug = $1)
      AND ($2::text IS NULL OR EXISTS (
            SELECT 1 FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = t.id AND g.slug = $2))
      AND ($3::text IS NULL OR strpos(lower(t.name), lower($3)) > 0)
      AND ($4::smallint IS NULL OR t.year = $4)
"#;

impl DBClient {
    /// Load genres for a batch of titles and stitch them onto the rows
    async fn attach_genres(&self, rows: Vec<TitleRow>) -> Result<Vec<Title>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

        let genre_rows = sqlx::query_as::<_, TitleGenreRow>(
            r#"
            SELECT gt.title_id, g.id, g.name, g.slug
            FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = ANY($1)
            ORDER BY g.name, g.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i64, Vec<Taxon>> = HashMap::new();
        for row in genre_rows {
            genres.entry(row.title_id).or_default().push(Taxon {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let category = match (row.category_id, row.category_name, row.category_slug) {
                    (Some(id), Some(name), Some(slug)) => Some(Taxon { id, name, slug }),
                    _ => None,
                };
                Title {
                    genres: genres.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    name: row.name,
                    year: row.year,
                    description: row.description,
                    category,
                    rating: row.rating,
                }
            })
            .collect())
    }
}

impl TitleExt for DBClient {
    async fn get_titles(
        &self,
        filter: &TitleFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Title>, StoreError> {
        let query = format!("{TITLE_SELECT} {TITLE_FILTER} ORDER BY t.name, t.id LIMIT $5 OFFSET $6");

        let rows = sqlx::query_as::<_, TitleRow>(&query)
            .bind(filter.category.as_deref())
            .bind(filter.genre.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.year)
            .bind(i64::from(limit))
            .bind(page_offset(page, limit))
            .fetch_all(&self.pool)
            .await?;

        self.attach_genres(rows).await
    }

    async fn get_title_count(&self, filter: &TitleFilter) -> Result<i64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM titles t LEFT JOIN categories c ON c.id = t.category_id {TITLE_FILTER}"
        );

        let count: i64 = sqlx::query_scalar(&query)
            .bind(filter.category.as_deref())
            .bind(filter.genre.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.year)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_title(&self, title_id: i64) -> Result<Option<Title>, StoreError> {
        let query = format!("{TITLE_SELECT} WHERE t.id = $1");

        let row = sqlx::query_as::<_, TitleRow>(&query)
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_genres(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn save_title(&self, draft: &TitleDraft) -> Result<Title, StoreError> {
        let mut tx = self.pool.begin().await?;

        let title_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO titles (name, year, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(draft.year)
        .bind(draft.description.as_deref())
        .bind(draft.category_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO genre_title (title_id, genre_id) SELECT $1, UNNEST($2::bigint[])")
            .bind(title_id)
            .bind(&draft.genre_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_title(title_id).await?.ok_or(StoreError::NotFound)
    }

    async fn update_title(&self, title_id: i64, draft: &TitleDraft) -> Result<Title, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE titles
            SET name = $1, year = $2, description = $3, category_id = $4
            WHERE id = $5
            "#,
        )
        .bind(&draft.name)
        .bind(draft.year)
        .bind(draft.description.as_deref())
        .bind(draft.category_id)
        .bind(title_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM genre_title WHERE title_id = $1")
            .bind(title_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO genre_title (title_id, genre_id) SELECT $1, UNNEST($2::bigint[])")
            .bind(title_id)
            .bind(&draft.genre_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_title(title_id).await?.ok_or(StoreError::NotFound)
    }

    async fn delete_title(&self, title_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(title_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
