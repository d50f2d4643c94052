use super::{DBClient, StoreError, page_offset};
use crate::models::{Taxon, Taxonomy};

/// Category and genre operations; both live in identical name/slug tables
pub trait TaxonomyExt {
    async fn get_taxa(
        &self,
        kind: Taxonomy,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Vec<Taxon>, StoreError>;

    async fn get_taxon_count(&self, kind: Taxonomy, search: Option<&str>)
    -> Result<i64, StoreError>;

    async fn get_taxon(&self, kind: Taxonomy, slug: &str) -> Result<Option<Taxon>, StoreError>;

    async fn save_taxon(&self, kind: Taxonomy, name: &str, slug: &str)
    -> Result<Taxon, StoreError>;

    /// Delete by slug. Titles keep existing: a deleted category is cleared
    /// from them, a deleted genre is dropped from their genre list.
    async fn delete_taxon(&self, kind: Taxonomy, slug: &str) -> Result<(), StoreError>;
}

impl TaxonomyExt for DBClient {
    async fn get_taxa(
        &self,
        kind: Taxonomy,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Vec<Taxon>, StoreError> {
        // Table names come from the Taxonomy enum, never from input
        let query = format!(
            r#"
            SELECT id, name, slug FROM {}
            WHERE ($1::text IS NULL OR strpos(lower(name), lower($1)) > 0)
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
            kind.table()
        );

        let taxa = sqlx::query_as::<_, Taxon>(&query)
            .bind(search)
            .bind(i64::from(limit))
            .bind(page_offset(page, limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(taxa)
    }

    async fn get_taxon_count(
        &self,
        kind: Taxonomy,
        search: Option<&str>,
    ) -> Result<i64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::text IS NULL OR strpos(lower(name), lower($1)) > 0)",
            kind.table()
        );

        let count: i64 = sqlx::query_scalar(&query)
            .bind(search)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_taxon(&self, kind: Taxonomy, slug: &str) -> Result<Option<Taxon>, StoreError> {
        let query = format!("SELECT id, name, slug FROM {} WHERE slug = $1", kind.table());

        let taxon = sqlx::query_as::<_, Taxon>(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(taxon)
    }

    async fn save_taxon(
        &self,
        kind: Taxonomy,
        name: &str,
        slug: &str,
    ) -> Result<Taxon, StoreError> {
        let query = format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            kind.table()
        );

        let taxon = sqlx::query_as::<_, Taxon>(&query)
            .bind(name)
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(taxon)
    }

    async fn delete_taxon(&self, kind: Taxonomy, slug: &str) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {} WHERE slug = $1", kind.table());

        let result = sqlx::query(&query).bind(slug).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
