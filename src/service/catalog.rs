use chrono::{Datelike, Utc};

use super::{Page, PageParams, db_error};
use crate::db::{StoreError, TaxonomyExt, TitleExt};
use crate::error::{ErrorMessage, HttpError};
use crate::models::{FIRST_FILM_YEAR, Taxon, Taxonomy, Title, TitleDraft, TitleFilter, User};
use crate::policy::{Action, Resource, authorize};

fn taxon_not_found(kind: Taxonomy) -> HttpError {
    let message = match kind {
        Taxonomy::Category => ErrorMessage::CategoryNotFound,
        Taxonomy::Genre => ErrorMessage::GenreNotFound,
    };
    HttpError::not_found(message.to_string())
}

fn title_not_found() -> HttpError {
    HttpError::not_found(ErrorMessage::TitleNotFound.to_string())
}

pub async fn list_taxa<S: TaxonomyExt>(
    store: &S,
    kind: Taxonomy,
    params: PageParams,
    search: Option<&str>,
) -> Result<Page<Taxon>, HttpError> {
    let items = store
        .get_taxa(kind, params.page, params.limit, search)
        .await
        .map_err(db_error("getting taxa"))?;
    let total = store
        .get_taxon_count(kind, search)
        .await
        .map_err(db_error("getting taxon count"))?;

    Ok(Page {
        items,
        page: params.page,
        limit: params.limit,
        total,
    })
}

pub async fn create_taxon<S: TaxonomyExt>(
    store: &S,
    requester: &User,
    kind: Taxonomy,
    name: &str,
    slug: &str,
) -> Result<Taxon, HttpError> {
    authorize(Some(requester), Action::Create, Resource::Catalog)?;

    store.save_taxon(kind, name, slug).await.map_err(|e| {
        if e.is_unique_violation_of(kind.slug_constraint()) {
            tracing::warn!("Conflict, saving {}, unique_violation: {}", kind.table(), e);
            HttpError::unique_constraint_violation("slug", ErrorMessage::SlugTaken.to_string())
        } else {
            db_error("saving taxon")(e)
        }
    })
}

/// Delete a category or genre; titles keep existing without the link
pub async fn delete_taxon<S: TaxonomyExt>(
    store: &S,
    requester: &User,
    kind: Taxonomy,
    slug: &str,
) -> Result<(), HttpError> {
    authorize(Some(requester), Action::Delete, Resource::Catalog)?;

    store.delete_taxon(kind, slug).await.map_err(|e| match e {
        StoreError::NotFound => taxon_not_found(kind),
        e => db_error("deleting taxon")(e),
    })
}

/// Release year must be between the first film and the current year
pub fn check_year(year: i16) -> Result<(), HttpError> {
    let current = Utc::now().year();
    if year < FIRST_FILM_YEAR || i32::from(year) > current {
        return Err(HttpError::validation(
            "year",
            ErrorMessage::YearOutOfRange(FIRST_FILM_YEAR, current).to_string(),
        ));
    }
    Ok(())
}

/// Title fields as clients send them: relations by slug
#[derive(Debug, Clone, Default)]
pub struct TitleInput {
    pub name: String,
    pub year: i16,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Vec<String>,
}

/// Partial title update; `None` keeps the current value and `Some(None)`
/// clears an optional column
#[derive(Debug, Clone, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i16>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub genre: Option<Vec<String>>,
}

async fn resolve_category<S: TaxonomyExt>(
    store: &S,
    slug: Option<&str>,
) -> Result<Option<i64>, HttpError> {
    let Some(slug) = slug else {
        return Ok(None);
    };
    let category = store
        .get_taxon(Taxonomy::Category, slug)
        .await
        .map_err(db_error("getting category"))?
        .ok_or_else(|| {
            HttpError::validation("category", ErrorMessage::CategoryNotFound.to_string())
        })?;
    Ok(Some(category.id))
}

async fn resolve_genres<S: TaxonomyExt>(store: &S, slugs: &[String]) -> Result<Vec<i64>, HttpError> {
    if slugs.is_empty() {
        return Err(HttpError::validation(
            "genre",
            ErrorMessage::EmptyGenreList.to_string(),
        ));
    }

    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let genre = store
            .get_taxon(Taxonomy::Genre, slug)
            .await
            .map_err(db_error("getting genre"))?
            .ok_or_else(|| {
                HttpError::validation("genre", ErrorMessage::GenreNotFound.to_string())
            })?;
        if !ids.contains(&genre.id) {
            ids.push(genre.id);
        }
    }
    Ok(ids)
}

/// A relation vanished between resolving it and writing the title
fn title_write_error(context: &'static str) -> impl FnOnce(StoreError) -> HttpError {
    move |e| match e {
        StoreError::ForeignKeyViolation { .. } => {
            tracing::warn!("Conflict, {}, foreign_key_violation: {}", context, e);
            HttpError::bad_request(ErrorMessage::ValidationFailed.to_string())
        }
        StoreError::NotFound => title_not_found(),
        e => db_error(context)(e),
    }
}

pub async fn list_titles<S: TitleExt>(
    store: &S,
    filter: &TitleFilter,
    params: PageParams,
) -> Result<Page<Title>, HttpError> {
    let items = store
        .get_titles(filter, params.page, params.limit)
        .await
        .map_err(db_error("getting titles"))?;
    let total = store
        .get_title_count(filter)
        .await
        .map_err(db_error("getting title count"))?;

    Ok(Page {
        items,
        page: params.page,
        limit: params.limit,
        total,
    })
}

pub async fn get_title<S: TitleExt>(store: &S, title_id: i64) -> Result<Title, HttpError> {
    store
        .get_title(title_id)
        .await
        .map_err(db_error("getting title"))?
        .ok_or_else(title_not_found)
}

pub async fn create_title<S: TitleExt + TaxonomyExt>(
    store: &S,
    requester: &User,
    input: TitleInput,
) -> Result<Title, HttpError> {
    authorize(Some(requester), Action::Create, Resource::Catalog)?;
    check_year(input.year)?;

    let draft = TitleDraft {
        category_id: resolve_category(store, input.category.as_deref()).await?,
        genre_ids: resolve_genres(store, &input.genre).await?,
        name: input.name,
        year: input.year,
        description: input.description,
    };

    store
        .save_title(&draft)
        .await
        .map_err(title_write_error("saving title"))
}

pub async fn update_title<S: TitleExt + TaxonomyExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    changes: TitleChanges,
) -> Result<Title, HttpError> {
    authorize(Some(requester), Action::Update, Resource::Catalog)?;
    let current = get_title(store, title_id).await?;

    if let Some(year) = changes.year {
        check_year(year)?;
    }
    let category_id = match changes.category {
        Some(slug) => resolve_category(store, slug.as_deref()).await?,
        None => current.category.as_ref().map(|c| c.id),
    };
    let genre_ids = match &changes.genre {
        Some(slugs) => resolve_genres(store, slugs).await?,
        None => current.genres.iter().map(|g| g.id).collect(),
    };

    let draft = TitleDraft {
        name: changes.name.unwrap_or(current.name),
        year: changes.year.unwrap_or(current.year),
        description: changes.description.unwrap_or(current.description),
        category_id,
        genre_ids,
    };

    store
        .update_title(title_id, &draft)
        .await
        .map_err(title_write_error("updating title"))
}

/// Delete a title together with its reviews and their comments
pub async fn delete_title<S: TitleExt>(
    store: &S,
    requester: &User,
    title_id: i64,
) -> Result<(), HttpError> {
    authorize(Some(requester), Action::Delete, Resource::Catalog)?;

    store.delete_title(title_id).await.map_err(|e| match e {
        StoreError::NotFound => title_not_found(),
        e => db_error("deleting title")(e),
    })
}
