use super::catalog::get_title;
use super::{Page, PageParams, db_error};
use crate::db::{REVIEW_AUTHOR_TITLE_KEY, ReviewExt, StoreError, TitleExt};
use crate::error::{ErrorMessage, HttpError, NON_FIELD_ERRORS};
use crate::models::{Review, SCORE_MAX, SCORE_MIN, User};
use crate::policy::{Action, Resource, authorize};

pub fn check_score(score: i16) -> Result<(), HttpError> {
    if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        return Err(HttpError::validation(
            "score",
            ErrorMessage::ScoreOutOfRange(SCORE_MIN, SCORE_MAX).to_string(),
        ));
    }
    Ok(())
}

fn duplicate_review() -> HttpError {
    HttpError::unique_constraint_violation(
        NON_FIELD_ERRORS,
        ErrorMessage::DuplicateReview.to_string(),
    )
}

fn review_not_found() -> HttpError {
    HttpError::not_found(ErrorMessage::ReviewNotFound.to_string())
}

/// Look a review up inside its title; a review of another title is a 404
pub async fn find_review<S: TitleExt + ReviewExt>(
    store: &S,
    title_id: i64,
    review_id: i64,
) -> Result<Review, HttpError> {
    get_title(store, title_id).await?;
    store
        .get_review(title_id, review_id)
        .await
        .map_err(db_error("getting review"))?
        .ok_or_else(review_not_found)
}

pub async fn list_reviews<S: TitleExt + ReviewExt>(
    store: &S,
    title_id: i64,
    params: PageParams,
) -> Result<Page<Review>, HttpError> {
    get_title(store, title_id).await?;

    let items = store
        .get_reviews(title_id, params.page, params.limit)
        .await
        .map_err(db_error("getting reviews"))?;
    let total = store
        .get_title_review_count(title_id)
        .await
        .map_err(db_error("getting title review count"))?;

    Ok(Page {
        items,
        page: params.page,
        limit: params.limit,
        total,
    })
}

/// Post a review, at most one per author and title
///
/// The `review_exists` lookup only gives the common case a friendly error.
/// Two racing requests can both pass it; the storage constraint then rejects
/// the loser, which gets the same response.
pub async fn create_review<S: TitleExt + ReviewExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    text: &str,
    score: i16,
) -> Result<Review, HttpError> {
    authorize(
        Some(requester),
        Action::Create,
        Resource::Authored { author_id: None },
    )?;
    check_score(score)?;
    get_title(store, title_id).await?;

    let exists = store
        .review_exists(requester.id, title_id)
        .await
        .map_err(db_error("checking existing review"))?;
    if exists {
        return Err(duplicate_review());
    }

    store
        .save_review(title_id, requester.id, text, score)
        .await
        .map_err(|e| {
            if e.is_unique_violation_of(REVIEW_AUTHOR_TITLE_KEY) {
                tracing::warn!("Conflict, saving review, unique_violation: {}", e);
                duplicate_review()
            } else if matches!(e, StoreError::ForeignKeyViolation { .. }) {
                HttpError::not_found(ErrorMessage::TitleNotFound.to_string())
            } else {
                db_error("saving review")(e)
            }
        })
}

/// Edit text and/or score; author, title and date never change
pub async fn update_review<S: TitleExt + ReviewExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    review_id: i64,
    text: Option<String>,
    score: Option<i16>,
) -> Result<Review, HttpError> {
    let review = find_review(store, title_id, review_id).await?;
    authorize(
        Some(requester),
        Action::Update,
        Resource::Authored {
            author_id: Some(review.author_id),
        },
    )?;
    if let Some(score) = score {
        check_score(score)?;
    }

    let text = text.unwrap_or(review.text);
    let score = score.unwrap_or(review.score);
    store
        .update_review(review_id, &text, score)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => review_not_found(),
            e => db_error("updating review")(e),
        })
}

pub async fn delete_review<S: TitleExt + ReviewExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    review_id: i64,
) -> Result<(), HttpError> {
    let review = find_review(store, title_id, review_id).await?;
    authorize(
        Some(requester),
        Action::Delete,
        Resource::Authored {
            author_id: Some(review.author_id),
        },
    )?;

    store.delete_review(review_id).await.map_err(|e| match e {
        StoreError::NotFound => review_not_found(),
        e => db_error("deleting review")(e),
    })
}
