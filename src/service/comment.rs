use super::review::find_review;
use super::{Page, PageParams, db_error};
use crate::db::{CommentExt, ReviewExt, StoreError, TitleExt};
use crate::error::{ErrorMessage, HttpError};
use crate::models::{Comment, User};
use crate::policy::{Action, Resource, authorize};

fn comment_not_found() -> HttpError {
    HttpError::not_found(ErrorMessage::CommentNotFound.to_string())
}

/// Resolve title, review and comment along the URL path
pub async fn find_comment<S: TitleExt + ReviewExt + CommentExt>(
    store: &S,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, HttpError> {
    find_review(store, title_id, review_id).await?;
    store
        .get_comment(review_id, comment_id)
        .await
        .map_err(db_error("getting comment"))?
        .ok_or_else(comment_not_found)
}

pub async fn list_comments<S: TitleExt + ReviewExt + CommentExt>(
    store: &S,
    title_id: i64,
    review_id: i64,
    params: PageParams,
) -> Result<Page<Comment>, HttpError> {
    find_review(store, title_id, review_id).await?;

    let items = store
        .get_comments(review_id, params.page, params.limit)
        .await
        .map_err(db_error("getting comments"))?;
    let total = store
        .get_review_comment_count(review_id)
        .await
        .map_err(db_error("getting review comment count"))?;

    Ok(Page {
        items,
        page: params.page,
        limit: params.limit,
        total,
    })
}

pub async fn create_comment<S: TitleExt + ReviewExt + CommentExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    review_id: i64,
    text: &str,
) -> Result<Comment, HttpError> {
    authorize(
        Some(requester),
        Action::Create,
        Resource::Authored { author_id: None },
    )?;
    find_review(store, title_id, review_id).await?;

    store
        .save_comment(review_id, requester.id, text)
        .await
        .map_err(|e| match e {
            StoreError::ForeignKeyViolation { .. } => {
                HttpError::not_found(ErrorMessage::ReviewNotFound.to_string())
            }
            e => db_error("saving comment")(e),
        })
}

pub async fn update_comment<S: TitleExt + ReviewExt + CommentExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
    text: &str,
) -> Result<Comment, HttpError> {
    let comment = find_comment(store, title_id, review_id, comment_id).await?;
    authorize(
        Some(requester),
        Action::Update,
        Resource::Authored {
            author_id: Some(comment.author_id),
        },
    )?;

    store
        .update_comment(comment_id, text)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => comment_not_found(),
            e => db_error("updating comment")(e),
        })
}

pub async fn delete_comment<S: TitleExt + ReviewExt + CommentExt>(
    store: &S,
    requester: &User,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<(), HttpError> {
    let comment = find_comment(store, title_id, review_id, comment_id).await?;
    authorize(
        Some(requester),
        Action::Delete,
        Resource::Authored {
            author_id: Some(comment.author_id),
        },
    )?;

    store.delete_comment(comment_id).await.map_err(|e| match e {
        StoreError::NotFound => comment_not_found(),
        e => db_error("deleting comment")(e),
    })
}
