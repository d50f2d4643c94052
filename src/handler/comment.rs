use crate::AppState;
use crate::dtos::{CommentDto, InputCommentDto, ListQueryDto, ListResponseDto, SingleResponseDto};
use crate::error::HttpError;
use crate::extractors::{ValidatedJson, ValidatedQuery};
use crate::middleware::JWTAuthMiddleware;
use crate::middleware::auth;
use crate::service;
use axum::Extension;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::{Router, middleware};
use tracing::instrument;

/// Router for comment endpoints nested under /titles/{title_id}/reviews/{review_id}/comments/
pub fn comment_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        // GET / - Get comments for a review (public)
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            get(get_comments),
        )
        // POST / - Create comment (requires auth)
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            post(create_comment)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
            get(get_comment),
        )
        // PATCH, DELETE /{comment_id}/ - author, moderator or admin
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
            patch(edit_comment)
                .delete(delete_comment)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Get paginated comments for a review, oldest first
#[instrument(skip(app_state))]
pub async fn get_comments(
    ValidatedQuery(params): ValidatedQuery<ListQueryDto>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = service::comment::list_comments(
        &app_state.db_client,
        title_id,
        review_id,
        params.page_params(),
    )
    .await?;

    tracing::info!("get_comments successful");
    Ok(Json(ListResponseDto::from_page(page, CommentDto::from)))
}

#[instrument(skip(app_state))]
pub async fn get_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let comment =
        service::comment::find_comment(&app_state.db_client, title_id, review_id, comment_id)
            .await?;

    tracing::info!("get_comment successful");
    Ok(Json(SingleResponseDto::new(CommentDto::from(comment))))
}

/// Request body: { text }
/// Returns 201 Created with the new comment.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_comment(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = service::comment::create_comment(
        &app_state.db_client,
        &jwt.user,
        title_id,
        review_id,
        &body.text,
    )
    .await?;

    tracing::info!("create_comment successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleResponseDto::new(CommentDto::from(comment))),
    ))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn edit_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = service::comment::update_comment(
        &app_state.db_client,
        &jwt.user,
        title_id,
        review_id,
        comment_id,
        &body.text,
    )
    .await?;

    tracing::info!("edit_comment successful");
    Ok(Json(SingleResponseDto::new(CommentDto::from(comment))))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    service::comment::delete_comment(
        &app_state.db_client,
        &jwt.user,
        title_id,
        review_id,
        comment_id,
    )
    .await?;

    tracing::info!("delete_comment successful");
    Ok(StatusCode::NO_CONTENT)
}
