use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::{Extension, Router, middleware};
use tracing::instrument;

use crate::AppState;
use crate::dtos::{
    InputReviewDto, ListQueryDto, ListResponseDto, ReviewDto, SingleResponseDto, UpdateReviewDto,
};
use crate::error::HttpError;
use crate::extractors::{ValidatedJson, ValidatedQuery};
use crate::middleware::{JWTAuthMiddleware, auth};
use crate::service;

/// Router for reviews nested under a title
pub fn review_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/titles/{title_id}/reviews/", get(get_reviews))
        .route(
            "/titles/{title_id}/reviews/",
            post(create_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/titles/{title_id}/reviews/{review_id}/", get(get_review))
        // PATCH/DELETE - author, moderator or admin
        .route(
            "/titles/{title_id}/reviews/{review_id}/",
            patch(edit_review)
                .delete(delete_review)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

#[instrument(skip(app_state))]
pub async fn get_reviews(
    ValidatedQuery(params): ValidatedQuery<ListQueryDto>,
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page =
        service::review::list_reviews(&app_state.db_client, title_id, params.page_params()).await?;

    tracing::info!("get_reviews successful");
    Ok(Json(ListResponseDto::from_page(page, ReviewDto::from)))
}

#[instrument(skip(app_state))]
pub async fn get_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review = service::review::find_review(&app_state.db_client, title_id, review_id).await?;

    tracing::info!("get_review successful");
    Ok(Json(SingleResponseDto::new(ReviewDto::from(review))))
}

/// Request body: { text, score }
///
/// One review per author and title; a second attempt is a 400.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_review(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review = service::review::create_review(
        &app_state.db_client,
        &jwt.user,
        title_id,
        &body.text,
        body.score,
    )
    .await?;

    tracing::info!(review_id = review.id, "create_review successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleResponseDto::new(ReviewDto::from(review))),
    ))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn edit_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<UpdateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review = service::review::update_review(
        &app_state.db_client,
        &jwt.user,
        title_id,
        review_id,
        body.text,
        body.score,
    )
    .await?;

    tracing::info!("edit_review successful");
    Ok(Json(SingleResponseDto::new(ReviewDto::from(review))))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    service::review::delete_review(&app_state.db_client, &jwt.user, title_id, review_id).await?;

    tracing::info!("delete_review successful");
    Ok(StatusCode::NO_CONTENT)
}
