use crate::AppState;
use crate::dtos::{
    InputTitleDto, ListResponseDto, SingleResponseDto, TitleDto, TitleQueryDto, UpdateTitleDto,
};
use crate::error::HttpError;
use crate::extractors::{ValidatedJson, ValidatedQuery};
use crate::middleware::{JWTAuthMiddleware, auth};
use crate::service;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::{Extension, Router, middleware};
use tracing::instrument;

/// Router for `/titles/`; reads are public, writes need an admin token
pub fn title_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        // GET /titles/ - Filters: ?category=&genre=&name=&year=
        .route("/titles/", get(get_titles))
        .route(
            "/titles/",
            post(create_title).route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/titles/{title_id}/", get(get_title))
        .route(
            "/titles/{title_id}/",
            patch(update_title)
                .delete(delete_title)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

#[instrument(skip(app_state))]
pub async fn get_titles(
    ValidatedQuery(params): ValidatedQuery<TitleQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = service::catalog::list_titles(
        &app_state.db_client,
        &params.filter(),
        params.page_params(),
    )
    .await?;

    tracing::info!("get_titles successful");
    Ok(Json(ListResponseDto::from_page(page, TitleDto::from)))
}

/// Title with nested category/genres and the current mean rating
#[instrument(skip(app_state))]
pub async fn get_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let title = service::catalog::get_title(&app_state.db_client, title_id).await?;

    tracing::info!("get_title successful");
    Ok(Json(SingleResponseDto::new(TitleDto::from(title))))
}

/// Request body: { name, year, description?, category?: slug, genre: [slug] }
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_title(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let title = service::catalog::create_title(&app_state.db_client, &jwt.user, body.into()).await?;

    tracing::info!(title_id = title.id, "create_title successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleResponseDto::new(TitleDto::from(title))),
    ))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<UpdateTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let title =
        service::catalog::update_title(&app_state.db_client, &jwt.user, title_id, body.into())
            .await?;

    tracing::info!("update_title successful");
    Ok(Json(SingleResponseDto::new(TitleDto::from(title))))
}

/// Reviews and their comments go with the title
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    service::catalog::delete_title(&app_state.db_client, &jwt.user, title_id).await?;

    tracing::info!("delete_title successful");
    Ok(StatusCode::NO_CONTENT)
}
