use crate::{
    AppState,
    dtos::{
        CreateUserDto, ListQueryDto, ListResponseDto, SingleResponseDto, UpdateUserDto, UserDto,
    },
    error::HttpError,
    extractors::{ValidatedJson, ValidatedQuery},
    middleware::{JWTAuthMiddleware, auth},
    service,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;

/// Router for account endpoints
///
/// Every route needs a token. `/users/me/` is open to any account; the rest
/// is admin-only, which the user service enforces.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        // GET /users/ - List accounts, ?search= matches usernames
        // POST /users/ - Create an account
        .route("/users/", get(get_users).post(create_user))
        // GET|PATCH /users/me/ - Own profile
        .route("/users/me/", get(get_me).patch(update_me))
        // GET|PATCH|DELETE /users/{username}/ - Manage one account
        .route(
            "/users/{username}/",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

#[instrument(skip(jwt), fields(username = %jwt.user.username))]
pub async fn get_me(
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!("get_me successful");
    Ok(Json(SingleResponseDto::new(UserDto::from(jwt.user))))
}

/// Edit own profile
///
/// A `role` in the body only takes effect for admins.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_me(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = service::users::update_me(&app_state.db_client, &jwt.user, body.into()).await?;

    tracing::info!("update_me successful");
    Ok(Json(SingleResponseDto::new(UserDto::from(user))))
}

/// Query params: ?page=1&limit=10&search=ali
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_users(
    ValidatedQuery(query_params): ValidatedQuery<ListQueryDto>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let page = service::users::list_users(
        &app_state.db_client,
        &jwt.user,
        query_params.page_params(),
        query_params.search.as_deref(),
    )
    .await?;

    tracing::info!("get_users successful");
    Ok(Json(ListResponseDto::from_page(page, UserDto::from)))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username, target = %body.username))]
pub async fn create_user(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = service::users::create_user(&app_state.db_client, &jwt.user, body.into()).await?;

    tracing::info!("create_user successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleResponseDto::new(UserDto::from(user))),
    ))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_user(
    Path(target): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user = service::users::get_user(&app_state.db_client, &jwt.user, &target).await?;

    tracing::info!("get_user successful");
    Ok(Json(SingleResponseDto::new(UserDto::from(user))))
}

#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_user(
    Path(target): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user =
        service::users::update_user(&app_state.db_client, &jwt.user, &target, body.into()).await?;

    tracing::info!("update_user successful");
    Ok(Json(SingleResponseDto::new(UserDto::from(user))))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_user(
    Path(target): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    service::users::delete_user(&app_state.db_client, &jwt.user, &target).await?;

    tracing::info!("delete_user successful");
    Ok(StatusCode::NO_CONTENT)
}
