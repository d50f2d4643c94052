use crate::{
    AppState,
    dtos::{SignupDto, TokenRequestDto, TokenResponseDto},
    error::HttpError,
    extractors::ValidatedJson,
    service,
};
use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;

/// Router for the signup and token endpoints (no authentication)
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", post(signup))
        .route("/auth/token/", post(obtain_token))
}

/// Register a username/email pair and email a confirmation code
///
/// Safe to repeat with the same pair: a new code is sent for the existing
/// account. The code itself is never part of the response.
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn signup(
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = service::signup::signup(
        &app_state.db_client,
        &app_state.mail_client,
        &app_state.env,
        &body.username,
        &body.email,
    )
    .await?;

    tracing::info!("Signup successful");
    Ok(Json(SignupDto {
        username: user.username,
        email: user.email,
    }))
}

/// Exchange a confirmation code for an access token
///
/// The token is returned in the body and also set as the `access_token`
/// cookie for browser clients.
#[instrument(skip(app_state, cookie_jar, body), fields(username = %body.username))]
pub async fn obtain_token(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<TokenRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    let token = service::signup::exchange_token(
        &app_state.db_client,
        &app_state.env,
        &body.username,
        &body.confirmation_code,
    )
    .await?;

    let access_cookie = Cookie::build(("access_token", token.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .build();

    tracing::info!("Token issued");
    Ok((
        cookie_jar.add(access_cookie),
        Json(TokenResponseDto { token }),
    ))
}
