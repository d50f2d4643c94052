use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::User,
    utils::token,
};

/// Middleware extension that stores authenticated user information
///
/// This struct is inserted into the request extensions after successful authentication.
/// Subsequent handlers can extract this to access the authenticated user's data.
///
/// Example usage in a handler:
/// ```text
/// async fn my_handler(Extension(jwt): Extension<JWTAuthMiddleware>) {
///     // Access jwt.user here
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Pull the bearer token from the `access_token` cookie, falling back to the
/// `Authorization: Bearer <token>` header
fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
}

/// Authentication middleware that validates JWT tokens
///
/// Role and ownership checks happen later, in the services; this layer only
/// establishes who is calling.
///
/// # Errors
/// Returns 401 Unauthorized if:
/// - No token is provided
/// - Token is invalid or expired
/// - User no longer exists in database
/// - User has not activated the account yet
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    // Signature and expiry
    let token_details = token::decode_token(token, app_state.env.jwt_secret.as_bytes())
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user_id = uuid::Uuid::parse_str(&token_details)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting token user: {}", e);
            HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string())
        })?;

    // The account was deleted after the token was issued
    let user =
        user.ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    if !user.is_active {
        return Err(HttpError::unauthorized(
            ErrorMessage::UserInactive.to_string(),
        ));
    }

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum_extra::extract::cookie::Cookie;

    fn request(authorization: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_header_is_read() {
        let jar = CookieJar::new();
        assert_eq!(
            extract_token(&jar, &request(Some("Bearer abc.def"))),
            Some("abc.def".to_string())
        );
        assert_eq!(extract_token(&jar, &request(Some("Basic abc"))), None);
        assert_eq!(extract_token(&jar, &request(None)), None);
    }

    #[test]
    fn cookie_wins_over_header() {
        let jar = CookieJar::new().add(Cookie::new("access_token", "from-cookie"));
        assert_eq!(
            extract_token(&jar, &request(Some("Bearer from-header"))),
            Some("from-cookie".to_string())
        );
    }
}
