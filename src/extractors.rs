//! Request extractors that deserialize and validate in one step, so every
//! malformed body or query string is answered with the same 400 field map
//! as a `validator` failure.

use std::sync::LazyLock;

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{ErrorMessage, HttpError, NON_FIELD_ERRORS};

static MISSING_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"missing field `([^`]+)`").expect("missing field pattern is valid"));

// "<context>: <field>[.<rest>|[<i>]...]: <detail>[ at line L column C]"
static FIELD_DETAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:]+: ([A-Za-z_]\w*)(?:[.\[][^:]*)?: (.+?)(?: at line \d+ column \d+)?$")
        .expect("field detail pattern is valid")
});

/// Turn a serde failure reported by axum into a field-level 400
fn deserialize_error(body_text: &str) -> HttpError {
    if let Some(caps) = MISSING_FIELD_RE.captures(body_text) {
        return HttpError::validation(&caps[1], ErrorMessage::FieldRequired.to_string());
    }
    if let Some(caps) = FIELD_DETAIL_RE.captures(body_text) {
        return HttpError::validation(&caps[1], caps[2].to_string());
    }
    HttpError::validation(NON_FIELD_ERRORS, ErrorMessage::MalformedRequest.to_string())
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("Rejected JSON body: {}", rejection.body_text());
        match rejection {
            JsonRejection::JsonDataError(e) => deserialize_error(&e.body_text()),
            JsonRejection::JsonSyntaxError(_) => {
                HttpError::validation(NON_FIELD_ERRORS, ErrorMessage::MalformedRequest.to_string())
            }
            // Wrong content type or unreadable body keep their own status
            other => HttpError::new(other.body_text(), other.status()),
        }
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::warn!("Rejected query string: {}", rejection.body_text());
        deserialize_error(&rejection.body_text())
    }
}

/// JSON body that has passed `Validate`
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;

        value.validate().map_err(|e| {
            tracing::warn!("Invalid request body: {}", e);
            HttpError::from_validation(&e)
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Query string that has passed `Validate`
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;

        value.validate().map_err(|e| {
            tracing::warn!("Invalid query parameters: {}", e);
            HttpError::from_validation(&e)
        })?;

        Ok(ValidatedQuery(value))
    }
}
