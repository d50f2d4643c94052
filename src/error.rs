use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

/// Field name used for errors that are not tied to a single input field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Error response structure sent to clients
///
/// Example JSON response:
/// ```text
/// {
///   "status": "fail",
///   "message": "Validation failed",
///   "errors": { "email": ["Email is already registered to another username"] }
/// }
/// ```
///
/// `errors` is only present for validation and uniqueness failures, where the
/// client needs to know which field was rejected.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Enumeration of the fixed, user-facing error messages
///
/// Keeping them in one enum means a handler cannot drift from the wording the
/// rest of the API uses, and tests can compare against `to_string()`.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    UserNoLongerExist,
    UserInactive,

    // Authorization errors
    PermissionDenied,

    // Signup / token exchange
    ForbiddenUsername,
    UsernameBoundToOtherEmail,
    EmailBoundToOtherUsername,
    InvalidConfirmationCode,

    // Uniqueness
    UsernameTaken,
    EmailTaken,
    SlugTaken,
    DuplicateReview,

    // Lookup
    UserNotFound,
    CategoryNotFound,
    GenreNotFound,
    TitleNotFound,
    ReviewNotFound,
    CommentNotFound,

    // Content validation
    ScoreOutOfRange(i16, i16),
    YearOutOfRange(i16, i32),
    EmptyGenreList,

    ValidationFailed,
    FieldRequired,
    MalformedRequest,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::UserInactive => "User account is not active".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::ForbiddenUsername => "Username \"me\" is not allowed".to_string(),
            ErrorMessage::UsernameBoundToOtherEmail => {
                "This username is registered with a different email".to_string()
            }
            ErrorMessage::EmailBoundToOtherUsername => {
                "Email is already registered to another username".to_string()
            }
            ErrorMessage::InvalidConfirmationCode => "Invalid confirmation code".to_string(),
            ErrorMessage::UsernameTaken => "A user with that username already exists".to_string(),
            ErrorMessage::EmailTaken => "A user with that email already exists".to_string(),
            ErrorMessage::SlugTaken => "An entry with this slug already exists".to_string(),
            ErrorMessage::DuplicateReview => {
                "Cannot submit two reviews for one title".to_string()
            }
            ErrorMessage::UserNotFound => "User not found".to_string(),
            ErrorMessage::CategoryNotFound => "Category not found".to_string(),
            ErrorMessage::GenreNotFound => "Genre not found".to_string(),
            ErrorMessage::TitleNotFound => "Title not found".to_string(),
            ErrorMessage::ReviewNotFound => "Review not found".to_string(),
            ErrorMessage::CommentNotFound => "Comment not found".to_string(),
            ErrorMessage::ScoreOutOfRange(min, max) => {
                format!("Score must be between {} and {}", min, max)
            }
            ErrorMessage::YearOutOfRange(min, max) => {
                format!("Year must be between {} and {}", min, max)
            }
            ErrorMessage::EmptyGenreList => "At least one genre is required".to_string(),
            ErrorMessage::ValidationFailed => "Validation failed".to_string(),
            ErrorMessage::FieldRequired => "This field is required.".to_string(),
            ErrorMessage::MalformedRequest => "Request could not be parsed".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers and services return `Result<T, HttpError>`; axum turns the error
/// into a JSON response through `IntoResponse`. Status codes travel with the
/// message so the two cannot disagree.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            errors: BTreeMap::new(),
        }
    }

    /// 500 Internal Server Error
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    /// 400 Bad Request naming the rejected field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.clone()]);
        HttpError {
            message,
            status: StatusCode::BAD_REQUEST,
            errors,
        }
    }

    /// 400 Bad Request built from `validator` derive output
    pub fn from_validation(validation: &ValidationErrors) -> Self {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, field_errors) in validation.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            errors.insert(field.to_string(), messages);
        }
        HttpError {
            message: ErrorMessage::ValidationFailed.to_string(),
            status: StatusCode::BAD_REQUEST,
            errors,
        }
    }

    /// Uniqueness conflict (duplicate username, email, slug, review).
    ///
    /// Reported as a field-level validation failure so that a conflict caught by
    /// the storage constraint looks exactly like one caught by a pre-check.
    pub fn unique_constraint_violation(field: impl Into<String>, message: impl Into<String>) -> Self {
        HttpError::validation(field, message)
    }

    /// 401 Unauthorized (unauthenticated)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403 Forbidden (authenticated, insufficient role or ownership)
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message,
            errors: self.errors,
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
