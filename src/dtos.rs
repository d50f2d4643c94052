use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::db::{NewUser, UserChanges};
use crate::models::{Comment, Review, Taxon, Title, TitleFilter, User, UserRole};
use crate::service::catalog::{TitleChanges, TitleInput};
use crate::service::{Page, PageParams};
use crate::service::users::RESERVED_USERNAME;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid")
});

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

fn validate_not_reserved(username: &str) -> Result<(), ValidationError> {
    if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(ValidationError::new("reserved_username")
            .with_message("Username \"me\" is not allowed".into()));
    }
    Ok(())
}

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Signup request; the response echoes it back
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignupDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain only letters, digits and @/./+/-/_"),
        custom(function = "validate_not_reserved")
    )]
    pub username: String,

    #[validate(
        length(max = 254, message = "Email must be at most 254 characters"),
        email(message = "Email is invalid")
    )]
    pub email: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenRequestDto {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Confirmation code is required"))]
    pub confirmation_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub token: String,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

/// Generic list query parameters
#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct ListQueryDto {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    pub search: Option<String>,
}

impl ListQueryDto {
    pub fn page_params(&self) -> PageParams {
        page_params(self.page, self.limit)
    }
}

fn page_params(page: Option<u32>, limit: Option<u32>) -> PageParams {
    let defaults = PageParams::default();
    PageParams {
        page: page.unwrap_or(defaults.page),
        limit: limit.unwrap_or(defaults.limit),
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct ListResponseDto<T> {
    pub status: String,
    pub data: Vec<T>,
    pub pagination: PaginationDto,
}

impl<T> ListResponseDto<T> {
    pub fn from_page<U>(page: Page<U>, f: impl FnMut(U) -> T) -> Self {
        let pagination = PaginationDto {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        };
        ListResponseDto {
            status: "success".to_string(),
            data: page.map(f).items,
            pagination,
        }
    }
}

/// Single object response
#[derive(Debug, Serialize)]
pub struct SingleResponseDto<T> {
    pub status: String,
    pub data: T,
}

impl<T> SingleResponseDto<T> {
    pub fn new(data: T) -> Self {
        SingleResponseDto {
            status: "success".to_string(),
            data,
        }
    }
}

// ============================================================================
// User DTOs
// ============================================================================

/// Public account data (no internal id or activation state)
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        UserDto {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

/// Admin account creation
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain only letters, digits and @/./+/-/_"),
        custom(function = "validate_not_reserved")
    )]
    pub username: String,

    #[validate(
        length(max = 254, message = "Email must be at most 254 characters"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: String,

    #[serde(default)]
    pub bio: String,

    pub role: Option<UserRole>,
}

impl From<CreateUserDto> for NewUser {
    fn from(body: CreateUserDto) -> Self {
        NewUser {
            username: body.username,
            email: body.email,
            first_name: body.first_name,
            last_name: body.last_name,
            bio: body.bio,
            role: body.role.unwrap_or_default(),
            is_active: true,
        }
    }
}

/// Partial account update, used by `/users/me/` and the admin endpoints
///
/// `role` is accepted from anyone; for non-admins editing themselves it is
/// dropped before it reaches the store.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain only letters, digits and @/./+/-/_"),
        custom(function = "validate_not_reserved")
    )]
    pub username: Option<String>,

    #[validate(
        length(max = 254, message = "Email must be at most 254 characters"),
        email(message = "Email is invalid")
    )]
    pub email: Option<String>,

    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

impl From<UpdateUserDto> for UserChanges {
    fn from(body: UpdateUserDto) -> Self {
        UserChanges {
            username: body.username,
            email: body.email,
            first_name: body.first_name,
            last_name: body.last_name,
            bio: body.bio,
            role: body.role,
        }
    }
}

// ============================================================================
// Catalog DTOs
// ============================================================================

/// Category or genre as clients see it
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TaxonDto {
    pub name: String,
    pub slug: String,
}

impl From<Taxon> for TaxonDto {
    fn from(taxon: Taxon) -> Self {
        TaxonDto {
            name: taxon.name,
            slug: taxon.slug,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct InputTaxonDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters"),
        regex(path = *SLUG_RE, message = "Slug may contain only latin letters, digits, - and _")
    )]
    pub slug: String,
}

/// Title read payload: relations nested, rating derived
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TitleDto {
    pub id: i64,
    pub name: String,
    pub year: i16,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<TaxonDto>,
    pub category: Option<TaxonDto>,
}

impl From<Title> for TitleDto {
    fn from(title: Title) -> Self {
        TitleDto {
            id: title.id,
            name: title.name,
            year: title.year,
            rating: title.rating,
            description: title.description,
            genre: title.genres.into_iter().map(TaxonDto::from).collect(),
            category: title.category.map(TaxonDto::from),
        }
    }
}

/// Title write payload: relations by slug
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct InputTitleDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: String,

    pub year: i16,

    pub description: Option<String>,

    pub category: Option<String>,

    #[validate(length(min = 1, message = "At least one genre is required"))]
    pub genre: Vec<String>,
}

impl From<InputTitleDto> for TitleInput {
    fn from(body: InputTitleDto) -> Self {
        TitleInput {
            name: body.name,
            year: body.year,
            description: body.description,
            category: body.category,
            genre: body.genre,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateTitleDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: Option<String>,

    pub year: Option<i16>,

    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,

    #[validate(length(min = 1, message = "At least one genre is required"))]
    pub genre: Option<Vec<String>>,
}

/// Tell an explicit `null` (`Some(None)`) apart from an absent key (`None`)
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<UpdateTitleDto> for TitleChanges {
    fn from(body: UpdateTitleDto) -> Self {
        TitleChanges {
            name: body.name,
            year: body.year,
            description: body.description,
            category: body.category,
            genre: body.genre,
        }
    }
}

/// Title list query: pagination plus filters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TitleQueryDto {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    pub category: Option<String>, // Category slug
    pub genre: Option<String>,    // Genre slug
    pub name: Option<String>,     // Substring, case-insensitive
    pub year: Option<i16>,
}

impl TitleQueryDto {
    pub fn page_params(&self) -> PageParams {
        page_params(self.page, self.limit)
    }

    pub fn filter(&self) -> TitleFilter {
        TitleFilter {
            category: self.category.clone(),
            genre: self.genre.clone(),
            name: self.name.clone(),
            year: self.year,
        }
    }
}

// ============================================================================
// Review & Comment DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewDto {
    pub id: i64,
    pub text: String,
    pub author: String, // Author's username
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        ReviewDto {
            id: review.id,
            text: review.text,
            author: review.author,
            score: review.score,
            pub_date: review.pub_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InputReviewDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,

    pub score: i16, // 1..=10, checked in service::review
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReviewDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: Option<String>,

    pub score: Option<i16>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        CommentDto {
            id: comment.id,
            text: comment.text,
            author: comment.author,
            pub_date: comment.pub_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InputCommentDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,
}
