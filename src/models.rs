use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest accepted review score (inclusive)
pub const SCORE_MIN: i16 = 1;
/// Highest accepted review score (inclusive)
pub const SCORE_MAX: i16 = 10;
/// Year of the first film; titles cannot be released before it
pub const FIRST_FILM_YEAR: i16 = 1895;

/// User role enumeration for role-based access control (RBAC)
///
/// Stored in PostgreSQL as the `user_role` ENUM; variants are lowercased in
/// both the database and JSON (`Moderator` -> `"moderator"`).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User, // Reads everything, writes own reviews and comments
    Moderator, // May edit or delete anyone's reviews and comments
    Admin,     // Full access, including catalog and accounts
}

/// User model representing the users table
///
/// Accounts are created either by signup (pending until the confirmation code
/// is exchanged, unless signup is configured to activate immediately) or by an
/// administrator. There is no password: possession of the registered email is
/// proven with a confirmation code.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
    pub is_superuser: bool, // Implies admin regardless of role
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>, // Set on every successful token exchange
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == UserRole::Moderator
    }
}

/// Which name/slug table an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Category,
    Genre,
}

impl Taxonomy {
    pub fn table(&self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Genre => "genres",
        }
    }

    pub fn slug_constraint(&self) -> &'static str {
        match self {
            Taxonomy::Category => "categories_slug_key",
            Taxonomy::Genre => "genres_slug_key",
        }
    }
}

/// A category or genre: a display name plus a unique URL slug
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Taxon {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Title with its relations resolved
///
/// `rating` is never stored; it is the mean of the title's review scores,
/// aggregated on every read, and `None` while the title has no reviews.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i16,
    pub description: Option<String>,
    pub category: Option<Taxon>,
    pub genres: Vec<Taxon>,
    pub rating: Option<f64>,
}

/// Fully resolved column values for inserting or replacing a title
#[derive(Debug, Clone, PartialEq)]
pub struct TitleDraft {
    pub name: String,
    pub year: i16,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

/// Title list filters; every `None` matches everything
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i16>,
}

/// Review joined with its author's username
///
/// At most one review exists per (author_id, title_id); the
/// `reviews_author_title_key` constraint is the authority on that.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    pub title_id: i64,
    pub author_id: Uuid,
    pub author: String,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

/// Comment joined with its author's username
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub review_id: i64,
    pub author_id: Uuid,
    pub author: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}
