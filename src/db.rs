use sqlx::{Pool, Postgres};

mod user;
pub use user::{NewUser, UserChanges, UserExt};

mod taxonomy;
pub use taxonomy::TaxonomyExt;

mod title;
pub use title::TitleExt;

mod review;
pub use review::ReviewExt;

mod comment;
pub use comment::CommentExt;

#[cfg(test)]
pub mod memory;

pub const USERNAME_KEY: &str = "users_username_key";
pub const EMAIL_KEY: &str = "users_email_key";
pub const REVIEW_AUTHOR_TITLE_KEY: &str = "reviews_author_title_key";

/// Storage failures, classified so callers can tell a constraint firing from
/// a broken connection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: String },
    #[error("foreign key constraint `{constraint}` violated")]
    ForeignKeyViolation { constraint: String },
    #[error("row not found")]
    NotFound,
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                }
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                StoreError::ForeignKeyViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                }
            }
            other => StoreError::Sqlx(other),
        }
    }
}

/// Offset for a 1-based page number
pub(crate) fn page_offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Apply the embedded SQL migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}
