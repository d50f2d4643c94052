use super::{DBClient, StoreError, page_offset};
use crate::models::{User, UserRole};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, is_superuser, is_active, last_login, date_joined";

/// Column values for a new account
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
    pub is_active: bool,
}

/// Partial profile update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<UserRole>,
}

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID, username or email (first `Some` wins)
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    /// Get a page of users ordered by username, optionally filtered by a
    /// username substring
    async fn get_users(
        &self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Vec<User>, StoreError>;

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, StoreError>;

    async fn save_user(&self, new_user: &NewUser) -> Result<User, StoreError>;

    async fn update_user(&self, user_id: Uuid, changes: &UserChanges) -> Result<User, StoreError>;

    async fn delete_user(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Record a successful token exchange: activate the account and stamp
    /// `last_login`, which also invalidates every outstanding confirmation code
    ///
    /// Only applies while `is_active` and `last_login` still hold the values in
    /// `seen`; returns `None` when another exchange got there first.
    async fn confirm_user(&self, seen: &User) -> Result<Option<User>, StoreError>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
            ))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::text IS NULL OR strpos(lower(username), lower($1)) > 0)
            ORDER BY username
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(search)
        .bind(i64::from(limit))
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL OR strpos(lower(username), lower($1)) > 0)
            "#,
        )
        .bind(search)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, bio, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.bio)
        .bind(new_user.role)
        .bind(new_user.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, changes: &UserChanges) -> Result<User, StoreError> {
        // COALESCE keeps the stored value for every field the caller left out
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                bio = COALESCE($5, bio),
                role = COALESCE($6, role)
            WHERE id = $7
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.bio.as_deref())
        .bind(changes.role)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn confirm_user(&self, seen: &User) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_active = TRUE, last_login = NOW()
            WHERE id = $1
              AND is_active = $2
              AND last_login IS NOT DISTINCT FROM $3
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(seen.id)
        .bind(seen.is_active)
        .bind(seen.last_login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
