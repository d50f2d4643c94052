use super::{Page, PageParams, db_error};
use crate::db::{EMAIL_KEY, NewUser, StoreError, USERNAME_KEY, UserChanges, UserExt};
use crate::error::{ErrorMessage, HttpError};
use crate::models::User;
use crate::policy::{Action, Resource, authorize};

/// Username reserved for the `/users/me/` route
pub const RESERVED_USERNAME: &str = "me";

pub fn check_username_allowed(username: &str) -> Result<(), HttpError> {
    if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(HttpError::validation(
            "username",
            ErrorMessage::ForbiddenUsername.to_string(),
        ));
    }
    Ok(())
}

/// Translate account storage failures; uniqueness conflicts name the field
pub(crate) fn user_store_error(context: &'static str) -> impl FnOnce(StoreError) -> HttpError {
    move |e| {
        if e.is_unique_violation_of(USERNAME_KEY) {
            tracing::warn!("Conflict, {}, unique_violation: {}", context, e);
            HttpError::unique_constraint_violation(
                "username",
                ErrorMessage::UsernameTaken.to_string(),
            )
        } else if e.is_unique_violation_of(EMAIL_KEY) {
            tracing::warn!("Conflict, {}, unique_violation: {}", context, e);
            HttpError::unique_constraint_violation("email", ErrorMessage::EmailTaken.to_string())
        } else if matches!(e, StoreError::NotFound) {
            HttpError::not_found(ErrorMessage::UserNotFound.to_string())
        } else {
            db_error(context)(e)
        }
    }
}

/// Apply a self-service profile edit
///
/// Only admins may change their own role; for everyone else a `role` in the
/// request is dropped and the stored role stays as it is.
pub async fn update_me<S: UserExt>(
    store: &S,
    requester: &User,
    mut changes: UserChanges,
) -> Result<User, HttpError> {
    authorize(Some(requester), Action::Update, Resource::SelfProfile)?;

    if !requester.is_admin() && changes.role.take().is_some() {
        tracing::debug!(username = %requester.username, "Ignoring role change in self edit");
    }
    if let Some(username) = &changes.username {
        check_username_allowed(username)?;
    }

    store
        .update_user(requester.id, &changes)
        .await
        .map_err(user_store_error("updating own profile"))
}

pub async fn list_users<S: UserExt>(
    store: &S,
    requester: &User,
    params: PageParams,
    search: Option<&str>,
) -> Result<Page<User>, HttpError> {
    authorize(Some(requester), Action::Read, Resource::Users)?;

    let items = store
        .get_users(params.page, params.limit, search)
        .await
        .map_err(db_error("getting users"))?;
    let total = store
        .get_user_count(search)
        .await
        .map_err(db_error("getting user count"))?;

    Ok(Page {
        items,
        page: params.page,
        limit: params.limit,
        total,
    })
}

/// Admin account creation; such accounts are active immediately
pub async fn create_user<S: UserExt>(
    store: &S,
    requester: &User,
    mut new_user: NewUser,
) -> Result<User, HttpError> {
    authorize(Some(requester), Action::Create, Resource::Users)?;
    check_username_allowed(&new_user.username)?;

    new_user.is_active = true;
    store
        .save_user(&new_user)
        .await
        .map_err(user_store_error("saving user"))
}

async fn find_by_username<S: UserExt>(store: &S, username: &str) -> Result<User, HttpError> {
    store
        .get_user(None, Some(username), None)
        .await
        .map_err(db_error("getting user by username"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))
}

pub async fn get_user<S: UserExt>(
    store: &S,
    requester: &User,
    username: &str,
) -> Result<User, HttpError> {
    authorize(Some(requester), Action::Read, Resource::Users)?;
    find_by_username(store, username).await
}

pub async fn update_user<S: UserExt>(
    store: &S,
    requester: &User,
    username: &str,
    changes: UserChanges,
) -> Result<User, HttpError> {
    authorize(Some(requester), Action::Update, Resource::Users)?;
    if let Some(new_username) = &changes.username {
        check_username_allowed(new_username)?;
    }

    let target = find_by_username(store, username).await?;
    store
        .update_user(target.id, &changes)
        .await
        .map_err(user_store_error("updating user"))
}

pub async fn delete_user<S: UserExt>(
    store: &S,
    requester: &User,
    username: &str,
) -> Result<(), HttpError> {
    authorize(Some(requester), Action::Delete, Resource::Users)?;

    let target = find_by_username(store, username).await?;
    store
        .delete_user(target.id)
        .await
        .map_err(user_store_error("deleting user"))
}
