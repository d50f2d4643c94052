use super::db_error;
use super::users::{check_username_allowed, user_store_error};
use crate::config::Config;
use crate::db::{NewUser, StoreError, UserExt};
use crate::error::{ErrorMessage, HttpError};
use crate::mail::Mailer;
use crate::models::User;
use crate::utils::{confirmation, token};

/// Register (or re-register) a username/email pair and mail a fresh code
///
/// Repeating a signup with the same pair reuses the existing account. A name
/// or address already bound to a different partner is rejected on `email`.
/// Mail delivery failures are logged; the signup itself still succeeds.
pub async fn signup<S: UserExt, M: Mailer>(
    store: &S,
    mailer: &M,
    config: &Config,
    username: &str,
    email: &str,
) -> Result<User, HttpError> {
    check_username_allowed(username)?;

    let user = match find_pair(store, username, email).await? {
        Some(existing) => existing,
        None => {
            let new_user = NewUser {
                username: username.to_string(),
                email: email.to_string(),
                is_active: config.signup_activates_user,
                ..Default::default()
            };
            match store.save_user(&new_user).await {
                Ok(user) => user,
                // A concurrent signup for the same pair won the insert
                Err(e @ StoreError::UniqueViolation { .. }) => {
                    match find_pair(store, username, email).await? {
                        Some(existing) => existing,
                        None => return Err(user_store_error("saving user")(e)),
                    }
                }
                Err(e) => return Err(db_error("saving user")(e)),
            }
        }
    };

    let code = confirmation::make_code(&user, config.confirmation_secret.as_bytes()).map_err(|e| {
        tracing::error!("Confirmation code error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    if let Err(e) = mailer
        .send_confirmation_code(&user.email, &user.username, &code)
        .await
    {
        tracing::error!("Failed to send confirmation email: {}", e);
    }

    Ok(user)
}

/// The account matching both fields, `None` when neither is registered, or a
/// validation error when only one of them is
async fn find_pair<S: UserExt>(
    store: &S,
    username: &str,
    email: &str,
) -> Result<Option<User>, HttpError> {
    let by_username = store
        .get_user(None, Some(username), None)
        .await
        .map_err(db_error("getting user by username"))?;

    if let Some(user) = by_username {
        if user.email == email {
            return Ok(Some(user));
        }
        return Err(HttpError::validation(
            "email",
            ErrorMessage::UsernameBoundToOtherEmail.to_string(),
        ));
    }

    let by_email = store
        .get_user(None, None, Some(email))
        .await
        .map_err(db_error("getting user by email"))?;

    match by_email {
        Some(_) => Err(HttpError::validation(
            "email",
            ErrorMessage::EmailBoundToOtherUsername.to_string(),
        )),
        None => Ok(None),
    }
}

/// Trade a confirmation code for an access token
///
/// Success activates the account and stamps `last_login`; since both feed
/// the code's MAC, the code cannot be used a second time.
pub async fn exchange_token<S: UserExt>(
    store: &S,
    config: &Config,
    username: &str,
    code: &str,
) -> Result<String, HttpError> {
    let user = store
        .get_user(None, Some(username), None)
        .await
        .map_err(db_error("getting user by username"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))?;

    let invalid_code = || {
        HttpError::validation(
            "confirmation_code",
            ErrorMessage::InvalidConfirmationCode.to_string(),
        )
    };

    if !confirmation::check_code(
        &user,
        code,
        config.confirmation_secret.as_bytes(),
        config.confirmation_code_maxage,
    ) {
        return Err(invalid_code());
    }

    // The row must still be in the state the code was checked against
    let user = store
        .confirm_user(&user)
        .await
        .map_err(db_error("confirming user"))?
        .ok_or_else(|| {
            tracing::warn!("Confirmation code already spent by a concurrent exchange");
            invalid_code()
        })?;

    token::create_token(
        &user.id.to_string(),
        config.jwt_secret.as_bytes(),
        config.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::mail::testing::RecordingMailer;
    use crate::models::UserRole;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn signup_then_token_exchange() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        let user = signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();
        assert!(!user.is_active);
        assert_eq!(user.role, UserRole::User);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "alice@example.com");

        let jwt = exchange_token(&store, &config, "alice", &sent[0].code)
            .await
            .unwrap();
        let subject = token::decode_token(jwt, config.jwt_secret.as_bytes()).unwrap();
        assert_eq!(subject, user.id.to_string());

        let stored = store
            .get_user(Some(user.id), None, None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_active);
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn code_works_only_once() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();
        let code = mailer.last_code().unwrap();

        exchange_token(&store, &config, "alice", &code).await.unwrap();
        let err = exchange_token(&store, &config, "alice", &code)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.contains_key("confirmation_code"));
    }

    #[tokio::test]
    async fn concurrent_exchanges_of_one_code_issue_one_token() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();
        let code = mailer.last_code().unwrap();

        // Both calls read the pending row before either confirms it
        let (first, second) = tokio::join!(
            exchange_token(&store, &config, "alice", &code),
            exchange_token(&store, &config, "alice", &code),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let err = outcomes.into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.contains_key("confirmation_code"));
    }

    #[tokio::test]
    async fn wrong_code_and_unknown_user() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();

        let err = exchange_token(&store, &config, "alice", "1a2b-deadbeef")
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.contains_key("confirmation_code"));

        let code = mailer.last_code().unwrap();
        let err = exchange_token(&store, &config, "nobody", &code)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn repeated_signup_reuses_the_account() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        let first = signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();
        let second = signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.user_count(), 1);
        assert_eq!(mailer.sent().len(), 2);

        // The resent code is as good as the first one
        let code = mailer.last_code().unwrap();
        exchange_token(&store, &config, "alice", &code).await.unwrap();
    }

    #[tokio::test]
    async fn conflicting_pairs_are_rejected_on_email() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();

        let err = signup(&store, &mailer, &config, "alice", "other@example.com")
            .await
            .unwrap_err();
        assert_eq!(
            err.errors.get("email"),
            Some(&vec![ErrorMessage::UsernameBoundToOtherEmail.to_string()])
        );

        let err = signup(&store, &mailer, &config, "mallory", "alice@example.com")
            .await
            .unwrap_err();
        assert_eq!(
            err.errors.get("email"),
            Some(&vec![ErrorMessage::EmailBoundToOtherUsername.to_string()])
        );
        assert_eq!(store.user_count(), 1);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn reserved_username_is_rejected() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();

        for name in ["me", "Me", "ME"] {
            let err = signup(&store, &mailer, &config, name, "me@example.com")
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert!(err.errors.contains_key("username"));
        }
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn activating_signup_variant() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config {
            signup_activates_user: true,
            ..Config::for_tests()
        };

        let user = signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_signup() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::failing();
        let config = Config::for_tests();

        let user = signup(&store, &mailer, &config, "alice", "alice@example.com")
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_signups_for_one_pair_create_one_account() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mailer = std::sync::Arc::new(RecordingMailer::default());
        let config = std::sync::Arc::new(Config::for_tests());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..5 {
            let (store, mailer, config) = (store.clone(), mailer.clone(), config.clone());
            tasks.spawn(async move {
                signup(&*store, &*mailer, &config, "alice", "alice@example.com")
                    .await
                    .map(|u| u.id)
            });
        }

        let mut ids = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            ids.push(joined.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.user_count(), 1);
    }
}
