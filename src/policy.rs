//! Role-based authorization.
//!
//! One decision function covers every endpoint: who is asking (possibly
//! nobody), what they want to do, and to what kind of resource.

use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_safe(&self) -> bool {
        matches!(self, Action::Read)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Categories, genres and titles
    Catalog,
    /// Accounts other than the requester's own
    Users,
    /// The requester's own profile
    SelfProfile,
    /// Reviews and comments; `author_id` is `None` when the object does not
    /// exist yet (creation)
    Authored { author_id: Option<Uuid> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No credentials on an action that needs them (401)
    Unauthenticated,
    /// Credentials present but role or ownership insufficient (403)
    Forbidden,
}

impl From<Denial> for HttpError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => {
                HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string())
            }
            Denial::Forbidden => HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()),
        }
    }
}

pub fn authorize(
    requester: Option<&User>,
    action: Action,
    resource: Resource,
) -> Result<(), Denial> {
    // Public reads need no identity at all
    if action.is_safe() && matches!(resource, Resource::Catalog | Resource::Authored { .. }) {
        return Ok(());
    }

    let user = requester.ok_or(Denial::Unauthenticated)?;

    let allowed = match resource {
        Resource::Catalog | Resource::Users => user.is_admin(),
        Resource::SelfProfile => true,
        Resource::Authored { author_id } => match action {
            Action::Read | Action::Create => true,
            Action::Update | Action::Delete => {
                author_id == Some(user.id) || user.is_moderator() || user.is_admin()
            }
        },
    };

    if allowed { Ok(()) } else { Err(Denial::Forbidden) }
}
