/// Request actors and roles
///
/// Every request is made by an [`Actor`]: either nobody ([`Actor::Anonymous`])
/// or an active user described by a [`Principal`]. The principal's [`Role`]
/// comes from group membership and is looked up once per request through
/// [`Role::lookup`]; nothing else in the codebase inspects group names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Directory, StoreResult};

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Member of the `moderators` group
    Moderator,

    /// Everyone else
    Member,
}

impl Role {
    /// Resolves the role of a user
    pub async fn lookup<D>(directory: &D, user_id: Uuid) -> StoreResult<Role>
    where
        D: Directory + ?Sized,
    {
        directory.role_of(user_id).await
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self, Role::Moderator)
    }
}

/// Authenticated, active user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Principal {
    /// Staff or superuser
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Identity making a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Actor {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl Actor {
    /// Builds the actor for a token subject
    ///
    /// Missing or inactive users resolve to [`Actor::Anonymous`].
    pub async fn resolve<D>(directory: &D, user_id: Uuid) -> StoreResult<Actor>
    where
        D: Directory + ?Sized,
    {
        let Some(flags) = directory.active_account(user_id).await? else {
            return Ok(Actor::Anonymous);
        };

        let role = Role::lookup(directory, user_id).await?;

        Ok(Actor::Authenticated(Principal {
            user_id,
            role,
            is_staff: flags.is_staff,
            is_superuser: flags.is_superuser,
        }))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated(principal) => Some(principal),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.principal().map(|p| p.user_id)
    }
}
