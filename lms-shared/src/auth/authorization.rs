/// Access policy for courses, lessons and user accounts
///
/// Pure functions: no I/O, no clock. Callers load the target first and pass
/// its owner ID; list endpoints ask [`list_scope`] how to filter before
/// querying.
///
/// # Course and lesson matrix
///
/// | Action            | Owner   | Moderator | Other         | Anonymous |
/// |-------------------|---------|-----------|---------------|-----------|
/// | list              | own     | all       | own           | denied    |
/// | create            | allowed | denied    | allowed       | denied    |
/// | retrieve / update | allowed | allowed   | denied        | denied    |
/// | delete            | allowed | denied    | denied        | denied    |
///
/// A moderator who also owns an entity still cannot create or delete.
///
/// # Example
///
/// ```
/// use lms_shared::auth::actor::{Actor, Principal, Role};
/// use lms_shared::auth::authorization::{authorize, Action, AccessError};
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let moderator = Actor::Authenticated(Principal {
///     user_id: Uuid::new_v4(),
///     role: Role::Moderator,
///     is_staff: false,
///     is_superuser: false,
/// });
///
/// assert!(authorize(&moderator, Action::Update, Some(owner)).is_ok());
/// assert_eq!(
///     authorize(&moderator, Action::Delete, Some(owner)),
///     Err(AccessError::Forbidden)
/// );
/// assert_eq!(
///     authorize(&Actor::Anonymous, Action::Retrieve, Some(owner)),
///     Err(AccessError::Unauthorized)
/// );
/// ```

use uuid::Uuid;

use super::actor::{Actor, Principal};

/// Error type for access checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No authenticated actor
    #[error("Authentication credentials were not provided")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("You do not have permission to perform this action")]
    Forbidden,
}

/// Operation on a course or lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    Delete,
}

/// Row filter for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Unfiltered
    All,

    /// Only rows owned by this user
    OwnedBy(Uuid),
}

impl ListScope {
    /// Owner filter for queries; None means unfiltered
    pub fn owner_filter(&self) -> Option<Uuid> {
        match self {
            ListScope::All => None,
            ListScope::OwnedBy(user_id) => Some(*user_id),
        }
    }
}

fn require_principal(actor: &Actor) -> Result<&Principal, AccessError> {
    actor.principal().ok_or(AccessError::Unauthorized)
}

fn is_owner(principal: &Principal, owner_id: Option<Uuid>) -> bool {
    owner_id == Some(principal.user_id)
}

/// Decides whether `actor` may perform `action` on an entity owned by `owner_id`
///
/// `owner_id` is the owner of the concrete target for item actions and is
/// ignored for `List` and `Create`. An entity whose owner was removed
/// (`None`) is owned by nobody.
pub fn authorize(actor: &Actor, action: Action, owner_id: Option<Uuid>) -> Result<(), AccessError> {
    let principal = require_principal(actor)?;
    let moderator = principal.role.is_moderator();

    let allowed = match action {
        Action::List => true,
        Action::Create => !moderator,
        Action::Retrieve | Action::Update => moderator || is_owner(principal, owner_id),
        Action::Delete => !moderator && is_owner(principal, owner_id),
    };

    if allowed {
        Ok(())
    } else {
        Err(AccessError::Forbidden)
    }
}

/// Filter applied to course and lesson listings
pub fn list_scope(actor: &Actor) -> Result<ListScope, AccessError> {
    let principal = require_principal(actor)?;

    if principal.role.is_moderator() {
        Ok(ListScope::All)
    } else {
        Ok(ListScope::OwnedBy(principal.user_id))
    }
}

/// Filter applied to payment listings (same rule as courses)
pub fn payment_scope(actor: &Actor) -> Result<ListScope, AccessError> {
    list_scope(actor)
}

/// Whether `actor` may edit or deactivate the account `target_user_id`
///
/// Users manage their own account; staff and superusers manage every account.
pub fn authorize_account(actor: &Actor, target_user_id: Uuid) -> Result<(), AccessError> {
    let principal = require_principal(actor)?;

    if principal.user_id == target_user_id || principal.is_admin() {
        Ok(())
    } else {
        Err(AccessError::Forbidden)
    }
}

/// Any authenticated actor
pub fn require_authenticated(actor: &Actor) -> Result<&Principal, AccessError> {
    require_principal(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::actor::Role;

    fn actor(user_id: Uuid, role: Role) -> Actor {
        Actor::Authenticated(Principal {
            user_id,
            role,
            is_staff: false,
            is_superuser: false,
        })
    }

    const ITEM_ACTIONS: [Action; 3] = [Action::Retrieve, Action::Update, Action::Delete];

    #[test]
    fn test_anonymous_denied_everything() {
        let owner = Uuid::new_v4();
        for action in [Action::List, Action::Create, Action::Retrieve, Action::Update, Action::Delete] {
            assert_eq!(
                authorize(&Actor::Anonymous, action, Some(owner)),
                Err(AccessError::Unauthorized)
            );
        }
        assert_eq!(list_scope(&Actor::Anonymous), Err(AccessError::Unauthorized));
    }

    #[test]
    fn test_owner_can_do_everything_on_own_entity() {
        let owner = Uuid::new_v4();
        let me = actor(owner, Role::Member);

        assert!(authorize(&me, Action::Create, None).is_ok());
        for action in ITEM_ACTIONS {
            assert!(authorize(&me, action, Some(owner)).is_ok(), "{:?}", action);
        }
        assert_eq!(list_scope(&me), Ok(ListScope::OwnedBy(owner)));
    }

    #[test]
    fn test_moderator_updates_but_never_creates_or_deletes() {
        let moderator = actor(Uuid::new_v4(), Role::Moderator);
        let someone_else = Some(Uuid::new_v4());

        assert!(authorize(&moderator, Action::Retrieve, someone_else).is_ok());
        assert!(authorize(&moderator, Action::Update, someone_else).is_ok());
        assert_eq!(authorize(&moderator, Action::Create, None), Err(AccessError::Forbidden));
        assert_eq!(
            authorize(&moderator, Action::Delete, someone_else),
            Err(AccessError::Forbidden)
        );
        assert_eq!(list_scope(&moderator), Ok(ListScope::All));
    }

    #[test]
    fn test_moderator_owner_still_cannot_delete() {
        let user_id = Uuid::new_v4();
        let moderator = actor(user_id, Role::Moderator);

        assert_eq!(
            authorize(&moderator, Action::Delete, Some(user_id)),
            Err(AccessError::Forbidden)
        );
    }

    #[test]
    fn test_other_user_cannot_touch_foreign_entity() {
        let other = actor(Uuid::new_v4(), Role::Member);
        let owner = Some(Uuid::new_v4());

        for action in ITEM_ACTIONS {
            assert_eq!(authorize(&other, action, owner), Err(AccessError::Forbidden));
        }
        assert!(authorize(&other, Action::Create, None).is_ok());
    }

    #[test]
    fn test_orphaned_entity_has_no_owner() {
        let member = actor(Uuid::new_v4(), Role::Member);
        let moderator = actor(Uuid::new_v4(), Role::Moderator);

        for action in ITEM_ACTIONS {
            assert_eq!(authorize(&member, action, None), Err(AccessError::Forbidden));
        }
        assert!(authorize(&moderator, Action::Update, None).is_ok());
    }

    #[test]
    fn test_account_management() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(authorize_account(&actor(me, Role::Member), me).is_ok());
        assert_eq!(
            authorize_account(&actor(me, Role::Member), other),
            Err(AccessError::Forbidden)
        );
        assert_eq!(
            authorize_account(&actor(me, Role::Moderator), other),
            Err(AccessError::Forbidden)
        );

        let staff = Actor::Authenticated(Principal {
            user_id: me,
            role: Role::Member,
            is_staff: true,
            is_superuser: false,
        });
        assert!(authorize_account(&staff, other).is_ok());
        assert_eq!(authorize_account(&Actor::Anonymous, me), Err(AccessError::Unauthorized));
    }
}
