use eafoods_auth::Role;
use eafoods_core::UserId;
use eafoods_preorders::Actor;

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// The caller as seen by the services: staff if any role is a staff role.
    pub fn actor(&self) -> Actor {
        if self.roles.iter().any(Role::is_staff) {
            Actor::staff(self.user_id)
        } else {
            Actor::customer(self.user_id)
        }
    }
}
