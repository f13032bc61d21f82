//! API-side authorization guard.
//!
//! Permissions are checked at the HTTP boundary before a service is called.
//! The services themselves only see an [`eafoods_preorders::Actor`].

use eafoods_auth::{AuthzError, CommandAuthorization, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

/// Check that the caller holds every permission `command` requires.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal {
        user_id: principal.user_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Static role → permission table. Unknown roles grant nothing.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut perms = Vec::new();
    for role in roles {
        let granted: &[&'static str] = match role.as_str() {
            Role::ADMIN => &[Permission::WILDCARD],
            Role::OPS_MANAGER => &[
                Permission::PRODUCTS_CREATE,
                Permission::STOCK_UPDATE,
                Permission::PREORDERS_CONFIRM,
                Permission::PREORDERS_CANCEL,
                Permission::SLOTS_LIST,
                Permission::REPORTS_READ,
            ],
            Role::CUSTOMER => &[Permission::PREORDERS_CREATE, Permission::PREORDERS_CANCEL],
            _ => &[],
        };
        perms.extend(granted.iter().map(|p| Permission::new(*p)));
    }
    perms.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    perms.dedup_by(|a, b| a.as_str() == b.as_str());
    perms
}
