use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier carried in tokens.
///
/// Opaque at this layer; the API maps roles to permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const CUSTOMER: &'static str = "customer";
    pub const OPS_MANAGER: &'static str = "ops_manager";
    pub const ADMIN: &'static str = "admin";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn customer() -> Self {
        Self::new(Self::CUSTOMER)
    }

    pub fn ops_manager() -> Self {
        Self::new(Self::OPS_MANAGER)
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ops managers and admins act on other customers' preorders.
    pub fn is_staff(&self) -> bool {
        matches!(self.as_str(), Self::OPS_MANAGER | Self::ADMIN)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
