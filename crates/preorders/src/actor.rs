use serde::{Deserialize, Serialize};

use eafoods_core::UserId;

/// What kind of caller is acting on a preorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Customer,
    /// Ops managers and admins.
    Staff,
}

/// Authenticated caller, passed explicitly into every lifecycle operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub kind: ActorKind,
}

impl Actor {
    pub fn customer(id: UserId) -> Self {
        Self {
            id,
            kind: ActorKind::Customer,
        }
    }

    pub fn staff(id: UserId) -> Self {
        Self {
            id,
            kind: ActorKind::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.kind == ActorKind::Staff
    }
}
