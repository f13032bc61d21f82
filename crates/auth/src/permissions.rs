use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"stock.update"`.
///
/// `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: &'static str = "*";
    pub const PRODUCTS_CREATE: &'static str = "products.create";
    pub const STOCK_UPDATE: &'static str = "stock.update";
    pub const PREORDERS_CREATE: &'static str = "preorders.create";
    pub const PREORDERS_CONFIRM: &'static str = "preorders.confirm";
    pub const PREORDERS_CANCEL: &'static str = "preorders.cancel";
    pub const SLOTS_LIST: &'static str = "slots.list";
    pub const REPORTS_READ: &'static str = "reports.read";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == Self::WILDCARD
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
