use serde::{Deserialize, Serialize};

use eafoods_core::{DomainError, DomainResult, ValueObject};

/// Validated delivery address.
///
/// Must contain at least one letter and only letters, digits, whitespace and
/// `,` `.` `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeliveryAddress(String);

impl ValueObject for DeliveryAddress {}

impl DeliveryAddress {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let address = raw.trim();
        if address.is_empty() {
            return Err(DomainError::validation("delivery address cannot be empty"));
        }
        if !address.chars().any(char::is_alphabetic) {
            return Err(DomainError::validation(
                "delivery address must contain at least one letter",
            ));
        }
        if !address
            .chars()
            .all(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, ',' | '.' | '-'))
        {
            return Err(DomainError::validation(
                "delivery address can only contain letters, numbers, spaces, and ,.-",
            ));
        }
        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeliveryAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeliveryAddress> for String {
    fn from(value: DeliveryAddress) -> Self {
        value.0
    }
}

impl core::fmt::Display for DeliveryAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
