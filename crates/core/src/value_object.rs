//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: a delivery address
/// or a stock window has no identity of its own. To "modify" one, build a new one.
///
/// Constructors of value objects are expected to validate their input, so a
/// value that exists is a valid value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
