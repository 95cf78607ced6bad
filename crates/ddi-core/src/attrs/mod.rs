//! Extensible attributes
//!
//! - [`value`]: the `Value` union and order-insensitive comparison
//! - [`codec`]: operator-facing / wire conversion and identity stripping

pub mod codec;
pub mod value;

pub use value::{AttributeMap, Value, ValueKind, attributes_equivalent, values_equivalent};
