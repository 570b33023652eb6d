//! Strongly-typed identifiers.
//!
//! Cache partition keys and tenant labels are distinct concepts that are
//! both "just strings" on the wire; newtypes keep them from being swapped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed string newtype wrapper.
///
/// Generates: struct, `new()`, `as_str()`, Display, Serialize, Deserialize.
macro_rules! define_key {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_key!(TenantKey);
define_key!(TenantId);
