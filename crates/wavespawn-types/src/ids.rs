//! Type-safe integer identifier wrappers.
//!
//! Entity type numbers and rule numbers both arrive as plain integers in the
//! rule table. Wrapping them keeps a rule id from ever being handed to the
//! game loop as something to instantiate.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u32` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of an entity type the game loop knows how to instantiate
    /// (the `enemy_no` column of the rule table).
    EntityTypeId
}

define_id! {
    /// Identifier of a spawn rule. Unique within a snapshot, used only for
    /// logs and diagnostics.
    RuleId
}
