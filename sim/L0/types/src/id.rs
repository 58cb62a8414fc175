//! Stable handles into the world's body and constraint arenas.
//!
//! Handles are handed out in increasing order and never reused, so a stale
//! handle is always detectable.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw arena index.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw arena index.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

arena_handle!(
    /// Handle to a rigid body.
    BodyId,
    "Body"
);

arena_handle!(
    /// Handle to a registered joint or persistent contact.
    ConstraintId,
    "Constraint"
);
