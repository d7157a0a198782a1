//! Type-safe entity identifiers.
//!
//! Every table uses a `BIGSERIAL` key. Each entity gets its own newtype
//! around the raw `i64` so that, say, a stand id can never be passed
//! where a user id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database key.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw database key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a user account.
    UserId
);
entity_id!(
    /// Identifier of a kermesse (event).
    KermesseId
);
entity_id!(
    /// Identifier of a stand.
    StandId
);
entity_id!(
    /// Identifier of an interaction record.
    InteractionId
);
entity_id!(
    /// Identifier of a tombola (raffle).
    TombolaId
);
entity_id!(
    /// Identifier of a tombola ticket.
    TicketId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_raw_key() {
        assert_eq!(UserId::new(42).to_string(), "42");
    }

    #[test]
    fn serializes_as_a_bare_number() {
        let Ok(json) = serde_json::to_string(&StandId::new(7)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "7");

        let Ok(id) = serde_json::from_str::<TicketId>("13") else {
            panic!("deserialization failed");
        };
        assert_eq!(id.get(), 13);
    }

    #[test]
    fn ordering_follows_the_raw_key() {
        assert!(TombolaId::new(1) < TombolaId::new(2));
        assert_eq!(i64::from(KermesseId::from(5)), 5);
    }
}
