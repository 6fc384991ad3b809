//! Identifier newtypes.
//!
//! Every entity id is a distinct wrapper around `Uuid` so that an
//! `AppointmentId` can never be handed to a function expecting a
//! `BillId`. The wrappers are zero-cost and serialize transparently.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mints a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identity of an account in the external user directory.
    AccountId
);
entity_id!(
    /// Identity of a doctor profile, distinct from the doctor's account.
    DoctorId
);
entity_id!(PetId);
entity_id!(AppointmentId);
entity_id!(ConsultationId);
entity_id!(BillId);
