//! Domain model: identifiers, entities, and the appointment lifecycle.

pub mod entities;
pub mod ids;
pub mod status;

pub use entities::{Account, Actor, Appointment, Consultation, DoctorProfile, Pet, Role};
pub use ids::{AccountId, AppointmentId, BillId, ConsultationId, DoctorId, PetId};
pub use status::AppointmentStatus;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Names the kind of entity an error or audit record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    DoctorProfile,
    Pet,
    Appointment,
    Consultation,
    Bill,
}
