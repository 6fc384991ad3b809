//! The appointment lifecycle state machine.
//!
//! The transition table below is the single source of truth for which
//! status moves are legal. Everything that mutates an appointment's
//! status routes through it; there is no raw setter anywhere in the
//! crate.

use crate::error::SchedulingError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle states of an appointment.
///
/// `Refused` and `Completed` are terminal. There is no separate
/// cancelled state: a client rejecting a reschedule proposal closes the
/// appointment as `Refused` and books a fresh one.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Refused,
    RescheduleProposed,
    Completed,
}

impl AppointmentStatus {
    /// Legal next states from this one.
    pub fn allowed_transitions(self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Pending => &[Accepted, Refused, RescheduleProposed],
            Accepted => &[Completed],
            RescheduleProposed => &[Accepted, Refused],
            Refused | Completed => &[],
        }
    }

    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Refused | AppointmentStatus::Completed)
    }

    /// Maps the integer codes the legacy schema stored.
    ///
    /// Anything outside the known range is a validation failure, never a
    /// blind cast.
    pub fn from_legacy_code(code: i16) -> Result<Self, SchedulingError> {
        match code {
            0 => Ok(AppointmentStatus::Pending),
            1 => Ok(AppointmentStatus::Accepted),
            2 => Ok(AppointmentStatus::Refused),
            3 => Ok(AppointmentStatus::Completed),
            4 => Ok(AppointmentStatus::RescheduleProposed),
            other => Err(SchedulingError::Validation(format!(
                "unknown appointment status code {other}"
            ))),
        }
    }

    pub fn legacy_code(self) -> i16 {
        match self {
            AppointmentStatus::Pending => 0,
            AppointmentStatus::Accepted => 1,
            AppointmentStatus::Refused => 2,
            AppointmentStatus::Completed => 3,
            AppointmentStatus::RescheduleProposed => 4,
        }
    }
}
