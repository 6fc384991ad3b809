//! Core entities.
//!
//! Entities reference each other by id, never by containment. The
//! `Appointment` keeps its status and consultation link private so the
//! state-machine methods are the only mutation path; everything else is
//! plain data.

use crate::config::CompletionPolicy;
use crate::domain::ids::{AccountId, AppointmentId, ConsultationId, DoctorId, PetId};
use crate::domain::status::AppointmentStatus;
use crate::error::SchedulingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{Display, EnumString};

/// Roles the user directory can assign to an account.
///
/// A plain authenticated client holds no special role at all; `Client`
/// exists so the directory can tag non-staff accounts explicitly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Role {
    Client,
    Doctor,
    Admin,
}

/// The resolved identity making a request.
///
/// Always passed explicitly into service calls; the core never reaches
/// for an ambient "current user".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub account_id: AccountId,
    pub roles: HashSet<Role>,
}

impl Actor {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id, roles: HashSet::new() }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

impl From<&Account> for Actor {
    fn from(account: &Account) -> Self {
        Self { account_id: account.id, roles: account.roles.clone() }
    }
}

/// An account as the external directory reports it. Role membership is
/// owned by the directory; the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub roles: HashSet<Role>,
}

/// Professional profile backing a doctor account (1:1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: DoctorId,
    pub account_id: AccountId,
    pub specialization: String,
    pub bio: String,
}

/// A client's animal. Referenced, not owned, by appointments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub owner: AccountId,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub age_years: u32,
    pub weight_kg: f64,
}

/// A booked appointment.
///
/// `status`, `consultation`, and `scheduled_at` are private: the only
/// way they change is through [`transition_to`](Appointment::transition_to),
/// [`propose_reschedule`](Appointment::propose_reschedule), and
/// [`complete`](Appointment::complete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub pet_id: PetId,
    pub doctor_id: DoctorId,
    pub description: Option<String>,
    scheduled_at: DateTime<Utc>,
    status: AppointmentStatus,
    consultation: Option<ConsultationId>,
}

impl Appointment {
    /// Books a new appointment. Bookings always start `Pending`,
    /// whatever the caller might wish for.
    pub fn book(
        pet_id: PetId,
        doctor_id: DoctorId,
        scheduled_at: DateTime<Utc>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: AppointmentId::generate(),
            pet_id,
            doctor_id,
            description,
            scheduled_at,
            status: AppointmentStatus::Pending,
            consultation: None,
        }
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn consultation(&self) -> Option<ConsultationId> {
        self.consultation
    }

    /// Applies a plain status transition from the table.
    ///
    /// `Completed` and `RescheduleProposed` are not reachable here:
    /// completion must carry a consultation and a reschedule proposal
    /// must carry the new time, so each has its own entry point.
    pub fn transition_to(&mut self, target: AppointmentStatus) -> Result<(), SchedulingError> {
        match target {
            AppointmentStatus::Completed => Err(SchedulingError::Validation(
                "an appointment is completed by recording a consultation, not by a status edit"
                    .into(),
            )),
            AppointmentStatus::RescheduleProposed => Err(SchedulingError::Validation(
                "a reschedule proposal must carry the new date-time".into(),
            )),
            target if self.status.can_transition_to(target) => {
                self.status = target;
                Ok(())
            }
            target => {
                Err(SchedulingError::InvalidTransition { from: self.status, to: target })
            }
        }
    }

    /// Moves to `RescheduleProposed`, applying the proposed time and the
    /// status change as one operation.
    pub fn propose_reschedule(&mut self, new_time: DateTime<Utc>) -> Result<(), SchedulingError> {
        if !self.status.can_transition_to(AppointmentStatus::RescheduleProposed) {
            return Err(SchedulingError::InvalidTransition {
                from: self.status,
                to: AppointmentStatus::RescheduleProposed,
            });
        }
        self.scheduled_at = new_time;
        self.status = AppointmentStatus::RescheduleProposed;
        Ok(())
    }

    /// Moves to `Completed`, linking the consultation that closes the
    /// appointment. Which source states are eligible depends on the
    /// clinic's [`CompletionPolicy`].
    pub fn complete(
        &mut self,
        consultation: ConsultationId,
        policy: CompletionPolicy,
    ) -> Result<(), SchedulingError> {
        match self.status {
            AppointmentStatus::Completed => Err(SchedulingError::AlreadyCompleted(self.id)),
            AppointmentStatus::Refused => Err(SchedulingError::InvalidTransition {
                from: AppointmentStatus::Refused,
                to: AppointmentStatus::Completed,
            }),
            AppointmentStatus::Accepted => {
                self.finish(consultation);
                Ok(())
            }
            AppointmentStatus::Pending | AppointmentStatus::RescheduleProposed => match policy {
                CompletionPolicy::AnyOpen => {
                    self.finish(consultation);
                    Ok(())
                }
                CompletionPolicy::AcceptedOnly => Err(SchedulingError::InvalidTransition {
                    from: self.status,
                    to: AppointmentStatus::Completed,
                }),
            },
        }
    }

    fn finish(&mut self, consultation: ConsultationId) {
        self.status = AppointmentStatus::Completed;
        self.consultation = Some(consultation);
    }
}

/// Medical record produced when a doctor closes out an appointment.
/// Created exactly once per appointment and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: ConsultationId,
    pub appointment_id: AppointmentId,
    pub diagnosis: String,
    pub treatment: Option<String>,
    /// Doctor-private notes, never shown to the client.
    pub notes: Option<String>,
    pub service_cost: Decimal,
}

impl Consultation {
    pub fn new(
        appointment_id: AppointmentId,
        diagnosis: impl Into<String>,
        treatment: Option<String>,
        notes: Option<String>,
        service_cost: Decimal,
    ) -> Result<Self, SchedulingError> {
        let diagnosis = diagnosis.into();
        if diagnosis.trim().is_empty() {
            return Err(SchedulingError::Validation("diagnosis must not be empty".into()));
        }
        if service_cost.is_sign_negative() {
            return Err(SchedulingError::Validation(format!(
                "service cost must not be negative (got {service_cost})"
            )));
        }
        Ok(Self {
            id: ConsultationId::generate(),
            appointment_id,
            diagnosis,
            treatment,
            notes,
            service_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn appointment() -> Appointment {
        Appointment::book(
            PetId::generate(),
            DoctorId::generate(),
            Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap(),
            None,
        )
    }

    #[test]
    fn bookings_start_pending() {
        let appt = appointment();
        assert_eq!(appt.status(), AppointmentStatus::Pending);
        assert!(appt.consultation().is_none());
    }

    #[test]
    fn illegal_transition_leaves_status_unchanged() {
        let mut appt = appointment();
        appt.transition_to(AppointmentStatus::Refused).unwrap();
        let err = appt.transition_to(AppointmentStatus::Accepted).unwrap_err();
        assert_matches!(
            err,
            SchedulingError::InvalidTransition {
                from: AppointmentStatus::Refused,
                to: AppointmentStatus::Accepted
            }
        );
        assert_eq!(appt.status(), AppointmentStatus::Refused);
    }

    #[test]
    fn completion_is_not_reachable_through_a_status_edit() {
        let mut appt = appointment();
        appt.transition_to(AppointmentStatus::Accepted).unwrap();
        assert_matches!(
            appt.transition_to(AppointmentStatus::Completed),
            Err(SchedulingError::Validation(_))
        );
        assert_eq!(appt.status(), AppointmentStatus::Accepted);
    }

    #[test]
    fn propose_reschedule_moves_status_and_time_together() {
        let mut appt = appointment();
        let new_time = Utc.with_ymd_and_hms(2026, 3, 20, 15, 30, 0).unwrap();
        appt.propose_reschedule(new_time).unwrap();
        assert_eq!(appt.status(), AppointmentStatus::RescheduleProposed);
        assert_eq!(appt.scheduled_at(), new_time);
    }

    #[test]
    fn propose_reschedule_rejected_outside_pending() {
        let mut appt = appointment();
        let original_time = appt.scheduled_at();
        appt.transition_to(AppointmentStatus::Accepted).unwrap();
        let err = appt.propose_reschedule(original_time + chrono::Duration::days(1)).unwrap_err();
        assert_matches!(err, SchedulingError::InvalidTransition { .. });
        assert_eq!(appt.scheduled_at(), original_time);
    }

    #[test]
    fn completion_policy_gates_pending_appointments() {
        let consultation = ConsultationId::generate();

        let mut strict = appointment();
        assert_matches!(
            strict.complete(consultation, CompletionPolicy::AcceptedOnly),
            Err(SchedulingError::InvalidTransition { .. })
        );
        assert_eq!(strict.status(), AppointmentStatus::Pending);

        let mut lenient = appointment();
        lenient.complete(consultation, CompletionPolicy::AnyOpen).unwrap();
        assert_eq!(lenient.status(), AppointmentStatus::Completed);
        assert_eq!(lenient.consultation(), Some(consultation));
    }

    #[test]
    fn completing_twice_reports_already_completed() {
        let mut appt = appointment();
        appt.transition_to(AppointmentStatus::Accepted).unwrap();
        appt.complete(ConsultationId::generate(), CompletionPolicy::AcceptedOnly).unwrap();
        assert_matches!(
            appt.complete(ConsultationId::generate(), CompletionPolicy::AnyOpen),
            Err(SchedulingError::AlreadyCompleted(_))
        );
    }

    #[test]
    fn refused_appointments_never_complete() {
        let mut appt = appointment();
        appt.transition_to(AppointmentStatus::Refused).unwrap();
        assert_matches!(
            appt.complete(ConsultationId::generate(), CompletionPolicy::AnyOpen),
            Err(SchedulingError::InvalidTransition { .. })
        );
    }

    #[test]
    fn consultation_requires_a_diagnosis_and_non_negative_cost() {
        let appt = AppointmentId::generate();
        assert_matches!(
            Consultation::new(appt, "  ", None, None, Decimal::new(4500, 2)),
            Err(SchedulingError::Validation(_))
        );
        assert_matches!(
            Consultation::new(appt, "Otitis", None, None, Decimal::new(-1, 2)),
            Err(SchedulingError::Validation(_))
        );
        let ok = Consultation::new(appt, "Otitis", Some("Ear drops".into()), None, Decimal::ZERO)
            .unwrap();
        assert_eq!(ok.appointment_id, appt);
    }
}
