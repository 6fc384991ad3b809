//! Scheduling workflow service.
//!
//! The façade callers go through. Every operation takes the caller's
//! resolved [`Actor`] explicitly — there is no ambient "current user" —
//! and follows the same shape:
//!
//! 1. load the target and resolve its ownership chain,
//! 2. ask the guard, before any mutation is attempted,
//! 3. apply the change through the appointment state machine or the
//!    billing ledger,
//! 4. commit through the store's atomic, version-checked batch,
//! 5. leave an audit record either way.
//!
//! Consultation completion is the one multi-write operation: the
//! consultation, its bill, and the `Completed` status go into a single
//! batch, so no reader ever observes a partial outcome.

use crate::audit::{AuditOutcome, AuditRecord, AuditTrail};
use crate::billing::{self, Bill};
use crate::config::ServiceConfig;
use crate::domain::{
    AccountId, Actor, Appointment, AppointmentId, AppointmentStatus, BillId, Consultation,
    DoctorId, EntityKind, PetId, Role,
};
use crate::error::{SchedulingError, SchedulingResult};
use crate::guard::{AccessPolicy, AccessRequest, Operation};
use crate::store::{ClinicDirectory, SchedulingStore, StoreError, Versioned, WriteBatch};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::info;

/// Input for booking a new appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub pet_id: PetId,
    pub doctor_id: DoctorId,
    pub scheduled_at: DateTime<Utc>,
    pub description: Option<String>,
}

/// Input for the consultation completion transaction.
#[derive(Debug, Clone)]
pub struct CompleteConsultation {
    pub appointment_id: AppointmentId,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub service_cost: Decimal,
}

/// Everything the completion transaction produced.
#[derive(Debug, Clone)]
pub struct CompletedVisit {
    pub appointment: Appointment,
    pub consultation: Consultation,
    pub bill: Bill,
}

/// The client home dashboard.
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    pub outstanding_total: Decimal,
    pub pet_count: usize,
    pub next_appointment: Option<Appointment>,
    /// Last three completed visits, newest first.
    pub recent_visits: Vec<Appointment>,
}

pub struct SchedulingService {
    store: Arc<dyn SchedulingStore>,
    directory: Arc<dyn ClinicDirectory>,
    guard: AccessPolicy,
    config: ServiceConfig,
    audit: AuditTrail,
}

impl SchedulingService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        directory: Arc<dyn ClinicDirectory>,
        config: ServiceConfig,
    ) -> Self {
        let audit = if config.audit_enabled {
            AuditTrail::new(config.audit_capacity)
        } else {
            AuditTrail::disabled()
        };
        Self { store, directory, guard: AccessPolicy::standard(), config, audit }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Books an appointment for one of the actor's pets. Always starts
    /// `Pending`, whatever the caller asks for.
    pub async fn create_appointment(
        &self,
        actor: &Actor,
        input: NewAppointment,
    ) -> SchedulingResult<Appointment> {
        let result = self.create_appointment_inner(actor, &input).await;
        let entity_id = match &result {
            Ok(appointment) => appointment.id.to_string(),
            Err(_) => format!("pet {}", input.pet_id),
        };
        self.record_audit(actor, Operation::CreateAppointment, EntityKind::Appointment, entity_id, &result);
        result.map_err(SchedulingError::track)
    }

    async fn create_appointment_inner(
        &self,
        actor: &Actor,
        input: &NewAppointment,
    ) -> SchedulingResult<Appointment> {
        let pet = self.store.pet(input.pet_id).await.map_err(SchedulingError::from_store)?;
        let doctor = self
            .directory
            .doctor_profile(input.doctor_id)
            .await
            .map_err(SchedulingError::from_store)?;
        if doctor.is_none() {
            return Err(SchedulingError::not_found(EntityKind::DoctorProfile, input.doctor_id));
        }

        let request = AccessRequest::new(actor, Operation::CreateAppointment)
            .pet_owner(Some(pet.record.owner))
            .assigned_doctor(Some(input.doctor_id))
            .actor_profile(self.actor_profile(actor).await?);
        self.guard.check(&request)?;

        let appointment = Appointment::book(
            input.pet_id,
            input.doctor_id,
            input.scheduled_at,
            input.description.clone(),
        );
        self.store
            .insert_appointment(appointment.clone())
            .await
            .map_err(SchedulingError::from_store)?;
        info!(
            appointment = %appointment.id,
            pet = %appointment.pet_id,
            doctor = %appointment.doctor_id,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// The client's answer to a proposed reschedule: accepting moves the
    /// appointment to `Accepted` at the proposed time, rejecting closes
    /// it as `Refused`.
    pub async fn respond_to_reschedule(
        &self,
        actor: &Actor,
        id: AppointmentId,
        accept: bool,
    ) -> SchedulingResult<Appointment> {
        let result = self.respond_to_reschedule_inner(actor, id, accept).await;
        self.record_audit(
            actor,
            Operation::RespondToReschedule,
            EntityKind::Appointment,
            id.to_string(),
            &result,
        );
        result.map_err(SchedulingError::track)
    }

    async fn respond_to_reschedule_inner(
        &self,
        actor: &Actor,
        id: AppointmentId,
        accept: bool,
    ) -> SchedulingResult<Appointment> {
        let (mut appointment, owner) = self.appointment_with_owner(id).await?;
        let request = AccessRequest::new(actor, Operation::RespondToReschedule)
            .pet_owner(owner)
            .assigned_doctor(Some(appointment.record.doctor_id))
            .actor_profile(self.actor_profile(actor).await?);
        self.guard.check(&request)?;

        let target =
            if accept { AppointmentStatus::Accepted } else { AppointmentStatus::Refused };
        appointment.record.transition_to(target)?;
        self.commit_appointment(&appointment).await?;
        info!(appointment = %id, accepted = accept, "reschedule answered");
        Ok(appointment.record)
    }

    /// Admin decision on a pending booking: confirm (`Accepted`) or deny
    /// (`Refused`). `Completed` and `RescheduleProposed` have dedicated
    /// operations and are rejected here.
    pub async fn admin_set_status(
        &self,
        actor: &Actor,
        id: AppointmentId,
        target: AppointmentStatus,
    ) -> SchedulingResult<Appointment> {
        let result = self.admin_set_status_inner(actor, id, target).await;
        self.record_audit(actor, Operation::SetStatus, EntityKind::Appointment, id.to_string(), &result);
        result.map_err(SchedulingError::track)
    }

    async fn admin_set_status_inner(
        &self,
        actor: &Actor,
        id: AppointmentId,
        target: AppointmentStatus,
    ) -> SchedulingResult<Appointment> {
        let (mut appointment, owner) = self.appointment_with_owner(id).await?;
        let request = AccessRequest::new(actor, Operation::SetStatus)
            .pet_owner(owner)
            .assigned_doctor(Some(appointment.record.doctor_id))
            .actor_profile(self.actor_profile(actor).await?);
        self.guard.check(&request)?;

        match target {
            AppointmentStatus::Accepted | AppointmentStatus::Refused => {}
            AppointmentStatus::Completed => {
                return Err(SchedulingError::Validation(
                    "completion requires a consultation; use complete_consultation".into(),
                ));
            }
            AppointmentStatus::RescheduleProposed => {
                return Err(SchedulingError::Validation(
                    "a reschedule proposal needs a new time; use propose_reschedule".into(),
                ));
            }
            AppointmentStatus::Pending => {
                return Err(SchedulingError::Validation(
                    "pending is the initial status, not a transition target".into(),
                ));
            }
        }

        appointment.record.transition_to(target)?;
        self.commit_appointment(&appointment).await?;
        info!(appointment = %id, status = %target, "status set");
        Ok(appointment.record)
    }

    /// Admin proposes a new time for a pending booking. The new time and
    /// the `RescheduleProposed` status are applied as one operation.
    pub async fn propose_reschedule(
        &self,
        actor: &Actor,
        id: AppointmentId,
        new_time: DateTime<Utc>,
    ) -> SchedulingResult<Appointment> {
        let result = self.propose_reschedule_inner(actor, id, new_time).await;
        self.record_audit(
            actor,
            Operation::ProposeReschedule,
            EntityKind::Appointment,
            id.to_string(),
            &result,
        );
        result.map_err(SchedulingError::track)
    }

    async fn propose_reschedule_inner(
        &self,
        actor: &Actor,
        id: AppointmentId,
        new_time: DateTime<Utc>,
    ) -> SchedulingResult<Appointment> {
        let (mut appointment, owner) = self.appointment_with_owner(id).await?;
        let request = AccessRequest::new(actor, Operation::ProposeReschedule)
            .pet_owner(owner)
            .assigned_doctor(Some(appointment.record.doctor_id))
            .actor_profile(self.actor_profile(actor).await?);
        self.guard.check(&request)?;

        appointment.record.propose_reschedule(new_time)?;
        self.commit_appointment(&appointment).await?;
        info!(appointment = %id, proposed = %new_time, "reschedule proposed");
        Ok(appointment.record)
    }

    /// The completion transaction: records the consultation, derives the
    /// bill, and marks the appointment `Completed` — atomically.
    pub async fn complete_consultation(
        &self,
        actor: &Actor,
        input: CompleteConsultation,
    ) -> SchedulingResult<CompletedVisit> {
        let result = self.complete_consultation_inner(actor, &input).await;
        self.record_audit(
            actor,
            Operation::CompleteConsultation,
            EntityKind::Appointment,
            input.appointment_id.to_string(),
            &result,
        );
        result.map_err(SchedulingError::track)
    }

    async fn complete_consultation_inner(
        &self,
        actor: &Actor,
        input: &CompleteConsultation,
    ) -> SchedulingResult<CompletedVisit> {
        let (appointment, owner) = self.appointment_with_owner(input.appointment_id).await?;
        let request = AccessRequest::new(actor, Operation::CompleteConsultation)
            .pet_owner(owner)
            .assigned_doctor(Some(appointment.record.doctor_id))
            .actor_profile(self.actor_profile(actor).await?);
        self.guard.check(&request)?;

        let consultation = Consultation::new(
            input.appointment_id,
            input.diagnosis.clone(),
            input.treatment.clone(),
            input.notes.clone(),
            input.service_cost,
        )?;
        let bill = Bill::for_consultation(&consultation);

        let mut updated = appointment.record.clone();
        updated.complete(consultation.id, self.config.completion)?;

        let batch = WriteBatch::new()
            .insert_consultation(consultation.clone())
            .insert_bill(bill.clone())
            .put_appointment(Versioned::new(appointment.version, updated.clone()));
        self.store.commit(batch).await.map_err(|err| match err {
            // A concurrent completion got there first; its consultation
            // already occupies the 1:1 slot.
            StoreError::UniqueViolation { kind: EntityKind::Consultation, .. } => {
                SchedulingError::AlreadyCompleted(input.appointment_id)
            }
            other => SchedulingError::from_store(other),
        })?;

        info!(
            appointment = %updated.id,
            consultation = %consultation.id,
            bill = %bill.id,
            cost = %consultation.service_cost,
            "consultation recorded and billed"
        );
        Ok(CompletedVisit { appointment: updated, consultation, bill })
    }

    /// Admin marks a bill paid, stamping the payment date. One-way.
    pub async fn mark_bill_paid(&self, actor: &Actor, id: BillId) -> SchedulingResult<Bill> {
        let result = self.mark_bill_paid_inner(actor, id).await;
        self.record_audit(actor, Operation::MarkBillPaid, EntityKind::Bill, id.to_string(), &result);
        result.map_err(SchedulingError::track)
    }

    async fn mark_bill_paid_inner(&self, actor: &Actor, id: BillId) -> SchedulingResult<Bill> {
        let bill = self.store.bill(id).await.map_err(SchedulingError::from_store)?;
        let request = AccessRequest::new(actor, Operation::MarkBillPaid);
        self.guard.check(&request)?;

        let mut updated = bill.record.clone();
        updated.mark_paid(Utc::now())?;
        self.store
            .commit(WriteBatch::new().put_bill(Versioned::new(bill.version, updated.clone())))
            .await
            .map_err(SchedulingError::from_store)?;
        info!(bill = %id, "bill marked paid");
        Ok(updated)
    }

    /// Admin removes an appointment entirely; the store cascades the
    /// deletion to any linked consultation and bill.
    pub async fn delete_appointment(&self, actor: &Actor, id: AppointmentId) -> SchedulingResult<()> {
        let result = self.delete_appointment_inner(actor, id).await;
        self.record_audit(actor, Operation::DeleteAppointment, EntityKind::Appointment, id.to_string(), &result);
        result.map_err(SchedulingError::track)
    }

    async fn delete_appointment_inner(
        &self,
        actor: &Actor,
        id: AppointmentId,
    ) -> SchedulingResult<()> {
        let request = AccessRequest::new(actor, Operation::DeleteAppointment);
        self.guard.check(&request)?;
        self.store.delete_appointment(id).await.map_err(SchedulingError::from_store)?;
        info!(appointment = %id, "appointment deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Detail read of one appointment; owner, assigned doctor, or admin.
    pub async fn appointment(
        &self,
        actor: &Actor,
        id: AppointmentId,
    ) -> SchedulingResult<Appointment> {
        let (appointment, owner) = self
            .appointment_with_owner(id)
            .await
            .map_err(SchedulingError::track)?;
        let request = AccessRequest::new(actor, Operation::ReadAppointment)
            .pet_owner(owner)
            .assigned_doctor(Some(appointment.record.doctor_id))
            .actor_profile(self.actor_profile(actor).await?);
        self.guard.check(&request).map_err(SchedulingError::track)?;
        Ok(appointment.record)
    }

    /// The actor's appointment list: clients see their own pets'
    /// bookings, doctors their schedule, admins everything. Sorted by
    /// scheduled time.
    pub async fn appointments_for(&self, actor: &Actor) -> SchedulingResult<Vec<Appointment>> {
        let rows = if actor.is_admin() {
            self.store.appointments().await
        } else if let Some(doctor) = self.actor_profile(actor).await? {
            self.store.appointments_for_doctor(doctor).await
        } else {
            self.store.appointments_for_owner(actor.account_id).await
        }
        .map_err(|err| SchedulingError::from_store(err).track())?;

        let mut list: Vec<Appointment> = rows.into_iter().map(|row| row.record).collect();
        list.sort_by_key(|appointment| appointment.scheduled_at());
        Ok(list)
    }

    /// Detail read of one bill; the pet's owner or an admin.
    pub async fn bill(&self, actor: &Actor, id: BillId) -> SchedulingResult<Bill> {
        let bill = self
            .store
            .bill(id)
            .await
            .map_err(|err| SchedulingError::from_store(err).track())?;
        let owner = self.resolve_bill_owner(&bill.record).await?;
        let request = AccessRequest::new(actor, Operation::ReadBill).pet_owner(owner);
        self.guard.check(&request).map_err(SchedulingError::track)?;
        Ok(bill.record)
    }

    /// The actor's bills: clients get their own (broken chains skipped),
    /// admins get the full ledger.
    pub async fn bills_for(&self, actor: &Actor) -> SchedulingResult<Vec<Bill>> {
        let rows = if actor.is_admin() {
            self.store.bills().await
        } else {
            self.store.bills_for_owner(actor.account_id).await
        }
        .map_err(|err| SchedulingError::from_store(err).track())?;

        let mut list: Vec<Bill> = rows.into_iter().map(|row| row.record).collect();
        list.sort_by_key(|bill| bill.id);
        Ok(list)
    }

    /// The client home dashboard: outstanding balance, pet count, next
    /// upcoming appointment, and the last three completed visits.
    pub async fn dashboard(&self, actor: &Actor) -> SchedulingResult<DashboardSummary> {
        let now = Utc::now();
        let bills = self
            .store
            .bills_for_owner(actor.account_id)
            .await
            .map_err(|err| SchedulingError::from_store(err).track())?;
        let outstanding_total = billing::outstanding_total(bills.iter().map(|row| &row.record));

        let pet_count = self
            .store
            .pets_for_owner(actor.account_id)
            .await
            .map_err(|err| SchedulingError::from_store(err).track())?
            .len();

        let appointments: Vec<Appointment> = self
            .store
            .appointments_for_owner(actor.account_id)
            .await
            .map_err(|err| SchedulingError::from_store(err).track())?
            .into_iter()
            .map(|row| row.record)
            .collect();

        let next_appointment = appointments
            .iter()
            .filter(|appointment| appointment.scheduled_at() > now)
            .min_by_key(|appointment| appointment.scheduled_at())
            .cloned();

        // A visit is history once the consultation exists, even if it was
        // scheduled for later today.
        let mut recent_visits: Vec<Appointment> = appointments
            .into_iter()
            .filter(|appointment| appointment.consultation().is_some())
            .collect();
        recent_visits.sort_by_key(|appointment| Reverse(appointment.scheduled_at()));
        recent_visits.truncate(3);

        Ok(DashboardSummary { outstanding_total, pet_count, next_appointment, recent_visits })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The actor's own doctor profile id, when they hold the Doctor role.
    async fn actor_profile(&self, actor: &Actor) -> SchedulingResult<Option<DoctorId>> {
        if !actor.has_role(Role::Doctor) {
            return Ok(None);
        }
        let profile = self
            .directory
            .doctor_profile_for_account(actor.account_id)
            .await
            .map_err(SchedulingError::from_store)?;
        Ok(profile.map(|profile| profile.id))
    }

    async fn appointment_with_owner(
        &self,
        id: AppointmentId,
    ) -> SchedulingResult<(Versioned<Appointment>, Option<AccountId>)> {
        let appointment =
            self.store.appointment(id).await.map_err(SchedulingError::from_store)?;
        let owner = self.resolve_pet_owner(appointment.record.pet_id).await?;
        Ok((appointment, owner))
    }

    /// Owner behind a pet id; `None` when the link is broken, which the
    /// guard reads as deny.
    async fn resolve_pet_owner(&self, pet_id: PetId) -> SchedulingResult<Option<AccountId>> {
        match self.store.pet(pet_id).await {
            Ok(pet) => Ok(Some(pet.record.owner)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(other) => Err(SchedulingError::Storage(other)),
        }
    }

    /// Owner chain behind a bill; `None` as soon as any link is missing.
    async fn resolve_bill_owner(&self, bill: &Bill) -> SchedulingResult<Option<AccountId>> {
        let consultation = match self.store.consultation(bill.consultation_id).await {
            Ok(consultation) => consultation,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(other) => return Err(SchedulingError::Storage(other)),
        };
        let appointment = match self.store.appointment(consultation.record.appointment_id).await
        {
            Ok(appointment) => appointment,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(other) => return Err(SchedulingError::Storage(other)),
        };
        self.resolve_pet_owner(appointment.record.pet_id).await
    }

    async fn commit_appointment(
        &self,
        appointment: &Versioned<Appointment>,
    ) -> SchedulingResult<()> {
        self.store
            .commit(
                WriteBatch::new().put_appointment(Versioned::new(
                    appointment.version,
                    appointment.record.clone(),
                )),
            )
            .await
            .map_err(SchedulingError::from_store)
    }

    fn record_audit<T>(
        &self,
        actor: &Actor,
        operation: Operation,
        entity: EntityKind,
        entity_id: String,
        result: &SchedulingResult<T>,
    ) {
        let outcome = match result {
            Ok(_) => AuditOutcome::Applied,
            Err(SchedulingError::Forbidden(reason)) => {
                AuditOutcome::Denied { reason: reason.to_string() }
            }
            Err(err) => AuditOutcome::Rejected { error: err.to_string() },
        };
        self.audit.record(AuditRecord {
            at: Utc::now(),
            actor: actor.account_id,
            operation,
            entity,
            entity_id,
            outcome,
        });
    }
}
