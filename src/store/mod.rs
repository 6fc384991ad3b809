//! Persistence and identity ports.
//!
//! The core talks to its external collaborators through these traits.
//! All writes flow through a [`WriteBatch`]: every update op carries the
//! version it was read at, and a commit applies the whole batch or none
//! of it. That one primitive supplies both the optimistic-concurrency
//! discipline and the atomicity the completion transaction depends on.

pub mod memory;

pub use memory::{InMemoryDirectory, InMemoryStore, StoreStats};

use crate::billing::Bill;
use crate::domain::{
    Account, AccountId, Appointment, AppointmentId, BillId, Consultation, ConsultationId,
    DoctorId, DoctorProfile, EntityKind, Pet, PetId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Monotonic per-row version used for optimistic concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub fn initial() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A row together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: Version,
    pub record: T,
}

impl<T> Versioned<T> {
    pub fn new(version: Version, record: T) -> Self {
        Self { version, record }
    }
}

/// Infrastructure-level failures, distinct from the domain taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} version conflict: wrote at {expected}, stored is {found}")]
    VersionConflict { kind: EntityKind, id: String, expected: Version, found: Version },

    #[error("a {kind} already exists for {constraint} {id}")]
    UniqueViolation { kind: EntityKind, constraint: &'static str, id: String },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }
}

/// One write in a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Version-checked update of an existing appointment.
    PutAppointment(Versioned<Appointment>),
    /// Insert of a new consultation; unique per appointment.
    InsertConsultation(Consultation),
    /// Insert of a new bill; unique per consultation.
    InsertBill(Bill),
    /// Version-checked update of an existing bill.
    PutBill(Versioned<Bill>),
}

/// A set of writes that commit together or not at all.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_appointment(mut self, appointment: Versioned<Appointment>) -> Self {
        self.ops.push(WriteOp::PutAppointment(appointment));
        self
    }

    pub fn insert_consultation(mut self, consultation: Consultation) -> Self {
        self.ops.push(WriteOp::InsertConsultation(consultation));
        self
    }

    pub fn insert_bill(mut self, bill: Bill) -> Self {
        self.ops.push(WriteOp::InsertBill(bill));
        self
    }

    pub fn put_bill(mut self, bill: Versioned<Bill>) -> Self {
        self.ops.push(WriteOp::PutBill(bill));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Persistence port for the scheduling core.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn pet(&self, id: PetId) -> Result<Versioned<Pet>, StoreError>;
    async fn pets_for_owner(&self, owner: AccountId) -> Result<Vec<Versioned<Pet>>, StoreError>;

    async fn appointment(&self, id: AppointmentId) -> Result<Versioned<Appointment>, StoreError>;
    async fn appointments(&self) -> Result<Vec<Versioned<Appointment>>, StoreError>;
    async fn appointments_for_owner(
        &self,
        owner: AccountId,
    ) -> Result<Vec<Versioned<Appointment>>, StoreError>;
    async fn appointments_for_doctor(
        &self,
        doctor: DoctorId,
    ) -> Result<Vec<Versioned<Appointment>>, StoreError>;

    async fn consultation(
        &self,
        id: ConsultationId,
    ) -> Result<Versioned<Consultation>, StoreError>;
    async fn consultation_for_appointment(
        &self,
        appointment: AppointmentId,
    ) -> Result<Option<Versioned<Consultation>>, StoreError>;

    async fn bill(&self, id: BillId) -> Result<Versioned<Bill>, StoreError>;
    async fn bills(&self) -> Result<Vec<Versioned<Bill>>, StoreError>;
    /// Bills whose consultation → appointment → pet chain resolves to the
    /// given owner. Rows with a broken chain are skipped, not errors.
    async fn bills_for_owner(&self, owner: AccountId) -> Result<Vec<Versioned<Bill>>, StoreError>;

    async fn insert_pet(&self, pet: Pet) -> Result<(), StoreError>;
    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError>;

    /// Applies every op in the batch or none of them. Version checks and
    /// unique constraints are validated for the whole batch before any
    /// row changes.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Deletes an appointment, cascading to its consultation and bill.
    /// The cascade is part of this contract, not an assumed side effect.
    async fn delete_appointment(&self, id: AppointmentId) -> Result<(), StoreError>;
}

/// Identity port: accounts and doctor profiles live in the external user
/// directory.
#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;
    async fn doctor_profile(&self, id: DoctorId) -> Result<Option<DoctorProfile>, StoreError>;
    async fn doctor_profile_for_account(
        &self,
        account: AccountId,
    ) -> Result<Option<DoctorProfile>, StoreError>;
}
