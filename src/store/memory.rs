//! In-memory store and directory.
//!
//! Backs the test suites and serves as the reference implementation of
//! the commit contract: the whole batch is validated (version checks,
//! unique indexes) under one write lock before any row changes, so a
//! commit is a single serializable unit.

use super::{
    ClinicDirectory, SchedulingStore, StoreError, Version, Versioned, WriteBatch, WriteOp,
};
use crate::billing::Bill;
use crate::domain::{
    Account, AccountId, Appointment, AppointmentId, BillId, Consultation, ConsultationId,
    DoctorId, DoctorProfile, EntityKind, Pet, PetId,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Tables {
    pets: HashMap<PetId, Versioned<Pet>>,
    appointments: HashMap<AppointmentId, Versioned<Appointment>>,
    consultations: HashMap<ConsultationId, Versioned<Consultation>>,
    bills: HashMap<BillId, Versioned<Bill>>,
    // Unique 1:1 indexes backing the data-model invariants.
    consultation_by_appointment: HashMap<AppointmentId, ConsultationId>,
    bill_by_consultation: HashMap<ConsultationId, BillId>,
}

impl Tables {
    fn owner_of_bill(&self, bill: &Bill) -> Option<AccountId> {
        let consultation = self.consultations.get(&bill.consultation_id)?;
        let appointment = self.appointments.get(&consultation.record.appointment_id)?;
        let pet = self.pets.get(&appointment.record.pet_id)?;
        Some(pet.record.owner)
    }
}

/// Operation counters, exposed for monitoring and tests.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub commits: u64,
    pub conflicts: u64,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    commits: AtomicU64,
    conflicts: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }

    /// Removes a pet row without touching its appointments, leaving an
    /// orphaned foreign key behind. Exists so tests can exercise the
    /// guard's broken-chain handling; pet registry maintenance itself is
    /// an external concern.
    pub fn remove_pet(&self, id: PetId) -> bool {
        self.tables.write().pets.remove(&id).is_some()
    }

    fn validate(tables: &Tables, op: &WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::PutAppointment(update) => {
                match tables.appointments.get(&update.record.id) {
                    Some(current) if current.version == update.version => Ok(()),
                    Some(current) => Err(StoreError::VersionConflict {
                        kind: EntityKind::Appointment,
                        id: update.record.id.to_string(),
                        expected: update.version,
                        found: current.version,
                    }),
                    None => {
                        Err(StoreError::not_found(EntityKind::Appointment, update.record.id))
                    }
                }
            }
            WriteOp::InsertConsultation(consultation) => {
                if tables.consultation_by_appointment.contains_key(&consultation.appointment_id)
                {
                    return Err(StoreError::UniqueViolation {
                        kind: EntityKind::Consultation,
                        constraint: "appointment",
                        id: consultation.appointment_id.to_string(),
                    });
                }
                if tables.consultations.contains_key(&consultation.id) {
                    return Err(StoreError::UniqueViolation {
                        kind: EntityKind::Consultation,
                        constraint: "id",
                        id: consultation.id.to_string(),
                    });
                }
                Ok(())
            }
            WriteOp::InsertBill(bill) => {
                if tables.bill_by_consultation.contains_key(&bill.consultation_id) {
                    return Err(StoreError::UniqueViolation {
                        kind: EntityKind::Bill,
                        constraint: "consultation",
                        id: bill.consultation_id.to_string(),
                    });
                }
                if tables.bills.contains_key(&bill.id) {
                    return Err(StoreError::UniqueViolation {
                        kind: EntityKind::Bill,
                        constraint: "id",
                        id: bill.id.to_string(),
                    });
                }
                Ok(())
            }
            WriteOp::PutBill(update) => match tables.bills.get(&update.record.id) {
                Some(current) if current.version == update.version => Ok(()),
                Some(current) => Err(StoreError::VersionConflict {
                    kind: EntityKind::Bill,
                    id: update.record.id.to_string(),
                    expected: update.version,
                    found: current.version,
                }),
                None => Err(StoreError::not_found(EntityKind::Bill, update.record.id)),
            },
        }
    }

    fn apply(tables: &mut Tables, op: WriteOp) {
        match op {
            WriteOp::PutAppointment(update) => {
                let id = update.record.id;
                tables
                    .appointments
                    .insert(id, Versioned::new(update.version.next(), update.record));
            }
            WriteOp::InsertConsultation(consultation) => {
                tables
                    .consultation_by_appointment
                    .insert(consultation.appointment_id, consultation.id);
                tables
                    .consultations
                    .insert(consultation.id, Versioned::new(Version::initial(), consultation));
            }
            WriteOp::InsertBill(bill) => {
                tables.bill_by_consultation.insert(bill.consultation_id, bill.id);
                tables.bills.insert(bill.id, Versioned::new(Version::initial(), bill));
            }
            WriteOp::PutBill(update) => {
                let id = update.record.id;
                tables.bills.insert(id, Versioned::new(update.version.next(), update.record));
            }
        }
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn pet(&self, id: PetId) -> Result<Versioned<Pet>, StoreError> {
        self.tables
            .read()
            .pets
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Pet, id))
    }

    async fn pets_for_owner(&self, owner: AccountId) -> Result<Vec<Versioned<Pet>>, StoreError> {
        Ok(self
            .tables
            .read()
            .pets
            .values()
            .filter(|pet| pet.record.owner == owner)
            .cloned()
            .collect())
    }

    async fn appointment(&self, id: AppointmentId) -> Result<Versioned<Appointment>, StoreError> {
        self.tables
            .read()
            .appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Appointment, id))
    }

    async fn appointments(&self) -> Result<Vec<Versioned<Appointment>>, StoreError> {
        Ok(self.tables.read().appointments.values().cloned().collect())
    }

    async fn appointments_for_owner(
        &self,
        owner: AccountId,
    ) -> Result<Vec<Versioned<Appointment>>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .appointments
            .values()
            .filter(|appt| {
                tables
                    .pets
                    .get(&appt.record.pet_id)
                    .is_some_and(|pet| pet.record.owner == owner)
            })
            .cloned()
            .collect())
    }

    async fn appointments_for_doctor(
        &self,
        doctor: DoctorId,
    ) -> Result<Vec<Versioned<Appointment>>, StoreError> {
        Ok(self
            .tables
            .read()
            .appointments
            .values()
            .filter(|appt| appt.record.doctor_id == doctor)
            .cloned()
            .collect())
    }

    async fn consultation(
        &self,
        id: ConsultationId,
    ) -> Result<Versioned<Consultation>, StoreError> {
        self.tables
            .read()
            .consultations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Consultation, id))
    }

    async fn consultation_for_appointment(
        &self,
        appointment: AppointmentId,
    ) -> Result<Option<Versioned<Consultation>>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .consultation_by_appointment
            .get(&appointment)
            .and_then(|id| tables.consultations.get(id))
            .cloned())
    }

    async fn bill(&self, id: BillId) -> Result<Versioned<Bill>, StoreError> {
        self.tables
            .read()
            .bills
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Bill, id))
    }

    async fn bills(&self) -> Result<Vec<Versioned<Bill>>, StoreError> {
        Ok(self.tables.read().bills.values().cloned().collect())
    }

    async fn bills_for_owner(&self, owner: AccountId) -> Result<Vec<Versioned<Bill>>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .bills
            .values()
            .filter(|bill| tables.owner_of_bill(&bill.record) == Some(owner))
            .cloned()
            .collect())
    }

    async fn insert_pet(&self, pet: Pet) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.pets.contains_key(&pet.id) {
            return Err(StoreError::UniqueViolation {
                kind: EntityKind::Pet,
                constraint: "id",
                id: pet.id.to_string(),
            });
        }
        tables.pets.insert(pet.id, Versioned::new(Version::initial(), pet));
        Ok(())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.appointments.contains_key(&appointment.id) {
            return Err(StoreError::UniqueViolation {
                kind: EntityKind::Appointment,
                constraint: "id",
                id: appointment.id.to_string(),
            });
        }
        tables
            .appointments
            .insert(appointment.id, Versioned::new(Version::initial(), appointment));
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for op in batch.ops() {
            if let Err(err) = Self::validate(&tables, op) {
                if matches!(err, StoreError::VersionConflict { .. }) {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                return Err(err);
            }
        }
        for op in batch.into_ops() {
            Self::apply(&mut tables, op);
        }
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_appointment(&self, id: AppointmentId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.appointments.remove(&id).is_none() {
            return Err(StoreError::not_found(EntityKind::Appointment, id));
        }
        if let Some(consultation_id) = tables.consultation_by_appointment.remove(&id) {
            tables.consultations.remove(&consultation_id);
            if let Some(bill_id) = tables.bill_by_consultation.remove(&consultation_id) {
                tables.bills.remove(&bill_id);
            }
        }
        Ok(())
    }
}

/// In-memory stand-in for the external user directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<AccountId, Account>>,
    doctors: RwLock<HashMap<DoctorId, DoctorProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_account(&self, account: Account) {
        self.accounts.write().insert(account.id, account);
    }

    pub fn upsert_doctor(&self, profile: DoctorProfile) {
        self.doctors.write().insert(profile.id, profile);
    }
}

#[async_trait]
impl ClinicDirectory for InMemoryDirectory {
    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    async fn doctor_profile(&self, id: DoctorId) -> Result<Option<DoctorProfile>, StoreError> {
        Ok(self.doctors.read().get(&id).cloned())
    }

    async fn doctor_profile_for_account(
        &self,
        account: AccountId,
    ) -> Result<Option<DoctorProfile>, StoreError> {
        Ok(self
            .doctors
            .read()
            .values()
            .find(|profile| profile.account_id == account)
            .cloned())
    }
}
