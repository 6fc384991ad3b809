//! Shared fixture: a seeded clinic with an admin, two doctors, a client
//! with one pet, and a stranger, wired to the in-memory store and
//! directory.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use vetclinic_core::domain::{
    Account, AccountId, Actor, AppointmentId, AppointmentStatus, DoctorId, DoctorProfile, Pet,
    PetId, Role,
};
use vetclinic_core::{
    CompleteConsultation, InMemoryDirectory, InMemoryStore, NewAppointment, SchedulingService,
    SchedulingStore, ServiceConfig,
};

pub struct Clinic {
    pub store: Arc<InMemoryStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub service: SchedulingService,
    pub admin: Actor,
    pub doctor: Actor,
    pub doctor_id: DoctorId,
    pub other_doctor: Actor,
    pub other_doctor_id: DoctorId,
    pub client: Actor,
    pub stranger: Actor,
    pub pet_id: PetId,
}

fn account(display_name: &str, roles: impl IntoIterator<Item = Role>) -> Account {
    Account {
        id: AccountId::generate(),
        display_name: display_name.to_string(),
        roles: roles.into_iter().collect::<HashSet<_>>(),
    }
}

pub async fn clinic() -> Clinic {
    clinic_with(ServiceConfig::default()).await
}

pub async fn clinic_with(config: ServiceConfig) -> Clinic {
    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(InMemoryDirectory::new());

    let admin_account = account("Clinic Admin", [Role::Admin]);
    let doctor_account = account("Dr. Laura Petrescu", [Role::Doctor]);
    let other_doctor_account = account("Dr. Imran Hadzic", [Role::Doctor]);
    let client_account = account("Maya Lindqvist", [Role::Client]);
    let stranger_account = account("Jonas Okafor", [Role::Client]);

    for acc in [
        &admin_account,
        &doctor_account,
        &other_doctor_account,
        &client_account,
        &stranger_account,
    ] {
        directory.upsert_account((*acc).clone());
    }

    let doctor_profile = DoctorProfile {
        id: DoctorId::generate(),
        account_id: doctor_account.id,
        specialization: "Dermatology".to_string(),
        bio: "Ten years of small-animal practice.".to_string(),
    };
    let other_doctor_profile = DoctorProfile {
        id: DoctorId::generate(),
        account_id: other_doctor_account.id,
        specialization: "Orthopedics".to_string(),
        bio: "Joint and fracture specialist.".to_string(),
    };
    directory.upsert_doctor(doctor_profile.clone());
    directory.upsert_doctor(other_doctor_profile.clone());

    let pet = Pet {
        id: PetId::generate(),
        owner: client_account.id,
        name: "Rex".to_string(),
        species: "dog".to_string(),
        breed: Some("beagle".to_string()),
        age_years: 4,
        weight_kg: 13.2,
    };
    let pet_id = pet.id;
    store.insert_pet(pet).await.unwrap();

    let service = SchedulingService::new(store.clone(), directory.clone(), config);

    Clinic {
        store,
        directory,
        service,
        admin: Actor::from(&admin_account),
        doctor: Actor::from(&doctor_account),
        doctor_id: doctor_profile.id,
        other_doctor: Actor::from(&other_doctor_account),
        other_doctor_id: other_doctor_profile.id,
        client: Actor::from(&client_account),
        stranger: Actor::from(&stranger_account),
        pet_id,
    }
}

impl Clinic {
    pub fn tomorrow(&self) -> DateTime<Utc> {
        Utc::now() + Duration::days(1)
    }

    pub fn booking(&self) -> NewAppointment {
        NewAppointment {
            pet_id: self.pet_id,
            doctor_id: self.doctor_id,
            scheduled_at: self.tomorrow(),
            description: Some("Ear check".to_string()),
        }
    }

    pub async fn pending_appointment(&self) -> AppointmentId {
        self.service.create_appointment(&self.client, self.booking()).await.unwrap().id
    }

    pub async fn accepted_appointment(&self) -> AppointmentId {
        let id = self.pending_appointment().await;
        self.service
            .admin_set_status(&self.admin, id, AppointmentStatus::Accepted)
            .await
            .unwrap();
        id
    }

    /// Drives a fresh appointment into the requested state.
    pub async fn appointment_in(&self, status: AppointmentStatus) -> AppointmentId {
        let id = self.pending_appointment().await;
        match status {
            AppointmentStatus::Pending => {}
            AppointmentStatus::Accepted => {
                self.service
                    .admin_set_status(&self.admin, id, AppointmentStatus::Accepted)
                    .await
                    .unwrap();
            }
            AppointmentStatus::Refused => {
                self.service
                    .admin_set_status(&self.admin, id, AppointmentStatus::Refused)
                    .await
                    .unwrap();
            }
            AppointmentStatus::RescheduleProposed => {
                self.service
                    .propose_reschedule(&self.admin, id, self.tomorrow() + Duration::days(1))
                    .await
                    .unwrap();
            }
            AppointmentStatus::Completed => {
                self.service
                    .admin_set_status(&self.admin, id, AppointmentStatus::Accepted)
                    .await
                    .unwrap();
                self.service
                    .complete_consultation(&self.doctor, self.completion(id, 4500))
                    .await
                    .unwrap();
            }
        }
        id
    }

    pub fn completion(&self, id: AppointmentId, cost_cents: i64) -> CompleteConsultation {
        CompleteConsultation {
            appointment_id: id,
            diagnosis: "Otitis externa".to_string(),
            treatment: Some("Ear drops, twice daily".to_string()),
            notes: None,
            service_cost: Decimal::new(cost_cents, 2),
        }
    }

    pub async fn status_of(&self, id: AppointmentId) -> AppointmentStatus {
        self.store.appointment(id).await.unwrap().record.status()
    }
}
