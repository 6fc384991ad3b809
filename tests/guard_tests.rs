//! Authorization matrix: who may do what, and how denials read.

mod common;

use assert_matches::assert_matches;
use common::clinic;
use vetclinic_core::{AppointmentStatus, DenyReason, SchedulingError, SchedulingStore};

#[tokio::test]
async fn stranger_answering_a_reschedule_is_forbidden_and_changes_nothing() {
    let clinic = clinic().await;
    let id = clinic.pending_appointment().await;
    clinic.service.propose_reschedule(&clinic.admin, id, clinic.tomorrow()).await.unwrap();

    let err =
        clinic.service.respond_to_reschedule(&clinic.stranger, id, true).await.unwrap_err();
    assert_matches!(err, SchedulingError::Forbidden(DenyReason::NotPetOwner));
    assert_eq!(clinic.status_of(id).await, AppointmentStatus::RescheduleProposed);
}

#[tokio::test]
async fn owner_and_assigned_doctor_may_read_a_stranger_may_not() {
    let clinic = clinic().await;
    let id = clinic.pending_appointment().await;

    assert!(clinic.service.appointment(&clinic.client, id).await.is_ok());
    assert!(clinic.service.appointment(&clinic.doctor, id).await.is_ok());
    assert!(clinic.service.appointment(&clinic.admin, id).await.is_ok());

    let err = clinic.service.appointment(&clinic.stranger, id).await.unwrap_err();
    assert_matches!(err, SchedulingError::Forbidden(DenyReason::NotPetOwner));
}

#[tokio::test]
async fn only_the_assigned_doctor_may_complete() {
    let clinic = clinic().await;
    let id = clinic.accepted_appointment().await;

    let err = clinic
        .service
        .complete_consultation(&clinic.other_doctor, clinic.completion(id, 4500))
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::Forbidden(DenyReason::NotAssignedDoctor));
    assert_eq!(clinic.status_of(id).await, AppointmentStatus::Accepted);
    assert!(clinic.store.bills().await.unwrap().is_empty());

    clinic
        .service
        .complete_consultation(&clinic.doctor, clinic.completion(id, 4500))
        .await
        .unwrap();
}

#[tokio::test]
async fn a_client_cannot_complete_a_consultation() {
    let clinic = clinic().await;
    let id = clinic.accepted_appointment().await;
    let err = clinic
        .service
        .complete_consultation(&clinic.client, clinic.completion(id, 4500))
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::Forbidden(DenyReason::DoctorOnly));
}

#[tokio::test]
async fn admin_reserved_operations_deny_clients_and_doctors() {
    let clinic = clinic().await;
    let id = clinic.pending_appointment().await;

    for actor in [&clinic.client, &clinic.doctor, &clinic.stranger] {
        let err = clinic
            .service
            .admin_set_status(actor, id, AppointmentStatus::Accepted)
            .await
            .unwrap_err();
        assert_matches!(err, SchedulingError::Forbidden(DenyReason::AdminOnly));

        let err = clinic
            .service
            .propose_reschedule(actor, id, clinic.tomorrow())
            .await
            .unwrap_err();
        assert_matches!(err, SchedulingError::Forbidden(DenyReason::AdminOnly));

        let err = clinic.service.delete_appointment(actor, id).await.unwrap_err();
        assert_matches!(err, SchedulingError::Forbidden(DenyReason::AdminOnly));
    }
    assert_eq!(clinic.status_of(id).await, AppointmentStatus::Pending);
}

#[tokio::test]
async fn client_cannot_book_for_someone_elses_pet() {
    let clinic = clinic().await;
    let err = clinic
        .service
        .create_appointment(&clinic.stranger, clinic.booking())
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::Forbidden(DenyReason::NotPetOwner));
}

#[tokio::test]
async fn orphaned_pet_link_denies_the_owner_but_not_the_admin() {
    let clinic = clinic().await;
    let id = clinic.pending_appointment().await;

    // Sever the appointment -> pet link.
    assert!(clinic.store.remove_pet(clinic.pet_id));

    let err = clinic.service.appointment(&clinic.client, id).await.unwrap_err();
    assert_matches!(err, SchedulingError::Forbidden(DenyReason::OwnershipUnresolved));

    // Admin access does not depend on the chain.
    assert!(clinic.service.appointment(&clinic.admin, id).await.is_ok());
}

#[tokio::test]
async fn denied_attempts_land_in_the_audit_trail() {
    let clinic = clinic().await;
    let id = clinic.pending_appointment().await;
    clinic
        .service
        .admin_set_status(&clinic.stranger, id, AppointmentStatus::Accepted)
        .await
        .unwrap_err();

    let recent = clinic.service.audit_trail().recent(1);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].actor, clinic.stranger.account_id);
    assert!(matches!(
        recent[0].outcome,
        vetclinic_core::audit::AuditOutcome::Denied { .. }
    ));
}
