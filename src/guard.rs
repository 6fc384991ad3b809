//! Ownership and role authorization.
//!
//! Requests are checked against an ordered chain of allow rules; the
//! first rule that grants access wins, and a request no rule grants is
//! denied with a reason specific enough for a user-facing message.
//!
//! The guard is pure: it never loads or mutates anything. Callers
//! resolve the ownership chain (bill → consultation → appointment →
//! pet → owner) up front and pass `None` for any link that is missing;
//! an unresolvable chain reads as deny, never as a panic.

use crate::domain::{AccountId, Actor, DoctorId, Role};
use crate::error::SchedulingError;
use serde::Serialize;
use std::fmt;
use strum::Display;

/// Operations the guard knows how to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ReadAppointment,
    CreateAppointment,
    RespondToReschedule,
    SetStatus,
    ProposeReschedule,
    DeleteAppointment,
    CompleteConsultation,
    ReadBill,
    MarkBillPaid,
}

impl Operation {
    /// Operations a pet owner may perform on their own animal's records.
    pub fn owner_permitted(self) -> bool {
        matches!(
            self,
            Operation::ReadAppointment
                | Operation::CreateAppointment
                | Operation::RespondToReschedule
                | Operation::ReadBill
        )
    }

    /// Operations the assigned doctor may perform.
    pub fn doctor_permitted(self) -> bool {
        matches!(self, Operation::ReadAppointment | Operation::CompleteConsultation)
    }

    /// Operations reserved to administrators.
    pub fn admin_reserved(self) -> bool {
        matches!(
            self,
            Operation::SetStatus
                | Operation::ProposeReschedule
                | Operation::DeleteAppointment
                | Operation::MarkBillPaid
        )
    }
}

/// One authorization question: may `actor` perform `operation` on the
/// target whose resolved links are attached?
#[derive(Debug, Clone)]
pub struct AccessRequest<'a> {
    pub actor: &'a Actor,
    pub operation: Operation,
    /// Owner of the pet behind the target, when the chain resolved.
    pub pet_owner: Option<AccountId>,
    /// Doctor the target appointment is assigned to, if any.
    pub assigned_doctor: Option<DoctorId>,
    /// The actor's own doctor profile, if they have one.
    pub actor_profile: Option<DoctorId>,
}

impl<'a> AccessRequest<'a> {
    pub fn new(actor: &'a Actor, operation: Operation) -> Self {
        Self { actor, operation, pet_owner: None, assigned_doctor: None, actor_profile: None }
    }

    pub fn pet_owner(mut self, owner: Option<AccountId>) -> Self {
        self.pet_owner = owner;
        self
    }

    pub fn assigned_doctor(mut self, doctor: Option<DoctorId>) -> Self {
        self.assigned_doctor = doctor;
        self
    }

    pub fn actor_profile(mut self, profile: Option<DoctorId>) -> Self {
        self.actor_profile = profile;
        self
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    AdminOnly,
    DoctorOnly,
    NotAssignedDoctor,
    NotPetOwner,
    OwnershipUnresolved,
    NoApplicableRule,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            DenyReason::AdminOnly => "only an administrator may perform this operation",
            DenyReason::DoctorOnly => "only a doctor may perform this operation",
            DenyReason::NotAssignedDoctor => {
                "this appointment is assigned to a different doctor"
            }
            DenyReason::NotPetOwner => "this record belongs to a different client's pet",
            DenyReason::OwnershipUnresolved => {
                "ownership of this record could not be established"
            }
            DenyReason::NoApplicableRule => "no access rule permits this operation",
        };
        f.write_str(message)
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { rule: &'static str },
    Deny { reason: DenyReason },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }
}

/// One allow rule in the chain. Returns `Some(Allow)` when the rule
/// grants the request and `None` when it has nothing to say, letting
/// evaluation fall through to the next rule.
pub trait AccessRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, request: &AccessRequest<'_>) -> Option<Decision>;
}

/// Administrators may perform every appointment and billing operation.
struct AdminRule;

impl AccessRule for AdminRule {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn evaluate(&self, request: &AccessRequest<'_>) -> Option<Decision> {
        request
            .actor
            .has_role(Role::Admin)
            .then_some(Decision::Allow { rule: self.name() })
    }
}

/// The assigned doctor may read and complete their own appointments.
struct AssignedDoctorRule;

impl AccessRule for AssignedDoctorRule {
    fn name(&self) -> &'static str {
        "assigned_doctor"
    }

    fn evaluate(&self, request: &AccessRequest<'_>) -> Option<Decision> {
        if !request.operation.doctor_permitted() || !request.actor.has_role(Role::Doctor) {
            return None;
        }
        match (request.actor_profile, request.assigned_doctor) {
            (Some(own), Some(assigned)) if own == assigned => {
                Some(Decision::Allow { rule: self.name() })
            }
            _ => None,
        }
    }
}

/// The pet's owner may read, book, and answer reschedule proposals for
/// their own animal, and read its bills.
struct PetOwnerRule;

impl AccessRule for PetOwnerRule {
    fn name(&self) -> &'static str {
        "pet_owner"
    }

    fn evaluate(&self, request: &AccessRequest<'_>) -> Option<Decision> {
        if !request.operation.owner_permitted() {
            return None;
        }
        match request.pet_owner {
            Some(owner) if owner == request.actor.account_id => {
                Some(Decision::Allow { rule: self.name() })
            }
            _ => None,
        }
    }
}

/// The rule chain. Evaluation order is part of the policy: admin first,
/// then the assigned doctor, then the pet owner, then deny.
pub struct AccessPolicy {
    rules: Vec<Box<dyn AccessRule>>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl AccessPolicy {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(AdminRule),
                Box::new(AssignedDoctorRule),
                Box::new(PetOwnerRule),
            ],
        }
    }

    /// Evaluates the chain; first grant wins, fallthrough is a reasoned
    /// deny.
    pub fn authorize(&self, request: &AccessRequest<'_>) -> Decision {
        for rule in &self.rules {
            if let Some(decision) = rule.evaluate(request) {
                return decision;
            }
        }
        Decision::Deny { reason: Self::deny_reason(request) }
    }

    /// Convenience wrapper turning a deny into the typed error.
    pub fn check(&self, request: &AccessRequest<'_>) -> Result<(), SchedulingError> {
        match self.authorize(request) {
            Decision::Allow { .. } => Ok(()),
            Decision::Deny { reason } => Err(SchedulingError::Forbidden(reason)),
        }
    }

    /// Picks the most specific reason for a request no rule granted.
    fn deny_reason(request: &AccessRequest<'_>) -> DenyReason {
        let operation = request.operation;
        if operation.owner_permitted() && request.pet_owner.is_none() {
            return DenyReason::OwnershipUnresolved;
        }
        if operation.admin_reserved() {
            return DenyReason::AdminOnly;
        }
        if operation.doctor_permitted() && request.actor.has_role(Role::Doctor) {
            return DenyReason::NotAssignedDoctor;
        }
        if operation.owner_permitted() {
            return DenyReason::NotPetOwner;
        }
        if operation.doctor_permitted() {
            return DenyReason::DoctorOnly;
        }
        DenyReason::NoApplicableRule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;

    fn admin() -> Actor {
        Actor::new(AccountId::generate()).with_role(Role::Admin)
    }

    fn doctor(profile: DoctorId) -> (Actor, DoctorId) {
        (Actor::new(AccountId::generate()).with_role(Role::Doctor), profile)
    }

    fn client() -> Actor {
        Actor::new(AccountId::generate())
    }

    #[test]
    fn admin_is_allowed_on_everything() {
        let actor = admin();
        for operation in [
            Operation::ReadAppointment,
            Operation::CreateAppointment,
            Operation::RespondToReschedule,
            Operation::SetStatus,
            Operation::ProposeReschedule,
            Operation::DeleteAppointment,
            Operation::CompleteConsultation,
            Operation::ReadBill,
            Operation::MarkBillPaid,
        ] {
            let decision =
                AccessPolicy::standard().authorize(&AccessRequest::new(&actor, operation));
            assert_eq!(decision, Decision::Allow { rule: "admin" }, "operation {operation}");
        }
    }

    #[test]
    fn assigned_doctor_may_complete_their_own_appointment() {
        let profile = DoctorId::generate();
        let (actor, _) = doctor(profile);
        let request = AccessRequest::new(&actor, Operation::CompleteConsultation)
            .assigned_doctor(Some(profile))
            .actor_profile(Some(profile));
        assert!(AccessPolicy::standard().authorize(&request).is_allow());
    }

    #[test]
    fn doctor_is_denied_on_someone_elses_appointment() {
        let (actor, profile) = doctor(DoctorId::generate());
        let request = AccessRequest::new(&actor, Operation::CompleteConsultation)
            .assigned_doctor(Some(DoctorId::generate()))
            .actor_profile(Some(profile));
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Deny { reason: DenyReason::NotAssignedDoctor }
        );
    }

    #[test]
    fn doctor_role_without_a_profile_is_denied() {
        let actor = Actor::new(AccountId::generate()).with_role(Role::Doctor);
        let request = AccessRequest::new(&actor, Operation::CompleteConsultation)
            .assigned_doctor(Some(DoctorId::generate()));
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Deny { reason: DenyReason::NotAssignedDoctor }
        );
    }

    #[test]
    fn owner_may_respond_to_reschedule_for_their_own_pet() {
        let actor = client();
        let request = AccessRequest::new(&actor, Operation::RespondToReschedule)
            .pet_owner(Some(actor.account_id));
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Allow { rule: "pet_owner" }
        );
    }

    #[test]
    fn stranger_is_denied_with_not_pet_owner() {
        let actor = client();
        let request = AccessRequest::new(&actor, Operation::RespondToReschedule)
            .pet_owner(Some(AccountId::generate()));
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Deny { reason: DenyReason::NotPetOwner }
        );
    }

    #[test]
    fn broken_ownership_chain_denies_instead_of_panicking() {
        let actor = client();
        let request = AccessRequest::new(&actor, Operation::ReadBill).pet_owner(None);
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Deny { reason: DenyReason::OwnershipUnresolved }
        );
    }

    #[test]
    fn broken_chain_still_yields_to_the_admin_rule() {
        let actor = admin();
        let request = AccessRequest::new(&actor, Operation::ReadBill).pet_owner(None);
        assert!(AccessPolicy::standard().authorize(&request).is_allow());
    }

    #[test]
    fn marking_bills_paid_is_admin_reserved() {
        let actor = client();
        let request = AccessRequest::new(&actor, Operation::MarkBillPaid)
            .pet_owner(Some(actor.account_id));
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Deny { reason: DenyReason::AdminOnly }
        );
    }

    #[test]
    fn client_cannot_complete_a_consultation() {
        let actor = client();
        let request = AccessRequest::new(&actor, Operation::CompleteConsultation)
            .assigned_doctor(Some(DoctorId::generate()));
        assert_eq!(
            AccessPolicy::standard().authorize(&request),
            Decision::Deny { reason: DenyReason::DoctorOnly }
        );
    }

    #[test]
    fn check_surfaces_the_reason_in_the_error() {
        let actor = client();
        let request =
            AccessRequest::new(&actor, Operation::SetStatus).pet_owner(Some(actor.account_id));
        let err = AccessPolicy::standard().check(&request).unwrap_err();
        assert!(matches!(err, SchedulingError::Forbidden(DenyReason::AdminOnly)));
    }
}
