//! Appointment lifecycle, authorization, and billing core for a
//! veterinary clinic.
//!
//! Callers (an HTTP layer, a CLI, tests) resolve the acting identity and
//! drive everything through [`SchedulingService`]. Status changes route
//! through the appointment state machine, every operation is authorized
//! by the ownership/role guard before any mutation is attempted, and
//! consultation completion commits the consultation, the bill, and the
//! `Completed` status as one atomic batch.
//!
//! Identity and persistence are external collaborators behind the
//! [`ClinicDirectory`] and [`SchedulingStore`] ports; in-memory
//! implementations back the test suites.

pub mod audit;
pub mod billing;
pub mod config;
pub mod domain;
pub mod error;
pub mod guard;
pub mod logging;
pub mod service;
pub mod store;

pub use billing::Bill;
pub use config::{CompletionPolicy, ServiceConfig};
pub use domain::{
    Account, Actor, Appointment, AppointmentStatus, Consultation, DoctorProfile, Pet, Role,
};
pub use error::{ERROR_METRICS, ErrorMetrics, SchedulingError, SchedulingResult};
pub use guard::{AccessPolicy, AccessRequest, Decision, DenyReason, Operation};
pub use logging::{LogFormat, LoggingConfig, init_logging};
pub use service::{
    CompleteConsultation, CompletedVisit, DashboardSummary, NewAppointment, SchedulingService,
};
pub use store::{
    ClinicDirectory, InMemoryDirectory, InMemoryStore, SchedulingStore, StoreError, Version,
    Versioned, WriteBatch,
};
