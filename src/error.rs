//! Error taxonomy for scheduling operations.
//!
//! This module provides:
//! - Typed, expected failure outcomes the caller can match on
//! - Stable numeric codes and metric categories per variant
//! - Retryability classification
//! - A process-wide error-occurrence registry ([`ERROR_METRICS`])
//!
//! Every denial or rejection carries enough structure for a specific
//! user-facing message — which rule denied, which transition was
//! illegal — never a bare "operation failed". Only unexpected backend
//! faults travel as [`SchedulingError::Storage`].

use crate::domain::{AppointmentId, AppointmentStatus, BillId, EntityKind};
use crate::guard::DenyReason;
use crate::store::StoreError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Every expected way a scheduling operation can fail.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The referenced entity id is unknown.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// The guard denied the operation for this actor.
    #[error("forbidden: {0}")]
    Forbidden(DenyReason),

    /// The state machine has no such transition.
    #[error("invalid appointment transition: {from} -> {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    /// Completion was re-attempted on an appointment that already has a
    /// consultation; no second bill is ever created.
    #[error("appointment {0} already has a consultation on record")]
    AlreadyCompleted(AppointmentId),

    /// Payment marking was re-attempted on a settled bill.
    #[error("bill {0} is already marked paid")]
    AlreadyPaid(BillId),

    /// Optimistic-lock conflict: someone else changed the entity since it
    /// was read. The caller reloads and retries.
    #[error("{kind} {id} was modified concurrently")]
    ConcurrentModification { kind: EntityKind, id: String },

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unexpected infrastructure failure, retryable at the caller's
    /// discretion.
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl SchedulingError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    /// Stable numeric code, suitable for API payloads and log correlation.
    pub fn code(&self) -> u16 {
        match self {
            SchedulingError::NotFound { .. } => 1001,
            SchedulingError::Forbidden(_) => 1002,
            SchedulingError::InvalidTransition { .. } => 1003,
            SchedulingError::AlreadyCompleted(_) => 1004,
            SchedulingError::AlreadyPaid(_) => 1005,
            SchedulingError::ConcurrentModification { .. } => 1006,
            SchedulingError::Validation(_) => 1007,
            SchedulingError::Storage(_) => 1999,
        }
    }

    /// Category label used by [`ErrorMetrics`].
    pub fn category(&self) -> &'static str {
        match self {
            SchedulingError::NotFound { .. } => "resource_not_found",
            SchedulingError::Forbidden(_) => "forbidden",
            SchedulingError::InvalidTransition { .. } => "invalid_transition",
            SchedulingError::AlreadyCompleted(_) | SchedulingError::AlreadyPaid(_) => {
                "idempotency"
            }
            SchedulingError::ConcurrentModification { .. } => "concurrency",
            SchedulingError::Validation(_) => "validation_error",
            SchedulingError::Storage(_) => "storage_error",
        }
    }

    /// Whether retrying the same call can succeed without the caller
    /// changing anything but timing.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulingError::ConcurrentModification { .. } | SchedulingError::Storage(_)
        )
    }

    /// Lifts a raw store failure into the domain taxonomy. Unknown ids
    /// and version conflicts have first-class variants; everything else
    /// is an infrastructure fault.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => SchedulingError::NotFound { kind, id },
            StoreError::VersionConflict { kind, id, .. } => {
                SchedulingError::ConcurrentModification { kind, id }
            }
            other => SchedulingError::Storage(other),
        }
    }

    /// Records this error in [`ERROR_METRICS`] and passes it through, for
    /// use at the service boundary.
    pub fn track(self) -> Self {
        ERROR_METRICS.record(&self);
        self
    }
}

// =============================================================================
// ERROR METRICS
// =============================================================================

/// Process-wide counters of error occurrences, by category.
#[derive(Debug, Default)]
pub struct ErrorMetrics {
    total: AtomicU64,
    by_category: RwLock<HashMap<&'static str, u64>>,
}

impl ErrorMetrics {
    pub fn record(&self, err: &SchedulingError) {
        self.total.fetch_add(1, Ordering::Relaxed);
        *self.by_category.write().entry(err.category()).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn count_for(&self, category: &str) -> u64 {
        self.by_category.read().get(category).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        self.by_category.read().clone()
    }

    /// Clears all counters. Intended for tests.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.by_category.write().clear();
    }
}

pub static ERROR_METRICS: Lazy<ErrorMetrics> = Lazy::new(ErrorMetrics::default);
