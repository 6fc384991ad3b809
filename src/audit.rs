//! Audit trail for scheduling mutations.
//!
//! Every attempted mutation lands here with its outcome — applied,
//! denied, or rejected. The trail is also the seam a notification sender
//! would subscribe to: a proposed reschedule shows up as an applied
//! `propose_reschedule` record for the pet's owner to be told about.
//!
//! Records go to a bounded in-memory ring buffer and are mirrored to the
//! `vetclinic::audit` tracing target for log shipping.

use crate::domain::{AccountId, EntityKind};
use crate::guard::Operation;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

/// Default ring-buffer capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub actor: AccountId,
    pub operation: Operation,
    pub entity: EntityKind,
    pub entity_id: String,
    pub outcome: AuditOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The mutation committed.
    Applied,
    /// The guard refused the actor.
    Denied { reason: String },
    /// The operation failed after authorization (invalid transition,
    /// validation, conflict, ...).
    Rejected { error: String },
}

pub struct AuditTrail {
    enabled: bool,
    capacity: usize,
    records: RwLock<VecDeque<AuditRecord>>,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            enabled: true,
            capacity: capacity.max(1),
            records: RwLock::new(VecDeque::new()),
        }
    }

    /// A trail that drops everything; used when auditing is switched off.
    pub fn disabled() -> Self {
        Self { enabled: false, capacity: 0, records: RwLock::new(VecDeque::new()) }
    }

    pub fn record(&self, record: AuditRecord) {
        if !self.enabled {
            return;
        }
        info!(
            target: "vetclinic::audit",
            actor = %record.actor,
            operation = %record.operation,
            entity = %record.entity,
            entity_id = %record.entity_id,
            outcome = ?record.outcome,
            "audit"
        );
        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// The most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        self.records.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
