//! Billing ledger.
//!
//! A bill is derived from a consultation exactly once, at completion
//! time, with the total frozen from the consultation's service cost.
//! After that the bill only ever moves one way: unpaid → paid. There is
//! no unpay operation.

use crate::domain::{BillId, Consultation, ConsultationId};
use crate::error::SchedulingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An invoice for a completed consultation (1:1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub consultation_id: ConsultationId,
    total_amount: Decimal,
    paid: bool,
    payment_date: Option<DateTime<Utc>>,
}

impl Bill {
    /// Derives the bill for a freshly recorded consultation. The total
    /// is a copy of the service cost and is never recomputed, even if
    /// the consultation were edited later.
    pub fn for_consultation(consultation: &Consultation) -> Self {
        Self {
            id: BillId::generate(),
            consultation_id: consultation.id,
            total_amount: consultation.service_cost,
            paid: false,
            payment_date: None,
        }
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn payment_date(&self) -> Option<DateTime<Utc>> {
        self.payment_date
    }

    /// Marks the bill paid, stamping the payment date. Re-invocation is
    /// an explicit [`SchedulingError::AlreadyPaid`], never a silent
    /// double marking.
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<(), SchedulingError> {
        if self.paid {
            return Err(SchedulingError::AlreadyPaid(self.id));
        }
        self.paid = true;
        self.payment_date = Some(at);
        Ok(())
    }
}

/// Sum of the unpaid bill totals, as shown on the client dashboard.
pub fn outstanding_total<'a>(bills: impl IntoIterator<Item = &'a Bill>) -> Decimal {
    bills
        .into_iter()
        .filter(|bill| !bill.is_paid())
        .fold(Decimal::ZERO, |total, bill| total + bill.total_amount())
}
