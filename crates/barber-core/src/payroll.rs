//! # Payroll Calculator
//!
//! Turns a day of completed services and the outstanding product
//! consumption of one employee into a payroll draft.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  commission_local   = Σ charged_local   (completed services of the day) │
//! │  tip_local          = Σ tip_local       (same rows, tips included)      │
//! │  deduction_local    = Σ total_price     (ALL pending consumption)       │
//! │                                                                         │
//! │  subtotal           = commission + tip − deduction   (may be < 0)       │
//! │  total_payable      = subtotal × clamp(percent, 1, 100) / 100           │
//! │                                                                         │
//! │  *_reference        = *_local / rate     (zero when no rate)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Consumption is not filtered by day: everything still pending is swept
//! into the next payroll, whenever it was incurred.
//!
//! The duplicate check and the commit belong to the storage layer
//! (`barber-db`), which calls [`compute_payroll`] between the two.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::rate::Rate;
use crate::types::{
    ConsumptionStatus, PaymentCurrency, PaymentStatus, Payroll, ProductConsumption,
    ServiceRendered,
};

pub const MIN_PAYOUT_PERCENT: u32 = 1;
pub const MAX_PAYOUT_PERCENT: u32 = 100;

/// Clamps a requested payout percent into `1..=100`.
///
/// Out-of-range input is clamped, not rejected.
///
/// ```rust
/// use barber_core::payroll::clamp_payout_percent;
///
/// assert_eq!(clamp_payout_percent(150), 100);
/// assert_eq!(clamp_payout_percent(0), 1);
/// assert_eq!(clamp_payout_percent(60), 60);
/// ```
pub fn clamp_payout_percent(requested: i64) -> u32 {
    requested.clamp(MIN_PAYOUT_PERCENT as i64, MAX_PAYOUT_PERCENT as i64) as u32
}

/// A computed, not yet persisted, payroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayrollDraft {
    pub employee_id: String,
    #[ts(as = "String")]
    pub pay_day: NaiveDate,
    pub commission_local: Money,
    pub commission_reference: Money,
    pub tip_local: Money,
    pub tip_reference: Money,
    pub consumption_deduction_local: Money,
    pub subtotal_local: Money,
    /// What the caller asked for.
    pub requested_percent: i64,
    /// What is applied and stored.
    pub payout_percent: u32,
    pub total_payable_local: Money,
    pub total_payable_reference: Money,
    pub rate_used: Option<Rate>,
    /// Services counted in the commission.
    pub service_ids: Vec<String>,
    /// Consumptions to flip to `paid` on commit.
    pub consumption_ids: Vec<String>,
}

impl PayrollDraft {
    /// True when no rate was available and reference amounts are zero
    /// because of it, not because earnings were zero.
    #[inline]
    pub fn rate_missing(&self) -> bool {
        self.rate_used.is_none()
    }

    #[inline]
    pub fn percent_was_clamped(&self) -> bool {
        self.requested_percent != self.payout_percent as i64
    }

    /// Builds the record to insert. New payrolls start pending, paid in
    /// local currency until marked otherwise.
    pub fn into_payroll(self, id: String, created_at: NaiveDateTime) -> Payroll {
        Payroll {
            id,
            employee_id: self.employee_id,
            pay_day: self.pay_day,
            commission_local: self.commission_local,
            commission_reference: self.commission_reference,
            tip_local: self.tip_local,
            tip_reference: self.tip_reference,
            consumption_deduction_local: self.consumption_deduction_local,
            payout_percent: self.payout_percent,
            total_payable_local: self.total_payable_local,
            total_payable_reference: self.total_payable_reference,
            rate_used: self.rate_used,
            payment_currency: PaymentCurrency::default(),
            payment_status: PaymentStatus::Pending,
            created_at,
            paid_at: None,
        }
    }
}

/// Computes a payroll draft for `employee_id` on `pay_day`.
///
/// Rows that do not qualify are ignored here as well, so callers may pass
/// a wider selection than strictly needed:
/// - services: same employee, `completed`, dated `pay_day`
/// - consumptions: same employee, `pending`
pub fn compute_payroll(
    employee_id: &str,
    pay_day: NaiveDate,
    requested_percent: i64,
    services: &[ServiceRendered],
    consumptions: &[ProductConsumption],
    rate: Option<Rate>,
) -> PayrollDraft {
    let services: Vec<&ServiceRendered> = services
        .iter()
        .filter(|s| s.employee_id == employee_id && s.is_completed() && s.day == pay_day)
        .collect();

    let consumptions: Vec<&ProductConsumption> = consumptions
        .iter()
        .filter(|c| c.employee_id == employee_id && c.status == ConsumptionStatus::Pending)
        .collect();

    let commission_local: Money = services.iter().map(|s| s.charged_local).sum();
    let tip_local: Money = services.iter().map(|s| s.tip_local).sum();
    let consumption_deduction_local: Money =
        consumptions.iter().map(|c| c.total_price_local).sum();

    let subtotal_local = commission_local + tip_local - consumption_deduction_local;
    let payout_percent = clamp_payout_percent(requested_percent);
    let total_payable_local = subtotal_local.percent(payout_percent);

    let to_reference = |amount: Money| match rate {
        Some(rate) => rate.to_reference(amount),
        None => Money::zero(),
    };

    PayrollDraft {
        employee_id: employee_id.to_string(),
        pay_day,
        commission_local,
        commission_reference: to_reference(commission_local),
        tip_local,
        tip_reference: to_reference(tip_local),
        consumption_deduction_local,
        subtotal_local,
        requested_percent,
        payout_percent,
        total_payable_local,
        total_payable_reference: to_reference(total_payable_local),
        rate_used: rate,
        service_ids: services.iter().map(|s| s.id.clone()).collect(),
        consumption_ids: consumptions.iter().map(|c| c.id.clone()).collect(),
    }
}
