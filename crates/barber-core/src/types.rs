//! # Domain Types
//!
//! Core domain types used throughout Barber Ledger.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Employee ─┬─< ServiceRendered >── Transaction ──< ProductSale         │
//! │            │        (tips too)        (ticket)                          │
//! │            │                                                            │
//! │            ├─< ProductConsumption >── Payroll                           │
//! │            │     (self-consumption)    (one per employee per day)       │
//! │            │                                                            │
//! │  ExchangeRate (rate.rs)      DailyReport (one per day)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts suffixed `_local` are in the operating currency (bolívars);
//! `_reference` amounts are in the pricing currency (dollars).

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::rate::Rate;
use crate::reconcile::ReportSnapshot;

// =============================================================================
// Catalog
// =============================================================================

/// A barber or any other staff member on payroll.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

/// A retail product. Also consumed by employees.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price in reference currency, set by hand.
    pub price_reference: Money,
    /// Derived from `price_reference` and today's rate.
    pub price_local: Money,
    pub stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
    #[ts(as = "String")]
    pub updated_at: NaiveDateTime,
}

/// An entry of the service menu (haircut, beard trim, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    pub price_reference: Money,
    pub price_local: Money,
    pub is_active: bool,
}

// =============================================================================
// Services Rendered
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

/// A service line on a ticket, or an independent tip when `service_id`
/// is absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceRendered {
    pub id: String,
    pub employee_id: String,
    pub service_id: Option<String>,
    pub transaction_id: String,
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub charged_local: Money,
    pub tip_local: Money,
    /// Tips may be handed over in either currency; kept independently.
    pub tip_reference: Money,
    pub status: ServiceStatus,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

impl ServiceRendered {
    /// A gratuity with no underlying service.
    ///
    /// Legacy rows used `0` or an empty id instead of NULL.
    pub fn is_independent_tip(&self) -> bool {
        match self.service_id.as_deref().map(str::trim) {
            None | Some("") | Some("0") => true,
            Some(_) => false,
        }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == ServiceStatus::Completed
    }
}

// =============================================================================
// Product Consumption
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionStatus {
    #[default]
    Pending,
    Paid,
}

/// Products taken by an employee, deducted from their next payroll.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductConsumption {
    pub id: String,
    pub employee_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub unit_price_local: Money,
    pub total_price_local: Money,
    pub status: ConsumptionStatus,
    /// Set while the consumption is settled by a payroll.
    pub payroll_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

// =============================================================================
// Payroll
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCurrency {
    #[default]
    Local,
    Reference,
    Mixed,
}

impl PaymentCurrency {
    /// Counts toward the local-currency payroll total.
    pub fn pays_local(&self) -> bool {
        matches!(self, PaymentCurrency::Local | PaymentCurrency::Mixed)
    }

    /// Counts toward the reference-currency payroll total.
    pub fn pays_reference(&self) -> bool {
        matches!(self, PaymentCurrency::Reference | PaymentCurrency::Mixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// A finalized payroll record. At most one per employee per day.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payroll {
    pub id: String,
    pub employee_id: String,
    #[ts(as = "String")]
    pub pay_day: NaiveDate,
    pub commission_local: Money,
    pub commission_reference: Money,
    pub tip_local: Money,
    pub tip_reference: Money,
    pub consumption_deduction_local: Money,
    /// 1..=100
    pub payout_percent: u32,
    pub total_payable_local: Money,
    pub total_payable_reference: Money,
    /// `None` when no rate existed for `pay_day`; reference fields are
    /// then zero and not meaningful.
    pub rate_used: Option<Rate>,
    pub payment_currency: PaymentCurrency,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<NaiveDateTime>,
}

impl Payroll {
    /// `commission + tips − consumption`, before the payout percent.
    pub fn subtotal_local(&self) -> Money {
        self.commission_local + self.tip_local - self.consumption_deduction_local
    }

    #[inline]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Open,
    Closed,
}

/// A client ticket holding services and product sales.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub client_id: String,
    #[ts(as = "String")]
    pub opened_at: NaiveDateTime,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<NaiveDateTime>,
    /// Local calendar day of `closed_at`.
    #[ts(as = "Option<String>")]
    pub closed_day: Option<NaiveDate>,
    pub status: TransactionStatus,
    /// Running totals, maintained while the ticket is open.
    pub total_local: Money,
    pub total_reference: Money,
    pub paid_local: Money,
    pub paid_reference: Money,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub payment_methods: Vec<String>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub payment_entities: Vec<String>,
    pub reference_number: Option<String>,
}

impl Transaction {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.status == TransactionStatus::Closed
    }
}

/// What the client handed over when closing a ticket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionPayment {
    pub paid_local: Money,
    pub paid_reference: Money,
    /// e.g. "cash", "mobile_payment", "card"
    pub payment_methods: Vec<String>,
    /// e.g. bank names
    pub payment_entities: Vec<String>,
    pub reference_number: Option<String>,
}

impl TransactionPayment {
    /// Paid amounts cannot be negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.paid_local.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "paid_local".to_string(),
            });
        }
        if self.paid_reference.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "paid_reference".to_string(),
            });
        }
        Ok(())
    }
}

/// A product sold to a client on a ticket.
///
/// Uses the snapshot pattern: the unit price is frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductSale {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub quantity: i64,
    pub unit_price_local: Money,
    pub total_local: Money,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

// =============================================================================
// Daily Report
// =============================================================================

/// A day's financial summary. At most one per day.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailyReport {
    pub id: String,
    #[ts(as = "String")]
    pub report_day: NaiveDate,
    #[ts(as = "String")]
    pub generated_at: NaiveDateTime,
    pub rate_used: Option<Rate>,
    pub payroll_paid_count: i64,
    pub payroll_local: Money,
    pub payroll_reference: Money,
    pub services_count: i64,
    pub products_sold_count: i64,
    pub transactions_count: i64,
    pub revenue_local: Money,
    pub revenue_reference: Money,
    pub balance_local: Money,
    pub balance_reference: Money,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub summary: ReportSnapshot,
}
