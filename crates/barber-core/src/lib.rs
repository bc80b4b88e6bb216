//! # barber-core: Pure Accounting Logic for Barber Ledger
//!
//! Payroll and daily-reconciliation rules of a barbershop that prices in a
//! reference currency (dollars) and operates in a local one (bolívars).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Barber Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Back-office UI / CRUD screens (external)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   barber-db: gathers rows, runs storage transactions            │   │
//! │  │   effective_rate · compute_payroll · generate_report            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plain slices in, plain values out      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ barber-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌─────────────┐      │   │
//! │  │   │  money  │  │  rate   │  │ payroll  │  │  reconcile  │      │   │
//! │  │   │  Money  │  │ Resolver│  │Calculator│  │ Aggregator  │      │   │
//! │  │   └─────────┘  └─────────┘  └──────────┘  └─────────────┘      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Payroll, Transaction, ServiceRendered, ...)
//! - [`money`] - Decimal money, rounded only for display
//! - [`rate`] - Exchange rates and the effective-rate resolver
//! - [`day`] - Calendar-day normalization
//! - [`payroll`] - Payroll calculator
//! - [`reconcile`] - Daily reconciliation aggregator
//! - [`error`] / [`validation`] - Typed errors and input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use barber_core::money::Money;
//! use barber_core::payroll::compute_payroll;
//! use barber_core::rate::Rate;
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
//! let rate = Rate::new(Decimal::from(40)).ok();
//!
//! // Nothing rendered, nothing consumed: an empty payroll
//! let draft = compute_payroll("employee-1", day, 60, &[], &[], rate);
//! assert_eq!(draft.total_payable_local, Money::zero());
//! assert_eq!(draft.payout_percent, 60);
//! ```

pub mod day;
pub mod error;
pub mod money;
pub mod payroll;
pub mod rate;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payroll::PayrollDraft;
pub use rate::{ExchangeRate, Rate};
pub use reconcile::{Reconciliation, ReportSnapshot};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Payout percent applied when the caller has no preference.
pub const DEFAULT_PAYOUT_PERCENT: u32 = 100;

/// Maximum quantity of a single product line or consumption.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;
