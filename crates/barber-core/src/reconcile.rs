//! # Daily Reconciliation
//!
//! Aggregates one day of payrolls, tickets, services and product sales into
//! revenue and payroll totals per currency.
//!
//! ## Revenue Allocation (per closed ticket, once)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  services_total = Σ charged  (real services on the ticket, no tips)    │
//! │  products_total = Σ sale totals on the ticket                          │
//! │                                                                         │
//! │  services_total + products_total == 0                                   │
//! │      └── local += paid_local                       (Unitemized)        │
//! │                                                                         │
//! │  share = services_total / (services_total + products_total)            │
//! │                                                                         │
//! │  paid_local > 0 && paid_reference > 0               (Mixed)            │
//! │      ├── local     += paid_local                                        │
//! │      └── reference += paid_reference × share                            │
//! │  paid_local > 0 only                                (LocalOnly)        │
//! │      └── local     += paid_local                                        │
//! │  paid_reference > 0 only                            (ReferenceOnly)    │
//! │      ├── reference += paid_reference × share                            │
//! │      └── local     += paid_reference × (1 − share) × rate               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! In the Mixed branch the products share of the reference payment is not
//! reconverted into local revenue, while ReferenceOnly does reconvert it.
//! Historical reports depend on this; it is reproduced as is.
//!
//! Payroll reference amounts are floored per row before summing, so
//! fractional reference cents are never recovered by a later rounding.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use ts_rs::TS;

use crate::money::Money;
use crate::rate::Rate;
use crate::types::{
    DailyReport, PaymentCurrency, Payroll, ProductSale, ServiceRendered, Transaction,
};

// =============================================================================
// Input
// =============================================================================

/// Rows gathered for one day.
///
/// `transactions` must contain the tickets closed on `day` and the parents
/// of the day's services and sales. Rows outside the day are filtered out
/// again here, duplicate tickets are tolerated.
///
/// `ticket_services` / `ticket_sales` hold every line of the tickets closed
/// on `day`, whatever day the line itself is dated. A ticket opened before
/// midnight and closed after it is itemized from these.
#[derive(Debug, Clone, Copy)]
pub struct DayActivity<'a> {
    pub day: NaiveDate,
    pub rate: Option<Rate>,
    pub payrolls: &'a [Payroll],
    pub transactions: &'a [Transaction],
    pub services: &'a [ServiceRendered],
    pub product_sales: &'a [ProductSale],
    pub ticket_services: &'a [ServiceRendered],
    pub ticket_sales: &'a [ProductSale],
}

// =============================================================================
// Snapshot
// =============================================================================

/// Which branch allocated a ticket's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AllocationRule {
    /// No itemization; everything paid locally counts as local revenue.
    Unitemized,
    Mixed,
    LocalOnly,
    ReferenceOnly,
    /// Closed without any payment.
    Unpaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayrollLine {
    pub payroll_id: String,
    pub employee_id: String,
    pub payment_currency: PaymentCurrency,
    pub total_payable_local: Money,
    pub total_payable_reference: Money,
    /// Contribution to the local payroll total.
    pub counted_local: Money,
    /// Contribution to the reference payroll total, floored.
    pub counted_reference: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionLine {
    pub transaction_id: String,
    pub services_total_local: Money,
    pub products_total_local: Money,
    #[ts(type = "string | null")]
    pub share_services: Option<Decimal>,
    pub paid_local: Money,
    pub paid_reference: Money,
    pub revenue_local: Money,
    pub revenue_reference: Money,
    pub rule: AllocationRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ServiceLine {
    pub id: String,
    pub employee_id: String,
    pub service_id: Option<String>,
    pub transaction_id: String,
    pub charged_local: Money,
    pub tip_local: Money,
    pub tip_reference: Money,
    pub independent_tip: bool,
    pub parent_closed: bool,
    /// Revenue estimated for services on still-open tickets.
    pub estimated_local: Money,
    pub estimated_reference: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductLine {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_local: Money,
    /// Counted as local revenue outside any closed-ticket allocation.
    pub counted_unconditionally: bool,
}

/// Structured inputs and outputs of a report, kept for audit and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportSnapshot {
    pub rate: Option<Rate>,
    /// Reference conversions degraded to zero for lack of a rate.
    pub rate_missing: bool,
    pub payrolls: Vec<PayrollLine>,
    pub transactions: Vec<TransactionLine>,
    pub services: Vec<ServiceLine>,
    pub products: Vec<ProductLine>,
    #[ts(type = "Record<string, number>")]
    pub payment_methods: BTreeMap<String, u32>,
    #[ts(type = "Record<string, number>")]
    pub payment_entities: BTreeMap<String, u32>,
    pub tips_local: Money,
    pub tips_reference: Money,
}

// =============================================================================
// Output
// =============================================================================

/// The computed totals of a day, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub day: NaiveDate,
    pub rate: Option<Rate>,
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
    pub snapshot: ReportSnapshot,
}

impl Reconciliation {
    pub fn into_report(self, id: String, generated_at: NaiveDateTime) -> DailyReport {
        DailyReport {
            id,
            report_day: self.day,
            generated_at,
            rate_used: self.rate,
            payroll_paid_count: self.payroll_paid_count,
            payroll_local: self.payroll_local,
            payroll_reference: self.payroll_reference,
            services_count: self.services_count,
            products_sold_count: self.products_sold_count,
            transactions_count: self.transactions_count,
            revenue_local: self.revenue_local,
            revenue_reference: self.revenue_reference,
            balance_local: self.balance_local,
            balance_reference: self.balance_reference,
            summary: self.snapshot,
        }
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Revenue attributed to one closed ticket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub revenue_local: Money,
    pub revenue_reference: Money,
    pub share_services: Option<Decimal>,
    pub rule: AllocationRule,
}

/// Splits a closed ticket's payment between local and reference revenue.
///
/// `rate` only matters for reference-only payments; without it the
/// products portion converts to zero.
pub fn allocate_payment(
    services_total_local: Money,
    products_total_local: Money,
    paid_local: Money,
    paid_reference: Money,
    rate: Option<Rate>,
) -> Allocation {
    let itemized = services_total_local + products_total_local;

    if itemized.is_zero() {
        return Allocation {
            revenue_local: paid_local,
            revenue_reference: Money::zero(),
            share_services: None,
            rule: AllocationRule::Unitemized,
        };
    }

    let share_services = services_total_local.as_decimal() / itemized.as_decimal();
    let share_products = Decimal::ONE - share_services;

    let (revenue_local, revenue_reference, rule) =
        match (paid_local.is_positive(), paid_reference.is_positive()) {
            (true, true) => (
                paid_local,
                paid_reference.scale(share_services),
                AllocationRule::Mixed,
            ),
            (true, false) => (paid_local, Money::zero(), AllocationRule::LocalOnly),
            (false, true) => {
                let products_reference = paid_reference.scale(share_products);
                let products_local = rate
                    .map(|r| r.to_local(products_reference))
                    .unwrap_or_default();
                (
                    products_local,
                    paid_reference.scale(share_services),
                    AllocationRule::ReferenceOnly,
                )
            }
            (false, false) => (Money::zero(), Money::zero(), AllocationRule::Unpaid),
        };

    Allocation {
        revenue_local,
        revenue_reference,
        share_services: Some(share_services),
        rule,
    }
}

/// Estimates the revenue of a service whose ticket is still open.
///
/// The charge is split by the ticket's running totals, the reference total
/// converted to local only to form the ratio. Returns `(local, reference)`.
/// Without a rate, or with empty running totals, it is all local.
pub fn estimate_open_service(
    charged_local: Money,
    ticket_total_local: Money,
    ticket_total_reference: Money,
    rate: Option<Rate>,
) -> (Money, Money) {
    let Some(rate) = rate else {
        return (charged_local, Money::zero());
    };

    let denominator = ticket_total_local + rate.to_local(ticket_total_reference);
    if denominator.is_zero() {
        return (charged_local, Money::zero());
    }

    let local_share = ticket_total_local.as_decimal() / denominator.as_decimal();
    let local = charged_local.scale(local_share);
    let reference = rate.to_reference(charged_local - local);
    (local, reference)
}

// =============================================================================
// Aggregation
// =============================================================================

/// Reconciles one day.
pub fn reconcile_day(activity: DayActivity<'_>) -> Reconciliation {
    let day = activity.day;
    let rate = activity.rate;

    let services: Vec<&ServiceRendered> = activity
        .services
        .iter()
        .filter(|s| s.is_completed() && s.day == day)
        .collect();
    let product_sales: Vec<&ProductSale> = activity
        .product_sales
        .iter()
        .filter(|p| p.day == day)
        .collect();
    let tickets: HashMap<&str, &Transaction> = activity
        .transactions
        .iter()
        .map(|t| (t.id.as_str(), t))
        .collect();

    let mut snapshot = ReportSnapshot {
        rate,
        rate_missing: rate.is_none(),
        ..Default::default()
    };

    // -- payroll ---------------------------------------------------------------
    let mut payroll_local = Money::zero();
    let mut payroll_reference = Money::zero();

    for payroll in activity
        .payrolls
        .iter()
        .filter(|p| p.pay_day == day && p.is_paid())
    {
        let counted_local = if payroll.payment_currency.pays_local() {
            payroll.total_payable_local
        } else {
            Money::zero()
        };
        let counted_reference = if payroll.payment_currency.pays_reference() {
            payroll.total_payable_reference.floor_units()
        } else {
            Money::zero()
        };

        payroll_local += counted_local;
        payroll_reference += counted_reference;

        snapshot.payrolls.push(PayrollLine {
            payroll_id: payroll.id.clone(),
            employee_id: payroll.employee_id.clone(),
            payment_currency: payroll.payment_currency,
            total_payable_local: payroll.total_payable_local,
            total_payable_reference: payroll.total_payable_reference,
            counted_local,
            counted_reference,
        });
    }

    // -- closed tickets ----------------------------------------------------------
    let mut revenue_local = Money::zero();
    let mut revenue_reference = Money::zero();
    let mut processed: HashSet<&str> = HashSet::new();

    for ticket in activity
        .transactions
        .iter()
        .filter(|t| t.is_closed() && t.closed_day == Some(day))
    {
        if !processed.insert(ticket.id.as_str()) {
            continue;
        }

        let services_total_local: Money = activity
            .ticket_services
            .iter()
            .filter(|s| {
                s.transaction_id == ticket.id && s.is_completed() && !s.is_independent_tip()
            })
            .map(|s| s.charged_local)
            .sum();
        let products_total_local: Money = activity
            .ticket_sales
            .iter()
            .filter(|p| p.transaction_id == ticket.id)
            .map(|p| p.total_local)
            .sum();

        let allocation = allocate_payment(
            services_total_local,
            products_total_local,
            ticket.paid_local,
            ticket.paid_reference,
            rate,
        );

        revenue_local += allocation.revenue_local;
        revenue_reference += allocation.revenue_reference;

        for method in &ticket.payment_methods {
            *snapshot.payment_methods.entry(method.clone()).or_insert(0) += 1;
        }
        for entity in &ticket.payment_entities {
            *snapshot.payment_entities.entry(entity.clone()).or_insert(0) += 1;
        }

        snapshot.transactions.push(TransactionLine {
            transaction_id: ticket.id.clone(),
            services_total_local,
            products_total_local,
            share_services: allocation.share_services,
            paid_local: ticket.paid_local,
            paid_reference: ticket.paid_reference,
            revenue_local: allocation.revenue_local,
            revenue_reference: allocation.revenue_reference,
            rule: allocation.rule,
        });
    }

    // -- services ----------------------------------------------------------------
    let mut services_count = 0;

    for service in &services {
        let independent_tip = service.is_independent_tip();
        let parent = tickets.get(service.transaction_id.as_str());
        let parent_closed = parent.map(|t| t.is_closed()).unwrap_or(false);

        let (estimated_local, estimated_reference) = if independent_tip || parent_closed {
            (Money::zero(), Money::zero())
        } else {
            match parent {
                Some(ticket) => estimate_open_service(
                    service.charged_local,
                    ticket.total_local,
                    ticket.total_reference,
                    rate,
                ),
                None => (service.charged_local, Money::zero()),
            }
        };

        if !independent_tip {
            services_count += 1;
        }
        revenue_local += estimated_local;
        revenue_reference += estimated_reference;
        snapshot.tips_local += service.tip_local;
        snapshot.tips_reference += service.tip_reference;

        snapshot.services.push(ServiceLine {
            id: service.id.clone(),
            employee_id: service.employee_id.clone(),
            service_id: service.service_id.clone(),
            transaction_id: service.transaction_id.clone(),
            charged_local: service.charged_local,
            tip_local: service.tip_local,
            tip_reference: service.tip_reference,
            independent_tip,
            parent_closed,
            estimated_local,
            estimated_reference,
        });
    }

    // -- products outside closed tickets ----------------------------------------
    // A parent closed on another day allocates the sale on its own close day.
    let mut products_sold_count = 0;

    for sale in &product_sales {
        let parent_closed = tickets
            .get(sale.transaction_id.as_str())
            .map(|t| t.is_closed())
            .unwrap_or(false);
        let counted_unconditionally =
            !processed.contains(sale.transaction_id.as_str()) && !parent_closed;
        if counted_unconditionally {
            revenue_local += sale.total_local;
        }
        products_sold_count += sale.quantity;

        snapshot.products.push(ProductLine {
            id: sale.id.clone(),
            transaction_id: sale.transaction_id.clone(),
            product_id: sale.product_id.clone(),
            quantity: sale.quantity,
            total_local: sale.total_local,
            counted_unconditionally,
        });
    }

    Reconciliation {
        day,
        rate,
        payroll_paid_count: snapshot.payrolls.len() as i64,
        payroll_local,
        payroll_reference,
        services_count,
        products_sold_count,
        transactions_count: processed.len() as i64,
        revenue_local,
        revenue_reference,
        balance_local: revenue_local - payroll_local,
        balance_reference: revenue_reference - payroll_reference,
        snapshot,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
