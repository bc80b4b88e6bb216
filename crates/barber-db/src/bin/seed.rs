//! # Seed Data Generator
//!
//! Fills a development database with one working day of a small shop.
//!
//! ## Usage
//! ```bash
//! # Seed ./barber_dev.db with a 36.5 rate
//! cargo run -p barber-db --bin seed
//!
//! # Custom rate and database
//! cargo run -p barber-db --bin seed -- --rate 40.25 --db ./data/barber.db
//! ```
//!
//! ## Generated Data
//! - Three barbers, a service menu priced in reference currency, a shelf
//!   of products priced from the rate
//! - Today's exchange rate
//! - A handful of tickets: some closed with local, reference or mixed
//!   payments, one left open
//! - One product consumption, settled by a payroll for the first barber

use std::env;
use std::str::FromStr;

use barber_core::day::{now_local, today};
use barber_core::money::Money;
use barber_core::rate::Rate;
use barber_core::TransactionPayment;
use barber_db::{init_tracing, Database, DbConfig, NewService, DEFAULT_LOG_FILTER};
use rust_decimal::Decimal;
use tracing::info;

const BARBERS: &[&str] = &["Carlos", "Andrea", "Miguel"];

/// (name, reference price in cents)
const SERVICES: &[(&str, i64)] = &[
    ("Haircut", 800),
    ("Beard trim", 500),
    ("Haircut + beard", 1200),
    ("Kids haircut", 600),
];

/// (name, reference price in cents, stock)
const PRODUCTS: &[(&str, i64, i64)] = &[
    ("Pomade", 1099, 24),
    ("Beard oil", 1250, 12),
    ("Shampoo", 899, 30),
    ("Aftershave", 1500, 8),
];

/// (barber, service, products sold, paid local units, paid reference units)
const TICKETS: &[(usize, usize, i64, i64, i64)] = &[
    (0, 0, 0, 292, 0),
    (0, 2, 1, 0, 24),
    (1, 1, 0, 100, 3),
    (1, 3, 2, 0, 0),
    (2, 0, 1, 690, 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(DEFAULT_LOG_FILTER);

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./barber_dev.db");
    let mut rate = Decimal::new(365, 1);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--rate" | "-r" => {
                if i + 1 < args.len() {
                    rate = Decimal::from_str(&args[i + 1])?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Barber Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./barber_dev.db)");
                println!("  -r, --rate <RATE>   Today's exchange rate (default: 36.5)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let rate = Rate::new(rate)?;
    let day = today();

    println!("Barber Ledger Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Day:      {}", day);
    println!("Rate:     {}", rate);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");

    if !db.employees().list_active().await?.is_empty() {
        println!("⚠ Database already has employees");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut barbers = Vec::with_capacity(BARBERS.len());
    for name in BARBERS {
        barbers.push(db.employees().create(name).await?);
    }
    println!("✓ {} barbers", barbers.len());

    let mut services = Vec::with_capacity(SERVICES.len());
    for (name, cents) in SERVICES {
        let price_reference = Money::new(*cents, 2);
        services.push(
            db.service_catalog()
                .create(name, price_reference, rate.to_local(price_reference))
                .await?,
        );
    }

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (name, cents, stock) in PRODUCTS {
        let price_reference = Money::new(*cents, 2);
        products.push(
            db.products()
                .create(name, price_reference, rate.to_local(price_reference), *stock)
                .await?,
        );
    }
    println!("✓ {} services, {} products", services.len(), products.len());

    // Today's rate also reprices the menu and the shelf
    db.rates().record_rate(day, rate).await?;
    println!("✓ Rate recorded");

    let tickets = db.transactions();
    let mut closed = 0;
    for (idx, (barber, service, sold, paid_local, paid_reference)) in TICKETS.iter().enumerate() {
        let ticket = tickets.open(&format!("walk-in-{}", idx + 1)).await?;
        let offering = &services[*service];

        tickets
            .add_service(
                &ticket.id,
                &NewService {
                    employee_id: barbers[*barber].id.clone(),
                    service_id: offering.id.clone(),
                    charged_local: rate.to_local(offering.price_reference),
                    tip_local: Money::zero(),
                    tip_reference: Money::zero(),
                },
            )
            .await?;

        if *sold > 0 {
            let product = &products[idx % products.len()];
            tickets.add_product_sale(&ticket.id, &product.id, *sold).await?;
        }

        if *paid_local == 0 && *paid_reference == 0 {
            // Left open for the day's estimate
            continue;
        }

        let mut methods = Vec::new();
        if *paid_local > 0 {
            methods.push("mobile_payment".to_string());
        }
        if *paid_reference > 0 {
            methods.push("cash".to_string());
        }

        tickets
            .close(
                &ticket.id,
                &TransactionPayment {
                    paid_local: Money::from_units(*paid_local),
                    paid_reference: Money::from_units(*paid_reference),
                    payment_methods: methods,
                    payment_entities: Vec::new(),
                    reference_number: None,
                },
            )
            .await?;
        closed += 1;
    }
    println!("✓ {} tickets ({} closed)", TICKETS.len(), closed);

    let first = &barbers[0];
    tickets
        .add_tip(
            &tickets.open("tip-only").await?.id,
            &first.id,
            Money::zero(),
            Money::from_units(2),
        )
        .await?;

    db.consumptions()
        .record_consumption(&first.id, &products[0].id, 1, day)
        .await?;
    let payroll = db.payrolls().compute_payroll(&first.id, day, 60).await?;
    println!(
        "✓ Payroll for {}: {} local / {} reference",
        first.name,
        payroll.total_payable_local.round_display(),
        payroll.total_payable_reference.round_display()
    );

    info!(at = %now_local(), "Seed complete");
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
