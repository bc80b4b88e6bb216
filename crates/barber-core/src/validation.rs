//! # Validation Module
//!
//! Input validation for data entering the ledger.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Back-office UI  ── empty fields, immediate feedback          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories    ── THIS MODULE: business rule checks          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite          ── NOT NULL, UNIQUE, CHECK, FOREIGN KEY       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a display name (employee, product, service).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 120 characters
///
/// ```rust
/// use barber_core::validation::validate_name;
///
/// assert!(validate_name("Corte clásico").is_ok());
/// assert!(validate_name("   ").is_err());
/// ```
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 120 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 120,
        });
    }

    Ok(())
}

/// Validates a product quantity (sales and consumption).
///
/// ```rust
/// use barber_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates that an amount (price, charge, tip) is not negative.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}
