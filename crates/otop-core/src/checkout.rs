//! # Checkout Math
//!
//! Pure pieces of a POS settlement: payment check, supplier attribution
//! and receipt formatting. The engine wraps these around the stock
//! reservations of one unit of work.
//!
//! ## Attribution
//! ```text
//! cart lines ──► reservations ──► supplier ids {7, 3, 7, None}
//!                                         │
//!                                         ▼
//!                          distinct, non-zero: {3, 7}
//!                                         │
//!                   ┌─────────────────────┴─────────────────────┐
//!                   ▼                                           ▼
//!        header.supplier_id = 3 (lowest)        transaction_suppliers: 3, 7
//! ```
//!
//! A mixed-supplier cart still names a single supplier on the header.
//! Per-line `supplier_id` on the items is the exact attribution.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CheckoutRequest, Receipt, Reservation, Transaction, TransactionItem};

/// Rejects a payment that does not cover the expected total.
pub fn check_payment(received: Money, expected_total: Money) -> CoreResult<()> {
    if received < expected_total {
        return Err(CoreError::InsufficientPayment {
            received,
            total: expected_total,
        });
    }
    Ok(())
}

/// Supplier attribution of one checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    /// Supplier named on the transaction header.
    pub primary: i64,
    /// Every distinct supplier touched, ascending.
    pub suppliers: Vec<i64>,
}

/// Collects distinct non-zero supplier ids and picks the lowest as primary.
pub fn attribute(reservations: &[Reservation]) -> CoreResult<Attribution> {
    let suppliers: BTreeSet<i64> = reservations
        .iter()
        .filter_map(|r| r.supplier_id)
        .filter(|id| *id != 0)
        .collect();

    let primary = *suppliers.iter().next().ok_or(CoreError::NoValidSupplier)?;

    Ok(Attribution {
        primary,
        suppliers: suppliers.into_iter().collect(),
    })
}

/// Sum of every reserved line at its snapshotted price.
pub fn lines_total(reservations: &[Reservation]) -> CoreResult<Money> {
    reservations.iter().try_fold(Money::zero(), |acc, r| {
        acc.checked_add(r.line_total()?)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: "cart".to_string(),
            })
    })
}

/// True when `request` is the cart that was settled as `header` and `items`.
///
/// Lines compare by product and quantity in cart order. An item whose
/// product has since been deleted matches any product id.
pub fn same_settlement(
    request: &CheckoutRequest,
    header: &Transaction,
    items: &[TransactionItem],
) -> bool {
    header.received_cents == request.received_cents
        && header.total_cents == request.expected_total_cents
        && items.len() == request.lines.len()
        && items.iter().zip(&request.lines).all(|(item, line)| {
            item.quantity == line.quantity
                && item.product_id.map_or(true, |id| id == line.product_id)
        })
}

/// Renders a receipt timestamp.
pub fn format_receipt_date(at: DateTime<Utc>) -> String {
    at.format(Receipt::DATE_FORMAT).to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
