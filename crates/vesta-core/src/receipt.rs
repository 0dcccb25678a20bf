//! # Refund Receipt Rendering
//!
//! Pure rendering of a settled (or failed, for reprint-on-audit) refund into
//! a structured receipt payload. The renderer reads the order and the refund
//! record and nothing else: no clock, no config, no session state. Calling it
//! twice with the same inputs produces identical payloads.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        REFUND RECEIPT        │
//! │  Order ORD-022   Branch BR-1 │
//! │  Cashier CASH-2              │
//! │  ──────────────────────────  │
//! │  Olive Oil 1L   1 × $95.00   │
//! │  ──────────────────────────  │
//! │  TOTAL REFUND        $95.00  │
//! │  Method: cash                │
//! │  Reason: Damaged product     │
//! └──────────────────────────────┘
//! ```
//!
//! The payload is data, not text: the receipt printer / frontend decides the
//! layout above. Field names are camelCase on the wire, matching the other
//! display payloads the frontend consumes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Order, RefundMethod, RefundRecord};

// =============================================================================
// Receipt Payload
// =============================================================================

/// One rendered line on a refund receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub product_id: String,
    /// Product name frozen at sale time.
    pub name: String,
    /// Original unit price in cents.
    pub unit_price_cents: i64,
    /// Units returned. Whole-order refunds return every ordered unit, so
    /// this always equals the ordered quantity today.
    pub return_quantity: i64,
    /// unit price × returned quantity.
    pub line_total_cents: i64,
}

/// Structured refund receipt handed to the receipt renderer / printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub refund_id: String,
    pub order_id: String,
    pub branch_id: String,
    pub cashier_id: String,
    /// Settlement time if settled, otherwise record creation time (RFC 3339).
    /// Taken from the record, never from the wall clock.
    pub timestamp: String,
    pub lines: Vec<ReceiptLine>,
    pub total_refund_cents: i64,
    pub method: RefundMethod,
    /// Human-readable reason label.
    pub reason: String,
}

// =============================================================================
// Rendering
// =============================================================================

/// Renders a refund receipt from the original order and the refund record.
///
/// Pure function: no side effects, no mutation of either input, identical
/// output for identical inputs. Branch and cashier come from the record (the
/// refunding session), not from the order.
pub fn render_refund_receipt(order: &Order, record: &RefundRecord) -> ReceiptPayload {
    let lines: Vec<ReceiptLine> = order
        .items
        .iter()
        .map(|item| ReceiptLine {
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            unit_price_cents: item.unit_price_cents,
            return_quantity: item.quantity,
            line_total_cents: item.line_total_cents(),
        })
        .collect();

    ReceiptPayload {
        refund_id: record.id.clone(),
        order_id: order.id.clone(),
        branch_id: record.branch_id.clone(),
        cashier_id: record.cashier_id.clone(),
        timestamp: record.settled_at.unwrap_or(record.created_at).to_rfc3339(),
        lines,
        total_refund_cents: record.amount_cents,
        method: record.method,
        reason: record.reason.label().to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
