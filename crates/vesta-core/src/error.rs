//! # Error Types
//!
//! Domain-specific error types for vesta-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vesta-core errors (this file)                                         │
//! │  ├── ValidationError  - Return-request / order-shape violations         │
//! │  └── ShiftError       - Shift lifecycle and ordering violations         │
//! │                                                                         │
//! │  vesta-register errors (separate crate)                                │
//! │  └── RegisterError    - Wraps both, adds ledger/timeout/abort cases     │
//! │                                                                         │
//! │  Flow: ValidationError ─┐                                               │
//! │        ShiftError ──────┴─► RegisterError ─► Frontend notification      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (order id, refund id, amounts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message
//!
//! Note: a duplicate submission is NOT an error. The processor returns the
//! existing record for replayed attempts so operator retries stay safe.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{RefundMethod, RefundStatus};

// =============================================================================
// Validation Error
// =============================================================================

/// Return-request and order-shape validation errors.
///
/// These are always local: they block a submission synchronously and never
/// reach the refund ledger. No RefundRecord is created for any of them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Return reason is missing or malformed.
    ///
    /// ## When This Occurs
    /// - Reason "Other" chosen with an empty free-text field
    /// - Free-text reason longer than `MAX_REASON_LENGTH`
    ///
    /// ## User Workflow
    /// ```text
    /// Operator picks "Other", leaves the text box blank
    ///      │
    ///      ▼
    /// InvalidReason { detail: "free-text reason is required ..." }
    ///      │
    ///      ▼
    /// UI shows inline message next to the reason field
    /// ```
    #[error("invalid return reason: {detail}")]
    InvalidReason { detail: String },

    /// Chosen refund method is not in the allowed set for the order's
    /// payment method. Card is never allowed when the order was paid by card.
    #[error("refund method {method} is not allowed for this order (allowed: {allowed:?})")]
    InvalidMethod {
        method: RefundMethod,
        allowed: Vec<RefundMethod>,
    },

    /// Order already carries a settled refund; this design refunds the whole
    /// order exactly once.
    #[error("order {order_id} is not refundable (already fully refunded)")]
    OrderNotRefundable { order_id: String },

    /// Completed order arrived with no line items.
    #[error("order {order_id} has no line items")]
    EmptyOrder { order_id: String },

    /// A line item carries a non-positive quantity.
    #[error("line item {product_id} has non-positive quantity {quantity}")]
    NonPositiveQuantity { product_id: String, quantity: i64 },

    /// Order total does not equal the sum of its line totals.
    #[error("order {order_id} total is {declared_cents} cents but line items sum to {computed_cents} cents")]
    TotalMismatch {
        order_id: String,
        declared_cents: i64,
        computed_cents: i64,
    },

    /// A return request was checked against a different order than it names.
    #[error("return request targets order {expected} but was validated against {found}")]
    OrderMismatch { expected: String, found: String },
}

// =============================================================================
// Shift Error
// =============================================================================

/// Shift lifecycle and event-ordering violations.
///
/// These indicate a programming or ordering bug in the caller, not bad
/// operator input. They are reported and refused, never silently ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShiftError {
    /// A mutation arrived after the shift was closed.
    #[error("shift is closed; orders and refunds can no longer be recorded")]
    ShiftClosed,

    /// `close` was called on a shift that already ended.
    #[error("shift already closed at {ended_at}")]
    AlreadyClosed { ended_at: DateTime<Utc> },

    /// A refund references an order never recorded in this shift.
    #[error("refund references order {order_id}, which was not recorded in this shift")]
    UnknownOrder { order_id: String },

    /// Only settled refunds may enter the shift book.
    #[error("refund {refund_id} is {status}, only settled refunds can be recorded")]
    RefundNotSettled {
        refund_id: String,
        status: RefundStatus,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Convenience type alias for shift-book results.
pub type ShiftResult<T> = Result<T, ShiftError>;

// =============================================================================
// Unit Tests
// =============================================================================
