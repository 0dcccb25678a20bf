//! # Domain Types
//!
//! Core domain types for the refund and shift-reconciliation workflow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │  ReturnRequest  │   │  RefundRecord   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  order_id       │   │  id (UUID)      │       │
//! │  │  items[]        │   │  reason         │   │  order_id       │       │
//! │  │  total_cents    │   │  method         │   │  amount_cents   │       │
//! │  │  payment_method │   │  attempt_id     │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ReturnReason   │   │  RefundMethod   │   │  RefundStatus   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  DamagedProduct │   │  Cash           │   │  Pending        │       │
//! │  │  WrongItem      │   │  Card           │   │  Settled        │       │
//! │  │  ChangedMind    │   │  Wallet         │   │  Failed         │       │
//! │  │  ExpiredProduct │   └─────────────────┘   └─────────────────┘       │
//! │  │  Other(text)    │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Construction Invariants
//! Invariants live in the validating constructors (`Order::new`,
//! `ReturnRequest::new`), not in ad-hoc checks at call sites. An `Order`
//! whose total disagrees with its line items cannot be built; a
//! `ReturnRequest` with a blank "Other" reason cannot be built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::validation::validate_reason;

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid for the original order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Store wallet / loyalty balance.
    Wallet,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Refund Method
// =============================================================================

/// How the refund is paid back to the customer.
///
/// The allowed set depends on the order's payment method, see
/// [`crate::validation::permitted_refund_methods`]. Card is never offered
/// when the original payment was already card (the card terminal reverses
/// the original charge instead of issuing a second credit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// Cash out of the drawer.
    Cash,
    /// Credit to a card on the external terminal.
    Card,
    /// Credit to the store wallet / loyalty balance.
    Wallet,
}

impl fmt::Display for RefundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefundMethod::Cash => "cash",
            RefundMethod::Card => "card",
            RefundMethod::Wallet => "wallet",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Return Reason
// =============================================================================

/// Why the customer is returning the order.
///
/// A fixed enumerated set plus a free-text escape hatch. The free text is
/// required (non-blank after trimming) and capped at
/// [`crate::MAX_REASON_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    /// Product arrived or was discovered damaged.
    DamagedProduct,
    /// Customer received a different item than ordered.
    WrongItem,
    /// Customer changed their mind.
    ChangedMind,
    /// Product past its expiry date.
    ExpiredProduct,
    /// Anything else, described by the operator.
    Other(String),
}

impl ReturnReason {
    /// Human-readable label used on receipts and in the ledger payload.
    pub fn label(&self) -> &str {
        match self {
            ReturnReason::DamagedProduct => "Damaged product",
            ReturnReason::WrongItem => "Wrong item",
            ReturnReason::ChangedMind => "Customer changed mind",
            ReturnReason::ExpiredProduct => "Expired product",
            ReturnReason::Other(text) => text.as_str(),
        }
    }
}

impl fmt::Display for ReturnReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// =============================================================================
// Refund Status
// =============================================================================

/// Lifecycle of a refund record.
///
/// ```text
/// PENDING ──► SETTLED   (ledger acknowledged; durable, never reverted)
///    │
///    └─────► FAILED    (ledger rejected / timed out / operator aborted;
///                       kept for audit, retry is a NEW attempt)
/// ```
///
/// Terminal states are immutable: `mark_settled` / `mark_failed` refuse to
/// move a record that already reached SETTLED or FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Created locally, ledger call in flight.
    Pending,
    /// Acknowledged durable by the ledger.
    Settled,
    /// Rejected, timed out, or aborted.
    Failed,
}

impl RefundStatus {
    /// Settled and Failed are terminal.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RefundStatus::Settled | RefundStatus::Failed)
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Settled => "settled",
            RefundStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A line item on a completed order.
/// Uses snapshot pattern: name and price are frozen at sale time, so later
/// catalog edits never change what the customer actually paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    /// Product this line refers to.
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Quantity sold.
    pub quantity: i64,
}

impl LineItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Line total in cents (unit price × quantity).
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A completed order, immutable once constructed.
///
/// Invariant: `total_cents == Σ(item.unit_price_cents × item.quantity)`,
/// items non-empty, every quantity positive. `Order::new` refuses to build
/// an order that violates any of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    /// Business identifier, e.g. "ORD-022".
    pub id: String,
    /// Branch where the order was placed.
    pub branch_id: String,
    /// Cashier who completed the sale.
    pub cashier_id: String,
    /// Loyalty customer, if one was attached.
    pub customer_id: Option<String>,
    /// Line items with frozen names and prices.
    pub items: Vec<LineItem>,
    /// Order total in cents.
    pub total_cents: i64,
    /// How the customer paid.
    pub payment_method: PaymentMethod,
    /// When the sale was completed.
    #[ts(as = "String")]
    pub completed_at: DateTime<Utc>,
}

impl Order {
    /// Builds a completed order, enforcing the total/line-item invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        branch_id: impl Into<String>,
        cashier_id: impl Into<String>,
        customer_id: Option<String>,
        items: Vec<LineItem>,
        total_cents: i64,
        payment_method: PaymentMethod,
        completed_at: DateTime<Utc>,
    ) -> ValidationResult<Self> {
        let order = Order {
            id: id.into(),
            branch_id: branch_id.into(),
            cashier_id: cashier_id.into(),
            customer_id,
            items,
            total_cents,
            payment_method,
            completed_at,
        };
        order.verify()?;
        Ok(order)
    }

    /// Re-checks the construction invariant.
    ///
    /// Orders normally enter the system through `Order::new`, but records
    /// arriving from an external order source cross a trust boundary and are
    /// verified again before a refund is computed from them.
    pub fn verify(&self) -> ValidationResult<()> {
        if self.items.is_empty() {
            return Err(ValidationError::EmptyOrder {
                order_id: self.id.clone(),
            });
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ValidationError::NonPositiveQuantity {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                });
            }
        }
        let computed: i64 = self.items.iter().map(LineItem::line_total_cents).sum();
        if computed != self.total_cents {
            return Err(ValidationError::TotalMismatch {
                order_id: self.id.clone(),
                declared_cents: self.total_cents,
                computed_cents: computed,
            });
        }
        Ok(())
    }

    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Total number of units across all line items.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

// =============================================================================
// Return Request
// =============================================================================

/// An operator-entered request to return one completed order.
///
/// Ephemeral: it exists only for the duration of the refund flow and is
/// never persisted. The `attempt_id` is the caller-supplied half of the
/// idempotency key (`order_id` + `attempt_id`); submitting the same request
/// twice (double-click, flaky UI) is deduplicated, while an operator retry
/// after a failure is a fresh request with a fresh attempt id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequest {
    /// Order being returned.
    pub order_id: String,
    /// Why the customer is returning it.
    pub reason: ReturnReason,
    /// How the refund should be paid out.
    pub method: RefundMethod,
    /// Caller-supplied id for this submission attempt.
    pub attempt_id: String,
}

impl ReturnRequest {
    /// Builds a return request, enforcing the reason invariant up front.
    ///
    /// The refund-method check needs the order's payment method and happens
    /// in [`crate::validation::validate_return_request`].
    pub fn new(
        order_id: impl Into<String>,
        reason: ReturnReason,
        method: RefundMethod,
        attempt_id: impl Into<String>,
    ) -> ValidationResult<Self> {
        validate_reason(&reason)?;
        Ok(ReturnRequest {
            order_id: order_id.into(),
            reason,
            method,
            attempt_id: attempt_id.into(),
        })
    }
}

// =============================================================================
// Refund Record
// =============================================================================

/// The durable outcome of a refund submission.
///
/// Created PENDING by the refund processor, then moved exactly once to
/// SETTLED (ledger acknowledged) or FAILED (rejected / timed out / aborted,
/// kept for audit). The amount is always derived from the order total, never
/// re-entered by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundRecord {
    /// Unique identifier (UUID v4), assigned by the processor.
    pub id: String,
    /// Order this refund reverses.
    pub order_id: String,
    /// Branch issuing the refund.
    pub branch_id: String,
    /// Cashier issuing the refund (may differ from the selling cashier).
    pub cashier_id: String,
    /// Refunded amount in cents, equal to the order total.
    pub amount_cents: i64,
    /// How the refund was paid out.
    pub method: RefundMethod,
    /// Why the customer returned the order.
    pub reason: ReturnReason,
    /// Current lifecycle state.
    pub status: RefundStatus,
    /// Attempt id this record was created under (idempotency key half).
    pub attempt_id: String,
    /// When the record was created (PENDING).
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// When the ledger acknowledged, if it did.
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl RefundRecord {
    /// Creates a PENDING record for an accepted return request.
    ///
    /// Branch and cashier come from the operator session, not from the
    /// order: the refunding cashier may not be the selling cashier.
    pub fn pending(
        id: impl Into<String>,
        order: &Order,
        request: &ReturnRequest,
        session: &SessionContext,
        created_at: DateTime<Utc>,
    ) -> Self {
        RefundRecord {
            id: id.into(),
            order_id: order.id.clone(),
            branch_id: session.branch_id.clone(),
            cashier_id: session.cashier_id.clone(),
            amount_cents: order.total_cents,
            method: request.method,
            reason: request.reason.clone(),
            status: RefundStatus::Pending,
            attempt_id: request.attempt_id.clone(),
            created_at,
            settled_at: None,
        }
    }

    /// Returns the refunded amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// True once the record reached SETTLED or FAILED.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True if the ledger acknowledged this refund.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.status == RefundStatus::Settled
    }

    /// Moves PENDING → SETTLED. Returns false (and changes nothing) if the
    /// record already reached a terminal state.
    pub fn mark_settled(&mut self, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RefundStatus::Settled;
        self.settled_at = Some(at);
        true
    }

    /// Moves PENDING → FAILED. Returns false (and changes nothing) if the
    /// record already reached a terminal state.
    pub fn mark_failed(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RefundStatus::Failed;
        true
    }
}

// =============================================================================
// Session Context
// =============================================================================

/// The operator session a refund or shift runs under.
///
/// Always passed explicitly. Branch and cashier are never ambient globals;
/// every record that needs them takes them from this context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionContext {
    /// Branch the terminal belongs to.
    pub branch_id: String,
    /// Cashier signed in at the terminal.
    pub cashier_id: String,
}

impl SessionContext {
    /// Creates a session context.
    pub fn new(branch_id: impl Into<String>, cashier_id: impl Into<String>) -> Self {
        SessionContext {
            branch_id: branch_id.into(),
            cashier_id: cashier_id.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
