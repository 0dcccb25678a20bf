//! # vesta-core: Pure Domain Logic for Vesta POS
//!
//! This crate is the **heart** of the Vesta refund and shift-reconciliation
//! workflow. It contains all domain logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vesta POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (external)                          │   │
//! │  │    Order select ──► Return dialog ──► Receipt ──► Shift report  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ typed payloads (ts-rs exports)         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    vesta-register                               │   │
//! │  │    RefundProcessor, ShiftAggregator actor, event bus, config    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vesta-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   shift   │  │ validation│  │   │
//! │  │   │   Order   │  │   Money   │  │   Shift   │  │   rules   │  │   │
//! │  │   │  Refund   │  │  (cents)  │  │ Snapshot  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                  ┌───────────┐                                  │   │
//! │  │                  │  receipt  │                                  │   │
//! │  │                  │ rendering │                                  │   │
//! │  │                  └───────────┘                                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK • NO ASYNC • PURE FUNCTIONS                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, ReturnRequest, RefundRecord, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Return-request validation rules
//! - [`receipt`] - Pure refund-receipt rendering
//! - [`shift`] - The running shift book and its snapshot
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, clock access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! Timestamps are `chrono` *types* only: every instant (order completion,
//! refund settlement, shift boundaries) arrives as a parameter, so replaying
//! the same event sequence always reproduces the same book.
//!
//! ## Example Usage
//!
//! ```rust
//! use vesta_core::money::Money;
//! use vesta_core::types::{PaymentMethod, RefundMethod};
//! use vesta_core::validation::permitted_refund_methods;
//!
//! // Create money from cents (never from floats!)
//! let total = Money::from_cents(9500); // $95.00
//!
//! // Card orders never get a card refund offered
//! let allowed = permitted_refund_methods(PaymentMethod::Card);
//! assert_eq!(allowed, vec![RefundMethod::Cash]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod receipt;
pub mod shift;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use vesta_core::Money` instead of
// `use vesta_core::money::Money`

pub use error::{ShiftError, ShiftResult, ValidationError, ValidationResult};
pub use money::Money;
pub use receipt::{render_refund_receipt, ReceiptLine, ReceiptPayload};
pub use shift::{OrderSummary, Shift, ShiftSnapshot, TopProduct};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a free-text "Other" return reason, in characters.
///
/// ## Business Reason
/// The reason is printed on the refund receipt and forwarded to the ledger;
/// both truncate badly. Operators who need more than this belong in an
/// incident report, not a receipt line.
pub const MAX_REASON_LENGTH: usize = 200;

/// Default size of the shift's recent-orders window.
///
/// ## Business Reason
/// The shift screen shows a short "latest activity" strip, not the full
/// order log. Ten entries covers what a cashier actually glances at; the
/// register layer can widen it via `[shift] recent_orders` in its config.
pub const DEFAULT_RECENT_ORDERS: usize = 10;
