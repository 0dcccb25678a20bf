//! # vesta-register: Refund & Shift Runtime for Vesta POS
//!
//! This crate provides the async runtime layer of the register: refund
//! execution against an external payment ledger, live shift bookkeeping,
//! and the event bus that ties the two together. All money math and
//! business rules live in `vesta-core`; this crate supplies the clock,
//! the tasks, and the channels.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Register Runtime Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 RegisterSession (Main Orchestrator)              │  │
//! │  │                                                                  │  │
//! │  │  Wires bus + processor + shift actor + feed at sign-in          │  │
//! │  │  Hands out cloneable handles to the rest of the terminal        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ RefundProcessor│  │ ShiftAggregator│  │  ShiftFeed             │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Validates and  │  │ Owns the Shift │  │ Subscribes to the bus  │    │
//! │  │ settles refunds│  │ book behind an │  │ and folds sales and    │    │
//! │  │ Dedupe per     │  │ mpsc command   │  │ settled refunds into   │    │
//! │  │ (order,attempt)│  │ queue          │  │ the shift book         │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                         EventBus                                │   │
//! │  │                                                                 │   │
//! │  │ tokio::broadcast fan-out of RegisterEvent                       │   │
//! │  │ order_completed / refund_settled / refund_failed / shift_closed │   │
//! │  │ Feed, UI toasts, and reporting all subscribe independently      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  OUTSIDE COLLABORATORS (trait objects, injected at session start):     │
//! │  • OrderSource  - Sale lookup by order id                              │
//! │  • RefundLedger - External settlement with timeout + abort             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`session`] - Main `RegisterSession` orchestrator
//! - [`processor`] - Refund validation, dedupe, and ledger settlement
//! - [`aggregator`] - Shift book actor and cloneable `ShiftHandle`
//! - [`feed`] - Bus-to-shift bridge task
//! - [`notify`] - `RegisterEvent` and the broadcast `EventBus`
//! - [`ledger`] - `RefundLedger` trait and wire types
//! - [`source`] - `OrderSource` trait and in-memory implementation
//! - [`config`] - Register configuration (ledger timeout, shift window)
//! - [`error`] - Register error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chrono::Utc;
//! use vesta_core::types::{RefundMethod, ReturnReason, ReturnRequest, SessionContext};
//! use vesta_register::{RegisterConfig, RegisterSession};
//!
//! // Sign the cashier in
//! let config = RegisterConfig::load_or_default(None);
//! let session = RegisterSession::start(
//!     SessionContext::new("BR-1", "CASH-9"),
//!     orders,
//!     ledger,
//!     &config,
//!     Utc::now(),
//! );
//!
//! // Process a return at the counter
//! let request = ReturnRequest::new(
//!     "ORD-022",
//!     ReturnReason::DamagedProduct,
//!     RefundMethod::Cash,
//!     "attempt-1",
//! )?;
//! let outcome = session.processor().submit(&request).await?;
//! println!("refund {}", outcome.record().id);
//!
//! // End of day
//! let snapshot = session.close_shift(Utc::now()).await?;
//! println!("net sales: {}", snapshot.net_sales_cents);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Refund pipeline
pub mod ledger;
pub mod processor;
pub mod source;

// Shift bookkeeping
pub mod aggregator;
pub mod feed;

// Session plumbing
pub mod config;
pub mod error;
pub mod notify;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

// Refund pipeline types
pub use ledger::{LedgerAck, LedgerRejection, RefundLedger, RefundSubmission};
pub use processor::{RefundProcessor, SubmitOutcome};
pub use source::{MemoryOrderSource, OrderSource};

// Shift bookkeeping types
pub use aggregator::{ShiftAggregator, ShiftHandle};
pub use feed::ShiftFeed;

// Session plumbing types
pub use config::{LedgerSettings, RegisterConfig, ShiftSettings};
pub use error::{RegisterError, RegisterResult};
pub use notify::{EventBus, RegisterEvent};
pub use session::RegisterSession;
