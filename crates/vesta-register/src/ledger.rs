//! # Refund Ledger Boundary
//!
//! The external financial system that makes a refund durable. The register
//! only ever talks to it through the [`RefundLedger`] trait; everything on
//! the other side (gateway, queue, settlement batch) is out of scope here.
//!
//! ## Submission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Submission Contract                         │
//! │                                                                         │
//! │   RefundProcessor                              Refund Ledger            │
//! │        │                                            │                   │
//! │        │  RefundSubmission                          │                   │
//! │        │  { refund_id, attempt_id, order_id,        │                   │
//! │        │    branch, cashier, amount, method,        │                   │
//! │        │    reason }                                │                   │
//! │        ├───────────────────────────────────────────►│                   │
//! │        │                                            │                   │
//! │        │  Ok(LedgerAck { reference, time })         │  durable ✓        │
//! │        │◄───────────────────────────────────────────┤                   │
//! │        │            - or -                          │                   │
//! │        │  Err(LedgerRejection { reason })           │  refused ✗        │
//! │        │◄───────────────────────────────────────────┤                   │
//! │                                                                         │
//! │  RULES:                                                                │
//! │  • An acknowledged refund is durable. It is NEVER reverted locally.    │
//! │  • The (order_id, attempt_id) pair identifies the attempt; the ledger  │
//! │    may use it for its own deduplication.                               │
//! │  • The caller bounds the call with a timeout; a slow ledger is a       │
//! │    FAILED attempt on our side, retried only by a fresh attempt.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vesta_core::types::{RefundMethod, RefundRecord};

// =============================================================================
// Wire Types
// =============================================================================

/// Everything the ledger needs to settle one refund attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundSubmission {
    /// Local refund record id (UUID v4).
    pub refund_id: String,
    /// Operator attempt id, the caller half of the idempotency key.
    pub attempt_id: String,
    /// Order being reversed.
    pub order_id: String,
    /// Branch issuing the refund.
    pub branch_id: String,
    /// Cashier issuing the refund.
    pub cashier_id: String,
    /// Amount in cents.
    pub amount_cents: i64,
    /// Payout method.
    pub method: RefundMethod,
    /// Human-readable return reason.
    pub reason: String,
}

impl RefundSubmission {
    /// Builds the wire payload from a PENDING refund record.
    pub fn for_record(record: &RefundRecord) -> Self {
        RefundSubmission {
            refund_id: record.id.clone(),
            attempt_id: record.attempt_id.clone(),
            order_id: record.order_id.clone(),
            branch_id: record.branch_id.clone(),
            cashier_id: record.cashier_id.clone(),
            amount_cents: record.amount_cents,
            method: record.method,
            reason: record.reason.label().to_string(),
        }
    }
}

/// Positive acknowledgement: the refund is durable on the ledger side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAck {
    /// Ledger-side reference for reconciliation.
    pub reference: String,
    /// When the ledger recorded the refund.
    pub acknowledged_at: DateTime<Utc>,
}

/// The ledger refused the submission.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct LedgerRejection {
    /// Ledger-side explanation, forwarded to the operator.
    pub reason: String,
}

impl LedgerRejection {
    /// Creates a rejection with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        LedgerRejection {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Ledger Trait
// =============================================================================

/// The external refund ledger.
#[async_trait]
pub trait RefundLedger: Send + Sync {
    /// Submits one refund attempt and waits for the ledger's verdict.
    async fn submit(&self, submission: &RefundSubmission) -> Result<LedgerAck, LedgerRejection>;
}

// =============================================================================
// Test Doubles
// =============================================================================

/// Mock ledgers and tracing bootstrap shared by the register tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Once;
    use std::time::Duration;

    static TRACING: Once = Once::new();

    /// Initializes tracing for tests (only once), routing crate logs
    /// through the test writer so warn paths show up in failure output.
    pub fn init_tracing() {
        TRACING.call_once(|| {
            tracing_subscriber::fmt()
                .with_env_filter("info,vesta_register=debug")
                .with_test_writer()
                .try_init()
                .ok();
        });
    }

    /// Acknowledges every submission, numbering the references.
    #[derive(Default)]
    pub struct AckLedger {
        calls: AtomicU64,
    }

    impl AckLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// How many submissions reached the ledger.
        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefundLedger for AckLedger {
        async fn submit(&self, _: &RefundSubmission) -> Result<LedgerAck, LedgerRejection> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(LedgerAck {
                reference: format!("LGR-{n:04}"),
                acknowledged_at: Utc::now(),
            })
        }
    }

    /// Rejects every submission with a fixed reason.
    pub struct RejectLedger {
        pub reason: String,
    }

    impl RejectLedger {
        pub fn new(reason: impl Into<String>) -> Self {
            RejectLedger {
                reason: reason.into(),
            }
        }
    }

    #[async_trait]
    impl RefundLedger for RejectLedger {
        async fn submit(&self, _: &RefundSubmission) -> Result<LedgerAck, LedgerRejection> {
            Err(LedgerRejection::new(self.reason.clone()))
        }
    }

    /// Rejects the first submission, acknowledges every later one.
    #[derive(Default)]
    pub struct FailOnceLedger {
        calls: AtomicU64,
    }

    impl FailOnceLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// How many submissions reached the ledger.
        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefundLedger for FailOnceLedger {
        async fn submit(&self, _: &RefundSubmission) -> Result<LedgerAck, LedgerRejection> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(LedgerRejection::new("insufficient cash float"))
            } else {
                Ok(LedgerAck {
                    reference: format!("LGR-{n:04}"),
                    acknowledged_at: Utc::now(),
                })
            }
        }
    }

    /// Never answers within any sane timeout.
    pub struct StallLedger;

    #[async_trait]
    impl RefundLedger for StallLedger {
        async fn submit(&self, _: &RefundSubmission) -> Result<LedgerAck, LedgerRejection> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(LedgerAck {
                reference: "LGR-LATE".into(),
                acknowledged_at: Utc::now(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vesta_core::types::{
        LineItem, Order, PaymentMethod, ReturnReason, ReturnRequest, SessionContext,
    };

    #[test]
    fn test_submission_built_from_record() {
        let order = Order::new(
            "ORD-022",
            "BR-1",
            "CASH-2",
            None,
            vec![LineItem {
                product_id: "P-7".into(),
                name: "Olive oil 500ml".into(),
                unit_price_cents: 9500,
                quantity: 1,
            }],
            9500,
            PaymentMethod::Cash,
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
        )
        .unwrap();
        let request = ReturnRequest::new(
            "ORD-022",
            ReturnReason::DamagedProduct,
            vesta_core::types::RefundMethod::Cash,
            "attempt-1",
        )
        .unwrap();
        let session = SessionContext::new("BR-1", "CASH-9");
        let record = RefundRecord::pending(
            "a3f1c9d0-0000-4000-8000-000000000001",
            &order,
            &request,
            &session,
            Utc.with_ymd_and_hms(2025, 3, 14, 11, 0, 0).unwrap(),
        );

        let submission = RefundSubmission::for_record(&record);
        assert_eq!(submission.order_id, "ORD-022");
        assert_eq!(submission.attempt_id, "attempt-1");
        assert_eq!(submission.amount_cents, 9500);
        // Branch and cashier come from the refunding session, not the sale
        assert_eq!(submission.cashier_id, "CASH-9");
        assert_eq!(submission.reason, "Damaged product");
    }

    #[test]
    fn test_rejection_displays_reason() {
        let rejection = LedgerRejection::new("duplicate reference");
        assert_eq!(rejection.to_string(), "duplicate reference");
    }
}
