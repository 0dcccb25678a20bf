//! # Refund Processor Module
//!
//! Validates and executes one return/refund against one completed order.
//! The processor is the only component that talks to the refund ledger; it
//! turns a [`ReturnRequest`] into a terminal [`RefundRecord`] and a printed
//! receipt, and announces the outcome on the bus.
//!
//! ## Submission Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Refund Submission Pipeline                         │
//! │                                                                         │
//! │  ReturnRequest                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐   miss   ┌─────────────────────────────────────────┐  │
//! │  │ OrderSource  ├─────────►│ Err(OrderNotFound)                      │  │
//! │  └──────┬───────┘          └─────────────────────────────────────────┘  │
//! │         │ hit                                                           │
//! │         ▼                                                               │
//! │  ┌──────────────────────── per-order async lock ───────────────────┐   │
//! │  │                                                                 │   │
//! │  │  1. attempt id already seen?      ──► Duplicate(existing)       │   │
//! │  │  2. order already settled?        ──► Duplicate(settled)        │   │
//! │  │  3. validate order + reason + method  (no record on failure)    │   │
//! │  │  4. create PENDING record in the book                           │   │
//! │  │  5. ledger call, bounded:                                       │   │
//! │  │       timeout ─► FAILED  (retryable)                            │   │
//! │  │       reject  ─► FAILED  (retryable)                            │   │
//! │  │       abort   ─► FAILED  (retryable, late ack dropped)          │   │
//! │  │       ack     ─► SETTLED (durable, never reverted)              │   │
//! │  │  6. publish RefundSettled / RefundFailed                        │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  SubmitOutcome::Settled { record, receipt }                             │
//! │                                                                         │
//! │  IDEMPOTENCY KEY: (order_id, attempt_id)                               │
//! │  ─────────────────────────────────────────                             │
//! │  A double-click replays the same attempt id and gets the existing      │
//! │  record back. An operator RETRY after a failure is a new attempt       │
//! │  with a fresh id.                                                       │
//! │                                                                         │
//! │  AT MOST ONE SETTLED REFUND PER ORDER:                                 │
//! │  ───────────────────────────────────────                               │
//! │  The dedupe check, the ledger call, and the terminal-state write all   │
//! │  happen under the same per-order lock, so two racing submits           │
//! │  serialize and the loser observes the winner's settled record.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vesta_core::error::ValidationError;
use vesta_core::money::Money;
use vesta_core::receipt::{render_refund_receipt, ReceiptPayload};
use vesta_core::types::{Order, RefundRecord, ReturnRequest, SessionContext};
use vesta_core::validation::validate_return_request;

use crate::config::RegisterConfig;
use crate::error::{RegisterError, RegisterResult};
use crate::ledger::{RefundLedger, RefundSubmission};
use crate::notify::{EventBus, RegisterEvent};
use crate::source::OrderSource;

// =============================================================================
// Submit Outcome
// =============================================================================

/// What a submission call produced.
///
/// A duplicate is NOT an error: the existing record comes back so the UI can
/// show the operator what already happened.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The ledger acknowledged the refund. The receipt is ready to print.
    Settled {
        record: RefundRecord,
        receipt: ReceiptPayload,
    },
    /// The attempt id was already seen, or the order already has a settled
    /// refund. Nothing changed; this is the existing record.
    Duplicate(RefundRecord),
}

impl SubmitOutcome {
    /// The record this outcome refers to.
    pub fn record(&self) -> &RefundRecord {
        match self {
            SubmitOutcome::Settled { record, .. } => record,
            SubmitOutcome::Duplicate(record) => record,
        }
    }

    /// True when nothing new happened.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmitOutcome::Duplicate(_))
    }
}

// =============================================================================
// Refund Book
// =============================================================================

/// Every attempt this processor has made, in creation order.
#[derive(Default)]
struct RefundBook {
    records: Vec<RefundRecord>,
    /// (order_id, attempt_id) -> index into `records`.
    attempts: HashMap<(String, String), usize>,
    /// order_id -> index of its settled record.
    settled: HashMap<String, usize>,
}

impl RefundBook {
    fn attempt(&self, order_id: &str, attempt_id: &str) -> Option<&RefundRecord> {
        self.attempts
            .get(&(order_id.to_string(), attempt_id.to_string()))
            .map(|&index| &self.records[index])
    }

    fn settled_for(&self, order_id: &str) -> Option<&RefundRecord> {
        self.settled.get(order_id).map(|&index| &self.records[index])
    }

    fn insert(&mut self, record: RefundRecord) -> usize {
        let index = self.records.len();
        self.attempts.insert(
            (record.order_id.clone(), record.attempt_id.clone()),
            index,
        );
        self.records.push(record);
        index
    }

    /// Moves the attempt to SETTLED and indexes it as the order's refund.
    /// Refuses silently if the record already reached a terminal state.
    fn settle(&mut self, index: usize, at: DateTime<Utc>) -> RefundRecord {
        if self.records[index].mark_settled(at) {
            self.settled
                .insert(self.records[index].order_id.clone(), index);
        }
        self.records[index].clone()
    }

    /// Moves the attempt to FAILED, keeping it for audit.
    fn fail(&mut self, index: usize) -> RefundRecord {
        self.records[index].mark_failed();
        self.records[index].clone()
    }

    /// All attempts against one order, most recent first.
    fn refunds_for(&self, order_id: &str) -> Vec<RefundRecord> {
        self.records
            .iter()
            .filter(|record| record.order_id == order_id)
            .rev()
            .cloned()
            .collect()
    }
}

// =============================================================================
// Refund Processor
// =============================================================================

/// Executes refunds for one operator session.
pub struct RefundProcessor {
    /// Operator session every record is issued under.
    session: SessionContext,
    /// Where completed orders come from.
    orders: Arc<dyn OrderSource>,
    /// The external ledger that makes refunds durable.
    ledger: Arc<dyn RefundLedger>,
    /// Bus for settle/fail announcements.
    bus: EventBus,
    /// Upper bound on one ledger call, in milliseconds.
    ledger_timeout_ms: u64,
    /// Attempt history and settled index.
    book: Mutex<RefundBook>,
    /// Per-order submission locks, created on first use.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefundProcessor {
    /// Creates a processor for one operator session.
    pub fn new(
        session: SessionContext,
        orders: Arc<dyn OrderSource>,
        ledger: Arc<dyn RefundLedger>,
        bus: EventBus,
        config: &RegisterConfig,
    ) -> Self {
        RefundProcessor {
            session,
            orders,
            ledger,
            bus,
            ledger_timeout_ms: config.ledger.timeout_ms,
            book: Mutex::new(RefundBook::default()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether this request could be submitted right now.
    ///
    /// Verifies that the order has no settled refund yet, that the reason is
    /// well-formed, and that the payout method is permitted for the order's
    /// payment method. Makes no record and calls no ledger.
    pub async fn validate(
        &self,
        order: &Order,
        request: &ReturnRequest,
    ) -> Result<(), ValidationError> {
        if self.book.lock().await.settled_for(&order.id).is_some() {
            return Err(ValidationError::OrderNotRefundable {
                order_id: order.id.clone(),
            });
        }
        validate_return_request(order, request)
    }

    /// The amount a whole-order refund pays back: the order total.
    pub fn compute_refund_amount(&self, order: &Order) -> Money {
        order.total()
    }

    /// Submits a return request end to end.
    ///
    /// See the module diagram for the pipeline. Runs until the ledger
    /// answers or the configured timeout elapses.
    pub async fn submit(&self, request: &ReturnRequest) -> RegisterResult<SubmitOutcome> {
        self.submit_abortable(request, CancellationToken::new()).await
    }

    /// Like [`submit`](Self::submit), but the operator can abort while the
    /// ledger call is in flight.
    ///
    /// An abort marks the attempt FAILED. The in-flight ledger future is
    /// dropped, so a late acknowledgement can never flip the attempt back:
    /// its terminal state was written under the order lock exactly once.
    pub async fn submit_abortable(
        &self,
        request: &ReturnRequest,
        abort: CancellationToken,
    ) -> RegisterResult<SubmitOutcome> {
        let order = self
            .orders
            .order_by_id(&request.order_id)
            .await
            .ok_or_else(|| RegisterError::OrderNotFound {
                order_id: request.order_id.clone(),
            })?;

        let order_lock = self.order_lock(&order.id).await;
        let _guard = order_lock.lock().await;

        // Dedupe inside the lock: whoever got here first already decided
        {
            let book = self.book.lock().await;
            if let Some(existing) = book.attempt(&order.id, &request.attempt_id) {
                debug!(
                    order_id = %order.id,
                    attempt_id = %request.attempt_id,
                    status = %existing.status,
                    "Attempt replayed, returning existing record"
                );
                return Ok(SubmitOutcome::Duplicate(existing.clone()));
            }
            if let Some(existing) = book.settled_for(&order.id) {
                debug!(
                    order_id = %order.id,
                    refund_id = %existing.id,
                    "Order already settled, returning existing record"
                );
                return Ok(SubmitOutcome::Duplicate(existing.clone()));
            }
        }

        // Orders from the source cross a trust boundary; re-check invariants
        order.verify()?;
        validate_return_request(&order, request)?;

        let refund_id = Uuid::new_v4().to_string();
        let record = RefundRecord::pending(&refund_id, &order, request, &self.session, Utc::now());
        let index = self.book.lock().await.insert(record.clone());

        info!(
            refund_id = %record.id,
            order_id = %order.id,
            amount_cents = record.amount_cents,
            method = %record.method,
            "Submitting refund to ledger"
        );

        let submission = RefundSubmission::for_record(&record);
        let timeout = Duration::from_millis(self.ledger_timeout_ms);
        let verdict = tokio::select! {
            _ = abort.cancelled() => Err(RegisterError::Aborted),
            outcome = tokio::time::timeout(timeout, self.ledger.submit(&submission)) => {
                match outcome {
                    Ok(Ok(ack)) => Ok(ack),
                    Ok(Err(rejection)) => Err(RegisterError::LedgerRejected {
                        reason: rejection.reason,
                    }),
                    Err(_) => Err(RegisterError::LedgerTimeout {
                        timeout_ms: self.ledger_timeout_ms,
                    }),
                }
            }
        };

        match verdict {
            Ok(ack) => {
                let settled = self.book.lock().await.settle(index, ack.acknowledged_at);
                info!(
                    refund_id = %settled.id,
                    order_id = %settled.order_id,
                    ledger_reference = %ack.reference,
                    "Refund settled"
                );
                self.bus.publish(RegisterEvent::RefundSettled(settled.clone()));
                let receipt = render_refund_receipt(&order, &settled);
                Ok(SubmitOutcome::Settled {
                    record: settled,
                    receipt,
                })
            }
            Err(failure) => {
                let failed = self.book.lock().await.fail(index);
                warn!(
                    refund_id = %failed.id,
                    order_id = %failed.order_id,
                    error = %failure,
                    "Refund attempt failed"
                );
                self.bus.publish(RegisterEvent::RefundFailed {
                    order_id: failed.order_id.clone(),
                    attempt_id: failed.attempt_id.clone(),
                    reason: failure.to_string(),
                    retryable: failure.is_retryable(),
                });
                Err(failure)
            }
        }
    }

    // =========================================================================
    // Audit Queries
    // =========================================================================

    /// The settled refund for an order, if one exists.
    pub async fn settled_refund(&self, order_id: &str) -> Option<RefundRecord> {
        self.book.lock().await.settled_for(order_id).cloned()
    }

    /// Every attempt against an order, most recent first.
    pub async fn refunds_for(&self, order_id: &str) -> Vec<RefundRecord> {
        self.book.lock().await.refunds_for(order_id)
    }

    /// Returns the per-order lock, creating it on first use.
    async fn order_lock(&self, order_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(order_id.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::sync::broadcast::error::TryRecvError;
    use vesta_core::types::{
        LineItem, PaymentMethod, RefundMethod, RefundStatus, ReturnReason,
    };

    use crate::ledger::testing::{
        init_tracing, AckLedger, FailOnceLedger, RejectLedger, StallLedger,
    };
    use crate::source::MemoryOrderSource;

    fn ord_022() -> Order {
        Order::new(
            "ORD-022",
            "BR-1",
            "CASH-2",
            Some("CUST-77".into()),
            vec![
                LineItem {
                    product_id: "P-OIL".into(),
                    name: "Olive oil 500ml".into(),
                    unit_price_cents: 2500,
                    quantity: 2,
                },
                LineItem {
                    product_id: "P-HON".into(),
                    name: "Honey jar".into(),
                    unit_price_cents: 4500,
                    quantity: 1,
                },
            ],
            9500,
            PaymentMethod::Cash,
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn cash_request(attempt_id: &str) -> ReturnRequest {
        ReturnRequest::new(
            "ORD-022",
            ReturnReason::DamagedProduct,
            RefundMethod::Cash,
            attempt_id,
        )
        .unwrap()
    }

    async fn processor_with(ledger: Arc<dyn RefundLedger>) -> (Arc<RefundProcessor>, EventBus) {
        init_tracing();
        let orders = Arc::new(MemoryOrderSource::new());
        orders.insert(ord_022()).await;
        let bus = EventBus::new();
        let processor = RefundProcessor::new(
            SessionContext::new("BR-1", "CASH-9"),
            orders,
            ledger,
            bus.clone(),
            &RegisterConfig::default(),
        );
        (Arc::new(processor), bus)
    }

    #[tokio::test]
    async fn test_submit_settles_and_renders_receipt() {
        let ledger = Arc::new(AckLedger::new());
        let (processor, bus) = processor_with(ledger.clone()).await;
        let mut events = bus.subscribe();

        let outcome = processor.submit(&cash_request("attempt-1")).await.unwrap();
        let (record, receipt) = match outcome {
            SubmitOutcome::Settled { record, receipt } => (record, receipt),
            other => panic!("expected settled, got {:?}", other),
        };

        assert!(record.is_settled());
        assert_eq!(record.amount_cents, 9500);
        assert_eq!(record.cashier_id, "CASH-9");
        assert!(record.settled_at.is_some());

        assert_eq!(receipt.order_id, "ORD-022");
        assert_eq!(receipt.refund_id, record.id);
        assert_eq!(receipt.total_refund_cents, 9500);
        assert_eq!(receipt.lines.len(), 2);

        match events.recv().await.unwrap() {
            RegisterEvent::RefundSettled(settled) => assert_eq!(settled, record),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(ledger.calls(), 1);
    }

    #[tokio::test]
    async fn test_replayed_attempt_id_is_duplicate() {
        let ledger = Arc::new(AckLedger::new());
        let (processor, _bus) = processor_with(ledger.clone()).await;

        let first = processor.submit(&cash_request("attempt-1")).await.unwrap();
        let second = processor.submit(&cash_request("attempt-1")).await.unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert_eq!(second.record().id, first.record().id);
        // The replay never reached the ledger
        assert_eq!(ledger.calls(), 1);
    }

    #[tokio::test]
    async fn test_settled_order_is_not_refundable_again() {
        let ledger = Arc::new(AckLedger::new());
        let (processor, _bus) = processor_with(ledger.clone()).await;

        processor.submit(&cash_request("attempt-1")).await.unwrap();

        // A fresh attempt against the settled order is a duplicate, not a
        // second payout
        let retry = processor.submit(&cash_request("attempt-2")).await.unwrap();
        assert!(retry.is_duplicate());
        assert!(retry.record().is_settled());
        assert_eq!(ledger.calls(), 1);

        // Standalone validation names the reason
        let err = processor
            .validate(&ord_022(), &cash_request("attempt-3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::OrderNotRefundable { .. }));
    }

    #[tokio::test]
    async fn test_validation_failure_creates_no_record() {
        let ledger = Arc::new(AckLedger::new());
        let (processor, bus) = processor_with(ledger.clone()).await;
        let mut events = bus.subscribe();

        // Wallet payout is not permitted for a cash order
        let request = ReturnRequest::new(
            "ORD-022",
            ReturnReason::ChangedMind,
            RefundMethod::Wallet,
            "attempt-1",
        )
        .unwrap();
        let err = processor.submit(&request).await.unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Validation(ValidationError::InvalidMethod { .. })
        ));
        assert!(!err.is_retryable());

        assert!(processor.refunds_for("ORD-022").await.is_empty());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(ledger.calls(), 0);

        // A blank free-text reason never even builds a request
        assert!(ReturnRequest::new(
            "ORD-022",
            ReturnReason::Other("   ".into()),
            RefundMethod::Cash,
            "attempt-2",
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_unknown_order_is_order_not_found() {
        let ledger = Arc::new(AckLedger::new());
        let (processor, _bus) = processor_with(ledger).await;

        let request = ReturnRequest::new(
            "ORD-404",
            ReturnReason::WrongItem,
            RefundMethod::Cash,
            "attempt-1",
        )
        .unwrap();
        let err = processor.submit(&request).await.unwrap_err();
        assert!(matches!(err, RegisterError::OrderNotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_timeout_fails_attempt() {
        let (processor, bus) = processor_with(Arc::new(StallLedger)).await;
        let mut events = bus.subscribe();

        let err = processor.submit(&cash_request("attempt-1")).await.unwrap_err();
        assert!(matches!(err, RegisterError::LedgerTimeout { timeout_ms: 5000 }));
        assert!(err.is_retryable());

        // The failed attempt stays in the book for audit
        let attempts = processor.refunds_for("ORD-022").await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, RefundStatus::Failed);
        assert!(processor.settled_refund("ORD-022").await.is_none());

        match events.recv().await.unwrap() {
            RegisterEvent::RefundFailed { retryable, attempt_id, .. } => {
                assert!(retryable);
                assert_eq!(attempt_id, "attempt-1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejection_reason_reaches_the_operator() {
        let ledger = Arc::new(RejectLedger::new("till variance hold"));
        let (processor, _bus) = processor_with(ledger).await;

        let err = processor.submit(&cash_request("attempt-1")).await.unwrap_err();
        match err {
            RegisterError::LedgerRejected { ref reason } => {
                assert_eq!(reason, "till variance hold");
            }
            ref other => panic!("expected rejection, got {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fresh_attempt_settles_after_rejection() {
        let ledger = Arc::new(FailOnceLedger::new());
        let (processor, _bus) = processor_with(ledger.clone()).await;

        let err = processor.submit(&cash_request("attempt-1")).await.unwrap_err();
        assert!(matches!(err, RegisterError::LedgerRejected { .. }));
        assert!(err.is_retryable());

        // Replaying the failed attempt id returns the failed record
        let replay = processor.submit(&cash_request("attempt-1")).await.unwrap();
        assert!(replay.is_duplicate());
        assert_eq!(replay.record().status, RefundStatus::Failed);
        assert_eq!(ledger.calls(), 1);

        // A fresh attempt goes through
        let outcome = processor.submit(&cash_request("attempt-2")).await.unwrap();
        assert!(outcome.record().is_settled());
        assert_eq!(ledger.calls(), 2);

        // Audit trail: most recent first, both attempts kept
        let attempts = processor.refunds_for("ORD-022").await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].attempt_id, "attempt-2");
        assert_eq!(attempts[0].status, RefundStatus::Settled);
        assert_eq!(attempts[1].attempt_id, "attempt-1");
        assert_eq!(attempts[1].status, RefundStatus::Failed);
    }

    #[tokio::test]
    async fn test_concurrent_submits_settle_exactly_once() {
        let ledger = Arc::new(AckLedger::new());
        let (processor, _bus) = processor_with(ledger.clone()).await;

        let request_a = cash_request("attempt-a");
        let request_b = cash_request("attempt-b");
        let (a, b) = tokio::join!(
            processor.submit(&request_a),
            processor.submit(&request_b),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        // One winner, one duplicate observing the winner's record
        assert_ne!(a.is_duplicate(), b.is_duplicate());
        assert_eq!(a.record().id, b.record().id);
        assert!(a.record().is_settled());
        assert_eq!(ledger.calls(), 1);

        let attempts = processor.refunds_for("ORD-022").await;
        assert_eq!(attempts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_fails_attempt_and_drops_late_ack() {
        let (processor, bus) = processor_with(Arc::new(StallLedger)).await;
        let mut events = bus.subscribe();

        let abort = CancellationToken::new();
        let task = {
            let processor = processor.clone();
            let token = abort.clone();
            tokio::spawn(async move {
                let request = cash_request("attempt-1");
                processor.submit_abortable(&request, token).await
            })
        };

        // Let the ledger call get in flight, then pull the plug
        tokio::time::sleep(Duration::from_millis(10)).await;
        abort.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, RegisterError::Aborted));
        assert!(err.is_retryable());

        // FAILED for audit; the stalled acknowledgement never resurrects it
        let attempts = processor.refunds_for("ORD-022").await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, RefundStatus::Failed);
        assert!(processor.settled_refund("ORD-022").await.is_none());

        match events.recv().await.unwrap() {
            RegisterEvent::RefundFailed { retryable, .. } => assert!(retryable),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compute_refund_amount_is_order_total() {
        let (processor, _bus) = processor_with(Arc::new(AckLedger::new())).await;
        let order = ord_022();
        assert_eq!(processor.compute_refund_amount(&order), Money::from_cents(9500));
        assert!(processor.validate(&order, &cash_request("attempt-1")).await.is_ok());
    }
}
