//! # Register Session
//!
//! Per-cashier orchestrator. Wires the bus, the refund processor, the shift
//! aggregator, and the feed together for one working session, and exposes
//! the few entry points the rest of the terminal needs.
//!
//! ## Session Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RegisterSession                                  │
//! │                                                                         │
//! │  publish_order_completed(order)                                         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌──────────┐ subscribe ┌───────────┐  commands  ┌──────────────────┐  │
//! │  │ EventBus │──────────►│ ShiftFeed │───────────►│ ShiftAggregator  │  │
//! │  └──────────┘           └───────────┘            │ (actor task)     │  │
//! │      ▲  ▲                                        └──────────────────┘  │
//! │      │  │ RefundSettled / RefundFailed                   ▲             │
//! │      │  └────────────────┐                               │ close /     │
//! │      │                   │                               │ snapshot    │
//! │      │            ┌──────┴──────────┐                    │             │
//! │      │            │ RefundProcessor │◄── processor() ────┼── callers   │
//! │      │            └─────────────────┘                    │             │
//! │      │                                                   │             │
//! │      └── subscribe() for toasts/reporting     shift() ───┘             │
//! │                                                                         │
//! │  The feed subscribes BEFORE the session is handed out, so no event     │
//! │  published through the session can miss the book.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;

use vesta_core::shift::{Shift, ShiftSnapshot};
use vesta_core::types::{Order, SessionContext};

use crate::aggregator::{ShiftAggregator, ShiftHandle};
use crate::config::RegisterConfig;
use crate::error::RegisterResult;
use crate::feed::ShiftFeed;
use crate::ledger::RefundLedger;
use crate::notify::{EventBus, RegisterEvent};
use crate::processor::RefundProcessor;
use crate::source::OrderSource;

// =============================================================================
// Register Session
// =============================================================================

/// One cashier's wired-together register: bus, processor, shift, feed.
pub struct RegisterSession {
    /// Operator this session belongs to.
    context: SessionContext,
    /// The session's event bus.
    bus: EventBus,
    /// Refund execution for this session.
    processor: Arc<RefundProcessor>,
    /// Handle to the shift actor.
    shift: ShiftHandle,
}

impl RegisterSession {
    /// Opens a session: starts the shift actor and the feed, builds the
    /// processor, and returns the wired handle set.
    pub fn start(
        context: SessionContext,
        orders: Arc<dyn OrderSource>,
        ledger: Arc<dyn RefundLedger>,
        config: &RegisterConfig,
        started_at: DateTime<Utc>,
    ) -> Self {
        let bus = EventBus::new();

        let book = Shift::open_with_window(&context, started_at, config.recent_orders());
        let shift = ShiftAggregator::new(book, bus.clone()).start();

        // Subscribed before anything can publish: the book misses nothing
        ShiftFeed::new(bus.subscribe(), shift.clone()).start();

        let processor = Arc::new(RefundProcessor::new(
            context.clone(),
            orders,
            ledger,
            bus.clone(),
            config,
        ));

        info!(
            branch = %context.branch_id,
            cashier = %context.cashier_id,
            "Register session started"
        );

        RegisterSession {
            context,
            bus,
            processor,
            shift,
        }
    }

    /// The operator session this register runs under.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The session's refund processor.
    pub fn processor(&self) -> Arc<RefundProcessor> {
        self.processor.clone()
    }

    /// A handle to the shift actor.
    pub fn shift(&self) -> ShiftHandle {
        self.shift.clone()
    }

    /// Opens a subscription to the session's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RegisterEvent> {
        self.bus.subscribe()
    }

    /// Entry point for the checkout flow: announces a completed sale.
    /// The feed folds it into the shift book.
    pub fn publish_order_completed(&self, order: Order) {
        self.bus.publish(RegisterEvent::OrderCompleted(order));
    }

    /// Closes the shift and returns the frozen snapshot for reporting.
    pub async fn close_shift(&self, ended_at: DateTime<Utc>) -> RegisterResult<ShiftSnapshot> {
        self.shift.close(ended_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use vesta_core::error::ShiftError;
    use vesta_core::types::{
        LineItem, PaymentMethod, RefundMethod, ReturnReason, ReturnRequest,
    };

    use crate::error::RegisterError;
    use crate::ledger::testing::AckLedger;
    use crate::source::MemoryOrderSource;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, minute, 0).unwrap()
    }

    fn ord_022() -> Order {
        Order::new(
            "ORD-022",
            "BR-1",
            "CASH-2",
            None,
            vec![LineItem {
                product_id: "P-OIL".into(),
                name: "Olive oil 500ml".into(),
                unit_price_cents: 9500,
                quantity: 1,
            }],
            9500,
            PaymentMethod::Cash,
            ts(10, 30),
        )
        .unwrap()
    }

    async fn started_session() -> RegisterSession {
        let orders = Arc::new(MemoryOrderSource::new());
        orders.insert(ord_022()).await;
        RegisterSession::start(
            SessionContext::new("BR-1", "CASH-9"),
            orders,
            Arc::new(AckLedger::new()),
            &RegisterConfig::default(),
            ts(8, 0),
        )
    }

    async fn wait_for(
        shift: &ShiftHandle,
        pred: impl Fn(&ShiftSnapshot) -> bool,
    ) -> ShiftSnapshot {
        for _ in 0..100 {
            let snap = shift.snapshot().await.unwrap();
            if pred(&snap) {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("shift book never reached the expected state");
    }

    #[tokio::test]
    async fn test_damaged_product_return_end_to_end() {
        let session = started_session().await;
        let shift = session.shift();

        // Sale lands in the book through the bus and feed
        session.publish_order_completed(ord_022());
        let snap = wait_for(&shift, |snap| snap.total_orders == 1).await;
        assert_eq!(snap.total_sales_cents, 9500);
        assert_eq!(snap.net_sales_cents, 9500);

        // Damaged-product return, refunded in cash
        let request = ReturnRequest::new(
            "ORD-022",
            ReturnReason::DamagedProduct,
            RefundMethod::Cash,
            "attempt-1",
        )
        .unwrap();
        let outcome = session.processor().submit(&request).await.unwrap();
        assert!(outcome.record().is_settled());

        // The settled refund flows back into the book
        let snap = wait_for(&shift, |snap| snap.total_refunds_cents == 9500).await;
        assert_eq!(snap.total_sales_cents, 9500);
        assert_eq!(snap.net_sales_cents, 0);
        assert_eq!(snap.refunds.len(), 1);
        assert_eq!(snap.refunds[0].order_id, "ORD-022");
    }

    #[tokio::test]
    async fn test_close_shift_reports_and_freezes() {
        let session = started_session().await;
        let mut events = session.subscribe();

        session.publish_order_completed(ord_022());
        wait_for(&session.shift(), |snap| snap.total_orders == 1).await;

        let closed = session.close_shift(ts(17, 0)).await.unwrap();
        assert!(closed.is_closed());
        assert_eq!(closed.total_orders, 1);

        // Reporting consumers see the same frozen snapshot on the bus
        loop {
            match events.recv().await.unwrap() {
                RegisterEvent::ShiftClosed(snap) => {
                    assert_eq!(snap, closed);
                    break;
                }
                _ => continue,
            }
        }

        let err = session.close_shift(ts(17, 5)).await.unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Shift(ShiftError::AlreadyClosed { .. })
        ));
    }
}
