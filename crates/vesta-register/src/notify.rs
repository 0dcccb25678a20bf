//! # Register Event Bus
//!
//! One broadcast channel carries everything that happens at the register.
//! The shift feed folds events into the book; toast/alert UIs and reporting
//! subscribe to the same stream and filter what they care about.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Register Event Bus                               │
//! │                                                                         │
//! │   PUBLISHERS                                  SUBSCRIBERS               │
//! │                                                                         │
//! │   checkout flow ──OrderCompleted──┐      ┌──► ShiftFeed                 │
//! │                                   │      │    (folds into the book)     │
//! │   RefundProcessor ─RefundSettled──┼─────►┼──► Toast / alert UI          │
//! │                    RefundFailed───┤      │    (operator feedback)       │
//! │                                   │      │                              │
//! │   ShiftAggregator ──ShiftClosed───┘      └──► Reporting                 │
//! │                                               (end-of-shift summary)    │
//! │                                                                         │
//! │  RULES:                                                                │
//! │  • Publishing never blocks and never fails: with no subscribers the    │
//! │    event is simply dropped.                                            │
//! │  • A slow subscriber lags and skips ahead; it does not slow the        │
//! │    register down.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use ts_rs::TS;

use vesta_core::shift::ShiftSnapshot;
use vesta_core::types::{Order, RefundRecord};

// =============================================================================
// Constants
// =============================================================================

/// Broadcast channel capacity. Subscribers further behind than this lag.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// Register Events
// =============================================================================

/// Everything the register announces on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RegisterEvent {
    /// A sale was completed at checkout.
    OrderCompleted(Order),

    /// The ledger acknowledged a refund; it is durable.
    RefundSettled(RefundRecord),

    /// A refund attempt ended FAILED (rejected, timed out, or aborted).
    RefundFailed {
        /// Order the attempt was against.
        order_id: String,
        /// The failed attempt's id.
        attempt_id: String,
        /// Operator-facing explanation.
        reason: String,
        /// Whether a fresh attempt is worth offering.
        retryable: bool,
    },

    /// The shift was closed; the frozen snapshot for reporting.
    ShiftClosed(ShiftSnapshot),
}

impl RegisterEvent {
    /// Short event name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RegisterEvent::OrderCompleted(_) => "order_completed",
            RegisterEvent::RefundSettled(_) => "refund_settled",
            RegisterEvent::RefundFailed { .. } => "refund_failed",
            RegisterEvent::ShiftClosed(_) => "shift_closed",
        }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Cloneable handle to the register's broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RegisterEvent>,
}

impl EventBus {
    /// Creates a bus with the default capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        EventBus { tx }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped, which is fine: the bus
    /// carries notifications, not commands.
    pub fn publish(&self, event: RegisterEvent) {
        debug!(event = event.kind(), "Publishing register event");
        let _ = self.tx.send(event);
    }

    /// Opens a new subscription starting at the current position.
    pub fn subscribe(&self) -> broadcast::Receiver<RegisterEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(RegisterEvent::RefundFailed {
            order_id: "ORD-1".into(),
            attempt_id: "attempt-1".into(),
            reason: "timeout".into(),
            retryable: true,
        });
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(RegisterEvent::RefundFailed {
            order_id: "ORD-9".into(),
            attempt_id: "attempt-3".into(),
            reason: "rejected".into(),
            retryable: true,
        });

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                RegisterEvent::RefundFailed { order_id, .. } => assert_eq!(order_id, "ORD-9"),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = RegisterEvent::RefundFailed {
            order_id: "ORD-9".into(),
            attempt_id: "attempt-3".into(),
            reason: "ledger timed out".into(),
            retryable: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "refund_failed");
        assert_eq!(json["payload"]["order_id"], "ORD-9");
        assert_eq!(json["payload"]["retryable"], true);
    }
}
