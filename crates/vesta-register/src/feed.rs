//! # Shift Feed Module
//!
//! Bridges the event bus to the shift aggregator: subscribes to
//! [`RegisterEvent`]s and forwards completed orders and settled refunds into
//! the [`ShiftHandle`]. Failure and close notifications are for UI
//! consumers; the feed lets them pass.
//!
//! The feed never fails the register over a refused event. A refund for an
//! order the book never saw, or an event arriving after close, is logged and
//! dropped; the book stays correct either way. Falling behind the bus is
//! survivable too: the subscription lags, skips ahead, and the feed keeps
//! going.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vesta_core::error::ShiftError;

use crate::aggregator::ShiftHandle;
use crate::error::RegisterError;
use crate::notify::RegisterEvent;

// =============================================================================
// Shift Feed
// =============================================================================

/// Forwards bus events into the shift book.
pub struct ShiftFeed {
    /// Bus subscription, opened before the first event of the shift.
    events: broadcast::Receiver<RegisterEvent>,
    /// The book to feed.
    shift: ShiftHandle,
}

impl ShiftFeed {
    /// Creates a feed over an existing subscription.
    pub fn new(events: broadcast::Receiver<RegisterEvent>, shift: ShiftHandle) -> Self {
        ShiftFeed { events, shift }
    }

    /// Spawns the forwarding task.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Main forwarding loop.
    async fn run(mut self) {
        info!("Shift feed started");

        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if !self.forward(event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Shift feed lagging behind event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("Shift feed stopped");
    }

    /// Forwards one event. Returns false when the aggregator is gone and
    /// the loop should stop.
    async fn forward(&self, event: RegisterEvent) -> bool {
        let result = match event {
            RegisterEvent::OrderCompleted(order) => self.shift.order_completed(order).await,
            RegisterEvent::RefundSettled(record) => self.shift.refund_settled(record).await,
            // RefundFailed and ShiftClosed are notifications, not book entries
            _ => return true,
        };

        match result {
            Ok(true) => true,
            Ok(false) => {
                debug!("Replayed event already in the book");
                true
            }
            Err(RegisterError::ShiftStopped) => {
                info!("Shift aggregator gone, stopping feed");
                false
            }
            Err(RegisterError::Shift(ShiftError::ShiftClosed)) => {
                debug!("Shift closed, dropping late event");
                true
            }
            Err(e) => {
                warn!(error = %e, "Shift book refused event");
                true
            }
        }
    }
}
