//! # Shift Aggregator Module
//!
//! The actor that owns one cashier's live [`Shift`] book. All mutations and
//! queries arrive as commands over an mpsc channel and are applied by a
//! single task, so the book never needs a lock and every snapshot is a
//! point-in-time copy with no torn reads.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shift Aggregator                                 │
//! │                                                                         │
//! │  ShiftHandle (Clone)                     actor task                     │
//! │  ──────────────────                      ──────────                     │
//! │                                                                         │
//! │  order_completed(order) ──┐                                             │
//! │  refund_settled(record) ──┤   commands   ┌──────────────────────────┐   │
//! │  close(ended_at) ─────────┼─── mpsc ────►│  while let Some(cmd)     │   │
//! │  snapshot() ──────────────┘              │                          │   │
//! │       ▲                                  │   ┌──────────────────┐   │   │
//! │       │ oneshot reply per command        │   │ vesta_core::Shift│   │   │
//! │       └──────────────────────────────────┤   │ (the only copy)  │   │   │
//! │                                          │   └──────────────────┘   │   │
//! │                                          └────────────┬─────────────┘   │
//! │                                                       │ on close        │
//! │                                                       ▼                 │
//! │                                          EventBus: ShiftClosed(snap)    │
//! │                                                                         │
//! │  SERIALIZATION GUARANTEE:                                              │
//! │  ─────────────────────────                                             │
//! │  One consumer loop = one writer. Two concurrent refund events can       │
//! │  never interleave inside the book; a snapshot never observes half of    │
//! │  a mutation.                                                            │
//! │                                                                         │
//! │  LIFECYCLE:                                                            │
//! │  ──────────                                                            │
//! │  • Closing the shift freezes the book but keeps the actor alive so     │
//! │    late queries still answer (mutations fail ShiftClosed).             │
//! │  • When every handle is dropped the channel drains and the task exits. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use vesta_core::error::ShiftResult;
use vesta_core::shift::{Shift, ShiftSnapshot};
use vesta_core::types::{Order, RefundRecord};

use crate::error::{RegisterError, RegisterResult};
use crate::notify::{EventBus, RegisterEvent};

// =============================================================================
// Constants
// =============================================================================

/// Command queue depth. Backpressure starts when the book falls this far
/// behind the feed.
const COMMAND_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// Commands
// =============================================================================

/// Commands for the aggregator task.
enum ShiftCommand {
    /// Fold a completed order into the book.
    OrderCompleted {
        order: Order,
        reply: oneshot::Sender<ShiftResult<bool>>,
    },
    /// Fold a settled refund into the book.
    RefundSettled {
        record: RefundRecord,
        reply: oneshot::Sender<ShiftResult<bool>>,
    },
    /// Freeze the book and hand out the final snapshot.
    Close {
        ended_at: DateTime<Utc>,
        reply: oneshot::Sender<ShiftResult<ShiftSnapshot>>,
    },
    /// Point-in-time copy of the book.
    Snapshot {
        reply: oneshot::Sender<ShiftSnapshot>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle for talking to the shift actor.
#[derive(Clone)]
pub struct ShiftHandle {
    /// Command sender.
    cmd_tx: mpsc::Sender<ShiftCommand>,
}

impl ShiftHandle {
    /// Records a completed order.
    ///
    /// `Ok(false)` means the order id was already recorded this shift and
    /// the replay changed nothing.
    pub async fn order_completed(&self, order: Order) -> RegisterResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ShiftCommand::OrderCompleted { order, reply }).await?;
        Self::answer(rx.await)?.map_err(RegisterError::from)
    }

    /// Records a settled refund.
    ///
    /// `Ok(false)` means the refund id was already recorded. Refunds for
    /// orders never seen this shift are refused with `UnknownOrder`.
    pub async fn refund_settled(&self, record: RefundRecord) -> RegisterResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ShiftCommand::RefundSettled { record, reply }).await?;
        Self::answer(rx.await)?.map_err(RegisterError::from)
    }

    /// Closes the shift and returns the frozen snapshot.
    ///
    /// The snapshot is also published on the bus as `ShiftClosed`. A second
    /// close fails with `AlreadyClosed`.
    pub async fn close(&self, ended_at: DateTime<Utc>) -> RegisterResult<ShiftSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ShiftCommand::Close { ended_at, reply }).await?;
        Self::answer(rx.await)?.map_err(RegisterError::from)
    }

    /// Returns a point-in-time snapshot of the live book.
    pub async fn snapshot(&self) -> RegisterResult<ShiftSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ShiftCommand::Snapshot { reply }).await?;
        Self::answer(rx.await)
    }

    async fn send(&self, cmd: ShiftCommand) -> RegisterResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RegisterError::ShiftStopped)
    }

    fn answer<T>(reply: Result<T, oneshot::error::RecvError>) -> RegisterResult<T> {
        reply.map_err(|_| RegisterError::ShiftStopped)
    }
}

// =============================================================================
// Shift Aggregator
// =============================================================================

/// Owns the live shift book and applies commands one at a time.
pub struct ShiftAggregator {
    /// The one and only copy of the book.
    shift: Shift,
    /// Bus for announcing the close.
    bus: EventBus,
}

impl ShiftAggregator {
    /// Creates an aggregator around an opened shift book.
    pub fn new(shift: Shift, bus: EventBus) -> Self {
        ShiftAggregator { shift, bus }
    }

    /// Spawns the actor task and returns a handle.
    pub fn start(self) -> ShiftHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        ShiftHandle { cmd_tx }
    }

    /// Main actor loop.
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ShiftCommand>) {
        info!(
            branch = %self.shift.branch_id(),
            cashier = %self.shift.cashier_id(),
            "Shift aggregator started"
        );

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                ShiftCommand::OrderCompleted { order, reply } => {
                    let order_id = order.id.clone();
                    let result = self.shift.record_order(&order);
                    match &result {
                        Ok(true) => debug!(order_id = %order_id, "Order folded into shift"),
                        Ok(false) => debug!(order_id = %order_id, "Order replay ignored"),
                        Err(e) => warn!(order_id = %order_id, error = %e, "Order refused"),
                    }
                    let _ = reply.send(result);
                }
                ShiftCommand::RefundSettled { record, reply } => {
                    let refund_id = record.id.clone();
                    let result = self.shift.record_refund(&record);
                    match &result {
                        Ok(true) => debug!(refund_id = %refund_id, "Refund folded into shift"),
                        Ok(false) => debug!(refund_id = %refund_id, "Refund replay ignored"),
                        Err(e) => warn!(refund_id = %refund_id, error = %e, "Refund refused"),
                    }
                    let _ = reply.send(result);
                }
                ShiftCommand::Close { ended_at, reply } => {
                    let result = self.shift.close(ended_at).map(|()| self.shift.snapshot());
                    if let Ok(snapshot) = &result {
                        info!(
                            cashier = %snapshot.cashier_id,
                            total_orders = snapshot.total_orders,
                            net_sales_cents = snapshot.net_sales_cents,
                            "Shift closed"
                        );
                        self.bus.publish(RegisterEvent::ShiftClosed(snapshot.clone()));
                    }
                    let _ = reply.send(result);
                }
                ShiftCommand::Snapshot { reply } => {
                    let _ = reply.send(self.shift.snapshot());
                }
            }
        }

        info!("Shift aggregator stopped");
    }
}
