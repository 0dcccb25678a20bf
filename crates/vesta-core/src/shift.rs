//! # Shift Book
//!
//! The running accounting book for one cashier's shift, and the snapshot
//! type handed to reporting when the shift closes.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Shift Book Operations                             │
//! │                                                                         │
//! │  Event                      Operation              State Change         │
//! │  ─────                      ─────────              ────────────         │
//! │                                                                         │
//! │  Order completed ─────────► record_order() ─────► totalOrders += 1     │
//! │                                                    totalSales  += total │
//! │                                                    tallies, recents     │
//! │                                                                         │
//! │  Refund settled ──────────► record_refund() ────► totalRefunds += amt  │
//! │                                                    refunds list         │
//! │                                                                         │
//! │  Shift ends ──────────────► close() ────────────► ended_at set,        │
//! │                                                    book is read-only    │
//! │                                                                         │
//! │  Any time ────────────────► snapshot() ─────────► consistent copy,     │
//! │                                                    netSales recomputed  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `netSales == totalSales − totalRefunds` at every snapshot; net sales is
//!   recomputed from its inputs, never stored on its own
//! - An order id is counted at most once (`record_order` replays are no-ops)
//! - A refund must reference an order recorded in this shift, and must be
//!   settled; anything else is refused, never silently absorbed
//! - After `close()` every mutation fails with `ShiftClosed`
//!
//! This struct is pure and single-threaded. The serialization of concurrent
//! mutations is the register aggregator's job; the book itself never locks.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ShiftError, ShiftResult};
use crate::money::Money;
use crate::types::{Order, PaymentMethod, RefundRecord, SessionContext};
use crate::DEFAULT_RECENT_ORDERS;

// =============================================================================
// Snapshot Types
// =============================================================================

/// A compact view of one completed order for the recent-activity strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderSummary {
    pub order_id: String,
    pub total_cents: i64,
    /// Total units across all line items.
    pub item_count: i64,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub completed_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        OrderSummary {
            order_id: order.id.clone(),
            total_cents: order.total_cents,
            item_count: order.item_count(),
            payment_method: order.payment_method,
            completed_at: order.completed_at,
        }
    }
}

/// One row in the top-selling-products ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    /// Name frozen at first sale within the shift.
    pub name: String,
    /// Cumulative units sold this shift.
    pub quantity: i64,
    /// Earliest sale of this product within the shift; the tie-breaker.
    #[ts(as = "String")]
    pub first_sold_at: DateTime<Utc>,
}

/// Point-in-time copy of the shift book.
///
/// Produced by [`Shift::snapshot`]; after the shift closes, the final
/// snapshot is what reporting and printing consume. `net_sales_cents` is
/// recomputed from the totals on every snapshot, so it can never drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftSnapshot {
    pub branch_id: String,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    /// None while the shift is ongoing.
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Count of distinct completed orders.
    pub total_orders: u64,
    /// Sum of completed order totals.
    pub total_sales_cents: i64,
    /// Sum of settled refund amounts.
    pub total_refunds_cents: i64,
    /// Always `total_sales_cents - total_refunds_cents`.
    pub net_sales_cents: i64,
    /// Ranked: quantity desc, then earliest first sale, then product id.
    pub top_products: Vec<TopProduct>,
    /// Most recent first, capped at the shift's recent-order window.
    pub recent_orders: Vec<OrderSummary>,
    /// Settled refunds, most recent first.
    pub refunds: Vec<RefundRecord>,
}

impl ShiftSnapshot {
    /// Returns total sales as Money.
    #[inline]
    pub fn total_sales(&self) -> Money {
        Money::from_cents(self.total_sales_cents)
    }

    /// Returns total refunds as Money.
    #[inline]
    pub fn total_refunds(&self) -> Money {
        Money::from_cents(self.total_refunds_cents)
    }

    /// Returns net sales as Money.
    #[inline]
    pub fn net_sales(&self) -> Money {
        Money::from_cents(self.net_sales_cents)
    }

    /// True once the shift has ended.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

// =============================================================================
// Shift Book
// =============================================================================

/// Per-product running tally inside the live book.
#[derive(Debug, Clone)]
struct ProductTally {
    name: String,
    quantity: i64,
    first_sold_at: DateTime<Utc>,
}

/// The live accounting book for one open shift.
///
/// Created empty at shift start, mutated only by `record_order` and
/// `record_refund`, frozen by `close`. Replayed events are detected by id
/// and reported as `Ok(false)` so callers can log them without treating a
/// replay as a fault.
#[derive(Debug, Clone)]
pub struct Shift {
    branch_id: String,
    cashier_id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    total_orders: u64,
    total_sales: Money,
    total_refunds: Money,
    /// Order ids recorded this shift; also the refund admission set.
    seen_orders: HashSet<String>,
    /// Refund ids recorded this shift, for replay detection.
    seen_refunds: HashSet<String>,
    tallies: HashMap<String, ProductTally>,
    /// Most recent first, truncated to `recent_window`.
    recent_orders: VecDeque<OrderSummary>,
    /// Chronological; reversed into most-recent-first at snapshot time.
    refunds: Vec<RefundRecord>,
    recent_window: usize,
}

impl Shift {
    /// Opens an empty shift book for the session's cashier with the default
    /// recent-order window.
    pub fn open(session: &SessionContext, started_at: DateTime<Utc>) -> Self {
        Self::open_with_window(session, started_at, DEFAULT_RECENT_ORDERS)
    }

    /// Opens an empty shift book with an explicit recent-order window.
    pub fn open_with_window(
        session: &SessionContext,
        started_at: DateTime<Utc>,
        recent_window: usize,
    ) -> Self {
        Shift {
            branch_id: session.branch_id.clone(),
            cashier_id: session.cashier_id.clone(),
            started_at,
            ended_at: None,
            total_orders: 0,
            total_sales: Money::zero(),
            total_refunds: Money::zero(),
            seen_orders: HashSet::new(),
            seen_refunds: HashSet::new(),
            tallies: HashMap::new(),
            recent_orders: VecDeque::new(),
            refunds: Vec::new(),
            recent_window,
        }
    }

    /// Folds a completed order into the running totals.
    ///
    /// Returns `Ok(false)` when the order id was already recorded: the
    /// replay changes nothing. Fails with `ShiftClosed` after `close`.
    pub fn record_order(&mut self, order: &Order) -> ShiftResult<bool> {
        self.guard_open()?;

        if !self.seen_orders.insert(order.id.clone()) {
            return Ok(false);
        }

        self.total_orders += 1;
        self.total_sales += order.total();

        for item in &order.items {
            self.tallies
                .entry(item.product_id.clone())
                .and_modify(|tally| {
                    tally.quantity += item.quantity;
                    if order.completed_at < tally.first_sold_at {
                        tally.first_sold_at = order.completed_at;
                    }
                })
                .or_insert_with(|| ProductTally {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    first_sold_at: order.completed_at,
                });
        }

        self.recent_orders.push_front(OrderSummary::from(order));
        self.recent_orders.truncate(self.recent_window);

        Ok(true)
    }

    /// Folds a settled refund into the running totals.
    ///
    /// Refuses refunds for orders never recorded this shift
    /// (`UnknownOrder`) and records that are not settled
    /// (`RefundNotSettled`). Returns `Ok(false)` for a replayed refund id.
    pub fn record_refund(&mut self, record: &RefundRecord) -> ShiftResult<bool> {
        self.guard_open()?;

        if !record.is_settled() {
            return Err(ShiftError::RefundNotSettled {
                refund_id: record.id.clone(),
                status: record.status,
            });
        }

        if !self.seen_orders.contains(&record.order_id) {
            return Err(ShiftError::UnknownOrder {
                order_id: record.order_id.clone(),
            });
        }

        if !self.seen_refunds.insert(record.id.clone()) {
            return Ok(false);
        }

        self.total_refunds += record.amount();
        self.refunds.push(record.clone());

        Ok(true)
    }

    /// Ends the shift. The book becomes read-only; a second close fails
    /// with `AlreadyClosed`.
    pub fn close(&mut self, ended_at: DateTime<Utc>) -> ShiftResult<()> {
        if let Some(existing) = self.ended_at {
            return Err(ShiftError::AlreadyClosed { ended_at: existing });
        }
        self.ended_at = Some(ended_at);
        Ok(())
    }

    /// True once `close` succeeded.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Branch this shift belongs to.
    #[inline]
    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    /// Cashier working this shift.
    #[inline]
    pub fn cashier_id(&self) -> &str {
        &self.cashier_id
    }

    /// Net sales as Money, always derived from the two totals.
    #[inline]
    pub fn net_sales(&self) -> Money {
        self.total_sales - self.total_refunds
    }

    /// Produces a consistent point-in-time copy of the book.
    pub fn snapshot(&self) -> ShiftSnapshot {
        let mut top_products: Vec<TopProduct> = self
            .tallies
            .iter()
            .map(|(product_id, tally)| TopProduct {
                product_id: product_id.clone(),
                name: tally.name.clone(),
                quantity: tally.quantity,
                first_sold_at: tally.first_sold_at,
            })
            .collect();

        // Quantity desc, then earliest first sale, then product id. The last
        // key makes equal-timestamp ties reproducible across runs.
        top_products.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.first_sold_at.cmp(&b.first_sold_at))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        ShiftSnapshot {
            branch_id: self.branch_id.clone(),
            cashier_id: self.cashier_id.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            total_orders: self.total_orders,
            total_sales_cents: self.total_sales.cents(),
            total_refunds_cents: self.total_refunds.cents(),
            net_sales_cents: self.net_sales().cents(),
            top_products,
            recent_orders: self.recent_orders.iter().cloned().collect(),
            refunds: self.refunds.iter().rev().cloned().collect(),
        }
    }

    fn guard_open(&self) -> ShiftResult<()> {
        if self.ended_at.is_some() {
            return Err(ShiftError::ShiftClosed);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
