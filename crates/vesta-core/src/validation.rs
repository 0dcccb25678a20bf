//! # Validation Module
//!
//! Return-request validation rules for Vesta POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend (TypeScript)                                        │
//! │  ├── Basic format checks (empty reason text, method radio state)       │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (Rust, pure)                                     │
//! │  ├── Reason well-formedness (Other requires text, length cap)          │
//! │  ├── Method allowed for the order's payment method                     │
//! │  └── Order-shape invariant (total == Σ line totals)                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Refund processor (stateful)                                  │
//! │  └── Refundability: no second settled refund per order                 │
//! │                                                                         │
//! │  Validation failures stop here: nothing invalid reaches the ledger    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vesta_core::types::{PaymentMethod, RefundMethod};
//! use vesta_core::validation::permitted_refund_methods;
//!
//! // Card orders are refunded by reversing the charge, never by a second
//! // card credit, so "card" drops out of the offered list.
//! let allowed = permitted_refund_methods(PaymentMethod::Card);
//! assert_eq!(allowed, vec![RefundMethod::Cash]);
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::types::{Order, PaymentMethod, RefundMethod, ReturnReason, ReturnRequest};
use crate::MAX_REASON_LENGTH;

// =============================================================================
// Refund Method Rules
// =============================================================================

/// Returns the refund methods offered for an order paid with `payment`.
///
/// ## Rules
/// - The original payment method is always offered first, except card
/// - Cash is always available (drawer payout)
/// - Card is offered only when the original payment was NOT card
///
/// ## Method Matrix
/// ```text
/// paid by cash    →  [cash, card]
/// paid by card    →  [cash]            (terminal reverses the charge)
/// paid by wallet  →  [wallet, cash, card]
/// ```
pub fn permitted_refund_methods(payment: PaymentMethod) -> Vec<RefundMethod> {
    match payment {
        PaymentMethod::Cash => vec![RefundMethod::Cash, RefundMethod::Card],
        PaymentMethod::Card => vec![RefundMethod::Cash],
        PaymentMethod::Wallet => vec![
            RefundMethod::Wallet,
            RefundMethod::Cash,
            RefundMethod::Card,
        ],
    }
}

/// Validates that `method` is offered for an order paid with `payment`.
pub fn validate_refund_method(
    payment: PaymentMethod,
    method: RefundMethod,
) -> ValidationResult<()> {
    let allowed = permitted_refund_methods(payment);
    if !allowed.contains(&method) {
        return Err(ValidationError::InvalidMethod { method, allowed });
    }
    Ok(())
}

// =============================================================================
// Reason Rules
// =============================================================================

/// Validates a return reason.
///
/// ## Rules
/// - Enumerated reasons are always valid
/// - "Other" requires non-blank free text after trimming
/// - Free text is capped at MAX_REASON_LENGTH characters
///
/// ## Example
/// ```rust
/// use vesta_core::types::ReturnReason;
/// use vesta_core::validation::validate_reason;
///
/// assert!(validate_reason(&ReturnReason::DamagedProduct).is_ok());
/// assert!(validate_reason(&ReturnReason::Other("Box crushed".into())).is_ok());
/// assert!(validate_reason(&ReturnReason::Other("   ".into())).is_err());
/// ```
pub fn validate_reason(reason: &ReturnReason) -> ValidationResult<()> {
    if let ReturnReason::Other(text) = reason {
        let text = text.trim();

        if text.is_empty() {
            return Err(ValidationError::InvalidReason {
                detail: "free-text reason is required when \"Other\" is selected".to_string(),
            });
        }

        if text.len() > MAX_REASON_LENGTH {
            return Err(ValidationError::InvalidReason {
                detail: format!("free-text reason is limited to {MAX_REASON_LENGTH} characters"),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Request Validation
// =============================================================================

/// Validates the stateless parts of a return request against its order.
///
/// Checks, in order:
/// 1. the request actually targets this order,
/// 2. the reason is well-formed,
/// 3. the refund method is offered for the order's payment method.
///
/// Refundability (no second settled refund for the same order) is stateful
/// and lives in the refund processor, which owns the refund book.
pub fn validate_return_request(order: &Order, request: &ReturnRequest) -> ValidationResult<()> {
    if order.id != request.order_id {
        return Err(ValidationError::OrderMismatch {
            expected: request.order_id.clone(),
            found: order.id.clone(),
        });
    }

    validate_reason(&request.reason)?;
    validate_refund_method(order.payment_method, request.method)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::LineItem;

    fn order_paid_with(payment: PaymentMethod) -> Order {
        Order::new(
            "ORD-022",
            "BR-1",
            "CASH-9",
            None,
            vec![LineItem {
                product_id: "P-1".to_string(),
                name: "Olive Oil 1L".to_string(),
                unit_price_cents: 9500,
                quantity: 1,
            }],
            9500,
            payment,
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn request(method: RefundMethod) -> ReturnRequest {
        ReturnRequest::new("ORD-022", ReturnReason::DamagedProduct, method, "attempt-1").unwrap()
    }

    #[test]
    fn test_card_never_offered_for_card_orders() {
        let allowed = permitted_refund_methods(PaymentMethod::Card);
        assert!(!allowed.contains(&RefundMethod::Card));

        // Every other payment method does offer card.
        assert!(permitted_refund_methods(PaymentMethod::Cash).contains(&RefundMethod::Card));
        assert!(permitted_refund_methods(PaymentMethod::Wallet).contains(&RefundMethod::Card));
    }

    #[test]
    fn test_original_method_offered_except_card() {
        assert!(permitted_refund_methods(PaymentMethod::Cash).contains(&RefundMethod::Cash));
        assert!(permitted_refund_methods(PaymentMethod::Wallet).contains(&RefundMethod::Wallet));
        assert!(!permitted_refund_methods(PaymentMethod::Card).contains(&RefundMethod::Card));
    }

    #[test]
    fn test_validate_refund_method() {
        assert!(validate_refund_method(PaymentMethod::Cash, RefundMethod::Cash).is_ok());
        assert!(validate_refund_method(PaymentMethod::Cash, RefundMethod::Card).is_ok());
        assert!(validate_refund_method(PaymentMethod::Cash, RefundMethod::Wallet).is_err());

        let err = validate_refund_method(PaymentMethod::Card, RefundMethod::Card).unwrap_err();
        match err {
            ValidationError::InvalidMethod { method, allowed } => {
                assert_eq!(method, RefundMethod::Card);
                assert_eq!(allowed, vec![RefundMethod::Cash]);
            }
            other => panic!("expected InvalidMethod, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason(&ReturnReason::DamagedProduct).is_ok());
        assert!(validate_reason(&ReturnReason::Other("Box crushed".to_string())).is_ok());

        assert!(validate_reason(&ReturnReason::Other(String::new())).is_err());
        assert!(validate_reason(&ReturnReason::Other("   ".to_string())).is_err());
        assert!(validate_reason(&ReturnReason::Other("x".repeat(300))).is_err());
    }

    #[test]
    fn test_validate_return_request() {
        let order = order_paid_with(PaymentMethod::Cash);
        assert!(validate_return_request(&order, &request(RefundMethod::Cash)).is_ok());
        assert!(validate_return_request(&order, &request(RefundMethod::Card)).is_ok());

        let err =
            validate_return_request(&order, &request(RefundMethod::Wallet)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMethod { .. }));
    }

    #[test]
    fn test_validate_return_request_rejects_wrong_order() {
        let order = order_paid_with(PaymentMethod::Cash);
        let mut req = request(RefundMethod::Cash);
        req.order_id = "ORD-999".to_string();

        let err = validate_return_request(&order, &req).unwrap_err();
        assert!(matches!(err, ValidationError::OrderMismatch { .. }));
    }
}
