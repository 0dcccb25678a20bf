//! # Register Error Types
//!
//! Error types for the async register layer.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Register Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Domain      │  │     Ledger      │  │      Runtime            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  LedgerTimeout  │  │  ShiftStopped           │ │
//! │  │  Shift          │  │  LedgerRejected │  │                         │ │
//! │  │  OrderNotFound  │  │  Aborted        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Configuration: InvalidConfig, ConfigLoadFailed, ConfigSave…   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed ledger attempt (`LedgerTimeout`, `LedgerRejected`, `Aborted`)
//! still leaves a FAILED refund record behind for audit; the error tells the
//! operator the attempt did not settle and `is_retryable()` tells the UI
//! whether a fresh attempt is worth offering.

use thiserror::Error;

use vesta_core::error::{ShiftError, ValidationError};

/// Result type alias for register operations.
pub type RegisterResult<T> = Result<T, RegisterError>;

/// Register error type covering all failures of the async layer.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Domain errors from `vesta-core` are wrapped, never stringified
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum RegisterError {
    // =========================================================================
    // Domain Errors (wrapped from vesta-core)
    // =========================================================================
    /// Return request failed validation. No refund record was created.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Shift book refused the mutation.
    #[error("Shift error: {0}")]
    Shift(#[from] ShiftError),

    /// The order source has no order under this id.
    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: String },

    // =========================================================================
    // Ledger Errors (attempt reached the ledger but did not settle)
    // =========================================================================
    /// The ledger did not acknowledge within the configured timeout.
    #[error("Refund ledger timed out after {timeout_ms} ms")]
    LedgerTimeout { timeout_ms: u64 },

    /// The ledger explicitly rejected the submission.
    #[error("Refund ledger rejected the submission: {reason}")]
    LedgerRejected { reason: String },

    /// The operator aborted the attempt while the ledger call was in flight.
    #[error("Refund submission aborted by operator")]
    Aborted,

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// The shift aggregator task is gone (command channel closed).
    #[error("Shift aggregator is not running")]
    ShiftStopped,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid register configuration.
    #[error("Invalid register configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for RegisterError {
    fn from(err: std::io::Error) -> Self {
        RegisterError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for RegisterError {
    fn from(err: toml::de::Error) -> Self {
        RegisterError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for RegisterError {
    fn from(err: toml::ser::Error) -> Self {
        RegisterError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for the operator UI)
// =============================================================================

impl RegisterError {
    /// Returns true if a fresh submission attempt may succeed.
    ///
    /// ## Retryable Errors
    /// - Ledger timeouts (network or ledger slowness)
    /// - Ledger rejections (transient ledger-side refusals)
    /// - Operator aborts
    ///
    /// ## Non-Retryable Errors
    /// - Validation failures (the request itself is wrong)
    /// - Unknown orders
    /// - Closed or stopped shifts
    ///
    /// A retry is always a NEW attempt with a fresh attempt id; replaying
    /// the failed attempt id returns the failed record as a duplicate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegisterError::LedgerTimeout { .. }
                | RegisterError::LedgerRejected { .. }
                | RegisterError::Aborted
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RegisterError::InvalidConfig(_)
                | RegisterError::ConfigLoadFailed(_)
                | RegisterError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(RegisterError::LedgerTimeout { timeout_ms: 5000 }.is_retryable());
        assert!(RegisterError::LedgerRejected {
            reason: "insufficient float".into()
        }
        .is_retryable());
        assert!(RegisterError::Aborted.is_retryable());

        assert!(!RegisterError::OrderNotFound {
            order_id: "ORD-404".into()
        }
        .is_retryable());
        assert!(!RegisterError::ShiftStopped.is_retryable());
        assert!(!RegisterError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err = RegisterError::from(ValidationError::InvalidReason {
            detail: "blank".into(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_config_error_category() {
        assert!(RegisterError::ConfigLoadFailed("no file".into()).is_config_error());
        assert!(RegisterError::ConfigSaveFailed("read-only".into()).is_config_error());
        assert!(RegisterError::InvalidConfig("timeout_ms = 0".into()).is_config_error());
        assert!(!RegisterError::Aborted.is_config_error());
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = RegisterError::LedgerTimeout { timeout_ms: 5000 };
        assert!(err.to_string().contains("5000"));

        let err = RegisterError::OrderNotFound {
            order_id: "ORD-042".into(),
        };
        assert!(err.to_string().contains("ORD-042"));
    }
}
