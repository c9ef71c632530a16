//! Command outcome taxonomy
//!
//! Errors are typed outcomes, not exceptions: every command returns a
//! structured result, validation failures never partially mutate state, and
//! internal faults surface as `Internal` rather than crashing the executor.

use thiserror::Error;

/// Result alias used by every command API.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Reasons a command can be refused.
///
/// A partial market-order fill is not an error; it is reported through
/// `FillStatus` on the success path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("volume must be positive")]
    InvalidVolume,

    #[error("price must be positive")]
    InvalidPrice,

    #[error("unknown ticker: {ticker}")]
    UnknownTicker { ticker: String },

    #[error("no instruments initialized")]
    ServerMisconfigured,

    #[error("user not initialized: {user}")]
    UserNotInitialized { user: String },

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("insufficient ticker balance")]
    InsufficientTickerBalance,

    #[error("position limit exceeded")]
    PositionLimitExceeded,

    #[error("no liquidity on the opposite side")]
    NoLiquidity,

    #[error("order not found: {order_id}")]
    OrderNotFound { order_id: u64 },

    #[error("invalid order id")]
    InvalidOrderId,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ExchangeError {
    pub fn unknown_ticker(ticker: impl Into<String>) -> Self {
        Self::UnknownTicker {
            ticker: ticker.into(),
        }
    }

    pub fn user_not_initialized(user: impl Into<String>) -> Self {
        Self::UserNotInitialized { user: user.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ExchangeError::unknown_ticker("ACME");
        assert_eq!(err.to_string(), "unknown ticker: ACME");

        let err = ExchangeError::user_not_initialized("alice");
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_internal_constructor() {
        let err = ExchangeError::internal("snapshot serialization failed");
        assert!(matches!(err, ExchangeError::Internal { .. }));
    }
}
