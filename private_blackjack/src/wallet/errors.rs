//! Wallet error types.

use thiserror::Error;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Balance can't cover a debit. This is the only error the loan
    /// fallback reacts to.
    #[error("Insufficient funds for {participant}: available {available}, required {required}")]
    InsufficientFunds {
        participant: String,
        available: i64,
        required: i64,
    },

    /// Wallet not found
    #[error("Wallet not found for {0}")]
    WalletNotFound(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Repayment larger than the outstanding loan
    #[error("Repayment of {requested} exceeds outstanding loan of {outstanding}")]
    RepaymentExceedsLoan { outstanding: i64, requested: i64 },

    /// Balance overflow
    #[error("Balance overflow")]
    BalanceOverflow,
}

impl WalletError {
    #[must_use]
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) => "Internal server error".to_string(),
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            WalletError::InsufficientFunds {
                available,
                required,
                ..
            } => format!("Insufficient funds: you have {available}, need {required}"),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_participant() {
        let err = WalletError::InsufficientFunds {
            participant: "alice".to_string(),
            available: 20,
            required: 100,
        };
        assert!(err.is_insufficient_funds());
        assert_eq!(err.client_message(), "Insufficient funds: you have 20, need 100");
        assert!(!WalletError::WalletNotFound("bob".to_string())
            .client_message()
            .contains("bob"));
    }
}
