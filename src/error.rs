//! Error Types
//!
//! Single error taxonomy for the banking core. Error codes are stable and
//! machine-readable for consistent API responses.

use thiserror::Error;

/// Banking core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    // === Auth Errors ===
    #[error("Missing or invalid credential")]
    Unauthorized,

    #[error("Caller does not own this resource")]
    Forbidden,

    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount precision exceeds currency minor units")]
    PrecisionOverflow,

    #[error("Amount would overflow")]
    Overflow,

    #[error("Currency mismatch: account holds {account}, request is {requested}")]
    CurrencyMismatch { account: String, requested: String },

    #[error("Source and recipient account cannot be the same")]
    SameAccount,

    #[error("Invalid account number: {0}")]
    InvalidAccountNumber(String),

    #[error("Malformed request: {0}")]
    InvalidRequest(String),

    // === Not Found Errors ===
    #[error("Account not found")]
    AccountNotFound,

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Transfer not found or already processed")]
    TransferNotFound,

    #[error("TAN challenge not found")]
    ChallengeNotFound,

    #[error("Standing order not found")]
    OrderNotFound,

    // === Funds Errors ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    // === TAN Errors ===
    #[error("Wrong TAN, {remaining} attempts remaining")]
    TanWrongCode { remaining: u32 },

    #[error("TAN has expired")]
    TanExpired,

    #[error("Too many failed TAN attempts")]
    TanExhausted,

    // === Store Errors ===
    #[error("Transaction conflict retry budget exhausted")]
    ConflictExceeded,

    // === System Errors ===
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BankError {
    /// Get the stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            BankError::Unauthorized => "UNAUTHORIZED",
            BankError::Forbidden => "FORBIDDEN",
            BankError::InvalidAmount => "INVALID_AMOUNT",
            BankError::PrecisionOverflow => "PRECISION_OVERFLOW",
            BankError::Overflow => "OVERFLOW",
            BankError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            BankError::SameAccount => "SAME_ACCOUNT",
            BankError::InvalidAccountNumber(_) => "INVALID_ACCOUNT_NUMBER",
            BankError::InvalidRequest(_) => "INVALID_REQUEST",
            BankError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            BankError::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            BankError::TransferNotFound => "TRANSFER_NOT_FOUND",
            BankError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            BankError::OrderNotFound => "ORDER_NOT_FOUND",
            BankError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            BankError::TanWrongCode { .. } => "TAN_WRONG_CODE",
            BankError::TanExpired => "TAN_EXPIRED",
            BankError::TanExhausted => "TAN_EXHAUSTED",
            BankError::ConflictExceeded => "CONFLICT_EXCEEDED",
            BankError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            BankError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            BankError::Unauthorized => 401,
            BankError::Forbidden => 403,
            BankError::InvalidAmount
            | BankError::PrecisionOverflow
            | BankError::Overflow
            | BankError::CurrencyMismatch { .. }
            | BankError::SameAccount
            | BankError::InvalidAccountNumber(_)
            | BankError::InvalidRequest(_)
            | BankError::TanWrongCode { .. }
            | BankError::TanExpired
            | BankError::TanExhausted => 400,
            BankError::AccountNotFound
            | BankError::RecipientNotFound
            | BankError::TransferNotFound
            | BankError::ChallengeNotFound
            | BankError::OrderNotFound => 404,
            BankError::InsufficientFunds => 422,
            BankError::ConflictExceeded => 409,
            BankError::InvalidStateTransition(_) | BankError::Internal(_) => 500,
        }
    }

    /// Check if this error belongs to the TAN family
    pub fn is_tan_rejection(&self) -> bool {
        matches!(
            self,
            BankError::TanWrongCode { .. } | BankError::TanExpired | BankError::TanExhausted
        )
    }
}
