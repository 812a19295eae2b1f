use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    /// Inbound callback carried a signature that does not match our
    /// recomputation. Security boundary: no state change is made.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// Receipt sum disagrees with the charge amount. Fatal precondition
    /// failure, the request is never dispatched to the gateway.
    #[error("Receipt mismatch: {0}")]
    ReceiptMismatch(String),

    /// Write-time uniqueness violation on invoice_id. Recoverable: the
    /// caller re-runs allocation.
    #[error("Invoice id collision")]
    InvoiceCollision,

    #[error("Invoice allocation exhausted after {0} attempts")]
    InvoiceAllocationExhausted(u32),

    /// A non-terminal recurring parent already exists for this user.
    #[error("A pending parent payment already exists")]
    ParentPaymentPending,

    /// Network/timeout failure talking to the payment gateway.
    #[error("Gateway transport failure: {0}")]
    GatewayTransport(String),

    /// The gateway answered with a definitive rejection.
    #[error("Gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    ConfigError,
    InvalidInput,
    NotFound,
    Unauthorized,
    SignatureMismatch,
    ReceiptMismatch,
    InvoiceCollision,
    InvoiceAllocationExhausted,
    ParentPaymentPending,
    GatewayTransport,
    GatewayRejected,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::SignatureMismatch => "SIGNATURE_MISMATCH",
            ErrorCode::ReceiptMismatch => "RECEIPT_MISMATCH",
            ErrorCode::InvoiceCollision => "INVOICE_COLLISION",
            ErrorCode::InvoiceAllocationExhausted => "INVOICE_ALLOCATION_EXHAUSTED",
            ErrorCode::ParentPaymentPending => "PARENT_PAYMENT_PENDING",
            ErrorCode::GatewayTransport => "GATEWAY_TRANSPORT",
            ErrorCode::GatewayRejected => "GATEWAY_REJECTED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                // The payments table carries two unique constraints: the
                // invoice id itself and the one-live-parent partial index.
                return match db_err.constraint() {
                    Some("payments_one_live_parent_idx") => AppError::ParentPaymentPending,
                    _ => AppError::InvoiceCollision,
                };
            }
        }
        AppError::Database(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
