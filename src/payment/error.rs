//! Protocol Error Types
//!
//! Closed error taxonomy shared by every merchant API method. Codes and messages are
//! fixed by the provider protocol and must match byte-for-byte.

use serde::Serialize;
use thiserror::Error;

/// Error message in the three languages the provider displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalizedMessage {
    pub en: &'static str,
    pub ru: &'static str,
    pub uz: &'static str,
}

/// Payment protocol errors
///
/// Everything except `Internal` is an expected business outcome. `Internal` keeps its
/// detail for logs only; the provider only ever sees the fixed -32603 envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    // === Business rule outcomes ===
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Transaction cannot be performed")]
    CouldNotPerform,

    #[error("Transaction cannot be cancelled")]
    CouldNotCancel,

    // === Request shape ===
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Parse error")]
    ParseError,

    #[error("Invalid authorization")]
    Unauthorized,

    // === System ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub const INVALID_AMOUNT: i32 = -31001;
    pub const TRANSACTION_NOT_FOUND: i32 = -31003;
    pub const COULD_NOT_CANCEL: i32 = -31007;
    pub const COULD_NOT_PERFORM: i32 = -31008;
    pub const ACCOUNT_NOT_FOUND: i32 = -31050;
    pub const UNAUTHORIZED: i32 = -32504;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_SERVER: i32 = -32603;
    pub const PARSE_ERROR: i32 = -32700;

    /// Protocol error code
    pub fn code(&self) -> i32 {
        match self {
            PaymentError::InvalidAmount => Self::INVALID_AMOUNT,
            PaymentError::AccountNotFound => Self::ACCOUNT_NOT_FOUND,
            PaymentError::TransactionNotFound => Self::TRANSACTION_NOT_FOUND,
            PaymentError::CouldNotPerform => Self::COULD_NOT_PERFORM,
            PaymentError::CouldNotCancel => Self::COULD_NOT_CANCEL,
            PaymentError::InvalidParams(_) => Self::INVALID_PARAMS,
            PaymentError::MethodNotFound(_) => Self::METHOD_NOT_FOUND,
            PaymentError::ParseError => Self::PARSE_ERROR,
            PaymentError::Unauthorized => Self::UNAUTHORIZED,
            PaymentError::Internal(_) => Self::INTERNAL_SERVER,
        }
    }

    /// Pre-defined message shown to the payer
    pub fn message(&self) -> LocalizedMessage {
        match self {
            PaymentError::InvalidAmount => LocalizedMessage {
                en: "Invalid amount",
                ru: "Неверная сумма",
                uz: "Summa noto'g'ri",
            },
            PaymentError::AccountNotFound => LocalizedMessage {
                en: "User not found",
                ru: "Пользователь не найден",
                uz: "Foydalanuvchi topilmadi",
            },
            PaymentError::TransactionNotFound => LocalizedMessage {
                en: "Transaction not found",
                ru: "Транзакция не найдена",
                uz: "Tranzaksiya topilmadi",
            },
            PaymentError::CouldNotPerform => LocalizedMessage {
                en: "Could not perform this operation",
                ru: "Невозможно выполнить операцию",
                uz: "Ushbu operatsiyani bajarib bo'lmadi",
            },
            PaymentError::CouldNotCancel => LocalizedMessage {
                en: "The transaction cannot be cancelled",
                ru: "Заказ выполнен. Невозможно отменить транзакцию.",
                uz: "Tranzaksiyani bekor qilib bo'lmaydi",
            },
            PaymentError::InvalidParams(_) => LocalizedMessage {
                en: "Invalid params",
                ru: "Неверные параметры",
                uz: "Parametrlar noto'g'ri",
            },
            PaymentError::MethodNotFound(_) => LocalizedMessage {
                en: "Method not found",
                ru: "Метод не найден",
                uz: "Metod topilmadi",
            },
            PaymentError::ParseError => LocalizedMessage {
                en: "Parse error",
                ru: "Ошибка разбора запроса",
                uz: "So'rovni o'qib bo'lmadi",
            },
            PaymentError::Unauthorized => LocalizedMessage {
                en: "Invalid authorization",
                ru: "Неверная авторизация",
                uz: "Noto'g'ri avtorizatsiya",
            },
            PaymentError::Internal(_) => LocalizedMessage {
                en: "Internal server error",
                ru: "Внутренняя ошибка сервера",
                uz: "Ichki server xatosi",
            },
        }
    }

    /// Optional `data` member of the error envelope
    pub fn data(&self) -> Option<&'static str> {
        match self {
            PaymentError::AccountNotFound => Some("account"),
            _ => None,
        }
    }

    /// Stable name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::InvalidAmount => "INVALID_AMOUNT",
            PaymentError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            PaymentError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            PaymentError::CouldNotPerform => "COULD_NOT_PERFORM",
            PaymentError::CouldNotCancel => "COULD_NOT_CANCEL",
            PaymentError::InvalidParams(_) => "INVALID_PARAMS",
            PaymentError::MethodNotFound(_) => "METHOD_NOT_FOUND",
            PaymentError::ParseError => "PARSE_ERROR",
            PaymentError::Unauthorized => "UNAUTHORIZED",
            PaymentError::Internal(_) => "INTERNAL_SERVER",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, PaymentError::Internal(_))
    }
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Internal(format!("database: {}", e))
    }
}

impl From<tokio::time::error::Elapsed> for PaymentError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PaymentError::Internal("storage call timed out".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_codes() {
        assert_eq!(PaymentError::InvalidAmount.code(), -31001);
        assert_eq!(PaymentError::TransactionNotFound.code(), -31003);
        assert_eq!(PaymentError::CouldNotCancel.code(), -31007);
        assert_eq!(PaymentError::CouldNotPerform.code(), -31008);
        assert_eq!(PaymentError::AccountNotFound.code(), -31050);
        assert_eq!(PaymentError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(PaymentError::Internal("x".into()).code(), -32603);
        assert_eq!(PaymentError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(PaymentError::ParseError.code(), -32700);
        assert_eq!(PaymentError::Unauthorized.code(), -32504);
    }

    #[test]
    fn test_only_account_not_found_carries_data() {
        assert_eq!(PaymentError::AccountNotFound.data(), Some("account"));
        assert_eq!(PaymentError::InvalidAmount.data(), None);
        assert_eq!(PaymentError::Internal("boom".into()).data(), None);
    }

    #[test]
    fn test_internal_message_hides_detail() {
        let err = PaymentError::Internal("connection reset by peer".into());
        let msg = err.message();
        assert_eq!(msg.en, "Internal server error");
        assert!(!msg.ru.contains("connection"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_message_serializes_with_language_keys() {
        let json = serde_json::to_value(PaymentError::CouldNotCancel.message()).unwrap();
        assert_eq!(json["en"], "The transaction cannot be cancelled");
        assert!(json.get("ru").is_some());
        assert!(json.get("uz").is_some());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_internal() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        let err: PaymentError = elapsed.into();
        assert!(err.is_internal());
        assert_eq!(err.code(), -32603);
    }
}
