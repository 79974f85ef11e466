use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Repository error: {0}")] Repository(String),

    #[error("Invalid amount: {0}")] InvalidAmount(String),

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Coin not found: {0}")] CoinNotFound(String),

    #[error("Holding not found: {0}")] HoldingNotFound(String),

    #[error("Insufficient quantity: held {held}, requested {requested}")] InsufficientQuantity {
        held: Decimal,
        requested: Decimal,
    },

    #[error("Price unavailable: {0}")] PriceUnavailable(String),

    #[error("Concurrent update conflict: {0}")] Conflict(String),

    #[error("Notification error: {0}")] Notification(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Repository(_) => "REPOSITORY_ERROR",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::CoinNotFound(_) => "COIN_NOT_FOUND",
            AppError::HoldingNotFound(_) => "HOLDING_NOT_FOUND",
            AppError::InsufficientQuantity { .. } => "INSUFFICIENT_QUANTITY",
            AppError::PriceUnavailable(_) => "PRICE_UNAVAILABLE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Notification(_) => "NOTIFICATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors caused by user input rather than by the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAmount(_)
                | AppError::InvalidInput(_)
                | AppError::CoinNotFound(_)
                | AppError::HoldingNotFound(_)
                | AppError::InsufficientQuantity { .. }
        )
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let field = match self {
            AppError::InvalidAmount(_) | AppError::InsufficientQuantity { .. } => {
                Some("quantity".to_string())
            }
            AppError::CoinNotFound(_) | AppError::HoldingNotFound(_) => {
                Some("coin_id".to_string())
            }
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                field,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::CoinNotFound(_) | AppError::HoldingNotFound(_) => {
                axum::http::StatusCode::NOT_FOUND
            }
            | AppError::InvalidAmount(_)
            | AppError::InvalidInput(_)
            | AppError::InsufficientQuantity { .. } => {
                axum::http::StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) => axum::http::StatusCode::CONFLICT,
            AppError::PriceUnavailable(_) => axum::http::StatusCode::BAD_GATEWAY,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
