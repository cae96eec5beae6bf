use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid snapshot for match {match_id}: {reason}")]
    InvalidSnapshot { match_id: String, reason: String },

    #[error("Out-of-order snapshot for {match_id}@{sportsbook}: {timestamp} is not after {previous}")]
    OutOfOrder {
        match_id: String,
        sportsbook: String,
        timestamp: String,
        previous: String,
    },

    #[error("Bet not found: {0}")]
    BetNotFound(String),

    #[error("Duplicate bet id: {0}")]
    DuplicateBet(String),

    #[error("Bet {0} is already settled")]
    AlreadySettled(String),

    #[error("Invalid settlement for bet {id}: {reason}")]
    InvalidSettlement { id: String, reason: String },

    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Invalid guardrail rule: {0}")]
    InvalidRule(String),

    #[error("Betting is locked out: {0}")]
    LockedOut(String),

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    #[error("Snapshot source error: {0}")]
    Source(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidSnapshot { .. }
            | AppError::OutOfOrder { .. }
            | AppError::InvalidSettlement { .. }
            | AppError::InvalidBet(_)
            | AppError::InvalidRule(_) => StatusCode::BAD_REQUEST,
            AppError::BetNotFound(_) | AppError::AlertNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateBet(_) | AppError::AlreadySettled(_) => StatusCode::CONFLICT,
            AppError::LockedOut(_) => StatusCode::LOCKED,
            AppError::Source(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
