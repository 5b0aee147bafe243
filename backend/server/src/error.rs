use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::StoreError;

pub const GENERIC_JOIN_FAILURE: &str = "Failed to join waitlist. Please try again.";
pub const DEFAULT_REJECTION: &str = "Failed to join waitlist.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Email is required.")]
    MissingEmail,

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    /// The store ran and declined. The message is written for the end user.
    #[error("{0}")]
    Rejected(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingEmail | AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Store(e) => {
                error!("Store error: {e}");
                GENERIC_JOIN_FAILURE.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
