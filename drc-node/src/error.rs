//! Error types for the node's HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use drc::{CoordinatorError, ErrorKind};

/// Errors returned by the node's route handlers.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The coordinator rejected the operation.
    #[error("{0}")]
    Coordinator(#[from] CoordinatorError),

    /// A required header is missing or malformed.
    #[error("missing or invalid {0} header")]
    Header(&'static str),

    /// The blocking worker running the operation died.
    #[error("worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl NodeError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Coordinator(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::State => StatusCode::CONFLICT,
                ErrorKind::Funds => StatusCode::PAYMENT_REQUIRED,
                ErrorKind::Feed | ErrorKind::Overflow | ErrorKind::Host => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Header(_) => StatusCode::BAD_REQUEST,
            Self::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use drc::guard::GuardError;

    #[test]
    fn test_status_follows_error_kind() {
        let cases = [
            (CoordinatorError::FallbackRateIsZero, StatusCode::BAD_REQUEST),
            (
                CoordinatorError::CannotWithdrawFor {
                    caller: Address::ZERO,
                    from: Address::repeat_byte(1),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                CoordinatorError::RequestIsNotPending(B256::ZERO),
                StatusCode::NOT_FOUND,
            ),
            (GuardError::Paused.into(), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(NodeError::from(err).status(), status);
        }
        assert_eq!(
            NodeError::Header("x-caller").status(),
            StatusCode::BAD_REQUEST
        );
    }
}
