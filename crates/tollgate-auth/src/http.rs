//! HTTP response mapping for authorization errors.
//!
//! Denials become 403 / 401 responses; every other error is a 500 whose
//! message still names the broken policy or metadata so operators can tell
//! it apart from an access decision.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_server_error() {
            tracing::error!(
                kind = self.kind(),
                error = %self,
                "Authorization failed with server error"
            );
        }

        (status, Json(error_body(&self))).into_response()
    }
}

/// JSON body used for an authorization error response.
#[must_use]
pub fn error_body(error: &AuthError) -> serde_json::Value {
    json!({
        "status": error.status_code(),
        "error": error.kind(),
        "message": error_message(error),
    })
}

fn error_message(error: &AuthError) -> String {
    match error {
        AuthError::Forbidden { message }
        | AuthError::Unauthorized { message }
        | AuthError::PolicyExecution { message } => message.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
