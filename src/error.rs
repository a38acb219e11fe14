//! Error responses for the token endpoint.

use crate::signer::SigningError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Missing SERVER_APP_ID or SERVER_APP_CERTIFICATE")]
    MissingServerCredentials,

    #[error("channelName is required")]
    ChannelNameRequired,

    #[error("{0}")]
    Signing(#[from] SigningError),
}

impl TokenError {
    pub fn status(&self) -> StatusCode {
        match self {
            TokenError::MissingServerCredentials => StatusCode::INTERNAL_SERVER_ERROR,
            TokenError::ChannelNameRequired => StatusCode::BAD_REQUEST,
            TokenError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::MissingServerCredentials => "missing_server_credentials",
            TokenError::ChannelNameRequired => "channel_name_required",
            TokenError::Signing(_) => "token_signing_failed",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
