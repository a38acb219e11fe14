//! Logic for the `/token` endpoint.
//!
//! Issues a publisher token for one channel. Each request resolves to
//! exactly one outcome: preflight ok, a signed token, or a JSON error.

use crate::{
    AppState, audit,
    credentials::ServerCredentials,
    error::TokenError,
    signer::{Role, SigningRequest, TokenSigner},
    window::{Clock, ValidityWindow},
};
use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A validated token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub channel_name: String,
    pub subject_id: u32,
}

impl TokenRequest {
    /// Parses and validates a request body.
    ///
    /// A body that is not a JSON object is treated as `{}`, so malformed
    /// payloads end up as a missing channel name rather than a parse error.
    pub fn parse(body: &[u8]) -> Result<Self, TokenError> {
        let payload = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let channel_name = payload
            .get("channelName")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if channel_name.is_empty() {
            return Err(TokenError::ChannelNameRequired);
        }

        let subject_id = payload
            .get("uid")
            .or_else(|| payload.get("subjectId"))
            .map(subject_id_from)
            .unwrap_or_default();

        Ok(Self {
            channel_name: channel_name.to_string(),
            subject_id,
        })
    }
}

/// Anything that is not a whole number in `u32` range maps to subject 0.
fn subject_id_from(value: &Value) -> u32 {
    if let Some(id) = value.as_u64() {
        return u32::try_from(id).unwrap_or_default();
    }
    match value.as_f64() {
        Some(id) if id.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&id) => id as u32,
        _ => 0,
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Runs the issuance pipeline: credentials, body, validity window, signing.
pub fn issue_token(
    credentials: Option<&ServerCredentials>,
    signer: &dyn TokenSigner,
    clock: &dyn Clock,
    body: &[u8],
) -> Result<TokenResponse, TokenError> {
    // Checked first so a misconfigured deployment never reports a
    // validation error.
    let credentials = credentials.ok_or(TokenError::MissingServerCredentials)?;

    let request = TokenRequest::parse(body)?;
    let window = ValidityWindow::now(clock);

    let token = signer.sign(&SigningRequest {
        server_id: credentials.server_id(),
        server_secret: credentials.server_secret(),
        channel_name: &request.channel_name,
        subject_id: request.subject_id,
        role: Role::Publisher,
        expires_at: window.expires_at,
    })?;

    audit!(
        channel = %request.channel_name,
        uid = request.subject_id,
        expiresAt = window.expires_at,
        "issued publisher token"
    );
    Ok(TokenResponse { token })
}

/// Handler for `POST /token`.
#[tracing::instrument(skip_all)]
pub async fn token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenResponse>, TokenError> {
    issue_token(
        state.credentials.as_ref(),
        state.signer.as_ref(),
        state.clock.as_ref(),
        &body,
    )
    .map(Json)
    .inspect_err(|err| match err {
        TokenError::Signing(reason) => {
            tracing::error!(error = %reason, "failed to sign channel token")
        }
        TokenError::MissingServerCredentials => {
            tracing::error!("refusing token request, server credentials are not configured")
        }
        TokenError::ChannelNameRequired => {
            audit!("rejected token request without channel name")
        }
    })
}

/// Handler for `OPTIONS /token`. CORS headers are added by the router.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
