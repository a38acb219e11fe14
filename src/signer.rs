//! Channel token signing.
//!
//! [`TokenSigner`] is the seam between the HTTP layer and whatever builds the
//! token. [`JwtTokenSigner`] is the production implementation: an HS256 JWT
//! keyed by the server secret, carrying everything a verifier needs to check
//! channel, subject, role and expiry.

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Maximum channel name length, in bytes.
pub const MAX_CHANNEL_NAME_LEN: usize = 64;

/// Punctuation allowed in channel names besides ASCII letters, digits and space.
const CHANNEL_NAME_PUNCTUATION: &str = "!#$%&()+-:;<=.>?@[]^_{|}~,";

/// Capability granted by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    fn privileges(self) -> &'static [Privilege] {
        match self {
            Role::Publisher => &[
                Privilege::JoinChannel,
                Privilege::PublishAudioStream,
                Privilege::PublishVideoStream,
                Privilege::PublishDataStream,
            ],
            Role::Subscriber => &[Privilege::JoinChannel],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Publisher => write!(f, "publisher"),
            Role::Subscriber => write!(f, "subscriber"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    JoinChannel,
    PublishAudioStream,
    PublishVideoStream,
    PublishDataStream,
}

/// Everything needed to sign one channel token.
#[derive(Clone, Copy)]
pub struct SigningRequest<'a> {
    pub server_id: &'a str,
    pub server_secret: &'a str,
    pub channel_name: &'a str,
    pub subject_id: u32,
    pub role: Role,
    /// Unix seconds.
    pub expires_at: u64,
}

impl fmt::Debug for SigningRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningRequest")
            .field("server_id", &self.server_id)
            .field("server_secret", &"[REDACTED]")
            .field("channel_name", &self.channel_name)
            .field("subject_id", &self.subject_id)
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("server id must not be empty")]
    EmptyServerId,

    #[error("server secret must not be empty")]
    EmptyServerSecret,

    #[error("expiration must be a positive unix timestamp")]
    InvalidExpiration,

    #[error("channel name is {len} bytes, at most {max} allowed", max = MAX_CHANNEL_NAME_LEN)]
    ChannelNameTooLong { len: usize },

    #[error("channel name contains unsupported character {0:?}")]
    InvalidChannelCharacter(char),

    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Produces an opaque token for a signing request.
///
/// Implementations must be deterministic in their inputs and must fail
/// explicitly rather than return a token a verifier would reject.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, request: &SigningRequest<'_>) -> Result<String, SigningError>;
}

/// Claims carried by a channel token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelClaims {
    /// Server (app) id the token was issued under.
    pub iss: String,
    pub channel: String,
    pub uid: u32,
    pub role: Role,
    /// Expiration time (UNIX timestamp).
    pub exp: u64,
    /// Per-privilege expiration times.
    pub privileges: BTreeMap<Privilege, u64>,
}

impl ChannelClaims {
    fn from_request(request: &SigningRequest<'_>) -> Self {
        let privileges = request
            .role
            .privileges()
            .iter()
            .map(|privilege| (*privilege, request.expires_at))
            .collect();

        Self {
            iss: request.server_id.to_string(),
            channel: request.channel_name.to_string(),
            uid: request.subject_id,
            role: request.role,
            exp: request.expires_at,
            privileges,
        }
    }
}

/// Signs channel tokens as HS256 JWTs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwtTokenSigner;

impl TokenSigner for JwtTokenSigner {
    fn sign(&self, request: &SigningRequest<'_>) -> Result<String, SigningError> {
        validate(request)?;

        let claims = ChannelClaims::from_request(request);
        let key = EncodingKey::from_secret(request.server_secret.as_bytes());
        let token = encode(&Header::new(Algorithm::HS256), &claims, &key)?;

        tracing::debug!(
            channel = %claims.channel,
            uid = claims.uid,
            role = %claims.role,
            exp = claims.exp,
            "signed channel token"
        );
        Ok(token)
    }
}

fn validate(request: &SigningRequest<'_>) -> Result<(), SigningError> {
    if request.server_id.is_empty() {
        return Err(SigningError::EmptyServerId);
    }
    if request.server_secret.is_empty() {
        return Err(SigningError::EmptyServerSecret);
    }
    if request.expires_at == 0 {
        return Err(SigningError::InvalidExpiration);
    }
    validate_channel_name(request.channel_name)
}

fn validate_channel_name(name: &str) -> Result<(), SigningError> {
    if name.len() > MAX_CHANNEL_NAME_LEN {
        return Err(SigningError::ChannelNameTooLong { len: name.len() });
    }
    let allowed = |c: &char| {
        c.is_ascii_alphanumeric() || *c == ' ' || CHANNEL_NAME_PUNCTUATION.contains(*c)
    };
    match name.chars().find(|c| !allowed(c)) {
        Some(c) => Err(SigningError::InvalidChannelCharacter(c)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn request(channel_name: &str) -> SigningRequest<'_> {
        SigningRequest {
            server_id: "app-123",
            server_secret: "cert-456",
            channel_name,
            subject_id: 42,
            role: Role::Publisher,
            expires_at: 4600,
        }
    }

    fn decode_claims(token: &str, secret: &str) -> jsonwebtoken::errors::Result<ChannelClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Fixed timestamps in these tests are long in the past.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<ChannelClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map(|data| data.claims)
    }

    #[test]
    fn test_claims_can_be_reconstructed_by_verifier() {
        let token = JwtTokenSigner.sign(&request("lobby-1")).unwrap();
        let claims = decode_claims(&token, "cert-456").unwrap();

        assert_eq!(claims.iss, "app-123");
        assert_eq!(claims.channel, "lobby-1");
        assert_eq!(claims.uid, 42);
        assert_eq!(claims.role, Role::Publisher);
        assert_eq!(claims.exp, 4600);
        assert_eq!(claims.privileges.len(), 4);
        assert!(claims.privileges.values().all(|exp| *exp == 4600));
    }

    #[test]
    fn test_subscriber_only_joins() {
        let mut req = request("lobby-1");
        req.role = Role::Subscriber;
        let token = JwtTokenSigner.sign(&req).unwrap();
        let claims = decode_claims(&token, "cert-456").unwrap();

        assert_eq!(
            claims.privileges.keys().copied().collect::<Vec<_>>(),
            vec![Privilege::JoinChannel]
        );
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let first = JwtTokenSigner.sign(&request("lobby-1")).unwrap();
        let second = JwtTokenSigner.sign(&request("lobby-1")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expiry_changes_token() {
        let mut later = request("lobby-1");
        later.expires_at += 1;

        assert_ne!(
            JwtTokenSigner.sign(&request("lobby-1")).unwrap(),
            JwtTokenSigner.sign(&later).unwrap()
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtTokenSigner.sign(&request("lobby-1")).unwrap();
        assert!(decode_claims(&token, "not-the-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected_by_verifier() {
        let token = JwtTokenSigner.sign(&request("lobby-1")).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        let result = decode::<ChannelClaims>(
            &token,
            &DecodingKey::from_secret(b"cert-456"),
            &validation,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_malformed_inputs() {
        let mut req = request("lobby-1");
        req.server_secret = "";
        assert!(matches!(
            JwtTokenSigner.sign(&req),
            Err(SigningError::EmptyServerSecret)
        ));

        let mut req = request("lobby-1");
        req.server_id = "";
        assert!(matches!(
            JwtTokenSigner.sign(&req),
            Err(SigningError::EmptyServerId)
        ));

        let mut req = request("lobby-1");
        req.expires_at = 0;
        assert!(matches!(
            JwtTokenSigner.sign(&req),
            Err(SigningError::InvalidExpiration)
        ));
    }

    #[test]
    fn test_channel_name_rules() {
        let long = "a".repeat(MAX_CHANNEL_NAME_LEN + 1);
        assert!(matches!(
            JwtTokenSigner.sign(&request(&long)),
            Err(SigningError::ChannelNameTooLong { len: 65 })
        ));
        assert!(matches!(
            JwtTokenSigner.sign(&request("rooms/1")),
            Err(SigningError::InvalidChannelCharacter('/'))
        ));
        assert!(JwtTokenSigner.sign(&request("Team {A} & co: #1")).is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", request("lobby-1"));
        assert!(!debug.contains("cert-456"));
    }
}
