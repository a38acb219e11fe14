//! Server credential loading.
//!
//! The app id and app certificate are read once at startup from
//! `SERVER_APP_ID` and `SERVER_APP_CERTIFICATE`. They are immutable for the
//! rest of the process lifetime.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("SERVER_APP_ID is not set")]
    MissingServerId,

    #[error("SERVER_APP_CERTIFICATE is not set")]
    MissingServerSecret,

    #[error("failed to read server credentials: {0}")]
    Source(String),
}

/// The identity and shared secret used to sign channel tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerCredentials {
    server_id: String,
    server_secret: String,
}

#[derive(Deserialize)]
struct RawCredentials {
    app_id: Option<String>,
    app_certificate: Option<String>,
}

impl ServerCredentials {
    /// Both values must be non-empty.
    pub fn new(
        server_id: impl Into<String>,
        server_secret: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let server_id = server_id.into();
        let server_secret = server_secret.into();

        if server_id.trim().is_empty() {
            return Err(CredentialsError::MissingServerId);
        }
        if server_secret.trim().is_empty() {
            return Err(CredentialsError::MissingServerSecret);
        }

        Ok(Self {
            server_id,
            server_secret,
        })
    }

    /// Reads the credentials from the process environment.
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_source(environment())
    }

    fn from_source(env: config::Environment) -> Result<Self, CredentialsError> {
        let raw = config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|cfg| cfg.try_deserialize::<RawCredentials>())
            .map_err(|e| CredentialsError::Source(e.to_string()))?;

        Self::new(
            raw.app_id.unwrap_or_default(),
            raw.app_certificate.unwrap_or_default(),
        )
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn server_secret(&self) -> &str {
        &self.server_secret
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("server_id", &self.server_id)
            .field("server_secret", &"[REDACTED]")
            .finish()
    }
}

fn environment() -> config::Environment {
    // SERVER_APP_ID -> app_id, SERVER_APP_CERTIFICATE -> app_certificate
    config::Environment::with_prefix("SERVER").prefix_separator("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(vars: &[(&str, &str)]) -> config::Environment {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    #[test]
    fn test_loads_both_values() {
        let creds = ServerCredentials::from_source(env_with(&[
            ("SERVER_APP_ID", "app-123"),
            ("SERVER_APP_CERTIFICATE", "cert-456"),
        ]))
        .unwrap();

        assert_eq!(creds.server_id(), "app-123");
        assert_eq!(creds.server_secret(), "cert-456");
    }

    #[test]
    fn test_missing_certificate_fails_closed() {
        let err =
            ServerCredentials::from_source(env_with(&[("SERVER_APP_ID", "app-123")])).unwrap_err();
        assert_eq!(err, CredentialsError::MissingServerSecret);
    }

    #[test]
    fn test_missing_everything() {
        let err = ServerCredentials::from_source(env_with(&[])).unwrap_err();
        assert_eq!(err, CredentialsError::MissingServerId);
    }

    #[test]
    fn test_empty_values_are_rejected() {
        assert_eq!(
            ServerCredentials::new("", "secret").unwrap_err(),
            CredentialsError::MissingServerId
        );
        assert_eq!(
            ServerCredentials::new("app", "   ").unwrap_err(),
            CredentialsError::MissingServerSecret
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ServerCredentials::new("app-123", "super-secret").unwrap();
        let debug = format!("{:?}", creds);

        assert!(debug.contains("app-123"));
        assert!(!debug.contains("super-secret"));
    }
}
