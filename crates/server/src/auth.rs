// crates/server/src/auth.rs
//! Auth gateway: gates every inbound request except the public allow-list.
//!
//! Decision order, first match wins:
//! 1. path on the public allow-list — allow
//! 2. request already carries a validated [`Principal`] — allow
//! 3. credential header present — validate against the credential store;
//!    valid attaches a `Principal`, invalid/revoked is `403`
//! 4. nothing presented — `401`
//!
//! Credential values are opaque input: they are never stored and never
//! logged. The proxies inject the server-held upstream secret separately
//! (see `proxy`), so a caller credential never crosses the trust boundary.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::collections::{HashMap, HashSet};

use crate::config::{API_KEY_HEADER, INTERNAL_KEY_HEADER};
use crate::error::ApiError;
use crate::state::AppState;

/// Identity attached to a request once its credential has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub kind: PrincipalKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    /// Service-to-service caller authenticated by shared API key.
    Service,
    /// End-user session authenticated by bearer token.
    User,
}

/// Outcome of a credential lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid(Principal),
    /// Unknown or malformed credential.
    Invalid,
    /// Previously valid credential that has been revoked. Distinct from
    /// `Invalid` for audit logging; both reject with `403`.
    Revoked,
}

/// Credential storage is an external collaborator; the gateway only needs
/// lookups.
pub trait CredentialStore: Send + Sync {
    /// Validate a shared API key (service-to-service trust).
    fn validate_key(&self, key: &str) -> CredentialCheck;

    /// Validate an end-user session bearer token.
    fn validate_token(&self, token: &str) -> CredentialCheck;
}

/// In-memory credential store used by the binary (keys from config) and
/// by tests.
#[derive(Debug, Default)]
pub struct StaticKeyStore {
    keys: HashMap<String, String>,
    tokens: HashMap<String, String>,
    revoked: HashSet<String>,
}

impl StaticKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>, principal: impl Into<String>) -> Self {
        self.keys.insert(key.into(), principal.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), principal.into());
        self
    }

    /// Mark a credential as revoked. Revoked credentials stay in the map
    /// so the store can tell "revoked" from "never existed".
    pub fn revoke(mut self, credential: impl Into<String>) -> Self {
        self.revoked.insert(credential.into());
        self
    }
}

impl CredentialStore for StaticKeyStore {
    fn validate_key(&self, key: &str) -> CredentialCheck {
        if self.revoked.contains(key) {
            return CredentialCheck::Revoked;
        }
        match self.keys.get(key) {
            Some(name) => CredentialCheck::Valid(Principal {
                name: name.clone(),
                kind: PrincipalKind::Service,
            }),
            None => CredentialCheck::Invalid,
        }
    }

    fn validate_token(&self, token: &str) -> CredentialCheck {
        if self.revoked.contains(token) {
            return CredentialCheck::Revoked;
        }
        match self.tokens.get(token) {
            Some(name) => CredentialCheck::Valid(Principal {
                name: name.clone(),
                kind: PrincipalKind::User,
            }),
            None => CredentialCheck::Invalid,
        }
    }
}

/// Middleware gating the client-facing API.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Public allow-list.
    if state.config.is_public(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    // 2. Already-validated session principal (e.g. injected by an outer
    // session layer or a previous middleware).
    if req.extensions().get::<Principal>().is_some() {
        return Ok(next.run(req).await);
    }

    // 3. Shared API key header.
    if let Some(value) = req.headers().get(API_KEY_HEADER) {
        let key = value.to_str().map_err(|_| ApiError::Forbidden)?;
        return match state.credentials.validate_key(key) {
            CredentialCheck::Valid(principal) => {
                tracing::debug!(principal = %principal.name, "API key accepted");
                req.extensions_mut().insert(principal);
                Ok(next.run(req).await)
            }
            CredentialCheck::Revoked => {
                tracing::warn!("Revoked API key presented");
                Err(ApiError::Forbidden)
            }
            CredentialCheck::Invalid => Err(ApiError::Forbidden),
        };
    }

    // 3b. Bearer token (end-user session).
    if let Some(value) = req.headers().get(AUTHORIZATION) {
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Forbidden)?;
        return match state.credentials.validate_token(token) {
            CredentialCheck::Valid(principal) => {
                tracing::debug!(principal = %principal.name, "Bearer token accepted");
                req.extensions_mut().insert(principal);
                Ok(next.run(req).await)
            }
            CredentialCheck::Revoked => {
                tracing::warn!("Revoked bearer token presented");
                Err(ApiError::Forbidden)
            }
            CredentialCheck::Invalid => Err(ApiError::Forbidden),
        };
    }

    // 4. Nothing presented.
    Err(ApiError::Unauthorized)
}

/// Middleware for the internal ingest routes: the execution service
/// authenticates with the gateway's own shared secret, not a client
/// credential.
pub async fn require_internal(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match req.headers().get(INTERNAL_KEY_HEADER) {
        Some(value) if value.to_str().is_ok_and(|v| v == state.config.internal_key) => {
            Ok(next.run(req).await)
        }
        Some(_) => {
            tracing::warn!("Internal route called with wrong shared secret");
            Err(ApiError::Forbidden)
        }
        None => Err(ApiError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StaticKeyStore {
        StaticKeyStore::new()
            .with_key("k-panel", "panel")
            .with_key("k-old", "legacy-panel")
            .with_token("t-alice", "alice")
            .revoke("k-old")
    }

    #[test]
    fn test_valid_key() {
        let check = store().validate_key("k-panel");
        assert_eq!(
            check,
            CredentialCheck::Valid(Principal {
                name: "panel".to_string(),
                kind: PrincipalKind::Service,
            })
        );
    }

    #[test]
    fn test_unknown_key_is_invalid() {
        assert_eq!(store().validate_key("nope"), CredentialCheck::Invalid);
    }

    #[test]
    fn test_revoked_key() {
        assert_eq!(store().validate_key("k-old"), CredentialCheck::Revoked);
    }

    #[test]
    fn test_valid_token() {
        let CredentialCheck::Valid(principal) = store().validate_token("t-alice") else {
            panic!("expected valid token");
        };
        assert_eq!(principal.kind, PrincipalKind::User);
        assert_eq!(principal.name, "alice");
    }

    #[test]
    fn test_key_is_not_a_token() {
        assert_eq!(store().validate_token("k-panel"), CredentialCheck::Invalid);
    }
}
