// crates/server/src/config.rs
//! Gateway configuration.
//!
//! Everything the auth gateway and proxies need is carried in an explicit
//! [`GatewayConfig`] value built once in `main` (or by a test) and handed
//! to `AppState` — never read from process-global mutable state, so
//! multiple configurations can coexist in tests.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Default port for the gateway.
const DEFAULT_PORT: u16 = 47810;

/// Default time allowed for the upstream to produce response headers.
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Paths exempt from authentication.
const DEFAULT_PUBLIC_PATHS: &[&str] = &["/api/health", "/api/docs"];

/// Header carrying a caller's shared API key (service-to-service trust).
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header the proxies inject on outbound upstream requests. The caller's
/// own credential is never forwarded upstream.
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind port for the HTTP server.
    pub port: u16,
    /// Base URL of the upstream execution service, no trailing slash.
    pub upstream_base: String,
    /// Server-held shared secret injected into outbound upstream requests
    /// and required on the internal ingest routes.
    pub internal_key: String,
    /// Time allowed for the upstream to connect and produce response
    /// headers. Applies to both proxies at the opening phase only; an
    /// established stream body is never subject to it.
    pub upstream_timeout: Duration,
    /// Path prefixes exempt from authentication.
    pub public_paths: Vec<String>,
}

impl GatewayConfig {
    /// Build a config for tests against an arbitrary upstream.
    pub fn for_upstream(upstream_base: impl Into<String>, internal_key: impl Into<String>) -> Self {
        Self {
            port: 0,
            upstream_base: trim_trailing_slash(upstream_base.into()),
            internal_key: internal_key.into(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Read the config from the environment.
    ///
    /// `HOSTWARDEN_UPSTREAM_URL` and `HOSTWARDEN_INTERNAL_KEY` are
    /// required: a gateway without an upstream or without a secret to
    /// inject must refuse to start rather than run unauthenticated.
    pub fn from_env() -> Result<Self> {
        let upstream_base = std::env::var("HOSTWARDEN_UPSTREAM_URL")
            .context("HOSTWARDEN_UPSTREAM_URL is required")?;
        if upstream_base.is_empty() {
            bail!("HOSTWARDEN_UPSTREAM_URL must not be empty");
        }

        let internal_key = std::env::var("HOSTWARDEN_INTERNAL_KEY")
            .context("HOSTWARDEN_INTERNAL_KEY is required")?;
        if internal_key.is_empty() {
            bail!("HOSTWARDEN_INTERNAL_KEY must not be empty");
        }

        let port = std::env::var("HOSTWARDEN_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let upstream_timeout = std::env::var("HOSTWARDEN_UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT);

        Ok(Self {
            port,
            upstream_base: trim_trailing_slash(upstream_base),
            internal_key,
            upstream_timeout,
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Whether a request path is on the public allow-list.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|p| path == p || path.starts_with(&format!("{p}/")))
    }

    /// Rewrite an inbound path (plus optional query string) onto the
    /// upstream root.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}{}?{}", self.upstream_base, path, q),
            None => format!("{}{}", self.upstream_base, path),
        }
    }
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_public_allow_list() {
        let config = GatewayConfig::for_upstream("http://upstream:9000", "secret");
        assert!(config.is_public("/api/health"));
        assert!(config.is_public("/api/docs/openapi.json"));
        assert!(!config.is_public("/api/jobs"));
        assert!(!config.is_public("/api/healthz"));
    }

    #[test]
    fn test_upstream_url_rewrite() {
        let config = GatewayConfig::for_upstream("http://upstream:9000/", "secret");
        assert_eq!(
            config.upstream_url("/api/hosts/h1/backup", None),
            "http://upstream:9000/api/hosts/h1/backup"
        );
        assert_eq!(
            config.upstream_url("/api/servers/s1/console/tail", Some("lines=50")),
            "http://upstream:9000/api/servers/s1/console/tail?lines=50"
        );
    }

    #[test]
    fn test_upstream_timeout_default() {
        let config = GatewayConfig::for_upstream("http://upstream:9000", "secret");
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = GatewayConfig::for_upstream("http://upstream:9000///", "secret");
        assert_eq!(config.upstream_base, "http://upstream:9000");
    }
}
