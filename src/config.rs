//! Mock server configuration.
//!
//! Defaults suit in-process tests. The environment can override them:
//!
//! - `MOCKFEED_HOST` - interface to listen on (defaults to `127.0.0.1`)
//! - `MOCKFEED_WARNING_HEADER` - header carrying server warnings (defaults to `X-NuGet-Warning`)
//! - `MOCKFEED_BASE_PATH` - fixed base path instead of a random one

use std::env;
use std::net::{IpAddr, Ipv4Addr};

use axum::http::HeaderName;

use crate::error::{MockServerError, Result};

/// Header the registry protocol uses for server warnings.
pub const DEFAULT_WARNING_HEADER: &str = "X-NuGet-Warning";

/// Settings for a [`MockServer`](crate::mock_server::MockServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    /// Interface the listener binds to.
    pub host: IpAddr,
    /// Header that carries warnings on matched responses.
    pub warning_header: String,
    /// Base path for every route. `None` picks a random one per server.
    pub base_path: Option<String>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            warning_header: DEFAULT_WARNING_HEADER.to_string(),
            base_path: None,
        }
    }
}

impl MockServerConfig {
    /// Create a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("MOCKFEED_HOST") {
            config.host = host.parse().map_err(|_| {
                MockServerError::Config(format!("MOCKFEED_HOST is not an IP address: {host}"))
            })?;
        }
        if let Ok(header) = env::var("MOCKFEED_WARNING_HEADER") {
            config.warning_header = header;
        }
        if let Ok(base_path) = env::var("MOCKFEED_BASE_PATH") {
            config.base_path = Some(base_path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Use a fixed base path instead of a random one.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Use a different warning header.
    pub fn with_warning_header(mut self, header: impl Into<String>) -> Self {
        self.warning_header = header.into();
        self
    }

    /// Check that the configuration can be used to start a server.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid header name or a non-empty base path
    /// that does not start with `/` or ends with one.
    pub fn validate(&self) -> Result<()> {
        self.warning_header_name()?;

        if let Some(base_path) = &self.base_path {
            let well_formed = base_path.is_empty()
                || (base_path.starts_with('/') && !base_path.ends_with('/'));
            if !well_formed {
                return Err(MockServerError::Config(format!(
                    "base path must start and not end with '/': {base_path}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn warning_header_name(&self) -> Result<HeaderName> {
        HeaderName::try_from(self.warning_header.as_str()).map_err(|_| {
            MockServerError::Config(format!(
                "invalid warning header name: {}",
                self.warning_header
            ))
        })
    }

    /// The configured base path, or a fresh random one.
    pub(crate) fn resolve_base_path(&self) -> String {
        self.base_path
            .clone()
            .unwrap_or_else(|| format!("/{}", uuid::Uuid::new_v4().simple()))
    }
}
