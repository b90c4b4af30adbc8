//! Startup configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

use workshop_observability::{LogFormat, ParseLogFormatError};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WORKSHOP_BIND_ADDR: invalid socket address '{value}': {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("WORKSHOP_LOG_FORMAT: {0}")]
    LogFormat(#[from] ParseLogFormatError),

    #[error("JWT_SECRET must not be empty")]
    EmptySecret,
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub log_format: LogFormat,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("WORKSHOP_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::BindAddr { value: bind.clone(), source })?;

        let log_format = match lookup("WORKSHOP_LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => LogFormat::default(),
        };

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(s) if s.trim().is_empty() => return Err(ConfigError::EmptySecret),
            Some(s) => s,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn explicit_values_are_used() {
        let cfg = config(&[
            ("WORKSHOP_BIND_ADDR", "127.0.0.1:9000"),
            ("WORKSHOP_LOG_FORMAT", "pretty"),
            ("JWT_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.jwt_secret, "s3cret");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(config(&[("WORKSHOP_BIND_ADDR", "nowhere")]), Err(ConfigError::BindAddr { .. })));
        assert!(matches!(config(&[("WORKSHOP_LOG_FORMAT", "xml")]), Err(ConfigError::LogFormat(_))));
        assert!(matches!(config(&[("JWT_SECRET", "  ")]), Err(ConfigError::EmptySecret)));
    }
}
