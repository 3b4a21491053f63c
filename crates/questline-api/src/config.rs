//! Runtime configuration read from the environment.

use std::path::PathBuf;

use crate::error::AppError;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Bind host (`HOST`, default `0.0.0.0`).
    pub host: String,
    /// Bind port (`PORT`, default `3000`).
    pub port: u16,
    /// YAML catalog to load instead of the built-in one (`QUESTLINE_CATALOG`).
    pub catalog_path: Option<PathBuf>,
    /// Peers to join at startup (`QUESTLINE_PEERS`, default `0`).
    pub peers: u32,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let catalog_path = lookup("QUESTLINE_CATALOG")
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let peers = match lookup("QUESTLINE_PEERS") {
            Some(raw) => raw.parse().map_err(|e| {
                AppError::Config(format!("QUESTLINE_PEERS must be a valid u32: {e}"))
            })?,
            None => 0,
        };

        Ok(Self {
            host,
            port,
            catalog_path,
            peers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.catalog_path, None);
        assert_eq!(config.peers, 0);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("QUESTLINE_CATALOG", "content/verdant.yaml"),
            ("QUESTLINE_PEERS", "3"),
        ])
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.catalog_path,
            Some(PathBuf::from("content/verdant.yaml"))
        );
        assert_eq!(config.peers, 3);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = config_from(&[("PORT", "not-a-port")]);

        match result.unwrap_err() {
            AppError::Config(message) => assert!(message.contains("PORT")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_peer_count_is_rejected() {
        let result = config_from(&[("QUESTLINE_PEERS", "-1")]);

        match result.unwrap_err() {
            AppError::Config(message) => assert!(message.contains("QUESTLINE_PEERS")),
            other => panic!("expected Config, got {other:?}"),
        }
    }
}
