//! Service configuration (env-driven).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const DEFAULT_PORT: u16 = 4000;

/// Which backend keeps certificate records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Records are lost on restart; PDFs stay on disk.
    Memory,
    /// Records persist in a SQLite file.
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Prefix for every link handed out, without a trailing slash.
    pub base_url: String,
    pub cert_dir: PathBuf,
    pub store: StoreBackend,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port: u16 = lookup("PORT")
            .map(|v| v.parse())
            .transpose()
            .context("PORT must be a port number.")?
            .unwrap_or(DEFAULT_PORT);

        let listen_addr: SocketAddr = lookup("CERTIFY_LISTEN_ADDR")
            .unwrap_or_else(|| format!("0.0.0.0:{port}"))
            .parse()
            .context("CERTIFY_LISTEN_ADDR must be a socket address (example: 0.0.0.0:4000).")?;

        let base_url = lookup("CERTIFY_BASE_URL")
            .or_else(|| lookup("BASE_URL"))
            .unwrap_or_else(|| format!("http://localhost:{}", listen_addr.port()));
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("CERTIFY_BASE_URL must start with http:// or https:// (got '{base_url}').");
        }

        let cert_dir = lookup("CERTIFY_CERT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("certificates"));

        let store = match lookup("CERTIFY_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("sqlite") => StoreBackend::Sqlite {
                path: lookup("CERTIFY_DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("certify.db")),
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("CERTIFY_STORE must be 'sqlite' or 'memory' (got '{other}')."),
        };

        let log_level = lookup("CERTIFY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            listen_addr,
            base_url,
            cert_dir,
            store,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.base_url, "http://localhost:4000");
        assert_eq!(config.cert_dir, PathBuf::from("certificates"));
        assert_eq!(
            config.store,
            StoreBackend::Sqlite {
                path: PathBuf::from("certify.db")
            }
        );
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_port_and_base_url_fallbacks() {
        let config = load(&[("PORT", "8081"), ("BASE_URL", "https://certs.example.com/")]).unwrap();
        assert_eq!(config.listen_addr.port(), 8081);
        assert_eq!(config.base_url, "https://certs.example.com");
    }

    #[test]
    fn test_prefixed_values_win() {
        let config = load(&[
            ("PORT", "8081"),
            ("CERTIFY_LISTEN_ADDR", "127.0.0.1:9000"),
            ("BASE_URL", "https://old.example.com"),
            ("CERTIFY_BASE_URL", "https://new.example.com"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.base_url, "https://new.example.com");
    }

    #[test]
    fn test_memory_store() {
        let config = load(&[("CERTIFY_STORE", "memory")]).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("CERTIFY_BASE_URL", "certs.example.com")]).is_err());
        assert!(load(&[("CERTIFY_STORE", "postgres")]).is_err());
    }
}
