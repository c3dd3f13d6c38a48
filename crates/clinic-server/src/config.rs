//! Server configuration: a TOML file named by `CLINIC_CONFIG`, then
//! `CLINIC_*` environment overrides.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clinic_auth::{AuthConfig, RateLimitConfig};
use clinic_db::DbConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database: DbConfig,
    pub auth: AuthSection,
}

/// The `[auth]` table. Keys are referenced by path and read at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_private_key_path: Option<PathBuf>,
    pub jwt_public_key_path: Option<PathBuf>,
    pub access_token_lifetime_secs: u64,
    pub session_lifetime_secs: u64,
    pub jwt_issuer: String,
    pub pepper: Option<String>,
    pub min_password_length: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database: DbConfig::default(),
            auth: AuthSection::default(),
        }
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        let auth = AuthConfig::default();
        Self {
            jwt_private_key_path: None,
            jwt_public_key_path: None,
            access_token_lifetime_secs: auth.access_token_lifetime_secs,
            session_lifetime_secs: auth.session_lifetime_secs,
            jwt_issuer: auth.jwt_issuer,
            pepper: None,
            min_password_length: auth.min_password_length,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl ServerConfig {
    /// Load from the file named by `CLINIC_CONFIG` (defaults when unset)
    /// and apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CLINIC_CONFIG") {
            Ok(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                Self::from_toml(&contents)?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("parsing server config")
    }

    /// Apply `CLINIC_*` overrides resolved through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(addr) = lookup("CLINIC_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .with_context(|| format!("invalid CLINIC_BIND_ADDR {addr:?}"))?;
        }

        if let Some(url) = lookup("CLINIC_DB_URL") {
            self.database.url = url;
        }
        if let Some(ns) = lookup("CLINIC_DB_NAMESPACE") {
            self.database.namespace = ns;
        }
        if let Some(db) = lookup("CLINIC_DB_DATABASE") {
            self.database.database = db;
        }
        if let Some(user) = lookup("CLINIC_DB_USERNAME") {
            self.database.username = user;
        }
        if let Some(pass) = lookup("CLINIC_DB_PASSWORD") {
            self.database.password = pass;
        }

        if let Some(path) = lookup("CLINIC_JWT_PRIVATE_KEY") {
            self.auth.jwt_private_key_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CLINIC_JWT_PUBLIC_KEY") {
            self.auth.jwt_public_key_path = Some(PathBuf::from(path));
        }
        if let Some(pepper) = lookup("CLINIC_PEPPER") {
            self.auth.pepper = Some(pepper);
        }
        Ok(())
    }

    /// Build the auth service configuration, reading both JWT keys.
    pub fn auth_config(&self) -> anyhow::Result<AuthConfig> {
        let private_path = self
            .auth
            .jwt_private_key_path
            .as_ref()
            .context("auth.jwt_private_key_path is not set")?;
        let public_path = self
            .auth
            .jwt_public_key_path
            .as_ref()
            .context("auth.jwt_public_key_path is not set")?;

        Ok(AuthConfig {
            jwt_private_key_pem: std::fs::read_to_string(private_path)
                .with_context(|| format!("reading {}", private_path.display()))?,
            jwt_public_key_pem: std::fs::read_to_string(public_path)
                .with_context(|| format!("reading {}", public_path.display()))?,
            access_token_lifetime_secs: self.auth.access_token_lifetime_secs,
            session_lifetime_secs: self.auth.session_lifetime_secs,
            jwt_issuer: self.auth.jwt_issuer.clone(),
            pepper: self.auth.pepper.clone(),
            min_password_length: self.auth.min_password_length,
            rate_limit: self.auth.rate_limit.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database.namespace, "clinic");
        assert_eq!(config.auth.access_token_lifetime_secs, 900);
        assert_eq!(config.auth.rate_limit.login.max_attempts, 5);
        assert!(config.auth.jwt_private_key_path.is_none());
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            bind_addr = "127.0.0.1:9000"

            [database]
            url = "db.internal:8000"

            [auth]
            jwt_issuer = "clinic-staging"

            [auth.rate_limit.login]
            window_secs = 600
            max_attempts = 3
            block_secs = 1200
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.database.url, "db.internal:8000");
        assert_eq!(config.database.username, "root");
        assert_eq!(config.auth.jwt_issuer, "clinic-staging");
        assert_eq!(config.auth.rate_limit.login.max_attempts, 3);
        assert_eq!(config.auth.rate_limit.password_reset.max_attempts, 3);
        assert_eq!(config.auth.rate_limit.registration.max_attempts, 5);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = ServerConfig::from_toml("bind_addr = \"127.0.0.1:9000\"").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("CLINIC_BIND_ADDR", "0.0.0.0:7000"),
            ("CLINIC_DB_PASSWORD", "s3cret"),
            ("CLINIC_JWT_PRIVATE_KEY", "/etc/clinic/jwt.key"),
            ("CLINIC_PEPPER", "pepper"),
        ]);
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.database.password, "s3cret");
        assert_eq!(
            config.auth.jwt_private_key_path.as_deref(),
            Some(std::path::Path::new("/etc/clinic/jwt.key"))
        );
        assert_eq!(config.auth.pepper.as_deref(), Some("pepper"));
    }

    #[test]
    fn malformed_bind_addr_is_an_error() {
        let mut config = ServerConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "CLINIC_BIND_ADDR").then(|| "not-an-address".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn missing_key_paths_are_reported() {
        let err = ServerConfig::default().auth_config().unwrap_err();
        assert!(err.to_string().contains("jwt_private_key_path"));
    }
}
