//! Configuration types.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Role name the backend assigns to administrators.
pub const DEFAULT_ADMIN_ROLE: &str = "ADMINISTRADOR";

/// Screen paths the flows redirect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenPaths {
    /// Login screen; every failed login flow lands here.
    pub login: String,
    /// Terms-of-use acceptance screen.
    pub terms: String,
    /// Profile completion form.
    pub profile: String,
    /// Shown when the permission gate denies a route.
    pub access_denied: String,
    /// Used when the user has no permitted screen at all.
    pub fallback: String,
}

impl Default for ScreenPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            terms: "/auth/terminos".to_string(),
            profile: "/auth/completar-perfil".to_string(),
            access_denied: "/acceso-denegado".to_string(),
            fallback: "/inicio".to_string(),
        }
    }
}

/// Gate configuration shared by the session, router, permission gate and
/// the HTTP server.
///
/// The service holds one session, so it is a single-user companion of the
/// local client: it listens on loopback and only answers the client's origins.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Base URL of the reservation backend.
    pub api_url: String,
    /// Role that bypasses screen permission checks.
    pub admin_role: String,
    /// Allow navigation when the screen catalog cannot be loaded.
    pub fail_open_on_missing_metadata: bool,
    /// Upper bound for each remote call in the login flow.
    pub remote_timeout: Duration,
    pub paths: ScreenPaths,
    /// Address the HTTP server binds to.
    pub bind_addr: IpAddr,
    pub port: u16,
    /// libSQL file holding the token and validation flags.
    pub db_path: PathBuf,
    /// Browser origins allowed to call the gate.
    pub allowed_origins: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
            fail_open_on_missing_metadata: true,
            remote_timeout: Duration::from_secs(10),
            paths: ScreenPaths::default(),
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            db_path: PathBuf::from("./data/reservas-gate.db"),
            allowed_origins: vec!["http://localhost:8100".to_string()],
        }
    }
}

impl GateConfig {
    /// Build config from `RESERVAS_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = lookup("RESERVAS_API_URL").unwrap_or(defaults.api_url);
        let admin_role = lookup("RESERVAS_ADMIN_ROLE").unwrap_or(defaults.admin_role);

        let fail_open_on_missing_metadata = match lookup("RESERVAS_FAIL_OPEN") {
            Some(raw) => parse_bool("RESERVAS_FAIL_OPEN", &raw)?,
            None => defaults.fail_open_on_missing_metadata,
        };

        let remote_timeout = match lookup("RESERVAS_REMOTE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse("RESERVAS_REMOTE_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(invalid("RESERVAS_REMOTE_TIMEOUT_SECS", "must be greater than zero"));
                }
                Duration::from_secs(secs)
            }
            None => defaults.remote_timeout,
        };

        let bind_addr = match lookup("RESERVAS_BIND_ADDR") {
            Some(raw) => parse("RESERVAS_BIND_ADDR", &raw)?,
            None => defaults.bind_addr,
        };

        let port = match lookup("RESERVAS_PORT") {
            Some(raw) => parse("RESERVAS_PORT", &raw)?,
            None => defaults.port,
        };

        let db_path = lookup("RESERVAS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let allowed_origins = match lookup("RESERVAS_ALLOWED_ORIGINS") {
            Some(raw) => {
                let origins: Vec<String> = raw
                    .split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect();
                if origins.is_empty() {
                    return Err(invalid("RESERVAS_ALLOWED_ORIGINS", "no origin given"));
                }
                origins
            }
            None => defaults.allowed_origins,
        };

        Ok(Self {
            api_url,
            admin_role,
            fail_open_on_missing_metadata,
            remote_timeout,
            paths: defaults.paths,
            bind_addr,
            port,
            db_path,
            allowed_origins,
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| invalid(key, format!("{e} (got {raw:?})")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(key, format!("expected a boolean, got {other:?}"))),
    }
}
