//! Runtime configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const ENV_DB_PATH: &str = "PATIENT_RECORDS_DB_PATH";
pub const ENV_LISTEN_ADDR: &str = "PATIENT_RECORDS_LISTEN_ADDR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "PATIENT_RECORDS_BUSY_TIMEOUT_MS";

const DEFAULT_DB_PATH: &str = "patient_records.db";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const IN_MEMORY: &str = ":memory:";

/// Where the record store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    InMemory,
    File(PathBuf),
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageLocation::InMemory => f.write_str(IN_MEMORY),
            StorageLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub storage: StorageLocation,
    pub listen_addr: SocketAddr,
    pub busy_timeout: Duration,
}

impl ServerConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to
    /// defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup(ENV_DB_PATH) {
            Some(raw) if raw.trim() == IN_MEMORY => StorageLocation::InMemory,
            Some(raw) if !raw.trim().is_empty() => StorageLocation::File(PathBuf::from(raw.trim())),
            _ => StorageLocation::File(PathBuf::from(DEFAULT_DB_PATH)),
        };
        let listen_addr = parse_socket_addr(lookup(ENV_LISTEN_ADDR), DEFAULT_LISTEN_ADDR)?;
        let busy_timeout_ms = parse_u64(lookup(ENV_BUSY_TIMEOUT_MS), DEFAULT_BUSY_TIMEOUT_MS)?;

        Ok(Self {
            storage,
            listen_addr,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        })
    }
}

/// Parses an optional `u64` with fallback default.
fn parse_u64(value: Option<String>, default_value: u64) -> Result<u64> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid u64 value: {raw}")),
        None => Ok(default_value),
    }
}

/// Parses an optional socket address with fallback default.
fn parse_socket_addr(value: Option<String>, default_addr: &str) -> Result<SocketAddr> {
    let raw = value.unwrap_or_else(|| default_addr.to_string());
    raw.trim()
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid socket address: {raw}"))
}
