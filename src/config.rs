//! Server settings read from the environment.

use std::fmt::Display;
use std::net::SocketAddr;
use thiserror::Error;

/// Variable holding the socket address to bind
pub const ADDR_VAR: &str = "RUSTY_FACETS_ADDR";
/// Variable holding the maximum upload size in bytes
pub const UPLOAD_LIMIT_VAR: &str = "RUSTY_FACETS_UPLOAD_LIMIT";

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_UPLOAD_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} is not valid unicode")]
    NotUnicode(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    /// Largest accepted request body, in bytes
    pub upload_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }
}

impl Config {
    /// Reads the process environment, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Builds a config from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, std::env::VarError>,
    {
        let addr = read(&lookup, ADDR_VAR)?.unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = parse(ADDR_VAR, &addr)?;
        let upload_limit = match read(&lookup, UPLOAD_LIMIT_VAR)? {
            Some(value) => parse(UPLOAD_LIMIT_VAR, &value)?,
            None => DEFAULT_UPLOAD_LIMIT,
        };
        Ok(Self { addr, upload_limit })
    }
}

fn read<F>(lookup: &F, name: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&'static str) -> Result<String, std::env::VarError>,
{
    match lookup(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(name)),
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    value.trim().parse::<T>().map_err(|error| ConfigError::InvalidValue {
        name,
        value: value.to_owned(),
        reason: error.to_string(),
    })
}
