use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::Level;

pub const DEFAULT_PORT: u16 = 6789;

/// Command line: a single optional port.
#[derive(Debug, Parser)]
#[command(name = "webserver", about = "Serves files from the current directory over HTTP/1.0")]
pub struct Cli {
    /// TCP port to listen on
    #[arg(value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

/// Limits applied to every connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Time allowed for the request line and headers to arrive
    pub header_timeout: Duration,
    /// Longest accepted request or header line, terminator included
    pub max_line_len: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            header_timeout: Duration::from_secs(30),
            max_line_len: 8192,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory request targets are resolved against
    pub root: PathBuf,
    /// Ceiling on connections handled at once
    pub max_connections: usize,
    /// Upper bound on the lifetime of a single connection
    pub request_timeout: Duration,
    pub limits: ConnectionLimits,
    pub log_level: Level,
}

impl Config {
    /// Builds the configuration from `port` and the process environment.
    pub fn load(port: u16) -> anyhow::Result<Self> {
        Self::from_lookup(port, |key| std::env::var(key).ok())
    }

    /// Builds the configuration, reading settings through `lookup`.
    ///
    /// Unset keys take their defaults; set but unparseable keys are an error.
    pub fn from_lookup<F>(port: u16, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ConnectionLimits::default();

        let host = lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let root = lookup("WEB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let max_connections = parse_var(&lookup, "WEB_MAX_CONNECTIONS", 1024usize)?;
        let header_timeout = parse_var(
            &lookup,
            "WEB_HEADER_TIMEOUT_SECS",
            defaults.header_timeout.as_secs(),
        )?;
        let request_timeout = parse_var(&lookup, "WEB_REQUEST_TIMEOUT_SECS", 300u64)?;
        let max_line_len = parse_var(&lookup, "WEB_MAX_LINE_BYTES", defaults.max_line_len)?;
        let log_level = parse_var(&lookup, "WEB_LOG_LEVEL", Level::INFO)?;

        if max_connections == 0 {
            bail!("WEB_MAX_CONNECTIONS must be at least 1");
        }
        if max_line_len < 16 {
            bail!("WEB_MAX_LINE_BYTES must be at least 16");
        }

        Ok(Self {
            host,
            port,
            root,
            max_connections,
            request_timeout: Duration::from_secs(request_timeout),
            limits: ConnectionLimits {
                header_timeout: Duration::from_secs(header_timeout),
                max_line_len,
            },
            log_level,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value {:?} for {}", raw, key)),
    }
}
