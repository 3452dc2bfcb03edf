use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

/// Command line: `lantern <PORT> <WEB_ROOT> <LOOKUP_HOST> <LOOKUP_PORT>`.
#[derive(Debug, Clone, Parser)]
#[command(name = "lantern", version, about = "Static file server with an mdb-lookup gateway")]
pub struct Cli {
    /// Port to listen on
    pub port: u16,
    /// Directory served as the web root
    pub web_root: PathBuf,
    /// Host running the lookup service
    pub lookup_host: String,
    /// Port of the lookup service
    pub lookup_port: u16,
    /// Optional YAML file with timeouts and limits
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Deadline for each read or write on a client socket
    pub client_secs: u64,
    /// Deadline for each read or write on the lookup connection
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_secs: 30,
            upstream_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitConfig {
    /// Longest request or header line accepted, in bytes
    pub max_request_line: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_request_line: 8192,
        }
    }
}

/// Contents of the optional YAML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    pub timeouts: TimeoutConfig,
    pub limits: LimitConfig,
}

impl Tunables {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("invalid config file")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&text)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub web_root: PathBuf,
    pub lookup_addr: String,
    pub timeouts: TimeoutConfig,
    pub limits: LimitConfig,
}

impl Config {
    /// Builds the config from parsed arguments, reading the YAML file
    /// when one was given.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let tunables = match &cli.config {
            Some(path) => Tunables::load(path)?,
            None => Tunables::default(),
        };
        Ok(Self::from_parts(cli, tunables))
    }

    pub fn from_parts(cli: &Cli, tunables: Tunables) -> Self {
        let lookup_addr = if cli.lookup_host.contains(':') {
            format!("[{}]:{}", cli.lookup_host, cli.lookup_port)
        } else {
            format!("{}:{}", cli.lookup_host, cli.lookup_port)
        };

        Self {
            listen_addr: format!("0.0.0.0:{}", cli.port),
            web_root: cli.web_root.clone(),
            lookup_addr,
            timeouts: tunables.timeouts,
            limits: tunables.limits,
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.client_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.upstream_secs)
    }
}
