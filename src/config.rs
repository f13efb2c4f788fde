//! Server configuration: built-in defaults, optional JSON/YAML file, CLI/env overrides.
//!
//! Precedence (highest first): CLI flag / environment variable, config file, default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::proxy::tools::{ToolFamily, builtin_families};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 53422;

/// On-disk configuration. Every field is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    /// Extra tool families, tried after the built-in ones.
    pub tools: Vec<ToolFamilyConfig>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolFamilyConfig {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Values supplied on the command line (already merged with env fallbacks by clap).
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for `serve`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
    pub families: Vec<ToolFamily>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        host_port(&self.host, self.port)
    }
}

/// `host:port`, bracketing IPv6 literals.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Load a config file; `.yaml` / `.yml` are parsed as YAML, anything else as JSON.
pub fn load_file(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let lower = path.to_string_lossy().to_ascii_lowercase();

    if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        serde_yaml::from_str(&raw).context("failed to parse YAML config file")
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON config file")
    }
}

/// Merge overrides over the file over defaults and compile the tool families.
pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<ServerConfig> {
    let mut families = builtin_families().context("failed to compile built-in tool patterns")?;
    for t in file.tools {
        let family = ToolFamily::new(&t.name, &t.pattern, t.args)
            .with_context(|| format!("invalid pattern for tool family '{}'", t.name))?;
        families.push(family);
    }

    let host = overrides
        .host
        .or(file.host)
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    Ok(ServerConfig {
        host,
        port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
        timeout: overrides
            .timeout_secs
            .or(file.timeout_secs)
            .filter(|s| *s > 0)
            .map(Duration::from_secs),
        families,
    })
}
