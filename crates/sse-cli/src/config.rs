//! Configuration file handling for sse-cli

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default event stream URL
    pub url: Option<String>,
    /// Headers sent with every connection
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Backoff after a failed connection, in milliseconds
    pub reconnect_delay_ms: Option<u64>,
    /// Use the server's `retry:` hint as backoff
    pub honor_retry: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("sse-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: ArgOverrides<'_>) -> Result<MergedConfig> {
        let url = args
            .url
            .map(String::from)
            .or_else(|| self.url.clone())
            .context("No URL given on the command line or in the config file")?;

        // Command-line headers win over config headers with the same name
        let mut headers = self.headers.clone();
        headers.extend(args.headers.iter().cloned());

        Ok(MergedConfig {
            url,
            headers,
            output: args
                .output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "text".to_string()),
            no_color: args.no_color || self.no_color.unwrap_or(false),
            reconnect_delay_ms: args.reconnect_delay_ms.or(self.reconnect_delay_ms),
            honor_retry: args.honor_retry || self.honor_retry.unwrap_or(false),
        })
    }
}

/// Values given on the command line
#[derive(Debug, Default)]
pub struct ArgOverrides<'a> {
    pub url: Option<&'a str>,
    pub headers: &'a [(String, String)],
    pub output: Option<&'a str>,
    pub no_color: bool,
    pub reconnect_delay_ms: Option<u64>,
    pub honor_retry: bool,
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub output: String,
    pub no_color: bool,
    pub reconnect_delay_ms: Option<u64>,
    pub honor_retry: bool,
}
