//! Event source configuration with YAML support

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options for an [`EventSource`](crate::EventSource)
///
/// Can be loaded from YAML or JSON, or constructed programmatically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSourceOptions {
    /// Extra request headers, sent after the fixed SSE headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Forwarded to the transport
    #[serde(default)]
    pub with_credentials: bool,

    /// Forwarded to the transport; the core does not interpret it
    #[serde(default)]
    pub raw: bool,

    /// Initial `Last-Event-ID` for the first attempt
    #[serde(default)]
    pub last_event_id: Option<String>,

    /// Reconnection settings
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Reconnection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay after a failed attempt in milliseconds (default: 3s)
    #[serde(default = "default_reconnect_delay")]
    pub delay_ms: u64,

    /// Granularity of the backoff wait in milliseconds (default: 100ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Use the server's `retry:` hint as the backoff delay once received
    #[serde(default)]
    pub honor_server_retry: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay(),
            poll_interval_ms: default_poll_interval(),
            honor_server_retry: false,
        }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Maximum redirects followed per attempt (default: 5)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Interval of the cancellation checkpoint in milliseconds (default: 100ms)
    #[serde(default = "default_poll_interval")]
    pub progress_interval_ms: u64,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_redirects: default_max_redirects(),
            connect_timeout_ms: default_connect_timeout(),
            progress_interval_ms: default_poll_interval(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_reconnect_delay() -> u64 {
    3_000 // 3 seconds
}

fn default_poll_interval() -> u64 {
    100 // 100ms
}

fn default_max_redirects() -> usize {
    5
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_user_agent() -> String {
    concat!("sse-client/", env!("CARGO_PKG_VERSION")).to_string()
}

impl EventSourceOptions {
    /// Load options from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse options from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse options from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize options to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> EventSourceOptionsBuilder {
        EventSourceOptionsBuilder::new()
    }
}

/// Builder for EventSourceOptions
#[derive(Debug, Default)]
pub struct EventSourceOptionsBuilder {
    options: EventSourceOptions,
}

impl EventSourceOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.options.with_credentials = enabled;
        self
    }

    pub fn raw(mut self, enabled: bool) -> Self {
        self.options.raw = enabled;
        self
    }

    /// Seed the `Last-Event-ID` sent on the first attempt
    pub fn last_event_id(mut self, id: impl Into<String>) -> Self {
        self.options.last_event_id = Some(id.into());
        self
    }

    /// Set the backoff delay after a failed attempt
    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.options.reconnect.delay_ms = ms;
        self
    }

    /// Set the backoff polling granularity
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.options.reconnect.poll_interval_ms = ms;
        self
    }

    /// Let the server's `retry:` field drive the backoff delay
    pub fn honor_server_retry(mut self, enabled: bool) -> Self {
        self.options.reconnect.honor_server_retry = enabled;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.options.transport.max_redirects = max;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.options.transport.connect_timeout_ms = ms;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.options.transport.user_agent = agent.into();
        self
    }

    /// Build the options
    pub fn build(self) -> EventSourceOptions {
        self.options
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
