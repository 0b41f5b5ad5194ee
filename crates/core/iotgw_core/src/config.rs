use serde::{Deserialize, Serialize};

/// A named, typed connector endpoint as it appears in the gateway document.
///
/// `params` stays an opaque JSON value deliberately: see [`crate::connector`]
/// for why `iotgw_core` never parses driver-specific parameters itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// How a bridge behaves when its single pending-message slot is already full
/// and another message arrives before the rate limiter lets it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Discard the newly arrived message, keep the one already buffered.
    DropNew,
    /// Discard the buffered message, keep the newly arrived one.
    DropOldest,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        BufferPolicy::DropOldest
    }
}

/// A token-bucket rate limit: at most `max_per_second` messages pass through
/// a bridge in any one-second window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_per_second: u32,
}

/// A single `source -> destination` wiring rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub name: String,
    pub source: String,
    pub destination: String,
    /// Names a registered transform explicitly. Left unset, `prepare`
    /// chooses the registered default for the connectors' `(source,
    /// destination)` kind pair (see [`crate::transform::default_transform_for`]),
    /// falling back to `identity` when no more specific default exists.
    #[serde(default)]
    pub transform: Option<String>,
    /// Prefixed onto the MQTT topic the default transforms derive; see
    /// `spi_to_mqtt`/`http_to_mqtt` in [`crate::transform`].
    #[serde(default)]
    pub topic_prefix: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
    #[serde(default)]
    pub buffer_policy: BufferPolicy,
}

/// Gateway-wide settings: logging, the watchdog heartbeat, and the
/// directory of config fragments layered on top of the main document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub logfile: Option<String>,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default)]
    pub confdir: Option<String>,
    #[serde(default)]
    pub watchdog_interval_ms: Option<u64>,
}

fn default_loglevel() -> String {
    "info".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            name: None,
            timezone: None,
            loglevel: default_loglevel(),
            logfile: None,
            metrics_port: None,
            confdir: None,
            watchdog_interval_ms: None,
        }
    }
}

/// The whole gateway document: one `gateway` section, a list of connectors,
/// and the bridges that wire them together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub version: Option<u32>,
    /// Paths resolved relative to the main document, merged in during
    /// loading. Consumed entirely by `iotgw_config::load_all`; a `Config`
    /// produced by it always has this empty.
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,
}

impl Config {
    pub fn connector(&self, name: &str) -> Option<&ConnectorConfig> {
        self.connectors.iter().find(|c| c.name == name)
    }
}
