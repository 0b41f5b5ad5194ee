use serde::{Deserialize, Serialize};

fn default_keepalive() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    10
}

fn default_qos() -> u8 {
    0
}

/// One topic this connector subscribes to on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub topic: String,
    #[serde(default)]
    pub qos: Option<u8>,
}

/// TLS material for a secure broker connection. `ca_file` alone gives
/// server authentication; `cert_file`/`key_file` add client authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub ca_file: Option<String>,
    #[serde(default)]
    pub cert_file: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// The typed shape of an MQTT connector's opaque `params` document.
///
/// Either `url` (`mqtt://host:port` or `mqtts://host:port`) or `host`/`port`
/// may be given; `url` wins if both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_qos")]
    pub default_qos: u8,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl Config {
    /// Resolves the broker host/port/scheme from `url` (if set) or the
    /// explicit `host`/`port` fields, applying the 1883/8883 default ports.
    pub fn endpoint(&self) -> Result<Endpoint, String> {
        if let Some(url) = &self.url {
            let (scheme, rest) = url
                .split_once("://")
                .ok_or_else(|| format!("malformed MQTT url {url:?}"))?;
            let tls = match scheme {
                "mqtt" => false,
                "mqtts" => true,
                other => return Err(format!("unsupported MQTT scheme {other:?}")),
            };
            let default_port = if tls { 8883 } else { 1883 };
            let (host, port) = match rest.split_once(':') {
                Some((host, port)) => (
                    host.to_string(),
                    port.parse::<u16>()
                        .map_err(|_| format!("invalid port in {url:?}"))?,
                ),
                None => (rest.to_string(), default_port),
            };
            return Ok(Endpoint { host, port, tls });
        }

        let host = self.host.clone().unwrap_or_else(|| "localhost".to_string());
        let port = self.port.unwrap_or(1883);
        Ok(Endpoint {
            host,
            port,
            tls: self.tls.is_some() || port == 8883,
        })
    }
}
