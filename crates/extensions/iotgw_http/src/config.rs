use serde::{Deserialize, Serialize};

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// The typed shape of an HTTP server connector's opaque `params` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `host:port`, or a bare port (binds `0.0.0.0`). Defaults to `0.0.0.0:8080`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed request paths. Empty means every path is allowed.
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: default_bind(),
            routes: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Config {
    /// Resolves `bind` (`host:port` or a bare port) to a socket address string
    /// suitable for `TcpListener::bind`.
    pub fn socket_addr(&self) -> Result<String, String> {
        if self.bind.contains(':') {
            return Ok(self.bind.clone());
        }
        self.bind
            .parse::<u16>()
            .map(|port| format!("0.0.0.0:{port}"))
            .map_err(|_| format!("invalid bind address {:?}", self.bind))
    }

    pub fn route_allowed(&self, path: &str) -> bool {
        self.routes.is_empty() || self.routes.iter().any(|route| route == path)
    }
}
