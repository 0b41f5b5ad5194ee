use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while loading and merging the gateway configuration
/// document. Every variant aborts startup; on reload the previous `Config`
/// is kept and the daemon keeps running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("include {0} could not be resolved relative to the main file")]
    UnresolvedInclude(PathBuf),

    #[error("bridge {bridge:?} references unknown connector {connector:?}")]
    UnknownConnector { bridge: String, connector: String },

    #[error("duplicate connector name {0:?}")]
    DuplicateConnector(String),

    #[error("duplicate bridge name {0:?}")]
    DuplicateBridge(String),

    #[error("bridge {bridge:?} names unknown transform {transform:?}")]
    UnknownTransform { bridge: String, transform: String },
}
