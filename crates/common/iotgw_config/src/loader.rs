use std::collections::HashSet;
use std::path::{Path, PathBuf};

use iotgw_core::{Config, TransformRegistry};
use tracing::{debug, warn};

use crate::error::ConfigError;

fn read_fragment(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Appends `fragment`'s connectors and bridges onto `base`.
///
/// Gateway settings (loglevel, metrics port, ...) are taken from the main
/// document only: fragments under `confdir` or named in `includes` are
/// meant to add connectors and bridges, not to silently reshape daemon-wide
/// settings a reader would expect to find in the one main file.
fn merge_fragment(base: &mut Config, fragment: Config) {
    base.connectors.extend(fragment.connectors);
    base.bridges.extend(fragment.bridges);
}

/// Named-transform validation uses the built-in registry only: no driver
/// crate in this workspace registers an additional transform beyond
/// `identity`/`spi_to_mqtt`/`http_to_mqtt`/`uart_to_mqtt`/`modbus_to_mqtt`,
/// so `TransformRegistry::default()` is the full set a bridge rule's
/// `transform` field can legally name.
fn validate(config: &Config) -> Result<(), ConfigError> {
    let transforms = TransformRegistry::default();

    let mut seen_connectors = HashSet::new();
    for connector in &config.connectors {
        if !seen_connectors.insert(connector.name.as_str()) {
            return Err(ConfigError::DuplicateConnector(connector.name.clone()));
        }
    }

    let mut seen_bridges = HashSet::new();
    for bridge in &config.bridges {
        if !seen_bridges.insert(bridge.name.as_str()) {
            return Err(ConfigError::DuplicateBridge(bridge.name.clone()));
        }
        if !seen_connectors.contains(bridge.source.as_str()) {
            return Err(ConfigError::UnknownConnector {
                bridge: bridge.name.clone(),
                connector: bridge.source.clone(),
            });
        }
        if !seen_connectors.contains(bridge.destination.as_str()) {
            return Err(ConfigError::UnknownConnector {
                bridge: bridge.name.clone(),
                connector: bridge.destination.clone(),
            });
        }
        if let Some(transform) = &bridge.transform {
            if !transforms.contains(transform) {
                return Err(ConfigError::UnknownTransform {
                    bridge: bridge.name.clone(),
                    transform: transform.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Loads the main configuration file, layers in every path listed under its
/// `includes` (resolved relative to the main file's directory), then layers
/// in every `*.yaml` fragment found directly under `confdir`, sorted by file
/// name for a deterministic merge order.
///
/// The result is fully validated — every bridge must name connectors that
/// exist in the merged document — before being returned, so a caller doing
/// a reload can tell a good new config from a bad one without touching any
/// running bridge.
pub fn load_all(config_path: &Path, confdir: &Path) -> Result<Config, ConfigError> {
    let mut config = read_fragment(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let includes = std::mem::take(&mut config.includes);
    for include in &includes {
        let resolved = base_dir.join(include);
        if !resolved.exists() {
            return Err(ConfigError::UnresolvedInclude(resolved));
        }
        debug!(path = %resolved.display(), "loading include");
        let fragment = read_fragment(&resolved)?;
        merge_fragment(&mut config, fragment);
    }

    match std::fs::read_dir(confdir) {
        Ok(entries) => {
            let mut fragment_paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
                .collect();
            fragment_paths.sort();

            for path in fragment_paths {
                debug!(path = %path.display(), "loading confdir fragment");
                let fragment = read_fragment(&path)?;
                merge_fragment(&mut config, fragment);
            }
        }
        Err(err) => {
            warn!(confdir = %confdir.display(), error = %err, "confdir not readable, skipping");
        }
    }

    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn merges_confdir_fragments_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let confdir = tempfile::tempdir().unwrap();

        let main = write(
            dir.path(),
            "iotgw.yaml",
            "gateway:\n  loglevel: debug\nconnectors:\n  - name: m0\n    type: mqtt\n",
        );
        write(
            confdir.path(),
            "10-bridges.yaml",
            "bridges:\n  - name: b1\n    source: m0\n    destination: m0\n",
        );
        write(
            confdir.path(),
            "00-extra-connector.yaml",
            "connectors:\n  - name: u0\n    type: uart\n",
        );

        let config = load_all(&main, confdir.path()).unwrap();
        assert_eq!(config.gateway.loglevel, "debug");
        assert_eq!(config.connectors.len(), 2);
        assert_eq!(config.bridges.len(), 1);
    }

    #[test]
    fn rejects_bridge_with_unknown_connector() {
        let dir = tempfile::tempdir().unwrap();
        let confdir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "iotgw.yaml",
            "connectors:\n  - name: m0\n    type: mqtt\nbridges:\n  - name: b1\n    source: m0\n    destination: does-not-exist\n",
        );

        let err = load_all(&main, confdir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConnector { .. }));
    }

    #[test]
    fn rejects_bridge_with_unknown_transform() {
        let dir = tempfile::tempdir().unwrap();
        let confdir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "iotgw.yaml",
            "connectors:\n  - name: m0\n    type: mqtt\nbridges:\n  - name: b1\n    source: m0\n    destination: m0\n    transform: does-not-exist\n",
        );

        let err = load_all(&main, confdir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTransform { .. }));
    }

    #[test]
    fn missing_confdir_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "iotgw.yaml", "connectors: []\nbridges: []\n");
        let config = load_all(&main, Path::new("/does/not/exist")).unwrap();
        assert!(config.connectors.is_empty());
    }
}
