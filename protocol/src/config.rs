//! # Node Configuration
//!
//! The on-disk configuration surface for a node: `config.yaml` next to the
//! binary (or in the current working directory), holding the block-tick
//! interval, the genesis ("god") seed, a reserved per-node key slot, and
//! the embedded store's data directory.
//!
//! Unlike the constants modules elsewhere in this ecosystem, almost
//! everything here is a genuine runtime value read from disk rather than a
//! compile-time constant — there is exactly one thing actually fixed at
//! compile time: the default bootstrap listen address, which doubles as
//! the sentinel that decides whether this process is the bootstrap
//! validator or a dialing peer (see [`DEFAULT_LISTEN_ADDR`]).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// The listen address that makes a node the bootstrap validator. Any other
/// `--port` value makes it a peer that dials this address.
pub const DEFAULT_LISTEN_ADDR: &str = ":3000";

/// Default config file name, searched for next to the binary and in the
/// current working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default validator key file name, read relative to the data directory.
pub const DEFAULT_KEY_FILE: &str = "private_key.txt";

/// Errors loading or validating `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config is missing mandatory field `{0}`")]
    MissingField(&'static str),

    #[error("config field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// `network:` section — currently just the block-production cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Seconds between block-production ticks.
    pub tick: u64,
}

/// `keys:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    /// 64-hex-char seed for the genesis ("god") key.
    pub god_seed: String,
    /// Reserved for future per-node keying; unused by this node today.
    #[serde(default)]
    pub node_priv_key: Option<String>,
}

/// `badger:` section. Named after the original embedded store this config
/// shape was inherited from; the node itself opens this path with `sled`
/// (see [`crate::storage::BlockStore`]).
#[derive(Debug, Clone, Deserialize)]
pub struct BadgerConfig {
    pub data_dir: PathBuf,
}

/// The full parsed contents of `config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub keys: KeysConfig,
    pub badger: BadgerConfig,
}

impl NodeConfig {
    /// Loads and validates config from an explicit path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: NodeConfig =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Searches `config.yaml` in the current working directory first, then
    /// falls back to the directory containing `fallback_dir` (mirroring the
    /// original's "next to the binary, or CWD" search order).
    pub fn load_default(fallback_dir: &Path) -> Result<Self, ConfigError> {
        let cwd_candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
        if cwd_candidate.exists() {
            return Self::load(cwd_candidate);
        }
        Self::load(fallback_dir.join(DEFAULT_CONFIG_FILE))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network.tick == 0 {
            return Err(ConfigError::InvalidField {
                field: "network.tick",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.keys.god_seed.is_empty() {
            return Err(ConfigError::MissingField("keys.god_seed"));
        }
        let seed_bytes = hex::decode(&self.keys.god_seed).map_err(|_| ConfigError::InvalidField {
            field: "keys.god_seed",
            reason: "not valid hex".to_string(),
        })?;
        if seed_bytes.len() != 32 {
            return Err(ConfigError::InvalidField {
                field: "keys.god_seed",
                reason: format!("expected 32 bytes (64 hex chars), got {}", seed_bytes.len()),
            });
        }
        Ok(())
    }

    /// Decodes [`KeysConfig::god_seed`] into the 32-byte array
    /// [`crate::crypto::Keypair::from_seed`] expects. Infallible after
    /// [`Self::validate`] has already run at load time.
    pub fn god_seed_bytes(&self) -> [u8; 32] {
        let decoded = hex::decode(&self.keys.god_seed).expect("validated at load time");
        let mut out = [0u8; 32];
        out.copy_from_slice(&decoded);
        out
    }
}

/// Whether a `--port` value makes this process the bootstrap validator.
pub fn is_bootstrap_addr(port: &str) -> bool {
    port == DEFAULT_LISTEN_ADDR
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
network:
  tick: 5
keys:
  god_seed: "4a9fb8494f467fd001fad589342a3d63c4ddc148a119b76b0d14f4655fbb09f7"
  node_priv_key: ""
badger:
  data_dir: "/tmp/meridian-data"
"#;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), VALID_YAML);
        let cfg = NodeConfig::load(&path).unwrap();
        assert_eq!(cfg.network.tick, 5);
        assert_eq!(cfg.badger.data_dir, PathBuf::from("/tmp/meridian-data"));
    }

    #[test]
    fn god_seed_bytes_decodes_to_32_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), VALID_YAML);
        let cfg = NodeConfig::load(&path).unwrap();
        assert_eq!(cfg.god_seed_bytes().len(), 32);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = VALID_YAML.replace("tick: 5", "tick: 0");
        let path = write_config(dir.path(), &bad);
        let err = NodeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "network.tick", .. }));
    }

    #[test]
    fn short_god_seed_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = VALID_YAML.replace(
            "4a9fb8494f467fd001fad589342a3d63c4ddc148a119b76b0d14f4655fbb09f7",
            "abcd",
        );
        let path = write_config(dir.path(), &bad);
        let err = NodeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "keys.god_seed", .. }));
    }

    #[test]
    fn missing_mandatory_section_fails_to_parse() {
        let dir = tempfile::tempdir().unwrap();
        let bad = "network:\n  tick: 5\n";
        let path = write_config(dir.path(), bad);
        let err = NodeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn bootstrap_addr_detection() {
        assert!(is_bootstrap_addr(":3000"));
        assert!(!is_bootstrap_addr(":4000"));
    }
}
