//! Receiver configuration
//!
//! Settings come from, lowest precedence first: built-in defaults, an
//! optional YAML file, the `VLC_VCAM_SOCKET` environment variable, and
//! finally command-line flags applied by the binary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::network::DEFAULT_READ_CHUNK;

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "VLC_VCAM_SOCKET";

/// Largest accepted `read_chunk_size` (16 MiB).
pub const MAX_READ_CHUNK: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverConfig {
    /// Path of the listening UNIX stream socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Cap on a single payload read, in bytes.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Unlink a leftover socket file before binding.
    #[serde(default = "default_remove_stale_socket")]
    pub remove_stale_socket: bool,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/vlc_vcam.sock")
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK
}

fn default_remove_stale_socket() -> bool {
    true
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            read_chunk_size: default_read_chunk_size(),
            remove_stale_socket: default_remove_stale_socket(),
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&contents)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Parse configuration from a YAML string
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: ReceiverConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VLC_VCAM_SOCKET` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var_os(key));
    }

    /// Apply environment overrides using `lookup` instead of the real environment.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        if let Some(path) = lookup(SOCKET_ENV).filter(|p| !p.is_empty()) {
            self.socket_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.socket_path.as_os_str().is_empty(),
            "socket_path cannot be empty"
        );
        anyhow::ensure!(
            (1..=MAX_READ_CHUNK).contains(&self.read_chunk_size),
            "read_chunk_size out of range: {} (must be 1..={})",
            self.read_chunk_size,
            MAX_READ_CHUNK
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/vlc_vcam.sock"));
        assert_eq!(config.read_chunk_size, 1024 * 1024);
        assert!(config.remove_stale_socket);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = ReceiverConfig::from_str("{}").unwrap();
        assert_eq!(config, ReceiverConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = ReceiverConfig::from_str(
            r#"
socket_path: "/run/vcam/in.sock"
read_chunk_size: 65536
remove_stale_socket: false
"#,
        )
        .unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/vcam/in.sock"));
        assert_eq!(config.read_chunk_size, 65536);
        assert!(!config.remove_stale_socket);
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let result = ReceiverConfig::from_str("read_chunk_size: 0");
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("read_chunk_size"));
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let yaml = format!("read_chunk_size: {}", MAX_READ_CHUNK + 1);
        assert!(ReceiverConfig::from_str(&yaml).is_err());
    }

    #[test]
    fn test_empty_socket_path_rejected() {
        let err_msg = format!("{}", ReceiverConfig::from_str("socket_path: \"\"").unwrap_err());
        assert!(err_msg.contains("socket_path"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(ReceiverConfig::from_str("sokcet_path: /tmp/x.sock").is_err());
    }

    #[test]
    fn test_wrong_type() {
        assert!(ReceiverConfig::from_str("read_chunk_size: lots").is_err());
    }

    #[test]
    fn test_env_overrides_socket_path() {
        let mut config = ReceiverConfig::default();
        config.apply_env_from(|key| {
            assert_eq!(key, SOCKET_ENV);
            Some(OsString::from("/tmp/from_env.sock"))
        });
        assert_eq!(config.socket_path, PathBuf::from("/tmp/from_env.sock"));
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let mut config = ReceiverConfig::default();
        config.apply_env_from(|_| Some(OsString::new()));
        assert_eq!(config.socket_path, default_socket_path());

        config.apply_env_from(|_| None);
        assert_eq!(config.socket_path, default_socket_path());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("vcam_receiver_{}.yaml", std::process::id()));
        std::fs::write(&path, "socket_path: /tmp/file.sock\n").unwrap();

        let config = ReceiverConfig::from_file(&path).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/file.sock"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = ReceiverConfig::from_file("/nonexistent/vcam.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
