//! The on-disk configuration schema and runtime tuning knobs,
//! loaded once at startup and again on every reload.
//!
//! Each of `hosts`/`services`/`applications`/`endpoints` is a flat list of
//! named, classed elements; the class-specific fields are left as a raw
//! [`serde_json::Value`] blob until the registered factory for that class
//! binds it to its own config type (see [`crate::component::bind_config`]).

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Error;

// Default iouring/epoll entries: 32k
const DEFAULT_ENTRIES: u32 = 32768;

pub const FALLBACK_PARALLELISM: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(1) };

/// Configuration options for the runtime environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads, one `monoio` event loop each.
    #[serde(default = "default_workers")]
    pub worker_threads: usize,

    /// Number of I/O entries for io_uring.
    #[serde(default = "default_entries")]
    pub entries: u32,

    /// Idle timeout for sqpoll (io_uring specific).
    pub sqpoll_idle: Option<u32>,

    #[serde(default)]
    pub runtime_type: RuntimeType,

    #[serde(default = "default_cpu_affinity")]
    pub cpu_affinity: bool,

    pub thread_pool: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            worker_threads: default_workers(),
            entries: default_entries(),
            sqpoll_idle: None,
            runtime_type: Default::default(),
            cpu_affinity: default_cpu_affinity(),
            thread_pool: None,
        }
    }
}

/// Selects between the io_uring and legacy (epoll/kqueue) `monoio` drivers.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeType {
    #[cfg(target_os = "linux")]
    IoUring,
    Legacy,
}

impl Default for RuntimeType {
    #[cfg(target_os = "linux")]
    fn default() -> Self {
        Self::IoUring
    }
    #[cfg(not(target_os = "linux"))]
    fn default() -> Self {
        Self::Legacy
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .unwrap_or(FALLBACK_PARALLELISM)
        .into()
}

const fn default_entries() -> u32 {
    DEFAULT_ENTRIES
}

const fn default_cpu_affinity() -> bool {
    false
}

/// One named, classed configuration element. `class` selects the factory
/// from the process-wide registry; `fields` is everything else,
/// bound to that factory's own config type at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub class: String,
    #[serde(flatten)]
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub hosts: Vec<Element>,
    #[serde(default)]
    pub services: Vec<Element>,
    #[serde(default)]
    pub applications: Vec<Element>,
    #[serde(default)]
    pub endpoints: Vec<Element>,
}

impl Config {
    /// Reads and parses `path`, sniffing JSON vs. TOML from the first
    /// non-whitespace byte.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = crate::util::file_read(path.as_ref())
            .await
            .map_err(Error::IoError)?;
        Self::from_slice(&content)
    }

    pub fn from_slice(content: &[u8]) -> Result<Self, Error> {
        parse_sniffed(content)
    }
}

/// Parses `content` as JSON or TOML depending on its first non-whitespace
/// byte (`{` means JSON), matching the convention used throughout the
/// configuration loader.
pub fn parse_sniffed<T: DeserializeOwned>(content: &[u8]) -> Result<T, Error> {
    let is_json = match content
        .iter()
        .find(|&&b| b != b' ' && b != b'\r' && b != b'\n' && b != b'\t')
    {
        Some(first) => *first == b'{',
        None => false,
    };
    if is_json {
        serde_json::from_slice::<T>(content).map_err(|e| Error::ConfigInvalid(e.to_string()))
    } else {
        let text = String::from_utf8_lossy(content);
        toml::from_str::<T>(&text).map_err(|e| Error::ConfigInvalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_element_list() {
        let raw = br#"{"services": [{"name": "limiter", "class": "TokenBucketService", "capacity": 5}]}"#;
        let cfg: Config = parse_sniffed(raw).unwrap();
        assert_eq!(cfg.services.len(), 1);
        assert_eq!(cfg.services[0].class, "TokenBucketService");
    }

    #[test]
    fn parses_toml_element_list() {
        let raw = br#"
            [[services]]
            name = "limiter"
            class = "TokenBucketService"
            capacity = 5
        "#;
        let cfg: Config = parse_sniffed(raw).unwrap();
        assert_eq!(cfg.services.len(), 1);
        assert_eq!(cfg.services[0].name, "limiter");
    }

    #[test]
    fn malformed_json_is_config_invalid() {
        let raw = b"{not json";
        let err = parse_sniffed::<Config>(raw).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }
}
