//! Runtime configuration
//!
//! [`RuntimeConfig`] selects between the host-only and the accelerated
//! (primary + special buffer) build modes and sets memory limits and the
//! threshold above which bulk loops fan out over the rayon pool.
//!
//! # Examples
//!
//! ```
//! use ndrt_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::default()
//!     .with_accelerated(true)
//!     .with_num_devices(2)
//!     .with_host_memory_limit(64 << 20);
//!
//! assert!(config.accelerated);
//! assert_eq!(config.host_memory_limit, Some(64 << 20));
//! ```

use crate::error::{NdError, NdResult};

/// Environment variable names understood by [`RuntimeConfig::from_env`].
pub const ENV_ACCELERATED: &str = "NDRT_ACCELERATED";
pub const ENV_DEVICES: &str = "NDRT_DEVICES";
pub const ENV_DEVICE_ID: &str = "NDRT_DEVICE_ID";
pub const ENV_HOST_MEMORY_LIMIT: &str = "NDRT_HOST_MEMORY_LIMIT";
pub const ENV_DEVICE_MEMORY_LIMIT: &str = "NDRT_DEVICE_MEMORY_LIMIT";
pub const ENV_PARALLEL_THRESHOLD: &str = "NDRT_PARALLEL_THRESHOLD";
pub const ENV_TAD_CACHE: &str = "NDRT_TAD_CACHE";

/// Configuration shared by every array created through one launch context
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeConfig {
    /// Maintain a special (device) copy next to every primary buffer
    pub accelerated: bool,
    /// Number of devices, one shape cache slot each
    pub num_devices: usize,
    /// Device the launch context is bound to
    pub device_id: usize,
    /// Cap on total primary memory, in bytes
    pub host_memory_limit: Option<usize>,
    /// Cap on total special memory, in bytes
    pub device_memory_limit: Option<usize>,
    /// Element count from which loops run on the rayon pool
    pub parallel_threshold: usize,
    /// Reuse TAD packs across calls
    pub cache_tads: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            accelerated: false,
            num_devices: 1,
            device_id: 0,
            host_memory_limit: None,
            device_memory_limit: None,
            parallel_threshold: 32 * 1024,
            cache_tads: true,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration with the special buffer enabled.
    pub fn accelerated() -> Self {
        Self::default().with_accelerated(true)
    }

    pub fn with_accelerated(mut self, accelerated: bool) -> Self {
        self.accelerated = accelerated;
        self
    }

    pub fn with_num_devices(mut self, num_devices: usize) -> Self {
        self.num_devices = num_devices;
        self
    }

    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_host_memory_limit(mut self, bytes: usize) -> Self {
        self.host_memory_limit = Some(bytes);
        self
    }

    pub fn with_device_memory_limit(mut self, bytes: usize) -> Self {
        self.device_memory_limit = Some(bytes);
        self
    }

    pub fn with_parallel_threshold(mut self, elements: usize) -> Self {
        self.parallel_threshold = elements;
        self
    }

    pub fn with_tad_cache(mut self, enabled: bool) -> Self {
        self.cache_tads = enabled;
        self
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] when there are no devices or the
    /// bound device id is out of range.
    pub fn validate(&self) -> NdResult<()> {
        if self.num_devices == 0 {
            return Err(NdError::invalid_argument(
                "RuntimeConfig",
                "at least one device is required",
            ));
        }
        if self.device_id >= self.num_devices {
            return Err(NdError::invalid_argument(
                "RuntimeConfig",
                format!(
                    "device id {} is out of range for {} devices",
                    self.device_id, self.num_devices
                ),
            ));
        }
        Ok(())
    }

    /// Build a configuration from `NDRT_*` environment variables.
    ///
    /// Unset variables keep their default. Booleans accept `1/0`, `true/false`,
    /// `yes/no` and `on/off`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] when a variable cannot be parsed or
    /// the resulting configuration fails [`RuntimeConfig::validate`].
    pub fn from_env() -> NdResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RuntimeConfig::from_env`] with a caller supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> NdResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_ACCELERATED) {
            config.accelerated = parse_bool(ENV_ACCELERATED, &value)?;
        }
        if let Some(value) = lookup(ENV_DEVICES) {
            config.num_devices = parse_usize(ENV_DEVICES, &value)?;
        }
        if let Some(value) = lookup(ENV_DEVICE_ID) {
            config.device_id = parse_usize(ENV_DEVICE_ID, &value)?;
        }
        if let Some(value) = lookup(ENV_HOST_MEMORY_LIMIT) {
            config.host_memory_limit = Some(parse_usize(ENV_HOST_MEMORY_LIMIT, &value)?);
        }
        if let Some(value) = lookup(ENV_DEVICE_MEMORY_LIMIT) {
            config.device_memory_limit = Some(parse_usize(ENV_DEVICE_MEMORY_LIMIT, &value)?);
        }
        if let Some(value) = lookup(ENV_PARALLEL_THRESHOLD) {
            config.parallel_threshold = parse_usize(ENV_PARALLEL_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_TAD_CACHE) {
            config.cache_tads = parse_bool(ENV_TAD_CACHE, &value)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> NdResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(NdError::invalid_argument(
            "RuntimeConfig::from_env",
            format!("{key}: expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_usize(key: &str, value: &str) -> NdResult<usize> {
    value.trim().parse::<usize>().map_err(|e| {
        NdError::invalid_argument(
            "RuntimeConfig::from_env",
            format!("{key}: '{value}' is not a non-negative integer ({e})"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_host_only() {
        let config = RuntimeConfig::default();
        assert!(!config.accelerated);
        assert_eq!(config.num_devices, 1);
        assert!(config.cache_tads);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_parses_all_keys() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            (ENV_ACCELERATED, "yes"),
            (ENV_DEVICES, "4"),
            (ENV_DEVICE_ID, "2"),
            (ENV_HOST_MEMORY_LIMIT, "1024"),
            (ENV_DEVICE_MEMORY_LIMIT, "2048"),
            (ENV_PARALLEL_THRESHOLD, " 10 "),
            (ENV_TAD_CACHE, "off"),
        ]))
        .unwrap();

        assert!(config.accelerated);
        assert_eq!(config.num_devices, 4);
        assert_eq!(config.device_id, 2);
        assert_eq!(config.host_memory_limit, Some(1024));
        assert_eq!(config.device_memory_limit, Some(2048));
        assert_eq!(config.parallel_threshold, 10);
        assert!(!config.cache_tads);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[(ENV_ACCELERATED, "maybe")]));
        assert!(matches!(err, Err(NdError::InvalidArgument { .. })));

        let err = RuntimeConfig::from_lookup(lookup_from(&[(ENV_DEVICES, "-1")]));
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_device_range() {
        let config = RuntimeConfig::default().with_num_devices(2).with_device_id(2);
        assert!(config.validate().is_err());
        assert!(RuntimeConfig::default().with_num_devices(0).validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let config = RuntimeConfig::accelerated().with_parallel_threshold(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
