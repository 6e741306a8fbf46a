//! Cache configuration.
//!
//! Built from the `[cache]` section of `talkback.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_DETACHED_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
    Disabled,
}

impl CacheBackendKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "redis" => Some(Self::Redis),
            "disabled" | "none" | "off" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Required when `backend` is [`CacheBackendKind::Redis`].
    pub redis_url: Option<String>,
    /// Lifetime of every cached entry.
    pub ttl: Duration,
    /// Maximum entries held by the in-memory backend.
    pub memory_capacity: usize,
    /// Bound on a single request-scoped cache call.
    pub operation_timeout: Duration,
    /// Bound on a detached write-back task.
    pub detached_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            redis_url: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            detached_timeout: Duration::from_millis(DEFAULT_DETACHED_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            memory_capacity: settings.memory_capacity,
            operation_timeout: Duration::from_millis(settings.operation_timeout_ms.get()),
            detached_timeout: Duration::from_millis(settings.detached_timeout_ms.get()),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.backend != CacheBackendKind::Disabled
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert!(config.redis_url.is_none());
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.memory_capacity, 10_000);
        assert_eq!(config.operation_timeout, Duration::from_secs(2));
        assert_eq!(config.detached_timeout, Duration::from_secs(5));
        assert!(config.is_enabled());
    }

    #[test]
    fn disabled_backend_reports_disabled() {
        let config = CacheConfig {
            backend: CacheBackendKind::Disabled,
            ..Default::default()
        };
        assert!(!config.is_enabled());
    }

    #[test]
    fn backend_kind_parses_known_names() {
        assert_eq!(CacheBackendKind::parse("Redis"), Some(CacheBackendKind::Redis));
        assert_eq!(CacheBackendKind::parse(" memory "), Some(CacheBackendKind::Memory));
        assert_eq!(CacheBackendKind::parse("off"), Some(CacheBackendKind::Disabled));
        assert_eq!(CacheBackendKind::parse("memcached"), None);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
