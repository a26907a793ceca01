//! Host core configuration.

use serde::Deserialize;

use crate::capture::CaptureStrategy;
use crate::errors::{HostError, HostResult};

/// Top-level configuration for the host core.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Cache sizing.
    pub cache: CacheConfig,
    /// Artifact capture behavior.
    pub capture: CaptureConfig,
}

/// Cache sizing knobs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Soft bound on resident entries; `None` means unbounded.
    pub capacity: Option<usize>,
}

/// Artifact capture behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Which load context the host hands to compilation requests.
    pub strategy: CaptureStrategy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        // Capture is the safe default for a long-lived host: no binding,
        // no file locks, no identity conflicts.
        CaptureConfig {
            strategy: CaptureStrategy::Capture,
        }
    }
}

impl HostConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> HostResult<Self> {
        toml::from_str(text).map_err(|e| HostError::Config(e.to_string()))
    }
}
