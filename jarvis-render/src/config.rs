//! Engine configuration. Every field has a default, so an empty YAML document
//! (or `EngineConfig::default()`) gives the stock behaviour.

use crate::error::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifier chart scripts use to address their drawing surface.
pub const DEFAULT_SURFACE_ID: &str = "myChart";

/// Lua heap limit per script invocation: 4 MB.
pub const LUA_MEMORY_LIMIT_BYTES: usize = 4 * 1024 * 1024;

/// Wall-clock budget per script invocation.
pub const SCRIPT_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed identifier generated chart scripts use for their surface.
    pub surface_id: String,
    /// Language tag of the fenced chart script inside a code block.
    pub fence_marker: String,
    pub surface_width: u32,
    pub surface_height: u32,
    pub sandbox: SandboxConfig,
    /// syntect theme used for fenced code in markdown.
    pub syntax_theme: String,
    pub assistant_name: String,
    pub user_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            surface_id: DEFAULT_SURFACE_ID.to_string(),
            fence_marker: jarvis_blocks::DEFAULT_FENCE_MARKER.to_string(),
            surface_width: 800,
            surface_height: 400,
            sandbox: SandboxConfig::default(),
            syntax_theme: "base16-ocean.dark".to_string(),
            assistant_name: "Jarvis".to_string(),
            user_name: "You".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub memory_limit_bytes: usize,
    /// `None` lets scripts run unbounded.
    pub timeout_ms: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: LUA_MEMORY_LIMIT_BYTES,
            timeout_ms: Some(SCRIPT_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> RenderResult<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(yaml).map_err(|e| RenderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.surface_id.trim().is_empty() {
            return Err(RenderError::Config("surface_id must not be empty".to_string()));
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(RenderError::Config(format!(
                "surface size must be positive, got {}x{}",
                self.surface_width, self.surface_height
            )));
        }
        // Below this Luau cannot even open its standard libraries.
        if self.sandbox.memory_limit_bytes < 64 * 1024 {
            return Err(RenderError::Config(format!(
                "sandbox.memory_limit_bytes must be at least 65536, got {}",
                self.sandbox.memory_limit_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = EngineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.surface_id, "myChart");
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = "surface_width: 640\nsandbox:\n  timeout_ms: null\n";
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.surface_width, 640);
        assert_eq!(config.surface_height, 400);
        assert_eq!(config.sandbox.timeout_ms, None);
        assert_eq!(config.sandbox.memory_limit_bytes, LUA_MEMORY_LIMIT_BYTES);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_yaml_str("surface_height: 0").is_err());
        assert!(EngineConfig::from_yaml_str("surface_id: ''").is_err());
        assert!(EngineConfig::from_yaml_str("surface_width: wide").is_err());
    }
}
