//! Engine limits and their JSON configuration file.
//!
//! ```json
//! { "max_depth": 32, "max_output_size": 16777216, "display_limit": 4000 }
//! ```
//!
//! Missing keys take their defaults.  The CLI loads the file first and then
//! applies any explicit flags on top.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::DEFAULT_MAX_OUTPUT_SIZE;

pub const DEFAULT_MAX_DEPTH:     usize = 32;
/// Characters shown before the rendered result is truncated.
pub const DEFAULT_DISPLAY_LIMIT: usize = 4000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of layers peeled in one auto-decode session.
    pub max_depth:       usize,
    /// Every intermediate value must stay below this many bytes.
    pub max_output_size: usize,
    pub display_limit:   usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth:       DEFAULT_MAX_DEPTH,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            display_limit:   DEFAULT_DISPLAY_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read(path)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// A zero output cap would reject every layer including valid ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_output_size == 0 {
            return Err(ConfigError::Invalid("max_output_size must be positive"));
        }
        if self.display_limit == 0 {
            return Err(ConfigError::Invalid("display_limit must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = EngineConfig::from_json(br#"{ "max_depth": 4 }"#).unwrap();
        assert_eq!(cfg.max_depth, 4);
        assert_eq!(cfg.max_output_size, DEFAULT_MAX_OUTPUT_SIZE);
        assert_eq!(cfg.display_limit, DEFAULT_DISPLAY_LIMIT);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_cap() {
        assert!(matches!(EngineConfig::from_json(br#"{ "depth": 4 }"#), Err(ConfigError::Json(_))));
        assert!(matches!(
            EngineConfig::from_json(br#"{ "max_output_size": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn json_roundtrip() {
        let cfg = EngineConfig { max_depth: 7, ..Default::default() };
        assert_eq!(EngineConfig::from_json(cfg.to_json().unwrap().as_bytes()).unwrap(), cfg);
    }
}
