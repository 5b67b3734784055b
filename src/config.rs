//! Programmatic configuration of the boundary layer.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::logger::LogLevel;

/// How frames the driver marks as `Float` are tagged on delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatFormatTagging {
    /// Float frames are delivered as [`FrameFormat::Float`](crate::FrameFormat::Float).
    #[default]
    Distinct,
    /// Float frames are delivered as [`FrameFormat::Bgrx`](crate::FrameFormat::Bgrx), matching
    /// the tagging of older C shims over libfreenect2.
    Compat,
}

/// Settings shared by a [`Context`](crate::Context) and every session it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub float_format_tagging: FloatFormatTagging,
    /// Minimum level the default tracing logger reports for driver messages.
    ///
    /// The driver logger is process-wide, so this is too: the most recently created
    /// [`Context`](crate::Context) sets it for every context in the process.
    pub log_level: LogLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            float_format_tagging: FloatFormatTagging::Distinct,
            log_level: LogLevel::Info,
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_float_format_tagging(mut self, tagging: FloatFormatTagging) -> Self {
        self.float_format_tagging = tagging;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
