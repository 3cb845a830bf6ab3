//! Worksheet configuration.
//!
//! [`MathsheetConfig`] is plain serde data. Every field has a default, so a config file only
//! lists what it changes:
//!
//! ```yaml
//! font_size: 14
//! multiply_symbol: "×"
//! layout:
//!   font_scale: 0.7
//! ```

use crate::error::ConfigError;
use mathsheet_core::{LayoutConfig, OperatorStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by every equation of a worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathsheetConfig {
    /// Top-level font size of new equations, in points.
    pub font_size: f64,
    /// Glyph drawn for a typed `*`.
    pub multiply_symbol: String,
    /// Significant digits of spliced results.
    pub significant_digits: usize,
    /// Layout constants.
    pub layout: LayoutConfig,
    /// Expected number of submissions in flight at once.
    pub worker_queue_capacity_hint: usize,
}

impl Default for MathsheetConfig {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            multiply_symbol: "\u{00b7}".to_string(),
            significant_digits: 4,
            layout: LayoutConfig::default(),
            worker_queue_capacity_hint: 64,
        }
    }
}

impl MathsheetConfig {
    /// Parse a YAML configuration.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration file, choosing the format by extension.
    ///
    /// `.json` files are read as JSON, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("json") => Self::from_json(&text)?,
            Some("yaml" | "yml") => Self::from_yaml(&text)?,
            other => {
                tracing::warn!(
                    path = %path.display(),
                    extension = ?other,
                    "unknown config extension, reading as YAML"
                );
                Self::from_yaml(&text)?
            }
        };
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config.sanitized())
    }

    /// Layout constants with the configured font size applied.
    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            font_size: self.font_size,
            ..self.layout.clone()
        }
    }

    /// Operator display for newly typed operators.
    pub fn operator_style(&self) -> OperatorStyle {
        OperatorStyle::with_multiply(self.multiply_symbol.as_str())
    }

    /// Replace values no equation can use with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            tracing::warn!(font_size = self.font_size, "invalid font size, using the default");
            self.font_size = defaults.font_size;
        }
        if self.significant_digits == 0 {
            tracing::warn!("significant_digits must be at least 1, using the default");
            self.significant_digits = defaults.significant_digits;
        }
        if self.multiply_symbol.is_empty() {
            self.multiply_symbol = defaults.multiply_symbol;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = MathsheetConfig::from_yaml("font_size: 14\n").unwrap();
        assert_eq!(config.font_size, 14.0);
        assert_eq!(config.significant_digits, 4);
        assert_eq!(config.layout, LayoutConfig::default());
        assert_eq!(config.layout_config().font_size, 14.0);
    }

    #[test]
    fn json_and_yaml_agree() {
        let yaml = MathsheetConfig::from_yaml("multiply_symbol: x\nsignificant_digits: 6").unwrap();
        let json =
            MathsheetConfig::from_json(r#"{"multiply_symbol": "x", "significant_digits": 6}"#)
                .unwrap();
        assert_eq!(yaml, json);
        assert_eq!(json.operator_style().display_for("*").as_deref(), Some("x"));
    }

    #[test]
    fn zero_digits_fall_back() {
        let config = MathsheetConfig {
            significant_digits: 0,
            font_size: -1.0,
            ..MathsheetConfig::default()
        }
        .sanitized();
        assert_eq!(config.significant_digits, 4);
        assert_eq!(config.font_size, 12.0);
    }
}
