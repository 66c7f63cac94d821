use std::fs;
use std::path::Path;

use tracing::info;

use crate::core::{Assumptions, custom_mix_assumptions, default_assumptions};

pub const DEFAULT_PORT: u16 = 8080;
pub const MAX_HORIZON_YEARS: u32 = 100;
pub const MAX_PATHS: usize = 20_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Used for profile mixes and by the CLI.
    pub assumptions: Assumptions,
    /// Used by the HTTP API when the request carries its own allocation.
    pub custom_mix_assumptions: Assumptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assumptions: default_assumptions(),
            custom_mix_assumptions: custom_mix_assumptions(),
        }
    }
}

impl AppConfig {
    /// Built-in assumptions, or the table in `assumptions_path` when given.
    /// A loaded table replaces both built-in tables.
    pub fn load(assumptions_path: Option<&Path>) -> Result<Self, String> {
        let Some(path) = assumptions_path else {
            return Ok(Self::default());
        };

        let json = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read assumptions file {}: {e}", path.display()))?;
        let config = Self::from_assumptions_json(&json)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        info!(
            path = %path.display(),
            asset_classes = config.assumptions.len(),
            "loaded return assumptions"
        );
        Ok(config)
    }

    pub fn from_assumptions_json(json: &str) -> Result<Self, String> {
        let assumptions: Assumptions =
            serde_json::from_str(json).map_err(|e| format!("Invalid assumptions JSON: {e}"))?;
        if assumptions.is_empty() {
            return Err("Assumptions table lists no asset classes".to_string());
        }
        for (class, assumption) in &assumptions {
            if !assumption.mean_return.is_finite() {
                return Err(format!("Mean return for {class} must be finite"));
            }
            if !assumption.volatility.is_finite() || assumption.volatility < 0.0 {
                return Err(format!("Volatility for {class} must be >= 0"));
            }
        }
        Ok(Self {
            custom_mix_assumptions: assumptions.clone(),
            assumptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AssetAssumption, AssetClass};

    #[test]
    fn parses_assumption_table() {
        let config = AppConfig::from_assumptions_json(
            r#"{"stock":{"meanReturn":0.07,"volatility":0.16},"cash":{"mean":0.02,"vol":0.0}}"#,
        )
        .unwrap();
        assert_eq!(config.assumptions.len(), 2);
        assert_eq!(config.custom_mix_assumptions, config.assumptions);
        assert_eq!(
            config.assumptions[&AssetClass::from("cash")],
            AssetAssumption::new(0.02, 0.0)
        );
    }

    #[test]
    fn rejects_empty_or_invalid_tables() {
        assert!(AppConfig::from_assumptions_json("{}").is_err());
        assert!(AppConfig::from_assumptions_json("[1,2]").is_err());
        assert!(
            AppConfig::from_assumptions_json(r#"{"stock":{"meanReturn":0.07,"volatility":-0.1}}"#)
                .is_err()
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/assumptions.json"))).unwrap_err();
        assert!(err.contains("Failed to read assumptions file"));
    }

    #[test]
    fn default_config_uses_builtin_table() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.assumptions, default_assumptions());
        assert_eq!(config.custom_mix_assumptions, custom_mix_assumptions());
    }
}
