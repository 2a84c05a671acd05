//! Weights dictionary used by dictionary-driven blending
//!
//! The dictionary is keyed by model configuration. Each entry gives blend weights at a
//! series of points along a weighting coordinate (usually `forecast_period`):
//!
//! ```rust
//! use wxblend_core::weights_config::WeightsConfig;
//!
//! let config = WeightsConfig::from_json(
//!     r#"{
//!         "uk_det": {"forecast_period": [7, 12, 48, 54], "weights": [0, 1, 1, 0], "units": "hours"},
//!         "uk_ens": {"forecast_period": [7, 12, 48, 54], "weights": [1, 0, 0, 1], "units": "hours"}
//!     }"#,
//! )
//! .unwrap();
//!
//! let uk_det = config.get("uk_det").unwrap();
//! assert_eq!(uk_det.points("forecast_period").unwrap(), &[7.0, 12.0, 48.0, 54.0]);
//! assert_eq!(uk_det.units.as_deref(), Some("hours"));
//! ```

use crate::cube::FloatValue;
use crate::errors::{BlendError, BlendResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weights for one model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    /// Weight at each point of the weighting coordinate
    pub weights: Vec<FloatValue>,
    /// Units of the weighting coordinate points. Defaults to the cube's units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Points keyed by weighting coordinate name
    #[serde(flatten)]
    pub coords: BTreeMap<String, Vec<FloatValue>>,
}

impl ModelWeights {
    pub fn points(&self, weighting_coord: &str) -> Option<&[FloatValue]> {
        self.coords.get(weighting_coord).map(|p| p.as_slice())
    }
}

/// Blend weights keyed by model configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightsConfig(BTreeMap<String, ModelWeights>);

impl WeightsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, configuration: &str, weights: ModelWeights) {
        self.0.insert(configuration.to_string(), weights);
    }

    pub fn get(&self, configuration: &str) -> Option<&ModelWeights> {
        self.0.get(configuration)
    }

    pub fn configurations(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(value: &str) -> BlendResult<Self> {
        serde_json::from_str(value).map_err(|e| {
            BlendError::InvalidConfiguration(format!("unable to read weights dictionary: {}", e))
        })
    }

    pub fn from_toml(value: &str) -> BlendResult<Self> {
        toml::from_str(value).map_err(|e| {
            BlendError::InvalidConfiguration(format!("unable to read weights dictionary: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_toml() {
        let config = WeightsConfig::from_toml(
            r#"
            [uk_det]
            forecast_period = [7.0, 12.0]
            weights = [0.0, 1.0]
            units = "hours"

            [nc_det]
            forecast_period = [0.0, 5.0]
            weights = [1.0, 0.5]
            "#,
        )
        .unwrap();

        assert_eq!(config.configurations().collect::<Vec<_>>(), vec!["nc_det", "uk_det"]);
        let nc_det = config.get("nc_det").unwrap();
        assert_eq!(nc_det.weights, vec![1.0, 0.5]);
        assert_eq!(nc_det.units, None);
        assert_eq!(nc_det.points("forecast_period").unwrap(), &[0.0, 5.0]);
        assert!(nc_det.points("realization").is_none());
    }

    #[test]
    fn json_roundtrip() {
        let mut config = WeightsConfig::new();
        config.insert(
            "uk_ens",
            ModelWeights {
                weights: vec![1.0, 0.0],
                units: Some("hours".to_string()),
                coords: BTreeMap::from([("forecast_period".to_string(), vec![0.0, 24.0])]),
            },
        );
        let serialised = serde_json::to_string(&config).unwrap();
        assert_eq!(WeightsConfig::from_json(&serialised).unwrap(), config);
    }

    #[test]
    fn invalid_dictionary() {
        assert!(matches!(
            WeightsConfig::from_json(r#"{"uk_det": {"forecast_period": [1, 2]}}"#),
            Err(BlendError::InvalidConfiguration(_))
        ));
    }
}
