//! Calculate weights and blend forecasts across a single coordinate
//!
//! [`WeightAndBlend`] merges the input cubes along the blend coordinate, calculates one weight per
//! realization with the configured [`WeightingMethod`], optionally spreads those weights over the
//! grid using the missing-data mask, and collapses the blend coordinate with a weighted mean.
//!
//! If the merged cube holds a single realization there is nothing to blend. The input is passed
//! through with its attributes amended and its forecast times rebadged instead.
//!
//! # Examples
//!
//! ```rust
//! use wxblend::{BlendOptions, WeightAndBlend, WeightingMethod};
//!
//! let plugin = WeightAndBlend::new(
//!     "forecast_reference_time",
//!     WeightingMethod::Linear { y0val: 1.0, ynval: 0.0 },
//! );
//! let options = BlendOptions::default().with_spatial_weights(true);
//!
//! assert_eq!(plugin.blend_coord(), "forecast_reference_time");
//! assert_eq!(options.fuzzy_length, 20000.0);
//! ```

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wxblend_components::StandardPlugins;
use wxblend_core::cube::{Attributes, Cube, FloatValue};
use wxblend_core::errors::{BlendError, BlendResult};
use wxblend_core::metadata::{
    add_blend_time, amend_attributes, is_cycle_blend, is_model_blend,
    mark_deprecated_forecast_coords, rebadge_forecasts_as_latest_cycle, MODEL_CONFIGURATION,
    MODEL_ID,
};
use wxblend_core::plugins::BlendPlugins;
use wxblend_core::spatial::{check_if_grid_is_equal_area, distance_to_number_of_grid_cells};
use wxblend_core::time::CycleTime;
use wxblend_core::weights_config::WeightsConfig;

/// Default distance in metres over which spatial weights are smoothed
pub const DEFAULT_FUZZY_LENGTH: FloatValue = 20000.0;

/// How blend weights are calculated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum WeightingMethod {
    /// Weights interpolated from a dictionary keyed by model configuration
    Dict {
        weighting_coord: String,
        config: WeightsConfig,
    },
    /// Weights varying linearly from the first to the last realization
    Linear { y0val: FloatValue, ynval: FloatValue },
    /// Weights decaying geometrically by `cval`
    Nonlinear {
        cval: FloatValue,
        #[serde(default)]
        inverse_ordering: bool,
    },
}

/// Loose parameters for [`WeightingMethod::from_options`]
///
/// Only the parameters of the selected method are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightingOptions {
    pub weighting_coord: Option<String>,
    pub config: Option<WeightsConfig>,
    pub y0val: Option<FloatValue>,
    pub ynval: Option<FloatValue>,
    pub cval: Option<FloatValue>,
    pub inverse_ordering: bool,
}

fn required<T: Clone>(value: &Option<T>, name: &str, method: &str) -> BlendResult<T> {
    value.clone().ok_or_else(|| {
        BlendError::InvalidConfiguration(format!(
            "{} is required for the {} weights calculation method",
            name, method
        ))
    })
}

impl WeightingMethod {
    /// Select a method by name, taking its parameters from `options`
    ///
    /// Parameter values are not checked here. The weight calculators reject invalid values.
    pub fn from_options(method: &str, options: &WeightingOptions) -> BlendResult<Self> {
        match method {
            "dict" => Ok(WeightingMethod::Dict {
                weighting_coord: required(&options.weighting_coord, "weighting_coord", method)?,
                config: required(&options.config, "config", method)?,
            }),
            "linear" => Ok(WeightingMethod::Linear {
                y0val: required(&options.y0val, "y0val", method)?,
                ynval: required(&options.ynval, "ynval", method)?,
            }),
            "nonlinear" => Ok(WeightingMethod::Nonlinear {
                cval: required(&options.cval, "cval", method)?,
                inverse_ordering: options.inverse_ordering,
            }),
            other => Err(BlendError::InvalidConfiguration(format!(
                "Weights calculation method '{}' unrecognised",
                other
            ))),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            WeightingMethod::Dict { .. } => "dict",
            WeightingMethod::Linear { .. } => "linear",
            WeightingMethod::Nonlinear { .. } => "nonlinear",
        }
    }

    /// Coordinate used to look up dictionary weights, passed to the merge step
    pub fn weighting_coord(&self) -> Option<&str> {
        match self {
            WeightingMethod::Dict {
                weighting_coord, ..
            } => Some(weighting_coord),
            _ => None,
        }
    }
}

/// Per-call options for [`WeightAndBlend::process`]
#[derive(Debug, Clone, PartialEq)]
pub struct BlendOptions {
    /// Forecast reference time of the output. Defaults to the latest input cycle.
    pub cycletime: Option<CycleTime>,
    /// Attribute identifying the source model of each input, required for model blending
    pub model_id_attr: Option<String>,
    pub spatial_weights: bool,
    /// Distance in metres over which spatial weights are smoothed
    pub fuzzy_length: FloatValue,
    /// Attribute changes applied to the output
    pub attributes: Option<Attributes>,
}

impl Default for BlendOptions {
    fn default() -> Self {
        Self {
            cycletime: None,
            model_id_attr: None,
            spatial_weights: false,
            fuzzy_length: DEFAULT_FUZZY_LENGTH,
            attributes: None,
        }
    }
}

impl BlendOptions {
    pub fn with_cycletime(mut self, cycletime: CycleTime) -> Self {
        self.cycletime = Some(cycletime);
        self
    }

    pub fn with_model_id_attr(mut self, model_id_attr: &str) -> Self {
        self.model_id_attr = Some(model_id_attr.to_string());
        self
    }

    pub fn with_spatial_weights(mut self, spatial_weights: bool) -> Self {
        self.spatial_weights = spatial_weights;
        self
    }

    pub fn with_fuzzy_length(mut self, fuzzy_length: FloatValue) -> Self {
        self.fuzzy_length = fuzzy_length;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Non-fatal conditions found while blending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendAdvisory {
    MaskedDataWithoutSpatialWeights,
}

impl fmt::Display for BlendAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendAdvisory::MaskedDataWithoutSpatialWeights => write!(
                f,
                "Blending masked data without spatial weights has not been fully tested."
            ),
        }
    }
}

/// Output of [`WeightAndBlend::process`]
#[derive(Debug, Clone, PartialEq)]
pub struct Blended {
    pub cube: Cube,
    pub advisories: Vec<BlendAdvisory>,
}

fn default_plugins() -> Arc<dyn BlendPlugins> {
    Arc::new(StandardPlugins)
}

/// Merge forecasts, calculate weights and collapse the blend coordinate
///
/// The configuration is fixed at construction. Each call to [`process`](Self::process) works
/// out the coordinate it blends over from the configured name, so one instance can be shared
/// between threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightAndBlend {
    blend_coord: String,
    method: WeightingMethod,
    #[serde(skip, default = "default_plugins")]
    plugins: Arc<dyn BlendPlugins>,
}

impl WeightAndBlend {
    pub fn new(blend_coord: &str, method: WeightingMethod) -> Self {
        Self {
            blend_coord: blend_coord.to_string(),
            method,
            plugins: default_plugins(),
        }
    }

    /// Build from a method name, failing if the method is not `dict`, `linear` or `nonlinear`
    pub fn from_options(
        blend_coord: &str,
        method: &str,
        options: &WeightingOptions,
    ) -> BlendResult<Self> {
        Ok(Self::new(
            blend_coord,
            WeightingMethod::from_options(method, options)?,
        ))
    }

    /// Replace the merge, weighting and blending collaborators
    pub fn with_plugins(mut self, plugins: Arc<dyn BlendPlugins>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn from_toml(value: &str) -> BlendResult<Self> {
        toml::from_str(value).map_err(|e| BlendError::InvalidConfiguration(e.to_string()))
    }

    pub fn to_toml(&self) -> BlendResult<String> {
        toml::to_string(self).map_err(|e| BlendError::InvalidConfiguration(e.to_string()))
    }

    pub fn blend_coord(&self) -> &str {
        &self.blend_coord
    }

    pub fn method(&self) -> &WeightingMethod {
        &self.method
    }

    /// Coordinate blended over once the inputs are merged
    ///
    /// Model blends are carried out over the `model_id` coordinate built by the merge.
    pub fn resolve_blend_coord(&self) -> &str {
        if is_model_blend(&self.blend_coord) {
            MODEL_ID
        } else {
            &self.blend_coord
        }
    }

    /// Coordinate holding the keys of the weights dictionary
    pub fn config_coord(blend_coord: &str) -> &str {
        if is_model_blend(blend_coord) {
            MODEL_CONFIGURATION
        } else {
            blend_coord
        }
    }

    /// One weight per point of `blend_coord`
    fn calculate_blending_weights(&self, cube: &Cube, blend_coord: &str) -> BlendResult<Cube> {
        debug!("Calculating {} weights over {}", self.method.tag(), blend_coord);
        match &self.method {
            WeightingMethod::Dict {
                weighting_coord,
                config,
            } => self.plugins.dict_weights(
                cube,
                weighting_coord,
                config,
                Self::config_coord(blend_coord),
            ),
            WeightingMethod::Linear { y0val, ynval } => {
                self.plugins.linear_weights(cube, blend_coord, *y0val, *ynval)
            }
            WeightingMethod::Nonlinear {
                cval,
                inverse_ordering,
            } => self
                .plugins
                .nonlinear_weights(cube, blend_coord, *cval, *inverse_ordering),
        }
    }

    /// Spread 1D weights over the grid using the mask of each realization
    fn update_spatial_weights(
        &self,
        cube: &Cube,
        weights: &Cube,
        blend_coord: &str,
        fuzzy_length: FloatValue,
    ) -> BlendResult<Cube> {
        check_if_grid_is_equal_area(cube)?;
        let grid_cells = distance_to_number_of_grid_cells(cube, fuzzy_length, false)?;
        debug!(
            "Smoothing spatial weights over {} grid cells ({} m)",
            grid_cells, fuzzy_length
        );
        self.plugins
            .spatial_weights(cube, weights, blend_coord, grid_cells)
    }

    /// Pass a single realization through, updating attributes and forecast times
    fn update_metadata_only(
        &self,
        cube: &Cube,
        blend_coord: &str,
        options: &BlendOptions,
    ) -> BlendResult<Cube> {
        let mut result = cube.clone();
        if let Some(attributes) = &options.attributes {
            amend_attributes(&mut result, attributes);
        }

        let mut result =
            rebadge_forecasts_as_latest_cycle(vec![result], options.cycletime.as_ref())?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    BlendError::Error("Rebadging a single cube returned no cube".to_string())
                })?;

        if is_cycle_blend(blend_coord) {
            mark_deprecated_forecast_coords(&mut result)?;
            match &options.cycletime {
                Some(cycletime) => add_blend_time(&mut result, cycletime)?,
                None => {
                    return Err(BlendError::InvalidConfiguration(
                        "Current cycle time is required for cycle and model blending".to_string(),
                    ))
                }
            }
        }
        Ok(result)
    }

    /// Merge `cubes` and blend them across the blend coordinate
    pub fn process(&self, cubes: &[Cube], options: &BlendOptions) -> BlendResult<Blended> {
        let cube = self.plugins.merge(
            cubes,
            &self.blend_coord,
            self.method.weighting_coord(),
            options.model_id_attr.as_deref(),
            options.cycletime.as_ref(),
        )?;
        let blend_coord = self.resolve_blend_coord();

        let points = cube.coord(blend_coord).map(|c| c.len());
        if points.map_or(true, |n| n == 1) {
            info!(
                "Only one {} point to blend, updating metadata only",
                blend_coord
            );
            return Ok(Blended {
                cube: self.update_metadata_only(&cube, blend_coord, options)?,
                advisories: vec![],
            });
        }

        let mut advisories = vec![];
        let mut weights = self.calculate_blending_weights(&cube, blend_coord)?;
        if options.spatial_weights {
            weights =
                self.update_spatial_weights(&cube, &weights, blend_coord, options.fuzzy_length)?;
        } else if cube.is_masked() {
            let advisory = BlendAdvisory::MaskedDataWithoutSpatialWeights;
            warn!("{}", advisory);
            advisories.push(advisory);
        }

        let result = self.plugins.blend(
            &cube,
            &weights,
            blend_coord,
            options.cycletime.as_ref(),
            options.attributes.as_ref(),
        )?;
        Ok(Blended {
            cube: result,
            advisories,
        })
    }
}
