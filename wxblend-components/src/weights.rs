//! Blend weight calculators
//!
//! Each calculator returns a 1D `weights` cube over the blend dimension whose values sum to 1.

use log::debug;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use wxblend_core::cube::{Coord, Cube, FloatValue};
use wxblend_core::errors::{BlendError, BlendResult};
use wxblend_core::time::convert_period;
use wxblend_core::weights_config::WeightsConfig;

/// Scale weights so that they sum to 1
fn normalise_weights(weights: Vec<FloatValue>) -> BlendResult<Vec<FloatValue>> {
    if weights.iter().any(|w| *w < 0.0) {
        return Err(BlendError::Weights(
            "Weights must be positive, at least one value < 0.0".to_string(),
        ));
    }
    let sum: FloatValue = weights.iter().sum();
    if sum.is_nan() || sum <= 0.0 {
        return Err(BlendError::Weights("Sum of weights must be > 0.0".to_string()));
    }
    Ok(weights.into_iter().map(|w| w / sum).collect())
}

fn find_coord<'a>(cube: &'a Cube, coord_name: &str) -> BlendResult<&'a Coord> {
    cube.coord(coord_name).ok_or_else(|| {
        BlendError::Weights(format!(
            "The coord {} for this plugin must be an existing coordinate in the input cube",
            coord_name
        ))
    })
}

fn weights_cube(coord: &Coord, weights: Vec<FloatValue>) -> BlendResult<Cube> {
    Cube::new(
        "weights",
        "1",
        Array1::from(weights).into_dyn(),
        vec![coord.clone()],
    )
}

/// Weights varying linearly between the first and last point of a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChooseDefaultWeightsLinear {
    /// Relative weight of the first point
    y0val: FloatValue,
    /// Relative weight of the last point
    ynval: FloatValue,
}

impl ChooseDefaultWeightsLinear {
    pub fn new(y0val: FloatValue, ynval: FloatValue) -> Self {
        Self { y0val, ynval }
    }

    /// Normalised weights for `num_of_weights` evenly spaced points
    pub fn linear_weights(&self, num_of_weights: usize) -> BlendResult<Vec<FloatValue>> {
        if self.y0val.is_nan() || self.y0val < 0.0 {
            return Err(BlendError::Weights(format!(
                "y0val must be a float >= 0.0, y0val = {}",
                self.y0val
            )));
        }
        if num_of_weights == 1 {
            return Ok(vec![1.0]);
        }
        let slope = (self.ynval - self.y0val) / (num_of_weights - 1) as FloatValue;
        normalise_weights(
            (0..num_of_weights)
                .map(|i| self.y0val + slope * i as FloatValue)
                .collect(),
        )
    }

    pub fn process(&self, cube: &Cube, coord_name: &str) -> BlendResult<Cube> {
        let coord = find_coord(cube, coord_name)?;
        let weights = self.linear_weights(coord.len())?;
        debug!("Linear weights over {}: {:?}", coord_name, weights);
        weights_cube(coord, weights)
    }
}

/// Weights decaying geometrically along a coordinate
///
/// The i-th point receives `cval^i` before normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChooseDefaultWeightsNonLinear {
    cval: FloatValue,
}

impl ChooseDefaultWeightsNonLinear {
    pub fn new(cval: FloatValue) -> Self {
        Self { cval }
    }

    pub fn nonlinear_weights(&self, num_of_weights: usize) -> BlendResult<Vec<FloatValue>> {
        if !(self.cval > 0.0 && self.cval <= 1.0) {
            return Err(BlendError::Weights(format!(
                "cval must be greater than 0.0 and less than or equal to 1.0, cval = {}",
                self.cval
            )));
        }
        normalise_weights(
            (0..num_of_weights)
                .map(|i| self.cval.powi(i as i32))
                .collect(),
        )
    }

    /// Weights over `coord_name`
    ///
    /// With `inverse_ordering` the largest weight goes to the last point, e.g. to favour the
    /// most recent cycle when blending over forecast reference time.
    pub fn process(
        &self,
        cube: &Cube,
        coord_name: &str,
        inverse_ordering: bool,
    ) -> BlendResult<Cube> {
        let coord = find_coord(cube, coord_name)?;
        let mut weights = self.nonlinear_weights(coord.len())?;
        if inverse_ordering {
            weights.reverse();
        }
        debug!("Nonlinear weights over {}: {:?}", coord_name, weights);
        weights_cube(coord, weights)
    }
}

/// Linear interpolation with the end values held constant outside the points
fn interpolate(x: FloatValue, points: &[FloatValue], values: &[FloatValue]) -> FloatValue {
    let last = points.len() - 1;
    if x <= points[0] {
        return values[0];
    }
    if x >= points[last] {
        return values[last];
    }
    for (p, v) in points.windows(2).zip(values.windows(2)) {
        if x <= p[1] {
            let fraction = if p[1] > p[0] {
                (x - p[0]) / (p[1] - p[0])
            } else {
                0.0
            };
            return v[0] + fraction * (v[1] - v[0]);
        }
    }
    values[last]
}

/// Weights looked up from a dictionary keyed by model configuration
///
/// For each configuration on the cube the weight is interpolated at the cube's value of the
/// weighting coordinate, then the weights are normalised across configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChooseWeightsLinear {
    weighting_coord_name: String,
    config: WeightsConfig,
    config_coord_name: String,
}

impl ChooseWeightsLinear {
    pub fn new(weighting_coord_name: &str, config: WeightsConfig, config_coord_name: &str) -> Self {
        Self {
            weighting_coord_name: weighting_coord_name.to_string(),
            config,
            config_coord_name: config_coord_name.to_string(),
        }
    }

    /// Weight for one configuration at `value` of the weighting coordinate
    fn configuration_weight(
        &self,
        configuration: &str,
        value: FloatValue,
        units: &str,
    ) -> BlendResult<FloatValue> {
        let entry = self.config.get(configuration).ok_or_else(|| {
            BlendError::Weights(format!(
                "Configuration {} not found in weights dictionary",
                configuration
            ))
        })?;
        let points = entry.points(&self.weighting_coord_name).ok_or_else(|| {
            BlendError::Weights(format!(
                "Configuration {} has no points for {}",
                configuration, self.weighting_coord_name
            ))
        })?;
        if points.is_empty() || points.len() != entry.weights.len() {
            return Err(BlendError::Weights(format!(
                "Configuration {} has {} {} points but {} weights",
                configuration,
                points.len(),
                self.weighting_coord_name,
                entry.weights.len()
            )));
        }
        if points.windows(2).any(|w| w[1] < w[0]) {
            return Err(BlendError::Weights(format!(
                "{} points for configuration {} must be ascending",
                self.weighting_coord_name, configuration
            )));
        }

        let value = match &entry.units {
            Some(config_units) if config_units != units => {
                convert_period(value, units, config_units)?
            }
            _ => value,
        };
        Ok(interpolate(value, points, &entry.weights))
    }

    pub fn process(&self, cube: &Cube) -> BlendResult<Cube> {
        let config_coord = find_coord(cube, &self.config_coord_name)?;
        let weighting_coord = find_coord(cube, &self.weighting_coord_name)?;
        let value = match weighting_coord.numeric_points()? {
            [value] => *value,
            _ => {
                return Err(BlendError::Weights(format!(
                    "{} must have a single value to look up weights",
                    self.weighting_coord_name
                )))
            }
        };

        let mut weights = Vec::with_capacity(config_coord.len());
        for index in 0..config_coord.len() {
            let configuration = config_coord.points().label(index).ok_or_else(|| {
                BlendError::Weights(format!("No configuration at index {}", index))
            })?;
            weights.push(self.configuration_weight(
                &configuration,
                value,
                weighting_coord.units(),
            )?);
        }
        let weights = normalise_weights(weights)?;
        debug!(
            "Weights from dictionary over {} at {} = {}: {:?}",
            self.config_coord_name, self.weighting_coord_name, value, weights
        );

        // Weights are laid out along the dimension the configurations span
        match cube.coord_dim(&self.config_coord_name) {
            Some(axis) if !cube.is_dim_coord(&self.config_coord_name) => {
                weights_cube(&cube.dim_coords()[axis], weights)?
                    .with_aux_coord(config_coord.clone(), Some(0))
            }
            _ => weights_cube(config_coord, weights),
        }
    }
}
