//! Collaborators used by the blend orchestrator
//!
//! Blending is split into a merge step, a weight calculation (one of three methods), an
//! optional spatial refinement of the weights and a weighted reduction. The [`BlendPlugins`]
//! trait groups these so that the orchestrator can be run against the standard
//! implementations or against substitutes.

use crate::cube::{Attributes, Cube, FloatValue};
use crate::errors::BlendResult;
use crate::time::CycleTime;
use crate::weights_config::WeightsConfig;

pub trait BlendPlugins: std::fmt::Debug + Send + Sync {
    /// Merge inputs into one cube with an ascending, unique `blend_coord` dimension
    ///
    /// For model blending `model_id_attr` names the attribute used to build the
    /// `model_id` and `model_configuration` coordinates.
    fn merge(
        &self,
        cubes: &[Cube],
        blend_coord: &str,
        weighting_coord: Option<&str>,
        model_id_attr: Option<&str>,
        cycletime: Option<&CycleTime>,
    ) -> BlendResult<Cube>;

    /// Weights varying linearly from `y0val` (first point) to `ynval` (last point)
    fn linear_weights(
        &self,
        cube: &Cube,
        blend_coord: &str,
        y0val: FloatValue,
        ynval: FloatValue,
    ) -> BlendResult<Cube>;

    /// Weights decaying geometrically by `cval`
    fn nonlinear_weights(
        &self,
        cube: &Cube,
        blend_coord: &str,
        cval: FloatValue,
        inverse_ordering: bool,
    ) -> BlendResult<Cube>;

    /// Weights looked up per model configuration from a weights dictionary
    fn dict_weights(
        &self,
        cube: &Cube,
        weighting_coord: &str,
        config: &WeightsConfig,
        config_coord: &str,
    ) -> BlendResult<Cube>;

    /// Expand 1D weights into spatially varying weights using the cube's mask
    ///
    /// `fuzzy_length` is a (possibly fractional) number of grid cells.
    fn spatial_weights(
        &self,
        cube: &Cube,
        weights: &Cube,
        blend_coord: &str,
        fuzzy_length: FloatValue,
    ) -> BlendResult<Cube>;

    /// Collapse `blend_coord` using a weighted mean, repairing time metadata
    fn blend(
        &self,
        cube: &Cube,
        weights: &Cube,
        blend_coord: &str,
        cycletime: Option<&CycleTime>,
        attributes: Option<&Attributes>,
    ) -> BlendResult<Cube>;
}
