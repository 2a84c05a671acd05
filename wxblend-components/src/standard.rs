//! Standard implementations of the blending collaborators

use crate::merge::MergeCubesForWeightedBlending;
use crate::spatial_weights::SpatiallyVaryingWeightsFromMask;
use crate::weighted_blend::WeightedBlendAcrossWholeDimension;
use crate::weights::{ChooseDefaultWeightsLinear, ChooseDefaultWeightsNonLinear, ChooseWeightsLinear};
use serde::{Deserialize, Serialize};
use wxblend_core::cube::{Attributes, Cube, FloatValue};
use wxblend_core::errors::BlendResult;
use wxblend_core::plugins::BlendPlugins;
use wxblend_core::time::CycleTime;
use wxblend_core::weights_config::WeightsConfig;

/// Delegates each blending step to the plugin of this crate that implements it
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StandardPlugins;

impl BlendPlugins for StandardPlugins {
    fn merge(
        &self,
        cubes: &[Cube],
        blend_coord: &str,
        weighting_coord: Option<&str>,
        model_id_attr: Option<&str>,
        cycletime: Option<&CycleTime>,
    ) -> BlendResult<Cube> {
        MergeCubesForWeightedBlending::new(blend_coord, weighting_coord, model_id_attr)?
            .process(cubes, cycletime)
    }

    fn linear_weights(
        &self,
        cube: &Cube,
        blend_coord: &str,
        y0val: FloatValue,
        ynval: FloatValue,
    ) -> BlendResult<Cube> {
        ChooseDefaultWeightsLinear::new(y0val, ynval).process(cube, blend_coord)
    }

    fn nonlinear_weights(
        &self,
        cube: &Cube,
        blend_coord: &str,
        cval: FloatValue,
        inverse_ordering: bool,
    ) -> BlendResult<Cube> {
        ChooseDefaultWeightsNonLinear::new(cval).process(cube, blend_coord, inverse_ordering)
    }

    fn dict_weights(
        &self,
        cube: &Cube,
        weighting_coord: &str,
        config: &WeightsConfig,
        config_coord: &str,
    ) -> BlendResult<Cube> {
        ChooseWeightsLinear::new(weighting_coord, config.clone(), config_coord).process(cube)
    }

    fn spatial_weights(
        &self,
        cube: &Cube,
        weights: &Cube,
        blend_coord: &str,
        fuzzy_length: FloatValue,
    ) -> BlendResult<Cube> {
        SpatiallyVaryingWeightsFromMask::new(blend_coord, fuzzy_length).process(cube, weights)
    }

    fn blend(
        &self,
        cube: &Cube,
        weights: &Cube,
        blend_coord: &str,
        cycletime: Option<&CycleTime>,
        attributes: Option<&Attributes>,
    ) -> BlendResult<Cube> {
        WeightedBlendAcrossWholeDimension::new(blend_coord).process(
            cube,
            Some(weights),
            cycletime,
            attributes,
        )
    }
}
