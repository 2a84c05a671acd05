//! Merge input cubes into one cube with a leading blend dimension

use log::debug;
use ndarray::{stack, ArrayD, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use wxblend_core::cube::{AuxCoord, Coord, CoordPoints, Cube, FloatValue};
use wxblend_core::errors::{BlendError, BlendResult};
use wxblend_core::metadata::{
    is_model_blend, rebadge_forecasts_as_latest_cycle, MODEL_CONFIGURATION, MODEL_ID,
};
use wxblend_core::time::CycleTime;

/// Prepare cubes for a weighted blend by merging them along the blend coordinate
///
/// For model blending the inputs are told apart by an attribute, from which `model_id` and
/// `model_configuration` coordinates are created. The inputs are rebadged to a common forecast
/// reference time first, so that a model blend is a blend of forecasts for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCubesForWeightedBlending {
    blend_coord: String,
    weighting_coord: Option<String>,
    model_id_attr: Option<String>,
}

impl MergeCubesForWeightedBlending {
    pub fn new(
        blend_coord: &str,
        weighting_coord: Option<&str>,
        model_id_attr: Option<&str>,
    ) -> BlendResult<Self> {
        if is_model_blend(blend_coord) && model_id_attr.is_none() {
            return Err(BlendError::Merge(format!(
                "model_id_attr must be specified for model blending over {}",
                blend_coord
            )));
        }
        Ok(Self {
            blend_coord: blend_coord.to_string(),
            weighting_coord: weighting_coord.map(str::to_string),
            model_id_attr: model_id_attr.map(str::to_string),
        })
    }

    /// Add scalar `model_id` and `model_configuration` coordinates to each cube
    ///
    /// Model ids are 1000 times the rank of the model attribute among the sorted inputs.
    fn create_model_coordinates(&self, cubes: &mut [Cube], model_id_attr: &str) -> BlendResult<()> {
        let mut titles = Vec::with_capacity(cubes.len());
        for cube in cubes.iter() {
            let title = cube.attributes().get(model_id_attr).ok_or_else(|| {
                BlendError::Merge(format!(
                    "{} attribute is not present on all input cubes",
                    model_id_attr
                ))
            })?;
            titles.push(title.clone());
        }
        let mut sorted = titles.clone();
        sorted.sort();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(BlendError::Merge(format!(
                "Cannot create model dimension coordinate with duplicate {} values: {:?}",
                model_id_attr, titles
            )));
        }

        for (cube, title) in cubes.iter_mut().zip(&titles) {
            let rank = sorted.binary_search(title).map_err(|_| {
                BlendError::Merge(format!("Model {} not found when ranking inputs", title))
            })?;
            cube.set_aux_coord(
                Coord::scalar(MODEL_ID, "1", 1000.0 * rank as FloatValue),
                None,
            )?;
            cube.set_aux_coord(Coord::scalar_label(MODEL_CONFIGURATION, title), None)?;
        }
        Ok(())
    }

    /// Auxiliary coordinates of the merged cube
    ///
    /// Coordinates that agree across inputs are kept, shifted past the new leading dimension.
    /// Scalar coordinates that differ become coordinates along the new dimension.
    fn merge_aux_coords(cubes: &[&Cube], blend_coord: &str) -> BlendResult<Vec<AuxCoord>> {
        let template = cubes[0];
        for cube in &cubes[1..] {
            if let Some(extra) = cube
                .aux_coords()
                .iter()
                .find(|a| !template.has_coord(a.coord.name()))
            {
                return Err(BlendError::Merge(format!(
                    "Coordinate {} is not present on all input cubes",
                    extra.coord.name()
                )));
            }
        }

        let mut merged = Vec::new();
        for aux in template.aux_coords() {
            let name = aux.coord.name();
            if name == blend_coord {
                continue;
            }
            let mut matching = Vec::with_capacity(cubes.len());
            for cube in cubes {
                let other = cube
                    .aux_coords()
                    .iter()
                    .find(|a| a.coord.name() == name)
                    .ok_or_else(|| {
                        BlendError::Merge(format!(
                            "Coordinate {} is not present on all input cubes",
                            name
                        ))
                    })?;
                matching.push(other);
            }

            if matching.iter().all(|other| *other == aux) {
                merged.push(AuxCoord {
                    coord: aux.coord.clone(),
                    dim: aux.dim.map(|d| d + 1),
                });
                continue;
            }

            let scalars = matching
                .iter()
                .all(|other| other.dim.is_none() && other.coord.units() == aux.coord.units());
            let points = CoordPoints::concat(matching.iter().map(|other| other.coord.points()));
            match (scalars, points) {
                (true, Some(points)) => {
                    debug!("Merging scalar {} into a coordinate along {}", name, blend_coord);
                    let mut coord = Coord::new(name, aux.coord.units(), points);
                    *coord.attributes_mut() = aux.coord.attributes().clone();
                    merged.push(AuxCoord {
                        coord,
                        dim: Some(0),
                    });
                }
                _ => {
                    return Err(BlendError::Merge(format!(
                        "Coordinate {} differs between inputs and cannot be merged",
                        name
                    )))
                }
            }
        }
        Ok(merged)
    }

    /// Stack cubes along a new leading dimension built from their scalar blend coordinate
    fn merge_along_new_axis(cubes: Vec<Cube>, blend_coord: &str) -> BlendResult<Cube> {
        let mut keyed = Vec::with_capacity(cubes.len());
        for cube in cubes {
            let coord = cube.require_coord(blend_coord)?;
            let key = match (cube.is_dim_coord(blend_coord), coord.points().as_numeric()) {
                (false, Some([value])) => *value,
                _ => {
                    return Err(BlendError::Merge(format!(
                        "{} must be a scalar numeric coordinate on every input cube",
                        blend_coord
                    )))
                }
            };
            keyed.push((key, cube));
        }
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        if keyed.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(BlendError::Merge(format!(
                "Duplicate {} points found on input cubes",
                blend_coord
            )));
        }

        let cubes: Vec<&Cube> = keyed.iter().map(|(_, cube)| cube).collect();
        let template = cubes[0];
        for cube in &cubes[1..] {
            if cube.name() != template.name() || cube.units() != template.units() {
                return Err(BlendError::Merge(format!(
                    "Cannot merge {} ({}) with {} ({})",
                    cube.name(),
                    cube.units(),
                    template.name(),
                    template.units()
                )));
            }
            if cube.dim_coords() != template.dim_coords() {
                return Err(BlendError::Merge(format!(
                    "Dimension coordinates of input cubes do not match: {:?} and {:?}",
                    cube.shape(),
                    template.shape()
                )));
            }
            if cube.coord_system() != template.coord_system() {
                return Err(BlendError::Merge(
                    "Input cubes have different coordinate systems".to_string(),
                ));
            }
        }

        let views: Vec<ArrayViewD<FloatValue>> = cubes.iter().map(|c| c.data().view()).collect();
        let data = stack(Axis(0), &views)?;
        let mask = if cubes.iter().any(|c| c.mask().is_some()) {
            let masks: Vec<ArrayD<bool>> = cubes
                .iter()
                .map(|c| {
                    c.mask()
                        .cloned()
                        .unwrap_or_else(|| ArrayD::from_elem(IxDyn(c.shape()), false))
                })
                .collect();
            let views: Vec<ArrayViewD<bool>> = masks.iter().map(|m| m.view()).collect();
            Some(stack(Axis(0), &views)?)
        } else {
            None
        };

        let template_coord = template.require_coord(blend_coord)?;
        let mut blend_dim = Coord::numeric(
            blend_coord,
            template_coord.units(),
            keyed.iter().map(|(key, _)| *key).collect(),
        );
        *blend_dim.attributes_mut() = template_coord.attributes().clone();
        let mut dim_coords = vec![blend_dim];
        dim_coords.extend(template.dim_coords().iter().cloned());

        let mut merged = Cube::new(template.name(), template.units(), data, dim_coords)?;
        for aux in Self::merge_aux_coords(&cubes, blend_coord)? {
            merged.add_aux_coord(aux.coord, aux.dim)?;
        }
        if let Some(mask) = mask {
            merged = merged.with_mask(mask)?;
        }
        if let Some(system) = template.coord_system() {
            merged = merged.with_coord_system(system.clone());
        }
        for (key, value) in template.attributes() {
            if cubes[1..].iter().all(|c| c.attributes().get(key) == Some(value)) {
                merged.attributes_mut().insert(key.clone(), value.clone());
            } else {
                debug!("Dropping attribute {} which differs between inputs", key);
            }
        }
        Ok(merged)
    }

    /// Merge `cubes` into a single cube with `blend_coord` as its leading dimension
    ///
    /// A single input comes back as it is. No model coordinates are added and nothing is
    /// checked, so the blend coordinate may be absent from the result.
    pub fn process(&self, cubes: &[Cube], cycletime: Option<&CycleTime>) -> BlendResult<Cube> {
        match cubes {
            [] => return Err(BlendError::Merge("No input cubes to merge".to_string())),
            [single] => {
                debug!("Single input cube, nothing to merge along {}", self.blend_coord);
                return Ok(single.clone());
            }
            _ => {}
        }
        let mut cubes = cubes.to_vec();

        match (is_model_blend(&self.blend_coord), &self.model_id_attr) {
            (true, Some(model_id_attr)) => {
                self.create_model_coordinates(&mut cubes, model_id_attr)?;
                cubes = rebadge_forecasts_as_latest_cycle(cubes, cycletime)?;
            }
            (true, None) => {
                return Err(BlendError::Merge(
                    "model_id_attr must be specified for model blending".to_string(),
                ))
            }
            (false, _) => {}
        }

        // For model blends the coordinate built above is model_id
        let blend_coord = if is_model_blend(&self.blend_coord) {
            MODEL_ID
        } else {
            self.blend_coord.as_str()
        };
        if cubes.iter().any(|c| !c.has_coord(blend_coord)) {
            return Err(BlendError::Merge(format!(
                "{} coordinate is not present on all input cubes",
                blend_coord
            )));
        }
        if let Some(weighting_coord) = &self.weighting_coord {
            if cubes.iter().any(|c| !c.has_coord(weighting_coord)) {
                return Err(BlendError::Merge(format!(
                    "{} coordinate is not present on all input cubes",
                    weighting_coord
                )));
            }
        }

        debug!("Merging {} cubes along {}", cubes.len(), blend_coord);
        Self::merge_along_new_axis(cubes, blend_coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use wxblend_core::example_cubes::set_up_variable_cube;
    use wxblend_core::metadata::{FORECAST_PERIOD, FORECAST_REFERENCE_TIME};

    const MODEL_ATTR: &str = "mosg__model_configuration";

    fn cycletime(value: &str) -> CycleTime {
        CycleTime::parse(value).unwrap()
    }

    fn cube(value: f64, frt: &str) -> Cube {
        set_up_variable_cube(
            Array2::from_elem((3, 3), value),
            cycletime("20171122T0600Z"),
            cycletime(frt),
        )
        .unwrap()
    }

    fn model_cube(value: f64, frt: &str, model: &str) -> Cube {
        cube(value, frt).with_attribute(MODEL_ATTR, model)
    }

    fn points(cube: &Cube, name: &str) -> Vec<f64> {
        cube.coord(name).unwrap().numeric_points().unwrap().to_vec()
    }

    #[test]
    fn model_blend_requires_attribute() {
        let result = MergeCubesForWeightedBlending::new("model", None, None);
        assert!(matches!(result, Err(BlendError::Merge(_))));
        assert!(MergeCubesForWeightedBlending::new("model", None, Some(MODEL_ATTR)).is_ok());
        assert!(MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, None, None).is_ok());
    }

    #[test]
    fn merge_models() {
        let inputs = vec![
            model_cube(20.0, "20171122T0300Z", "uk_ens"),
            model_cube(10.0, "20171122T0000Z", "uk_det"),
        ];
        let result = MergeCubesForWeightedBlending::new("model", None, Some(MODEL_ATTR))
            .unwrap()
            .process(&inputs, None)
            .unwrap();

        assert_eq!(result.shape(), &[2, 3, 3]);
        assert_eq!(result.dim_coords()[0].name(), MODEL_ID);
        assert_eq!(points(&result, MODEL_ID), vec![0.0, 1000.0]);
        assert_eq!(
            result.coord(MODEL_CONFIGURATION).unwrap().points(),
            &CoordPoints::Labels(vec!["uk_det".into(), "uk_ens".into()])
        );
        assert_eq!(result.coord_dim(MODEL_CONFIGURATION), Some(0));
        assert_eq!(result.data()[[0, 0, 0]], 10.0);
        assert_eq!(result.data()[[1, 0, 0]], 20.0);

        // Both inputs rebadged to the latest cycle
        assert_eq!(
            points(&result, FORECAST_REFERENCE_TIME),
            vec![cycletime("20171122T0300Z").seconds()]
        );
        assert_eq!(points(&result, FORECAST_PERIOD), vec![3.0 * 3600.0]);
        assert!(!result.attributes().contains_key(MODEL_ATTR));
        assert_eq!(result.attributes().get("institution").unwrap(), "Met Office");
    }

    #[test]
    fn merge_models_to_cycletime() {
        let inputs = vec![
            model_cube(10.0, "20171122T0000Z", "uk_det"),
            model_cube(20.0, "20171122T0300Z", "uk_ens"),
        ];
        let target = cycletime("20171122T0400Z");
        let result = MergeCubesForWeightedBlending::new(MODEL_ID, None, Some(MODEL_ATTR))
            .unwrap()
            .process(&inputs, Some(&target))
            .unwrap();
        assert_eq!(points(&result, FORECAST_REFERENCE_TIME), vec![target.seconds()]);
        assert_eq!(points(&result, FORECAST_PERIOD), vec![2.0 * 3600.0]);
    }

    #[test]
    fn missing_model_attribute() {
        let inputs = vec![
            model_cube(10.0, "20171122T0000Z", "uk_det"),
            cube(20.0, "20171122T0300Z"),
        ];
        let result = MergeCubesForWeightedBlending::new("model", None, Some(MODEL_ATTR))
            .unwrap()
            .process(&inputs, None);
        assert!(matches!(result, Err(BlendError::Merge(msg)) if msg.contains(MODEL_ATTR)));
    }

    #[test]
    fn duplicate_models() {
        let inputs = vec![
            model_cube(10.0, "20171122T0000Z", "uk_det"),
            model_cube(20.0, "20171122T0300Z", "uk_det"),
        ];
        let result = MergeCubesForWeightedBlending::new("model", None, Some(MODEL_ATTR))
            .unwrap()
            .process(&inputs, None);
        assert!(matches!(result, Err(BlendError::Merge(_))));
    }

    #[test]
    fn merge_cycles() {
        let inputs = vec![cube(20.0, "20171122T0300Z"), cube(10.0, "20171122T0000Z")];
        let result = MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, None, None)
            .unwrap()
            .process(&inputs, None)
            .unwrap();

        assert_eq!(result.dim_coords()[0].name(), FORECAST_REFERENCE_TIME);
        assert_eq!(
            points(&result, FORECAST_REFERENCE_TIME),
            vec![
                cycletime("20171122T0000Z").seconds(),
                cycletime("20171122T0300Z").seconds()
            ]
        );
        // Differing forecast periods now run along the blend dimension
        assert_eq!(result.coord_dim(FORECAST_PERIOD), Some(0));
        assert_eq!(points(&result, FORECAST_PERIOD), vec![21600.0, 10800.0]);
        assert_eq!(result.data()[[0, 1, 1]], 10.0);
        assert!(result.mask().is_none());
    }

    #[test]
    fn blend_coord_missing() {
        let inputs = vec![cube(10.0, "20171122T0000Z"), cube(20.0, "20171122T0300Z")];
        let result = MergeCubesForWeightedBlending::new("realization", None, None)
            .unwrap()
            .process(&inputs, None);
        assert!(matches!(
            result,
            Err(BlendError::Merge(msg)) if msg == "realization coordinate is not present on all input cubes"
        ));
    }

    #[test]
    fn weighting_coord_missing() {
        let inputs = vec![cube(10.0, "20171122T0000Z"), cube(20.0, "20171122T0300Z")];
        let result =
            MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, Some("height"), None)
                .unwrap()
                .process(&inputs, None);
        assert!(matches!(result, Err(BlendError::Merge(_))));
    }

    #[test]
    fn single_cube_unchanged() {
        let input = cube(10.0, "20171122T0000Z");
        let result = MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, None, None)
            .unwrap()
            .process(&[input.clone()], None)
            .unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn single_model_cube_unchanged() {
        let merger = MergeCubesForWeightedBlending::new("model", None, Some(MODEL_ATTR)).unwrap();
        let target = cycletime("20171122T0300Z");
        for input in [
            model_cube(10.0, "20171122T0000Z", "uk_det"),
            cube(10.0, "20171122T0000Z"),
        ] {
            let result = merger.process(&[input.clone()], Some(&target)).unwrap();
            assert_eq!(result, input);
            assert!(!result.has_coord(MODEL_ID));
            assert!(!result.has_coord(MODEL_CONFIGURATION));
        }
    }

    #[test]
    fn duplicate_points_rejected() {
        let inputs = vec![cube(10.0, "20171122T0000Z"), cube(20.0, "20171122T0000Z")];
        let result = MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, None, None)
            .unwrap()
            .process(&inputs, None);
        assert!(matches!(result, Err(BlendError::Merge(_))));
    }

    #[test]
    fn mismatched_grids_rejected() {
        let other = set_up_variable_cube(
            Array2::from_elem((2, 2), 20.0),
            cycletime("20171122T0600Z"),
            cycletime("20171122T0300Z"),
        )
        .unwrap();
        let inputs = vec![cube(10.0, "20171122T0000Z"), other];
        let result = MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, None, None)
            .unwrap()
            .process(&inputs, None);
        assert!(matches!(result, Err(BlendError::Merge(_))));
    }

    #[test]
    fn masks_stacked() {
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[1, 1]] = true;
        let masked = cube(10.0, "20171122T0000Z")
            .with_mask(mask.into_dyn())
            .unwrap();
        let inputs = vec![masked, cube(20.0, "20171122T0300Z")];
        let result = MergeCubesForWeightedBlending::new(FORECAST_REFERENCE_TIME, None, None)
            .unwrap()
            .process(&inputs, None)
            .unwrap();

        let mask = result.mask().unwrap();
        assert!(mask[[0, 1, 1]]);
        assert!(!mask[[1, 1, 1]]);
        assert_eq!(mask.iter().filter(|m| **m).count(), 1);
    }
}
