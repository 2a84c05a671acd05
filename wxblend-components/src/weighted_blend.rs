//! Weighted mean across a whole dimension of a cube

use log::debug;
use ndarray::{ArrayD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};
use wxblend_core::cube::{Attributes, Coord, Cube, FloatValue};
use wxblend_core::errors::{BlendError, BlendResult};
use wxblend_core::metadata::{
    add_blend_time, amend_attributes, is_cycle_blend, latest_forecast_reference_time,
    mark_deprecated_forecast_coords, rebadge_forecast, FORECAST_REFERENCE_TIME, TIME,
};
use wxblend_core::time::CycleTime;

/// Collapse a dimension using a weighted mean
///
/// Masked points contribute no weight. Output points where every input is masked (or carries
/// zero weight) are masked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedBlendAcrossWholeDimension {
    blend_coord: String,
}

impl WeightedBlendAcrossWholeDimension {
    pub fn new(blend_coord: &str) -> Self {
        Self {
            blend_coord: blend_coord.to_string(),
        }
    }

    /// Expand weights to the shape of the cube, matching dimensions by coordinate name
    fn expand_weights(&self, cube: &Cube, weights: &Cube) -> BlendResult<ArrayD<FloatValue>> {
        if !weights.is_dim_coord(&self.blend_coord) {
            return Err(BlendError::Blending(format!(
                "weights must have {} as a dimension",
                self.blend_coord
            )));
        }

        let mut axes = Vec::with_capacity(weights.ndim());
        for coord in weights.dim_coords() {
            let axis = cube
                .dim_coords()
                .iter()
                .position(|c| c.name() == coord.name())
                .ok_or_else(|| {
                    BlendError::Blending(format!(
                        "weights dimension {} is not a dimension of cube {}",
                        coord.name(),
                        cube.name()
                    ))
                })?;
            if cube.dim_coords()[axis].points() != coord.points() {
                return Err(BlendError::Blending(format!(
                    "weights {} points do not match those of cube {}",
                    coord.name(),
                    cube.name()
                )));
            }
            axes.push(axis);
        }

        // Reorder the weight dimensions to follow the cube, then insert the missing ones
        let mut order: Vec<usize> = (0..axes.len()).collect();
        order.sort_by_key(|&i| axes[i]);
        let present: Vec<usize> = order.iter().map(|&i| axes[i]).collect();
        let mut view = weights.data().view().permuted_axes(order);
        for axis in 0..cube.ndim() {
            if !present.contains(&axis) {
                view = view.insert_axis(Axis(axis));
            }
        }

        let expanded = view
            .broadcast(IxDyn(cube.shape()))
            .ok_or_else(|| {
                BlendError::Blending(format!(
                    "weights of shape {:?} cannot be broadcast to cube shape {:?}",
                    weights.shape(),
                    cube.shape()
                ))
            })?
            .to_owned();
        Ok(expanded)
    }

    /// Copy the metadata of `cube` onto collapsed data, dropping `axis`
    fn collapsed_cube(
        &self,
        cube: &Cube,
        axis: usize,
        data: ArrayD<FloatValue>,
        mask: ArrayD<bool>,
    ) -> BlendResult<Cube> {
        let dim_coords: Vec<Coord> = cube
            .dim_coords()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != axis)
            .map(|(_, c)| c.clone())
            .collect();
        let mut result = Cube::new(cube.name(), cube.units(), data, dim_coords)?;

        for aux in cube.aux_coords() {
            let dim = match aux.dim {
                Some(d) if d == axis => {
                    debug!("Removing {} which spans {}", aux.coord.name(), self.blend_coord);
                    continue;
                }
                Some(d) if d > axis => Some(d - 1),
                other => other,
            };
            result.add_aux_coord(aux.coord.clone(), dim)?;
        }
        *result.attributes_mut() = cube.attributes().clone();
        if let Some(system) = cube.coord_system() {
            result = result.with_coord_system(system.clone());
        }
        if mask.iter().any(|&m| m) {
            result = result.with_mask(mask)?;
        }
        Ok(result)
    }

    /// Rebadge the blended forecast to a single cycle
    ///
    /// Uses `cycletime` if given, otherwise the latest input reference time.
    fn update_time_metadata(
        &self,
        cube: &Cube,
        result: &mut Cube,
        cycletime: Option<&CycleTime>,
    ) -> BlendResult<()> {
        if !result.has_coord(TIME) {
            return Ok(());
        }
        let reference_time = match cycletime {
            Some(cycletime) => Some(cycletime.seconds()),
            None if cube.has_coord(FORECAST_REFERENCE_TIME) => Some(
                latest_forecast_reference_time(std::slice::from_ref(cube))?,
            ),
            None => None,
        };
        if let Some(reference_time) = reference_time {
            rebadge_forecast(result, reference_time)?;
        }

        match cycletime {
            Some(cycletime) if is_cycle_blend(&self.blend_coord) => {
                add_blend_time(result, cycletime)?;
                mark_deprecated_forecast_coords(result)
            }
            _ => Ok(()),
        }
    }

    pub fn process(
        &self,
        cube: &Cube,
        weights: Option<&Cube>,
        cycletime: Option<&CycleTime>,
        attributes: Option<&Attributes>,
    ) -> BlendResult<Cube> {
        let axis = cube
            .dim_coords()
            .iter()
            .position(|c| c.name() == self.blend_coord)
            .ok_or_else(|| {
                BlendError::Blending(format!(
                    "{} is not a dimension coordinate of cube {}",
                    self.blend_coord,
                    cube.name()
                ))
            })?;

        let weights = match weights {
            Some(weights) => self.expand_weights(cube, weights)?,
            None => ArrayD::from_elem(IxDyn(cube.shape()), 1.0),
        };
        if weights.iter().any(|w| w.is_nan() || *w < 0.0) {
            return Err(BlendError::Blending(
                "weights must be non-negative numbers".to_string(),
            ));
        }

        let effective = match cube.mask() {
            Some(mask) => Zip::from(&weights)
                .and(mask)
                .map_collect(|&w, &masked| if masked { 0.0 } else { w }),
            None => weights,
        };
        let contributions = Zip::from(&effective)
            .and(cube.data())
            .map_collect(|&w, &value| if w > 0.0 { w * value } else { 0.0 });

        let totals = effective.sum_axis(Axis(axis));
        let sums = contributions.sum_axis(Axis(axis));
        let data = Zip::from(&sums)
            .and(&totals)
            .map_collect(|&sum, &total| if total > 0.0 { sum / total } else { 0.0 });
        let mask = totals.mapv(|total| total <= 0.0);

        let mut result = self.collapsed_cube(cube, axis, data, mask)?;
        self.update_time_metadata(cube, &mut result, cycletime)?;
        if let Some(attributes) = attributes {
            amend_attributes(&mut result, attributes);
        }
        debug!(
            "Blended {} points of {} into {}",
            cube.shape()[axis],
            self.blend_coord,
            result.name()
        );
        Ok(result)
    }
}
