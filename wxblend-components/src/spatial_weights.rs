//! Spatially varying blend weights derived from missing-data masks
//!
//! Where a realization is masked it gets no weight. Near the edge of its masked region its
//! weight ramps up over `fuzzy_length` grid cells, so blended fields have no sharp seams at
//! domain boundaries.

use log::debug;
use ndarray::{Array2, Array3, ArrayView2, Axis, Ix2, Zip};
use serde::{Deserialize, Serialize};
use wxblend_core::cube::{Cube, FloatValue};
use wxblend_core::errors::{BlendError, BlendResult};
use wxblend_core::spatial::spatial_axes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatiallyVaryingWeightsFromMask {
    blend_coord: String,
    /// Distance in grid cells over which weights ramp up from a masked region
    fuzzy_length: FloatValue,
}

impl SpatiallyVaryingWeightsFromMask {
    pub fn new(blend_coord: &str, fuzzy_length: FloatValue) -> Self {
        Self {
            blend_coord: blend_coord.to_string(),
            fuzzy_length,
        }
    }

    /// Weights for one realization in `[0, 1]`, from its `(y, x)` mask
    fn fuzzy_weights(&self, mask: ArrayView2<bool>) -> Array2<FloatValue> {
        let (ny, nx) = mask.dim();
        if !mask.iter().any(|&m| m) {
            return Array2::ones((ny, nx));
        }
        // A window as wide as the grid already reaches every cell
        let radius = self.fuzzy_length.ceil().min(ny.max(nx) as FloatValue) as isize;

        Array2::from_shape_fn((ny, nx), |(j, k)| {
            if mask[[j, k]] {
                return 0.0;
            }
            let mut nearest = FloatValue::INFINITY;
            for dj in -radius..=radius {
                for dk in -radius..=radius {
                    let (jj, kk) = (j as isize + dj, k as isize + dk);
                    if jj < 0 || kk < 0 || jj >= ny as isize || kk >= nx as isize {
                        continue;
                    }
                    if mask[[jj as usize, kk as usize]] {
                        nearest = nearest.min(((dj * dj + dk * dk) as FloatValue).sqrt());
                    }
                }
            }
            (nearest / self.fuzzy_length).min(1.0)
        })
    }

    /// The 1D weights as a vector, checking they lie along the blend coordinate
    fn blend_weights(&self, weights: &Cube, expected: usize) -> BlendResult<Vec<FloatValue>> {
        if weights.ndim() != 1 || weights.dim_coords()[0].name() != self.blend_coord {
            return Err(BlendError::Weights(format!(
                "Weights to refine must be 1D along {}",
                self.blend_coord
            )));
        }
        if weights.shape()[0] != expected {
            return Err(BlendError::Weights(format!(
                "Got {} weights for {} points of {}",
                weights.shape()[0],
                expected,
                self.blend_coord
            )));
        }
        Ok(weights.data().iter().copied().collect())
    }

    /// Combine 1D blend weights with the mask of each realization
    ///
    /// The result has dimensions `(blend_coord, y, x)` and is normalised along `blend_coord`
    /// wherever any realization has weight.
    pub fn process(&self, cube: &Cube, weights: &Cube) -> BlendResult<Cube> {
        if self.fuzzy_length.is_nan() || self.fuzzy_length <= 0.0 {
            return Err(BlendError::Weights(format!(
                "fuzzy_length must be > 0, got {}",
                self.fuzzy_length
            )));
        }
        let blend_axis = cube
            .dim_coords()
            .iter()
            .position(|c| c.name() == self.blend_coord)
            .ok_or_else(|| {
                BlendError::Weights(format!(
                    "{} is not a dimension of cube {}",
                    self.blend_coord,
                    cube.name()
                ))
            })?;
        let (y_axis, x_axis) = spatial_axes(cube)?;
        if cube.ndim() != 3 {
            return Err(BlendError::Weights(format!(
                "Spatial weights need a cube with only {}, y and x dimensions, got {:?}",
                self.blend_coord,
                cube.coord_names()
            )));
        }

        let shape = cube.shape();
        let (n, ny, nx) = (shape[blend_axis], shape[y_axis], shape[x_axis]);
        let blend_weights = self.blend_weights(weights, n)?;

        let mut result = Array3::<FloatValue>::zeros((n, ny, nx));
        for (index, weight) in blend_weights.iter().enumerate() {
            let fuzzy = match cube.mask() {
                Some(mask) => {
                    let slice = mask
                        .index_axis(Axis(blend_axis), index)
                        .into_dimensionality::<Ix2>()?;
                    if y_axis < x_axis {
                        self.fuzzy_weights(slice)
                    } else {
                        self.fuzzy_weights(slice.reversed_axes())
                    }
                }
                None => Array2::ones((ny, nx)),
            };
            result
                .index_axis_mut(Axis(0), index)
                .assign(&(fuzzy * *weight));
        }

        let totals = result.sum_axis(Axis(0));
        for mut layer in result.axis_iter_mut(Axis(0)) {
            Zip::from(&mut layer).and(&totals).for_each(|w, &total| {
                if total > 0.0 {
                    *w /= total;
                }
            });
        }
        debug!(
            "Spatial weights over {} with fuzzy length {} cells",
            self.blend_coord, self.fuzzy_length
        );

        Cube::new(
            "weights",
            "1",
            result.into_dyn(),
            vec![
                cube.dim_coords()[blend_axis].clone(),
                cube.dim_coords()[y_axis].clone(),
                cube.dim_coords()[x_axis].clone(),
            ],
        )
    }
}
