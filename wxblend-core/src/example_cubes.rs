//! Ready-made cubes for exercising the blending plugins

use crate::cube::{Coord, CoordSystem, Cube, FloatValue};
use crate::errors::BlendResult;
use crate::metadata::{FORECAST_PERIOD, FORECAST_REFERENCE_TIME, TIME};
use crate::spatial::{PROJECTION_X, PROJECTION_Y};
use crate::time::{CycleTime, SECONDS, SECONDS_SINCE_EPOCH};
use ndarray::Array2;

/// Grid spacing of [`set_up_variable_cube`] in metres
pub const GRID_SPACING: FloatValue = 2000.0;

/// Air temperature on an equal-area grid with scalar time coordinates
///
/// Rows map to `projection_y_coordinate` and columns to `projection_x_coordinate`, both spaced
/// [`GRID_SPACING`] apart.
pub fn set_up_variable_cube(
    data: Array2<FloatValue>,
    time: CycleTime,
    frt: CycleTime,
) -> BlendResult<Cube> {
    let (ny, nx) = data.dim();
    let axis = |n: usize| -> Vec<FloatValue> {
        (0..n).map(|i| i as FloatValue * GRID_SPACING).collect()
    };

    Cube::new(
        "air_temperature",
        "K",
        data.into_dyn(),
        vec![
            Coord::numeric(PROJECTION_Y, "m", axis(ny)),
            Coord::numeric(PROJECTION_X, "m", axis(nx)),
        ],
    )?
    .with_coord_system(CoordSystem::LambertAzimuthalEqualArea)
    .with_attribute("institution", "Met Office")
    .with_aux_coord(Coord::scalar(TIME, SECONDS_SINCE_EPOCH, time.seconds()), None)?
    .with_aux_coord(
        Coord::scalar(FORECAST_REFERENCE_TIME, SECONDS_SINCE_EPOCH, frt.seconds()),
        None,
    )?
    .with_aux_coord(
        Coord::scalar(FORECAST_PERIOD, SECONDS, time.seconds() - frt.seconds()),
        None,
    )
}
