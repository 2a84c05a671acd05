//! Grid geometry checks used before spatially varying weights are calculated

use crate::cube::{Cube, FloatValue};
use crate::errors::{BlendError, BlendResult};

pub const PROJECTION_X: &str = "projection_x_coordinate";
pub const PROJECTION_Y: &str = "projection_y_coordinate";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Relative tolerance used when comparing grid spacings
const SPACING_TOLERANCE: FloatValue = 1e-5;

/// Axes of the horizontal grid, as `(y_axis, x_axis)`
pub fn spatial_axes(cube: &Cube) -> BlendResult<(usize, usize)> {
    let find = |names: [&str; 2]| {
        names
            .iter()
            .find_map(|name| cube.dim_coords().iter().position(|c| c.name() == *name))
    };
    let y_axis = find([PROJECTION_Y, LATITUDE]).ok_or_else(|| {
        BlendError::Geometry(format!("cube {} has no y dimension coordinate", cube.name()))
    })?;
    let x_axis = find([PROJECTION_X, LONGITUDE]).ok_or_else(|| {
        BlendError::Geometry(format!("cube {} has no x dimension coordinate", cube.name()))
    })?;
    Ok((y_axis, x_axis))
}

/// Spacing of a regularly spaced coordinate, converted to metres
fn regular_spacing(cube: &Cube, name: &str) -> BlendResult<FloatValue> {
    let coord = cube.require_coord(name)?;
    let points = coord.numeric_points()?;
    if points.len() < 2 {
        return Err(BlendError::Geometry(format!(
            "{} needs at least two points to define a grid spacing",
            name
        )));
    }
    let spacing = points[1] - points[0];
    let regular = points
        .windows(2)
        .all(|w| ((w[1] - w[0]) - spacing).abs() <= SPACING_TOLERANCE * spacing.abs());
    if !regular || spacing == 0.0 {
        return Err(BlendError::Geometry(format!("{} is not regularly spaced", name)));
    }

    let scale = match coord.units() {
        "m" | "metres" | "meters" => 1.0,
        "km" | "kilometres" | "kilometers" => 1000.0,
        other => {
            return Err(BlendError::Geometry(format!(
                "{} has units '{}', expected a length",
                name, other
            )))
        }
    };
    Ok(spacing.abs() * scale)
}

/// Check that a cube is on an equal-area grid with equal spacing in x and y
pub fn check_if_grid_is_equal_area(cube: &Cube) -> BlendResult<()> {
    match cube.coord_system() {
        Some(system) if system.is_equal_area() => {}
        Some(system) => {
            return Err(BlendError::Geometry(format!(
                "Unable to convert from {} to an equal area grid",
                system
            )))
        }
        None => {
            return Err(BlendError::Geometry(format!(
                "cube {} has no coordinate system",
                cube.name()
            )))
        }
    }
    for name in [PROJECTION_X, PROJECTION_Y] {
        if !cube.is_dim_coord(name) {
            return Err(BlendError::Geometry(format!(
                "{} is not a dimension coordinate of cube {}",
                name,
                cube.name()
            )));
        }
    }

    let x_spacing = regular_spacing(cube, PROJECTION_X)?;
    let y_spacing = regular_spacing(cube, PROJECTION_Y)?;
    if (x_spacing - y_spacing).abs() > SPACING_TOLERANCE * x_spacing {
        return Err(BlendError::Geometry(format!(
            "Grid does not have equal spacing in x and y dimensions: {} m, {} m",
            x_spacing, y_spacing
        )));
    }
    Ok(())
}

/// Convert a distance in metres into a number of grid cells
///
/// Assumes an equal-area grid, see [`check_if_grid_is_equal_area`]. With `return_int` the result
/// is rounded to a whole number of cells, which must be at least one.
pub fn distance_to_number_of_grid_cells(
    cube: &Cube,
    distance: FloatValue,
    return_int: bool,
) -> BlendResult<FloatValue> {
    if distance.is_nan() || distance <= 0.0 {
        return Err(BlendError::Geometry(format!(
            "Please specify a positive distance in metres, got {}",
            distance
        )));
    }
    let cells = distance / regular_spacing(cube, PROJECTION_X)?;
    if !return_int {
        return Ok(cells);
    }
    let rounded = cells.round();
    if rounded == 0.0 {
        return Err(BlendError::Geometry(format!(
            "Distance of {} m gives zero cell extent",
            distance
        )));
    }
    Ok(rounded)
}
