//! Metadata utilities shared by the blending plugins
//!
//! Attribute amendment and forecast-time rebadging are applied both after a weighted blend
//! and when a single input is passed through without blending.

use crate::cube::{Attributes, Coord, Cube, FloatValue};
use crate::errors::{BlendError, BlendResult};
use crate::time::{CycleTime, SECONDS, SECONDS_SINCE_EPOCH};
use log::debug;

pub const TIME: &str = "time";
pub const FORECAST_REFERENCE_TIME: &str = "forecast_reference_time";
pub const FORECAST_PERIOD: &str = "forecast_period";
pub const BLEND_TIME: &str = "blend_time";
pub const MODEL_ID: &str = "model_id";
pub const MODEL_CONFIGURATION: &str = "model_configuration";

/// Attribute value that requests removal in [`amend_attributes`]
pub const REMOVE_ATTRIBUTE: &str = "remove";
/// Attribute key carrying the deprecation advisory on forecast time coordinates
pub const DEPRECATION_MESSAGE: &str = "deprecation_message";

/// Blend coordinates that identify a forecast cycle or model source
pub const CYCLE_BLEND_COORDS: [&str; 2] = [FORECAST_REFERENCE_TIME, MODEL_ID];

/// True if blending over `blend_coord` combines different models
pub fn is_model_blend(blend_coord: &str) -> bool {
    blend_coord.contains("model")
}

/// True if blending over `blend_coord` stamps cycle metadata (blend time, deprecations)
pub fn is_cycle_blend(blend_coord: &str) -> bool {
    CYCLE_BLEND_COORDS.contains(&blend_coord)
}

/// Apply attribute changes in place
///
/// A value of `"remove"` deletes the attribute, any other value adds or overwrites it.
pub fn amend_attributes(cube: &mut Cube, attributes: &Attributes) {
    for (key, value) in attributes {
        if value == REMOVE_ATTRIBUTE {
            cube.attributes_mut().remove(key);
        } else {
            cube.attributes_mut().insert(key.clone(), value.clone());
        }
    }
}

/// Attach (or replace) a scalar `blend_time` coordinate
pub fn add_blend_time(cube: &mut Cube, cycletime: &CycleTime) -> BlendResult<()> {
    cube.set_aux_coord(
        Coord::scalar(BLEND_TIME, SECONDS_SINCE_EPOCH, cycletime.seconds()),
        None,
    )
}

/// Stamp a deprecation advisory on the forecast period and reference time coordinates
///
/// Both coordinates must be present.
pub fn mark_deprecated_forecast_coords(cube: &mut Cube) -> BlendResult<()> {
    for name in [FORECAST_PERIOD, FORECAST_REFERENCE_TIME] {
        let coord = cube
            .coord_mut(name)
            .ok_or_else(|| BlendError::CoordinateNotFound(name.to_string()))?;
        coord.attributes_mut().insert(
            DEPRECATION_MESSAGE.to_string(),
            format!("{} will be removed in future and should not be used", name),
        );
    }
    Ok(())
}

/// Latest forecast reference time across cubes, in seconds since the epoch
pub fn latest_forecast_reference_time(cubes: &[Cube]) -> BlendResult<FloatValue> {
    let mut latest: Option<FloatValue> = None;
    for cube in cubes {
        for &value in cube.require_coord(FORECAST_REFERENCE_TIME)?.numeric_points()? {
            latest = Some(latest.map_or(value, |current: FloatValue| current.max(value)));
        }
    }
    latest.ok_or_else(|| BlendError::CoordinateNotFound(FORECAST_REFERENCE_TIME.to_string()))
}

/// Set the forecast reference time of a cube, recalculating the forecast period from its
/// validity time
pub fn rebadge_forecast(cube: &mut Cube, reference_time: FloatValue) -> BlendResult<()> {
    let time = cube.require_coord(TIME)?;
    let time_dim = cube.coord_dim(TIME);
    let periods: Vec<FloatValue> = time
        .numeric_points()?
        .iter()
        .map(|t| t - reference_time)
        .collect();

    let mut period = Coord::numeric(FORECAST_PERIOD, SECONDS, periods);
    let mut reference = Coord::scalar(
        FORECAST_REFERENCE_TIME,
        SECONDS_SINCE_EPOCH,
        reference_time,
    );
    if let Some(existing) = cube.coord(FORECAST_PERIOD) {
        *period.attributes_mut() = existing.attributes().clone();
    }
    if let Some(existing) = cube.coord(FORECAST_REFERENCE_TIME) {
        *reference.attributes_mut() = existing.attributes().clone();
    }

    cube.set_aux_coord(period, time_dim)?;
    cube.set_aux_coord(reference, None)
}

/// Rebadge forecasts so they share a single forecast reference time
///
/// The reference time is `cycletime` if given, otherwise the latest reference time found on
/// the inputs. With no cycle time and at most one cube there is nothing to unify and the input
/// is returned unchanged.
pub fn rebadge_forecasts_as_latest_cycle(
    cubes: Vec<Cube>,
    cycletime: Option<&CycleTime>,
) -> BlendResult<Vec<Cube>> {
    if cycletime.is_none() && cubes.len() <= 1 {
        return Ok(cubes);
    }
    let reference_time = match cycletime {
        Some(cycletime) => cycletime.seconds(),
        None => latest_forecast_reference_time(&cubes)?,
    };
    debug!(
        "Rebadging {} cube(s) to forecast reference time {}",
        cubes.len(),
        reference_time
    );
    cubes
        .into_iter()
        .map(|mut cube| {
            rebadge_forecast(&mut cube, reference_time)?;
            Ok(cube)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_cubes::set_up_variable_cube;
    use ndarray::Array2;

    fn cycletime(value: &str) -> CycleTime {
        CycleTime::parse(value).unwrap()
    }

    fn cube_at(validity: &str, reference: &str) -> Cube {
        set_up_variable_cube(
            Array2::from_elem((3, 3), 280.0),
            cycletime(validity),
            cycletime(reference),
        )
        .unwrap()
    }

    fn point(cube: &Cube, name: &str) -> FloatValue {
        cube.coord(name).unwrap().numeric_points().unwrap()[0]
    }

    #[test]
    fn amend_adds_overwrites_and_removes() {
        let mut cube = cube_at("20171122T0600Z", "20171122T0000Z")
            .with_attribute("source", "Met Office")
            .with_attribute("history", "old");
        let changes = Attributes::from([
            ("source".to_string(), "IMPROVER".to_string()),
            ("history".to_string(), "remove".to_string()),
            ("title".to_string(), "Blended forecast".to_string()),
        ]);
        amend_attributes(&mut cube, &changes);

        assert_eq!(cube.attributes().get("source").unwrap(), "IMPROVER");
        assert_eq!(cube.attributes().get("title").unwrap(), "Blended forecast");
        assert!(!cube.attributes().contains_key("history"));
    }

    #[test]
    fn single_cube_without_cycletime_unchanged() {
        let cube = cube_at("20171122T0600Z", "20171122T0000Z");
        let result = rebadge_forecasts_as_latest_cycle(vec![cube.clone()], None).unwrap();
        assert_eq!(result, vec![cube]);
    }

    #[test]
    fn rebadge_to_cycletime() {
        let cube = cube_at("20171122T0600Z", "20171122T0000Z");
        let target = cycletime("20171122T0200Z");
        let result = rebadge_forecasts_as_latest_cycle(vec![cube], Some(&target)).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(point(&result[0], FORECAST_REFERENCE_TIME), target.seconds());
        assert_eq!(point(&result[0], FORECAST_PERIOD), 4.0 * 3600.0);
    }

    #[test]
    fn rebadge_to_latest_input_cycle() {
        let early = cube_at("20171122T0600Z", "20171122T0000Z");
        let late = cube_at("20171122T0600Z", "20171122T0300Z");
        let result = rebadge_forecasts_as_latest_cycle(vec![early, late], None).unwrap();

        let latest = cycletime("20171122T0300Z").seconds();
        for cube in &result {
            assert_eq!(point(cube, FORECAST_REFERENCE_TIME), latest);
            assert_eq!(point(cube, FORECAST_PERIOD), 3.0 * 3600.0);
        }
    }

    #[test]
    fn rebadge_requires_time() {
        let mut cube = cube_at("20171122T0600Z", "20171122T0000Z");
        cube.remove_coord(TIME);
        let target = cycletime("20171122T0200Z");
        assert!(matches!(
            rebadge_forecasts_as_latest_cycle(vec![cube], Some(&target)),
            Err(BlendError::CoordinateNotFound(name)) if name == TIME
        ));
    }

    #[test]
    fn blend_time_and_deprecations() {
        let mut cube = cube_at("20171122T0600Z", "20171122T0000Z");
        let target = cycletime("20171122T0100Z");
        add_blend_time(&mut cube, &target).unwrap();
        add_blend_time(&mut cube, &target).unwrap();
        mark_deprecated_forecast_coords(&mut cube).unwrap();

        assert_eq!(point(&cube, BLEND_TIME), target.seconds());
        for name in [FORECAST_PERIOD, FORECAST_REFERENCE_TIME] {
            assert_eq!(
                cube.coord(name).unwrap().attributes()[DEPRECATION_MESSAGE],
                format!("{} will be removed in future and should not be used", name)
            );
        }
    }

    #[test]
    fn deprecation_requires_coords() {
        let mut cube = cube_at("20171122T0600Z", "20171122T0000Z");
        cube.remove_coord(FORECAST_PERIOD);
        assert!(mark_deprecated_forecast_coords(&mut cube).is_err());
    }

    #[test]
    fn blend_coordinate_kinds() {
        assert!(is_model_blend("model"));
        assert!(is_model_blend("model_id"));
        assert!(!is_model_blend("forecast_reference_time"));
        assert!(is_cycle_blend("forecast_reference_time"));
        assert!(is_cycle_blend("model_id"));
        assert!(!is_cycle_blend("realization"));
    }
}
