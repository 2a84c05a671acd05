//! Labelled n-dimensional forecast fields
//!
//! A [`Cube`] holds an `ndarray` payload together with the metadata needed to blend it:
//! one dimension coordinate per axis, auxiliary coordinates (scalar or spanning a single
//! dimension), string attributes, an optional missing-data mask and an optional coordinate
//! system.
//!
//! # Examples
//!
//! ```rust
//! use ndarray::array;
//! use wxblend_core::cube::{Coord, Cube};
//!
//! let cube = Cube::new(
//!     "air_temperature",
//!     "K",
//!     array![[280.0, 281.0], [282.0, 283.0]].into_dyn(),
//!     vec![
//!         Coord::numeric("projection_y_coordinate", "m", vec![0.0, 2000.0]),
//!         Coord::numeric("projection_x_coordinate", "m", vec![0.0, 2000.0]),
//!     ],
//! )
//! .unwrap()
//! .with_aux_coord(Coord::scalar("forecast_period", "seconds", 3600.0), None)
//! .unwrap();
//!
//! assert_eq!(cube.shape(), &[2, 2]);
//! assert_eq!(cube.coord_dim("projection_x_coordinate"), Some(1));
//! assert!(cube.coord("forecast_period").unwrap().is_scalar());
//! ```

use crate::errors::{BlendError, BlendResult};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type FloatValue = f64;

/// String attributes attached to a cube or coordinate
pub type Attributes = BTreeMap<String, String>;

/// Points held by a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordPoints {
    Numeric(Vec<FloatValue>),
    Labels(Vec<String>),
}

impl CoordPoints {
    pub fn len(&self) -> usize {
        match self {
            CoordPoints::Numeric(values) => values.len(),
            CoordPoints::Labels(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[FloatValue]> {
        match self {
            CoordPoints::Numeric(values) => Some(values),
            CoordPoints::Labels(_) => None,
        }
    }

    pub fn as_labels(&self) -> Option<&[String]> {
        match self {
            CoordPoints::Numeric(_) => None,
            CoordPoints::Labels(values) => Some(values),
        }
    }

    /// Text form of a single point, used when points act as lookup keys
    pub fn label(&self, index: usize) -> Option<String> {
        match self {
            CoordPoints::Numeric(values) => values.get(index).map(|v| v.to_string()),
            CoordPoints::Labels(values) => values.get(index).cloned(),
        }
    }

    /// Join points of the same kind end to end
    ///
    /// Returns `None` if numeric and label points are mixed.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a CoordPoints>) -> Option<CoordPoints> {
        let mut iter = parts.into_iter();
        let mut joined = iter.next()?.clone();
        for part in iter {
            match (&mut joined, part) {
                (CoordPoints::Numeric(acc), CoordPoints::Numeric(next)) => {
                    acc.extend_from_slice(next)
                }
                (CoordPoints::Labels(acc), CoordPoints::Labels(next)) => {
                    acc.extend(next.iter().cloned())
                }
                _ => return None,
            }
        }
        Some(joined)
    }
}

/// A named set of points describing one axis (or a scalar property) of a cube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    name: String,
    units: String,
    points: CoordPoints,
    attributes: Attributes,
}

impl Coord {
    pub fn new(name: &str, units: &str, points: CoordPoints) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            points,
            attributes: Attributes::new(),
        }
    }

    pub fn numeric(name: &str, units: &str, points: Vec<FloatValue>) -> Self {
        Self::new(name, units, CoordPoints::Numeric(points))
    }

    pub fn labels(name: &str, points: Vec<String>) -> Self {
        Self::new(name, "no_unit", CoordPoints::Labels(points))
    }

    /// Single-valued numeric coordinate
    pub fn scalar(name: &str, units: &str, value: FloatValue) -> Self {
        Self::numeric(name, units, vec![value])
    }

    /// Single-valued label coordinate
    pub fn scalar_label(name: &str, value: &str) -> Self {
        Self::labels(name, vec![value.to_string()])
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn points(&self) -> &CoordPoints {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.len() == 1
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Numeric points, or an error naming the coordinate if it holds labels
    pub fn numeric_points(&self) -> BlendResult<&[FloatValue]> {
        self.points.as_numeric().ok_or_else(|| {
            BlendError::Error(format!("Coordinate {} does not hold numeric points", self.name))
        })
    }
}

/// Coordinate that is either scalar (`dim == None`) or spans one cube dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxCoord {
    pub coord: Coord,
    pub dim: Option<usize>,
}

/// Horizontal coordinate reference system of a cube
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordSystem {
    LambertAzimuthalEqualArea,
    LatitudeLongitude,
    Other(String),
}

impl CoordSystem {
    pub fn is_equal_area(&self) -> bool {
        matches!(self, CoordSystem::LambertAzimuthalEqualArea)
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSystem::LambertAzimuthalEqualArea => write!(f, "LambertAzimuthalEqualArea"),
            CoordSystem::LatitudeLongitude => write!(f, "LatitudeLongitude"),
            CoordSystem::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A labelled forecast field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    name: String,
    units: String,
    data: ArrayD<FloatValue>,
    /// `true` marks a missing value
    mask: Option<ArrayD<bool>>,
    dim_coords: Vec<Coord>,
    aux_coords: Vec<AuxCoord>,
    attributes: Attributes,
    coord_system: Option<CoordSystem>,
}

impl Cube {
    /// Create a cube, checking that there is one dimension coordinate per axis and that each
    /// matches the length of its axis.
    pub fn new(
        name: &str,
        units: &str,
        data: ArrayD<FloatValue>,
        dim_coords: Vec<Coord>,
    ) -> BlendResult<Self> {
        if dim_coords.len() != data.ndim() {
            return Err(BlendError::Error(format!(
                "Cube {} has {} dimensions but {} dimension coordinates were supplied",
                name,
                data.ndim(),
                dim_coords.len()
            )));
        }
        for (axis, coord) in dim_coords.iter().enumerate() {
            if coord.len() != data.shape()[axis] {
                return Err(BlendError::Error(format!(
                    "Coordinate {} has {} points but dimension {} of cube {} has length {}",
                    coord.name(),
                    coord.len(),
                    axis,
                    name,
                    data.shape()[axis]
                )));
            }
            if dim_coords[..axis].iter().any(|c| c.name() == coord.name()) {
                return Err(BlendError::Error(format!(
                    "Duplicate coordinate {} on cube {}",
                    coord.name(),
                    name
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            units: units.to_string(),
            data,
            mask: None,
            dim_coords,
            aux_coords: vec![],
            attributes: Attributes::new(),
            coord_system: None,
        })
    }

    /// Attach a missing-data mask of the same shape as the data
    pub fn with_mask(mut self, mask: ArrayD<bool>) -> BlendResult<Self> {
        if mask.shape() != self.data.shape() {
            return Err(BlendError::Error(format!(
                "Mask shape {:?} does not match data shape {:?} on cube {}",
                mask.shape(),
                self.data.shape(),
                self.name
            )));
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn with_aux_coord(mut self, coord: Coord, dim: Option<usize>) -> BlendResult<Self> {
        self.add_aux_coord(coord, dim)?;
        Ok(self)
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_coord_system(mut self, coord_system: CoordSystem) -> Self {
        self.coord_system = Some(coord_system);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn data(&self) -> &ArrayD<FloatValue> {
        &self.data
    }

    pub fn mask(&self) -> Option<&ArrayD<bool>> {
        self.mask.as_ref()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn dim_coords(&self) -> &[Coord] {
        &self.dim_coords
    }

    pub fn aux_coords(&self) -> &[AuxCoord] {
        &self.aux_coords
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn coord_system(&self) -> Option<&CoordSystem> {
        self.coord_system.as_ref()
    }

    /// True if any value is masked
    pub fn is_masked(&self) -> bool {
        self.mask
            .as_ref()
            .map_or(false, |mask| mask.iter().any(|&m| m))
    }

    pub fn coord(&self, name: &str) -> Option<&Coord> {
        self.dim_coords
            .iter()
            .find(|c| c.name() == name)
            .or_else(|| {
                self.aux_coords
                    .iter()
                    .map(|a| &a.coord)
                    .find(|c| c.name() == name)
            })
    }

    pub fn coord_mut(&mut self, name: &str) -> Option<&mut Coord> {
        if let Some(index) = self.dim_coords.iter().position(|c| c.name() == name) {
            return Some(&mut self.dim_coords[index]);
        }
        self.aux_coords
            .iter_mut()
            .map(|a| &mut a.coord)
            .find(|c| c.name() == name)
    }

    /// Look up a coordinate, failing if it is absent
    pub fn require_coord(&self, name: &str) -> BlendResult<&Coord> {
        self.coord(name)
            .ok_or_else(|| BlendError::CoordinateNotFound(name.to_string()))
    }

    pub fn has_coord(&self, name: &str) -> bool {
        self.coord(name).is_some()
    }

    /// Names of all dimension and auxiliary coordinates
    pub fn coord_names(&self) -> Vec<&str> {
        self.dim_coords
            .iter()
            .map(|c| c.name())
            .chain(self.aux_coords.iter().map(|a| a.coord.name()))
            .collect()
    }

    /// Axis spanned by a coordinate, `None` for scalar or absent coordinates
    pub fn coord_dim(&self, name: &str) -> Option<usize> {
        self.dim_coords
            .iter()
            .position(|c| c.name() == name)
            .or_else(|| {
                self.aux_coords
                    .iter()
                    .find(|a| a.coord.name() == name)
                    .and_then(|a| a.dim)
            })
    }

    pub fn is_dim_coord(&self, name: &str) -> bool {
        self.dim_coords.iter().any(|c| c.name() == name)
    }

    /// Add an auxiliary coordinate
    ///
    /// Scalar coordinates must hold exactly one point. Coordinates spanning a dimension must
    /// match its length.
    pub fn add_aux_coord(&mut self, coord: Coord, dim: Option<usize>) -> BlendResult<()> {
        if self.has_coord(coord.name()) {
            return Err(BlendError::Error(format!(
                "Duplicate coordinate {} on cube {}",
                coord.name(),
                self.name
            )));
        }
        let expected = match dim {
            Some(axis) => *self.data.shape().get(axis).ok_or_else(|| {
                BlendError::Error(format!(
                    "Cube {} has no dimension {} for coordinate {}",
                    self.name,
                    axis,
                    coord.name()
                ))
            })?,
            None => 1,
        };
        if coord.len() != expected {
            return Err(BlendError::Error(format!(
                "Coordinate {} has {} points, expected {}",
                coord.name(),
                coord.len(),
                expected
            )));
        }
        self.aux_coords.push(AuxCoord { coord, dim });
        Ok(())
    }

    /// Add an auxiliary coordinate, replacing any auxiliary coordinate of the same name
    pub fn set_aux_coord(&mut self, coord: Coord, dim: Option<usize>) -> BlendResult<()> {
        if self.is_dim_coord(coord.name()) {
            return Err(BlendError::Metadata {
                cube: self.name.clone(),
                details: format!("cannot replace dimension coordinate {}", coord.name()),
            });
        }
        self.remove_coord(coord.name());
        self.add_aux_coord(coord, dim)
    }

    /// Remove an auxiliary coordinate. Dimension coordinates are never removed.
    pub fn remove_coord(&mut self, name: &str) -> Option<Coord> {
        let index = self.aux_coords.iter().position(|a| a.coord.name() == name)?;
        Some(self.aux_coords.remove(index).coord)
    }

    /// Replace the payload and mask while keeping all metadata
    ///
    /// Used by plugins that produce new values on an unchanged grid.
    pub fn with_data(
        &self,
        data: ArrayD<FloatValue>,
        mask: Option<ArrayD<bool>>,
    ) -> BlendResult<Self> {
        if data.shape() != self.data.shape() {
            return Err(BlendError::Error(format!(
                "New data shape {:?} does not match cube {} shape {:?}",
                data.shape(),
                self.name,
                self.data.shape()
            )));
        }
        let mut cube = self.clone();
        cube.data = data;
        cube.mask = None;
        match mask {
            Some(mask) => cube.with_mask(mask),
            None => Ok(cube),
        }
    }
}
