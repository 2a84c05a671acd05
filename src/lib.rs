//! Weighted blending of forecast realizations
//!
//! Combines forecasts from several cycles, models or ensemble members into one field. The
//! building blocks live in `wxblend-core` (data container, metadata and geometry helpers) and
//! `wxblend-components` (merge, weighting and blending plugins).

pub mod weight_and_blend;

pub use weight_and_blend::{
    BlendAdvisory, BlendOptions, Blended, WeightAndBlend, WeightingMethod, WeightingOptions,
    DEFAULT_FUZZY_LENGTH,
};
