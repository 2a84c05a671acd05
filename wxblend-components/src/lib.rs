pub mod merge;
pub mod spatial_weights;
pub mod standard;
pub mod weighted_blend;
pub mod weights;

pub use standard::StandardPlugins;
