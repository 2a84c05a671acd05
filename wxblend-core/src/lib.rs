pub mod cube;
pub mod example_cubes;
pub mod metadata;
pub mod plugins;
pub mod spatial;
pub mod time;
pub mod weights_config;

pub mod errors;
