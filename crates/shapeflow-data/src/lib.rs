//! Data files for shapeflow: simulation settings and level definitions,
//! readable from RON, TOML or JSON.

pub mod levels;
pub mod loader;

pub use levels::{builtin_levels, load_levels, LevelCatalog, LevelDef};
pub use loader::{load_sim_config, DataLoadError, Format};
