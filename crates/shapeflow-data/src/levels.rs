//! Level definitions and the catalog they are played from.

use crate::loader::{deserialize_list, deserialize_str, require_data_file, DataLoadError, Format};
use serde::{Deserialize, Serialize};
use shapeflow_core::config::SimConfig;
use shapeflow_core::goal::{GoalPolicy, LevelSession, TargetDescriptor};
use shapeflow_core::shape::ShapeSpec;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Base name of the level list in a data directory.
pub const LEVELS_FILE: &str = "levels";

const BUILTIN_LEVELS: &str = include_str!("../data/levels.ron");

fn default_difficulty() -> u8 {
    1
}

/// One level as written in data files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub id: String,
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    /// Position within the category.
    #[serde(default)]
    pub order: u32,
    /// The programming idea the level teaches.
    #[serde(default)]
    pub concept: String,
    /// Shape spawned by the default source.
    #[serde(default)]
    pub source: ShapeSpec,
    pub target: TargetDescriptor,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl LevelDef {
    pub fn goal(&self) -> GoalPolicy {
        GoalPolicy::new(self.target.clone())
    }

    /// A fresh session for this level. Call [`LevelSession::setup`] for the
    /// default layout or rebuild the factory from a program.
    pub fn session(&self, config: SimConfig) -> LevelSession {
        LevelSession::new(self.goal(), config).with_source(self.source.clone())
    }
}

// ===========================================================================
// Catalog
// ===========================================================================

/// Levels in file order, ids unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelCatalog {
    levels: Vec<LevelDef>,
}

impl LevelCatalog {
    /// `origin` only labels errors.
    pub fn from_levels(levels: Vec<LevelDef>, origin: &Path) -> Result<Self, DataLoadError> {
        let mut seen = HashSet::new();
        for level in &levels {
            if !seen.insert(level.id.as_str()) {
                return Err(DataLoadError::DuplicateId {
                    file: origin.to_path_buf(),
                    id: level.id.clone(),
                });
            }
        }
        Ok(Self { levels })
    }

    pub fn get(&self, id: &str) -> Option<&LevelDef> {
        self.levels.iter().find(|l| l.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LevelDef> {
        self.levels.iter()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for level in &self.levels {
            if !out.contains(&level.category.as_str()) {
                out.push(&level.category);
            }
        }
        out
    }

    /// Levels of one category sorted by `order`.
    pub fn in_category(&self, category: &str) -> Vec<&LevelDef> {
        let mut levels: Vec<&LevelDef> = self.levels.iter().filter(|l| l.category == category).collect();
        levels.sort_by_key(|l| l.order);
        levels
    }

    /// The level after `id` in catalog order.
    pub fn next_after(&self, id: &str) -> Option<&LevelDef> {
        let index = self.levels.iter().position(|l| l.id == id)?;
        self.levels.get(index + 1)
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load `levels.{ron,toml,json}` from `dir`. In TOML the list lives under a
/// `[[levels]]` array.
pub fn load_levels(dir: &Path) -> Result<LevelCatalog, DataLoadError> {
    let path = require_data_file(dir, LEVELS_FILE)?;
    let levels: Vec<LevelDef> = deserialize_list(&path, LEVELS_FILE)?;
    debug!(file = %path.display(), count = levels.len(), "loaded levels");
    LevelCatalog::from_levels(levels, &path)
}

/// The levels bundled with the crate.
pub fn builtin_levels() -> Result<LevelCatalog, DataLoadError> {
    let origin = Path::new("levels.ron");
    let levels = deserialize_str(BUILTIN_LEVELS, Format::Ron, origin)?;
    LevelCatalog::from_levels(levels, origin)
}
