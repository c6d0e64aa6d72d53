//! Format detection (RON/JSON/TOML), file discovery and deserialization
//! helpers shared by the config and level loaders.

use serde::de::DeserializeOwned;
use shapeflow_core::config::SimConfig;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Base name of the optional simulation settings file.
pub const SIM_CONFIG_FILE: &str = "sim";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("duplicate level id '{id}' in {file}")]
    DuplicateId { file: PathBuf, id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parse_error(file: &Path, e: impl Display) -> DataLoadError {
    DataLoadError::Parse {
        file: file.to_path_buf(),
        detail: e.to_string(),
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` and `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `ConflictingFormats` if more than one
/// does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for format in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = &found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing.clone(),
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize text in a known format. `origin` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(content: &str, format: Format, origin: &Path) -> Result<T, DataLoadError> {
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(origin, e)),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(origin, e)),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(origin, e)),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

/// Deserialize a list. TOML has no top-level arrays, so there the list is
/// read from the array at `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(path: &Path, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    if format != Format::Toml {
        return deserialize_str(&content, format, path);
    }
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array.try_into().map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Simulation settings
// ===========================================================================

/// Load `sim.{ron,toml,json}` from `dir`. Without one, the defaults apply;
/// fields missing from the file keep their defaults too.
pub fn load_sim_config(dir: &Path) -> Result<SimConfig, DataLoadError> {
    match find_data_file(dir, SIM_CONFIG_FILE)? {
        Some(path) => {
            let config = deserialize_file(&path)?;
            debug!(file = %path.display(), "loaded simulation config");
            Ok(config)
        }
        None => Ok(SimConfig::default()),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;

    #[derive(Debug, Deserialize)]
    struct Entry {
        name: String,
    }

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shapeflow_data_test_{suffix}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("levels.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("levels.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("levels.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["levels.yaml", "levels"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file / require_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        assert_eq!(find_data_file(&dir, "levels").unwrap(), None);
        fs::write(dir.join("levels.toml"), "").unwrap();
        assert_eq!(find_data_file(&dir, "levels").unwrap(), Some(dir.join("levels.toml")));
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("levels.ron"), "[]").unwrap();
        fs::write(dir.join("levels.json"), "[]").unwrap();
        assert!(matches!(
            find_data_file(&dir, "levels"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, "levels").unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { ref file, .. } if file == "levels"));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_file / deserialize_list
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_in_every_format() {
        let dir = make_test_dir("list");
        let files = [
            ("a.ron", r#"[(name: "circle"), (name: "square")]"#),
            ("b.json", r#"[{"name": "circle"}, {"name": "square"}]"#),
            ("c.toml", "[[entries]]\nname = \"circle\"\n\n[[entries]]\nname = \"square\"\n"),
        ];
        for (file, content) in files {
            let path = dir.join(file);
            fs::write(&path, content).unwrap();
            let entries: Vec<Entry> = deserialize_list(&path, "entries").unwrap();
            assert_eq!(entries.len(), 2, "{file}");
            assert_eq!(entries[1].name, "square");
        }
        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_missing_key() {
        let dir = make_test_dir("list_missing_key");
        let path = dir.join("levels.toml");
        fs::write(&path, r#"foo = "bar""#).unwrap();
        let result: Result<Vec<Entry>, _> = deserialize_list(&path, "entries");
        assert!(matches!(result, Err(DataLoadError::Parse { ref detail, .. }) if detail.contains("entries")));
        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_parse_error_names_file() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("bad.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();
        let err = deserialize_file::<Vec<Entry>>(&path).unwrap_err();
        assert!(err.to_string().contains("bad.ron"));
        cleanup(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = deserialize_file::<Vec<Entry>>(Path::new("/nonexistent/shapeflow/levels.ron")).unwrap_err();
        assert!(matches!(err, DataLoadError::Io(_)));
    }

    // -----------------------------------------------------------------------
    // load_sim_config
    // -----------------------------------------------------------------------

    #[test]
    fn sim_config_defaults_without_file() {
        let dir = make_test_dir("sim_default");
        assert_eq!(load_sim_config(&dir).unwrap(), SimConfig::default());
        cleanup(&dir);
    }

    #[test]
    fn sim_config_partial_toml() {
        let dir = make_test_dir("sim_toml");
        fs::write(dir.join("sim.toml"), "spawn_interval = 1.0\nmax_speed = 8.0\n").unwrap();
        let config = load_sim_config(&dir).unwrap();
        assert_eq!(config.spawn_interval, 1.0);
        assert_eq!(config.max_speed, 8.0);
        assert_eq!(config.processing_time, SimConfig::default().processing_time);
        cleanup(&dir);
    }

    #[test]
    fn sim_config_ron() {
        let dir = make_test_dir("sim_ron");
        fs::write(dir.join("sim.ron"), "(connection_speed: 2.0, event_capacity: 16)").unwrap();
        let config = load_sim_config(&dir).unwrap();
        assert_eq!(config.connection_speed, 2.0);
        assert_eq!(config.event_capacity, 16);
        cleanup(&dir);
    }
}
