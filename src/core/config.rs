use crate::error::DocgenError;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Logo used when a configuration points at an asset that does not exist.
pub const DEFAULT_LOGO: &str = "assets/LogoUNAC.png";

/// Read and deserialize a UTF-8 JSON configuration.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, DocgenError> {
    if !path.exists() {
        return Err(DocgenError::ConfigNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    // Editors on Windows like to prepend a BOM
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    serde_json::from_str(raw).map_err(|source| DocgenError::MalformedConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Accept `"2024"` and `2024` alike for free-text fields.
pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Locate a configuration file, falling back to `formats_dir/<file name>`
/// when the given path does not exist.
pub fn resolve_config_path(path: &Path, formats_dir: Option<&Path>) -> Result<PathBuf, DocgenError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let (Some(dir), Some(name)) = (formats_dir, path.file_name()) {
        let candidate = dir.join(name);
        if candidate.exists() {
            debug!("config {} resolved to {}", path.display(), candidate.display());
            return Ok(candidate);
        }
    }
    Err(DocgenError::ConfigNotFound(path.to_path_buf()))
}

/// Finds assets (logos) referenced from a configuration.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    base_dir: PathBuf,
}

impl AssetResolver {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Try the path as given, then relative to the base directory, then only
    /// its file name inside the base directory, then relative to each parent
    /// of the base directory, then the default logo.
    ///
    /// Bundled configurations live in `formats/<kind>/` and name their logo
    /// relative to the project root, which the parent walk reaches.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let given = Path::new(name);
        if given.is_absolute() && given.exists() {
            return Some(given.to_path_buf());
        }

        let joined = self.base_dir.join(given);
        if joined.exists() {
            return Some(joined);
        }

        if let Some(file_name) = given.file_name() {
            let flat = self.base_dir.join(file_name);
            if flat.exists() {
                return Some(flat);
            }
        }

        if let Some(found) = self
            .base_dir
            .ancestors()
            .skip(1)
            .map(|dir| dir.join(given))
            .find(|candidate| candidate.exists())
        {
            return Some(found);
        }

        let fallback = self.base_dir.join(DEFAULT_LOGO);
        if fallback.exists() {
            return Some(fallback);
        }

        None
    }
}
