use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const CATALOG_FILE: &str = "catalog.json";

/// One generated document as listed in `catalog.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub universidad: Option<String>,
    pub tipo: Option<String>,
    pub version: Option<String>,
    pub descripcion: Option<String>,
    pub file: String,
    pub format: String,
    pub size_bytes: u64,
    pub last_modified: String,
    pub sha256: String,
}

/// Descriptive fields copied from the generator configuration.
#[derive(Debug, Clone, Default)]
pub struct CatalogInfo {
    pub id: String,
    pub universidad: Option<String>,
    pub tipo: Option<String>,
    pub version: Option<String>,
    pub descripcion: Option<String>,
}

pub fn catalog_path_for(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join(CATALOG_FILE))
        .unwrap_or_else(|| PathBuf::from(CATALOG_FILE))
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

impl CatalogEntry {
    /// Describe a file that was just written.
    pub fn for_output(info: &CatalogInfo, output: &Path) -> Result<Self> {
        let bytes = std::fs::read(output).with_context(|| format!("reading {}", output.display()))?;
        let modified: DateTime<Local> = std::fs::metadata(output)?
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Local::now());

        Ok(Self {
            id: info.id.clone(),
            universidad: info.universidad.clone(),
            tipo: info.tipo.clone(),
            version: info.version.clone(),
            descripcion: info.descripcion.clone(),
            file: output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            format: "docx".to_string(),
            size_bytes: bytes.len() as u64,
            last_modified: modified.format("%Y-%m-%dT%H:%M:%S").to_string(),
            sha256: sha256_hex(&bytes),
        })
    }
}

/// Insert `entry` into the catalog, replacing any entry with the same id.
/// Entries that do not parse as catalog entries are kept untouched.
pub fn update_catalog(catalog_path: &Path, entry: &CatalogEntry) -> Result<usize> {
    let mut items: Vec<Value> = match std::fs::read_to_string(catalog_path) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!("{} is not a JSON array, starting over", catalog_path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("{} is unreadable ({}), starting over", catalog_path.display(), e);
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    };

    let before = items.len();
    items.retain(|item| item.get("id").and_then(Value::as_str) != Some(entry.id.as_str()));
    if items.len() != before {
        debug!("replacing catalog entry {}", entry.id);
    }
    items.push(serde_json::to_value(entry)?);

    if let Some(parent) = catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(catalog_path, serde_json::to_string_pretty(&items)?)
        .with_context(|| format!("writing {}", catalog_path.display()))?;
    info!("catalog updated: {} ({} entries)", catalog_path.display(), items.len());
    Ok(items.len())
}
