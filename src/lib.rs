pub mod core {
    pub mod catalog;
    pub mod config;
    pub mod informe;
    pub mod layout;
    pub mod maestria;
    pub mod parser;
    pub mod proyecto;
    pub mod registry;
    pub mod replicator;
    pub mod writer;
}

pub mod utils {
    pub mod document_processor;
}

pub mod error;
pub mod server;

pub use crate::core::registry::{FormatKind, SubType};
pub use crate::error::DocgenError;

use std::path::{Path, PathBuf};

/// A builder that turns one JSON configuration into one .docx file.
pub trait DocumentGenerator: Send + Sync {
    /// Read `config`, build the document and write it to `output`.
    fn generate(&self, config: &Path, output: &Path, ctx: &GenerationContext) -> anyhow::Result<GenerationReport>;

    /// File name used when the caller gives no output path.
    fn default_output_name(&self, config: &Path) -> anyhow::Result<String> {
        let stem = config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Ok(format!("{}.docx", stem))
    }
}

/// Where builders look for assets such as the institutional logo.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// Base directory for relative asset paths. `None` means the directory
    /// holding the configuration file.
    pub assets_dir: Option<PathBuf>,
    /// Directory searched when the configuration path does not exist.
    pub formats_dir: Option<PathBuf>,
    /// Record generated documents in `catalog.json` next to the output.
    pub catalog: bool,
}

impl GenerationContext {
    pub fn with_assets_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.assets_dir = Some(dir.into());
        self
    }

    pub fn with_formats_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.formats_dir = Some(dir.into());
        self
    }

    pub fn with_catalog(mut self, enabled: bool) -> Self {
        self.catalog = enabled;
        self
    }

    pub(crate) fn assets_base(&self, config: &Path) -> PathBuf {
        match &self.assets_dir {
            Some(dir) => dir.clone(),
            None => config
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// What a builder produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub paragraphs: usize,
    pub tables: usize,
    pub warnings: Vec<String>,
    /// Whether the configuration asks for the file to be opened afterwards.
    pub open_after: bool,
}

impl GenerationReport {
    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            paragraphs: 0,
            tables: 0,
            warnings: Vec::new(),
            open_after: true,
        }
    }
}
