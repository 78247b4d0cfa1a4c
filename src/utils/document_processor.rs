use crate::core::registry::FormatKind;
use crate::GenerationContext;
use anyhow::Result;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of one configuration in a batch run.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Generated { config: PathBuf, output: PathBuf, kind: FormatKind },
    Failed { config: PathBuf, error: String },
    Skipped { config: PathBuf, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn generated(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, BatchOutcome::Generated { .. })).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, BatchOutcome::Failed { .. })).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, BatchOutcome::Skipped { .. })).count()
    }
}

/// Guess the format from the top-level keys of a configuration.
pub fn detect_format(value: &Value) -> Option<FormatKind> {
    let obj = value.as_object()?;
    if obj.contains_key("paginas") {
        Some(FormatKind::Proyecto)
    } else if obj.contains_key("caratula") && obj.contains_key("cuerpo") {
        Some(FormatKind::Informe)
    } else if obj.contains_key("cover") && obj.contains_key("structure") {
        Some(FormatKind::Maestria)
    } else {
        None
    }
}

/// Generates every JSON configuration found under a directory.
pub struct DocumentProcessor {
    ctx: GenerationContext,
}

impl DocumentProcessor {
    pub fn new(ctx: GenerationContext) -> Self {
        Self { ctx }
    }

    /// Walk `input_dir` for `*.json`, generate each into
    /// `output_dir/<stem>.docx` in parallel. One failure never stops the batch.
    pub fn process_documents<P1: AsRef<Path>, P2: AsRef<Path>>(&self, input_dir: P1, output_dir: P2) -> Result<BatchReport> {
        let input_path = input_dir.as_ref();
        let output_path = output_dir.as_ref();

        info!("Starting batch generation from: {}", input_path.display());
        if !input_path.is_dir() {
            anyhow::bail!("input directory not found: {}", input_path.display());
        }
        fs::create_dir_all(output_path)?;
        info!("Output directory prepared: {}", output_path.display());

        let mut configs: Vec<PathBuf> = WalkDir::new(input_path)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
            })
            .collect();
        configs.sort();
        debug!("Found {} configuration files", configs.len());

        let outcomes: Vec<BatchOutcome> = configs
            .par_iter()
            .map(|config| self.process_config(config, output_path))
            .collect();

        let report = BatchReport { outcomes };
        info!(
            "Batch completed: {} generated, {} failed, {} skipped",
            report.generated(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    fn process_config(&self, config: &Path, output_dir: &Path) -> BatchOutcome {
        let value: Value = match crate::core::config::load_json(config) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to read {}: {}", config.display(), e);
                return BatchOutcome::Failed { config: config.to_path_buf(), error: e.to_string() };
            }
        };

        let Some(kind) = detect_format(&value) else {
            warn!("Skipping {}: not a known format", config.display());
            return BatchOutcome::Skipped {
                config: config.to_path_buf(),
                reason: "not a known format".to_string(),
            };
        };

        let stem = config.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let output = output_dir.join(format!("{}.docx", stem));
        info!("Processing {} as {}", config.display(), kind);

        match kind.generator().generate(config, &output, &self.ctx) {
            Ok(report) => {
                for warning in &report.warnings {
                    debug!("{}: {}", config.display(), warning);
                }
                BatchOutcome::Generated { config: config.to_path_buf(), output, kind }
            }
            Err(e) => {
                error!("Failed to generate {}: {:#}", config.display(), e);
                BatchOutcome::Failed { config: config.to_path_buf(), error: format!("{:#}", e) }
            }
        }
    }
}
