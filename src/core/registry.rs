use crate::core::informe::InformeGenerator;
use crate::core::maestria::MaestriaGenerator;
use crate::core::proyecto::ProyectoGenerator;
use crate::error::DocgenError;
use crate::{DocumentGenerator, GenerationContext, GenerationReport};
use chrono::{Local, NaiveTime, Timelike};
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Proyecto,
    Informe,
    Maestria,
}

/// Names accepted in place of a format.
pub const FORMAT_ALIASES: &[(&str, FormatKind)] = &[("pregrado", FormatKind::Informe)];

impl FormatKind {
    pub const ALL: [FormatKind; 3] = [FormatKind::Proyecto, FormatKind::Informe, FormatKind::Maestria];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Proyecto => "proyecto",
            FormatKind::Informe => "informe",
            FormatKind::Maestria => "maestria",
        }
    }

    pub fn generator(&self) -> Box<dyn DocumentGenerator> {
        match self {
            FormatKind::Proyecto => Box::new(ProyectoGenerator::new()),
            FormatKind::Informe => Box::new(InformeGenerator::new()),
            FormatKind::Maestria => Box::new(MaestriaGenerator::new()),
        }
    }
}

impl FromStr for FormatKind {
    type Err = DocgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        if let Some((_, kind)) = FORMAT_ALIASES.iter().find(|(alias, _)| *alias == key) {
            return Ok(*kind);
        }
        FormatKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| DocgenError::UnknownFormat(s.to_string()))
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Research approach of a format: quantitative or qualitative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubType {
    Cuant,
    Cual,
}

impl SubType {
    pub const ALL: [SubType; 2] = [SubType::Cuant, SubType::Cual];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubType::Cuant => "cuant",
            SubType::Cual => "cual",
        }
    }
}

impl FromStr for SubType {
    type Err = DocgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        SubType::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| DocgenError::UnknownSubType(s.to_string()))
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `formats/<kind>/unac_<kind>_<sub>.json`
pub fn config_path(formats_dir: &Path, kind: FormatKind, sub: SubType) -> PathBuf {
    formats_dir
        .join(kind.as_str())
        .join(format!("unac_{}_{}.json", kind, sub))
}

/// `UNAC_<KEY>_<SUB>_<HHMMSS>.docx`, where `key` is the format name the
/// caller used, so an alias keeps its own name.
pub fn download_name(key: &str, sub: SubType, time: NaiveTime) -> String {
    format!(
        "UNAC_{}_{}_{:02}{:02}{:02}.docx",
        key.trim().to_uppercase(),
        sub.as_str().to_uppercase(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// A generated file ready to be handed to the client.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub download_name: String,
    pub report: GenerationReport,
}

/// Resolves `(format, sub_type)` pairs to configurations and runs the
/// matching generator.
#[derive(Debug, Clone)]
pub struct Registry {
    formats_dir: PathBuf,
    output_dir: PathBuf,
    assets_dir: PathBuf,
}

impl Registry {
    /// Layout rooted at `base_dir`: `formats/`, `docs/` for output and
    /// assets looked up from the base directory itself.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        let base = base_dir.as_ref();
        Self {
            formats_dir: base.join("formats"),
            output_dir: base.join("docs"),
            assets_dir: base.to_path_buf(),
        }
    }

    pub fn with_formats_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.formats_dir = dir.into();
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn formats_dir(&self) -> &Path {
        &self.formats_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn context(&self) -> GenerationContext {
        GenerationContext::default()
            .with_assets_dir(&self.assets_dir)
            .with_formats_dir(&self.formats_dir)
    }

    /// Parse the request keys; bad keys are client errors.
    pub fn resolve(&self, format: &str, sub_type: &str) -> Result<(FormatKind, SubType), DocgenError> {
        Ok((format.parse()?, sub_type.parse()?))
    }

    pub fn generate(&self, format: &str, sub_type: &str) -> Result<GeneratedDocument, DocgenError> {
        let (kind, sub) = self.resolve(format, sub_type)?;
        let config = config_path(&self.formats_dir, kind, sub);
        if !config.exists() {
            return Err(DocgenError::ConfigNotFound(config));
        }

        let download_name = download_name(format, sub, Local::now().time());
        let path = self
            .output_dir
            .join(format!("{}_{}", Uuid::new_v4().simple(), download_name));
        debug!("generating {}/{} from {} into {}", kind, sub, config.display(), path.display());

        let report = kind.generator().generate(&config, &path, &self.context())?;
        if !path.exists() {
            return Err(DocgenError::OutputMissing(path));
        }
        info!("{}/{} ready: {}", kind, sub, path.display());
        Ok(GeneratedDocument { path, download_name, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_trims_lowercases_and_aliases() {
        assert_eq!(" Proyecto ".parse::<FormatKind>().unwrap(), FormatKind::Proyecto);
        assert_eq!("PREGRADO".parse::<FormatKind>().unwrap(), FormatKind::Informe);
        assert_eq!("maestria".parse::<FormatKind>().unwrap(), FormatKind::Maestria);
        assert!(matches!("doctorado".parse::<FormatKind>(), Err(DocgenError::UnknownFormat(_))));
        assert!(matches!("".parse::<FormatKind>(), Err(DocgenError::UnknownFormat(_))));
    }

    #[test]
    fn sub_type_parsing() {
        assert_eq!("CUAL".parse::<SubType>().unwrap(), SubType::Cual);
        assert!(matches!("mixto".parse::<SubType>(), Err(DocgenError::UnknownSubType(_))));
    }

    #[test]
    fn config_and_download_names() {
        let path = config_path(Path::new("formats"), FormatKind::Informe, SubType::Cuant);
        assert_eq!(path, Path::new("formats/informe/unac_informe_cuant.json"));

        let time = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
        assert_eq!(download_name("maestria", SubType::Cual, time), "UNAC_MAESTRIA_CUAL_090507.docx");
        assert_eq!(download_name(" Pregrado ", SubType::Cuant, time), "UNAC_PREGRADO_CUANT_090507.docx");
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let err = registry.generate("proyecto", "cuant").unwrap_err();
        assert!(matches!(err, DocgenError::ConfigNotFound(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn generate_runs_the_matching_builder() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let config = config_path(registry.formats_dir(), FormatKind::Proyecto, SubType::Cual);
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, r#"{"paginas": [{"tipo": "caratula", "titulo": "T"}]}"#).unwrap();

        let doc = registry.generate("proyecto", "cual").unwrap();
        assert!(doc.path.starts_with(registry.output_dir()));
        assert!(doc.path.exists());
        assert!(doc.download_name.starts_with("UNAC_PROYECTO_CUAL_"));
        assert_eq!(doc.report.tables, 1);
    }
}
