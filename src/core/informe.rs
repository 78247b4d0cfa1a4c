//! Thesis report ("informe de tesis", also served as "pregrado").

use crate::core::config::{load_json, resolve_config_path, string_or_number, AssetResolver};
use crate::core::writer::{text_run, Align, DocBuilder, LineStyle, PageGeometry, LINE_ONE_HALF};
use crate::{DocumentGenerator, GenerationContext, GenerationReport};
use anyhow::Result;
use docx_rs::{AlignmentType, Paragraph};
use log::info;
use serde::Deserialize;
use std::path::Path;

const LOGO_WIDTH_CM: f64 = 8.128;
const DEFAULT_COVER_LOGO: &str = "Imagenes/LogoUNAC.png";
const INDEX_PLACEHOLDER: &str = "(Generar Indice Automatico)";

#[derive(Debug, Clone, Deserialize)]
pub struct InformeConfig {
    #[serde(rename = "caratula")]
    pub cover: Cover,
    #[serde(rename = "preliminares")]
    pub preliminaries: Preliminaries,
    #[serde(rename = "cuerpo", default)]
    pub body: Vec<BodyChapter>,
    #[serde(rename = "finales")]
    pub finals: Finals,
    #[serde(default)]
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Cover {
    pub universidad: String,
    pub facultad: String,
    pub escuela: String,
    pub tipo_documento: String,
    pub titulo_placeholder: String,
    pub frase_grado: String,
    pub grado_objetivo: String,
    pub label_autor: String,
    pub label_asesor: String,
    pub label_linea: String,
    #[serde(deserialize_with = "string_or_number")]
    pub fecha: String,
    pub pais: String,
}

/// A titled preliminary page.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Block {
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "texto", default)]
    pub text: String,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preliminaries {
    #[serde(rename = "dedicatoria", default)]
    pub dedication: Option<Block>,
    #[serde(rename = "resumen", default)]
    pub summary: Option<Block>,
    #[serde(rename = "indices")]
    pub indexes: Indexes,
    #[serde(rename = "introduccion", default)]
    pub introduction: Option<Block>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indexes {
    #[serde(rename = "contenido")]
    pub contents: String,
    #[serde(rename = "tablas", default)]
    pub tables: Option<String>,
    #[serde(rename = "figuras", default)]
    pub figures: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BodyChapter {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
    #[serde(rename = "contenido", default)]
    pub content: Vec<BodyItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BodyItem {
    #[serde(rename = "texto")]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Finals {
    #[serde(rename = "referencias")]
    pub references: References,
    #[serde(rename = "anexos")]
    pub annexes: Annexes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct References {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Annexes {
    #[serde(rename = "titulo_seccion")]
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
}

pub struct InformeGenerator;

impl InformeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Centered single-spaced cover line. Empty values are left out.
    fn cover_block(&self, doc: &mut DocBuilder, text: &str, style: LineStyle) {
        if text.trim().is_empty() {
            return;
        }
        doc.center_line(text, style.single_spaced());
    }

    fn cover(&self, cfg: &InformeConfig, resolver: &AssetResolver, doc: &mut DocBuilder) {
        let c = &cfg.cover;
        let size = LineStyle::centered;
        self.cover_block(doc, &c.universidad, size(18.0).bold().after(4.0));
        self.cover_block(doc, &c.facultad, size(14.0).bold().after(4.0));
        self.cover_block(doc, &c.escuela, size(14.0).bold().after(25.0));

        let logo = resolver.resolve(cfg.logo_path.as_deref().unwrap_or(DEFAULT_COVER_LOGO));
        if !doc.center_logo(logo.as_deref(), LOGO_WIDTH_CM, 0.0) {
            self.cover_block(doc, "[LOGO INSTITUCIONAL]", size(10.0).before(40.0).after(40.0));
        }

        self.cover_block(doc, &c.tipo_documento, size(16.0).bold().before(30.0));
        self.cover_block(doc, &c.titulo_placeholder, size(14.0).bold().before(30.0).after(30.0));
        self.cover_block(doc, &c.frase_grado, size(12.0).before(10.0));
        self.cover_block(doc, &c.grado_objetivo, size(13.0).bold().after(35.0));
        self.cover_block(doc, &c.label_autor, size(12.0).bold().before(5.0));
        self.cover_block(doc, &c.label_asesor, size(12.0).bold().before(5.0).after(20.0));
        self.cover_block(doc, &c.label_linea, size(11.0).italic().after(40.0));
        self.cover_block(doc, &c.fecha, size(12.0));
        self.cover_block(doc, &c.pais, size(12.0).bold());
    }

    /// Heading 1, centered Arial 14 bold in black.
    fn formal_title(&self, doc: &mut DocBuilder, text: &str, before_pt: f64, after_pt: f64) {
        let style = LineStyle::centered(14.0)
            .bold()
            .font("Arial")
            .color("000000")
            .before(before_pt)
            .after(after_pt);
        doc.heading(text, 1, &style);
    }

    fn titled_page(&self, doc: &mut DocBuilder, block: &Block) {
        self.formal_title(doc, &block.title, 0.0, 12.0);
        if let Some(note) = &block.note {
            doc.guide_note(note);
        }
        if !block.text.is_empty() {
            doc.justified(&block.text);
        }
        doc.page_break();
    }

    fn index_placeholder(&self, doc: &mut DocBuilder) {
        doc.push(Paragraph::new().add_run(text_run(INDEX_PLACEHOLDER)).align(AlignmentType::Center));
    }

    fn preliminaries(&self, cfg: &InformeConfig, doc: &mut DocBuilder) {
        let p = &cfg.preliminaries;
        doc.blank().page_break();

        for block in [&p.dedication, &p.summary].into_iter().flatten() {
            self.titled_page(doc, block);
        }

        self.formal_title(doc, &p.indexes.contents, 0.0, 12.0);
        self.index_placeholder(doc);
        for title in [&p.indexes.tables, &p.indexes.figures].into_iter().flatten() {
            self.formal_title(doc, title, 24.0, 12.0);
            self.index_placeholder(doc);
        }
        doc.page_break();

        if let Some(block) = &p.introduction {
            self.titled_page(doc, block);
        }
    }

    fn body(&self, cfg: &InformeConfig, doc: &mut DocBuilder) {
        let item_style = LineStyle::default().bold().font("Arial");
        for chapter in &cfg.body {
            self.formal_title(doc, &chapter.title, 24.0, 18.0);
            if let Some(note) = &chapter.note {
                doc.guide_note(note);
            }
            for item in &chapter.content {
                doc.line(&item.text, &item_style);
            }
            doc.page_break();
        }
    }

    fn finals(&self, cfg: &InformeConfig, doc: &mut DocBuilder) {
        let f = &cfg.finals;
        self.formal_title(doc, &f.references.title, 0.0, 12.0);
        if let Some(note) = &f.references.note {
            doc.guide_note(note);
        }
        doc.page_break();

        self.formal_title(doc, &f.annexes.title, 0.0, 12.0);
        let item_style = LineStyle::default().bold();
        for item in &f.annexes.items {
            doc.line(item, &item_style);
        }
        doc.page_break();
    }

    pub fn build(&self, cfg: &InformeConfig, resolver: &AssetResolver, doc: &mut DocBuilder) {
        doc.page_setup(PageGeometry::default())
            .base_font("Arial", 12.0)
            .base_line_spacing(LINE_ONE_HALF)
            .base_alignment(Align::Justify)
            .heading_styles("Arial", &[(1, 14.0, true)]);

        self.cover(cfg, resolver, doc);
        self.preliminaries(cfg, doc);
        self.body(cfg, doc);
        self.finals(cfg, doc);
        doc.page_numbers("Arial", 10.0);
    }
}

impl Default for InformeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentGenerator for InformeGenerator {
    fn generate(&self, config: &Path, output: &Path, ctx: &GenerationContext) -> Result<GenerationReport> {
        let config = resolve_config_path(config, ctx.formats_dir.as_deref())?;
        let cfg: InformeConfig = load_json(&config)?;
        let resolver = AssetResolver::new(ctx.assets_base(&config));

        let mut doc = DocBuilder::new();
        self.build(&cfg, &resolver, &mut doc);

        let mut report = GenerationReport::new(output);
        report.paragraphs = doc.paragraph_count();
        report.tables = doc.table_count();
        report.warnings = doc.warnings().to_vec();
        doc.save(output)?;

        info!("informe generated: {} ({} chapters)", output.display(), cfg.body.len());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "caratula": {
            "universidad": "UNIVERSIDAD NACIONAL DEL CALLAO",
            "facultad": "FACULTAD DE INGENIERIA",
            "escuela": "ESCUELA PROFESIONAL",
            "tipo_documento": "INFORME FINAL DE TESIS",
            "titulo_placeholder": "TITULO",
            "frase_grado": "PARA OPTAR EL TITULO PROFESIONAL DE",
            "grado_objetivo": "INGENIERO",
            "label_autor": "AUTOR:",
            "label_asesor": "ASESOR:",
            "label_linea": "LINEA DE INVESTIGACION",
            "fecha": "2024",
            "pais": "PERU"
        },
        "preliminares": {
            "dedicatoria": {"titulo": "DEDICATORIA", "texto": "A mi familia"},
            "resumen": {"titulo": "RESUMEN", "texto": "Resumen", "nota": "Maximo 250 palabras"},
            "indices": {"contenido": "INDICE", "tablas": "INDICE DE TABLAS"},
            "introduccion": {"titulo": "INTRODUCCION", "texto": "Intro"}
        },
        "cuerpo": [
            {"titulo": "I. PLANTEAMIENTO DEL PROBLEMA", "contenido": [{"texto": "1.1 Descripcion"}, {"texto": "1.2 Formulacion"}]},
            {"titulo": "II. MARCO TEORICO", "nota": "Antecedentes"}
        ],
        "finales": {
            "referencias": {"titulo": "REFERENCIAS BIBLIOGRAFICAS", "nota": "APA 7"},
            "anexos": {"titulo_seccion": "ANEXOS", "items": ["Matriz de consistencia"]}
        }
    }"#;

    #[test]
    fn optional_blocks_parse() {
        let cfg: InformeConfig = serde_json::from_str(SAMPLE).unwrap();
        assert!(cfg.preliminaries.dedication.is_some());
        assert_eq!(cfg.preliminaries.indexes.tables.as_deref(), Some("INDICE DE TABLAS"));
        assert!(cfg.preliminaries.indexes.figures.is_none());
        assert_eq!(cfg.body[1].content.len(), 0);
        assert_eq!(cfg.finals.annexes.items.len(), 1);
    }

    #[test]
    fn missing_cover_is_malformed() {
        let err = serde_json::from_str::<InformeConfig>(r#"{"cuerpo": []}"#);
        assert!(err.is_err());
    }

    #[test]
    fn build_without_logo_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: InformeConfig = serde_json::from_str(SAMPLE).unwrap();
        let mut doc = DocBuilder::new();
        InformeGenerator::new().build(&cfg, &AssetResolver::new(dir.path()), &mut doc);

        assert_eq!(doc.warnings().len(), 1);
        // cover: 12 lines + placeholder
        let cover = 13;
        // blank + break; dedicatoria, resumen (+ note), each title/text/break;
        // index title, placeholder, tables title, placeholder, break;
        // introduction title/text/break
        let preliminaries = 2 + 3 + 4 + 5 + 3;
        // chapter one: title, 2 items, break; chapter two: title, note, break
        let body = 4 + 3;
        // references title, note, break; annexes title, item, break
        let finals = 3 + 3;
        assert_eq!(doc.paragraph_count(), cover + preliminaries + body + finals);
    }

    #[test]
    fn generate_writes_docx() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("unac_informe_cuant.json");
        std::fs::write(&config, SAMPLE).unwrap();
        let out = dir.path().join("informe.docx");
        let report = InformeGenerator::new()
            .generate(&config, &out, &GenerationContext::default())
            .unwrap();
        assert!(out.exists());
        assert_eq!(report.tables, 0);
    }

    #[test]
    fn body_paragraphs_are_justified() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("unac_informe_cual.json");
        std::fs::write(&config, SAMPLE).unwrap();
        let out = dir.path().join("informe.docx");
        InformeGenerator::new()
            .generate(&config, &out, &GenerationContext::default())
            .unwrap();

        let xml = crate::core::writer::package::part(&out, "word/document.xml");
        let aligns = crate::core::writer::package::paragraph_alignments(&xml);
        assert!(!aligns.is_empty());
        assert!(aligns.iter().all(|a| a.as_deref() != Some("left")));
        assert!(aligns.iter().all(Option::is_some));
        // chapter items such as "1.1 Descripcion" follow the justified default
        assert!(aligns.iter().filter(|a| a.as_deref() == Some("both")).count() >= 4);
    }
}
