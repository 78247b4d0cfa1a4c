//! Thesis proposal ("proyecto de tesis"): every page opens with the
//! institutional control table, followed by the page's own content.

use crate::core::config::{load_json, resolve_config_path, AssetResolver, DEFAULT_LOGO};
use crate::core::writer::{
    cm_to_twips, field_run, fonts, indented, load_picture, pt_to_half_points, spacing, text_run, DocBuilder,
    LineStyle, LINE_ONE_HALF,
};
use crate::{DocumentGenerator, GenerationContext, GenerationReport};
use anyhow::Result;
use docx_rs::{
    AlignmentType, Paragraph, Run, Shading, Table, TableCell, TableLayoutType, TableRow, VAlignType, VMergeType,
    WidthType,
};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;

const LOGO_COLUMN_CM: f64 = 3.0;
const DATA_COLUMN_CM: f64 = 3.4;
const LOGO_WIDTH_CM: f64 = 2.2;
const INDEX_STEP_CM: f64 = 0.7;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProyectoConfig {
    #[serde(rename = "configuracion", default)]
    pub settings: Settings,
    #[serde(rename = "encabezado", default)]
    pub header: ControlHeader,
    #[serde(rename = "paginas", default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(rename = "fuente_normal", default = "default_font")]
    pub font: String,
    #[serde(rename = "tamano_normal", default = "default_size")]
    pub size_pt: f64,
    #[serde(rename = "ruta_logo", default = "default_logo")]
    pub logo: String,
    #[serde(rename = "color_encabezado", default = "default_shading")]
    pub header_color: String,
    #[serde(rename = "fuente_tabla", default = "default_table_font")]
    pub table_font: String,
    #[serde(rename = "tamano_tabla", default = "default_table_size")]
    pub table_size_pt: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font: default_font(),
            size_pt: default_size(),
            logo: default_logo(),
            header_color: default_shading(),
            table_font: default_table_font(),
            table_size_pt: default_table_size(),
        }
    }
}

fn default_font() -> String {
    "Arial".to_string()
}
fn default_size() -> f64 {
    11.0
}
fn default_logo() -> String {
    DEFAULT_LOGO.to_string()
}
fn default_shading() -> String {
    "D9D9D9".to_string()
}
fn default_table_font() -> String {
    "Arial Narrow".to_string()
}
fn default_table_size() -> f64 {
    9.0
}

/// Texts of the control table. Defaults are the registered R4 values.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlHeader {
    #[serde(rename = "proceso", default = "default_process")]
    pub process: String,
    #[serde(rename = "registro", default = "default_record")]
    pub record: String,
    #[serde(rename = "codigo", default = "default_code")]
    pub code: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "fecha", default = "default_date")]
    pub date: String,
}

impl Default for ControlHeader {
    fn default() -> Self {
        Self {
            process: default_process(),
            record: default_record(),
            code: default_code(),
            version: default_version(),
            date: default_date(),
        }
    }
}

fn default_process() -> String {
    "INVESTIGACION CIENTIFICA Y TECNOLOGICA".to_string()
}
fn default_record() -> String {
    "PROYECTO DE INVESTIGACION - TESIS".to_string()
}
fn default_code() -> String {
    "M.IDIE.01/R4".to_string()
}
fn default_version() -> String {
    "01".to_string()
}
fn default_date() -> String {
    "14/12/2023".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Page {
    #[serde(rename = "tipo", default)]
    pub kind: String,
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(rename = "capitulos", default)]
    pub chapters: Vec<Chapter>,
}

/// A list entry: plain text, or an index line with indentation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Item {
    Text(String),
    Entry {
        #[serde(rename = "texto", default)]
        text: String,
        #[serde(default)]
        indent: f64,
        #[serde(default)]
        bold: bool,
    },
}

impl Item {
    pub fn text(&self) -> &str {
        match self {
            Item::Text(text) | Item::Entry { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Chapter {
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    #[serde(rename = "secciones", default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Section {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(rename = "texto", default)]
    pub text: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

pub struct ProyectoGenerator;

impl ProyectoGenerator {
    pub fn new() -> Self {
        Self
    }

    fn table_run(&self, text: &str, settings: &Settings) -> Run {
        text_run(text)
            .fonts(fonts(&settings.table_font))
            .size(pt_to_half_points(settings.table_size_pt))
    }

    fn text_cell(&self, text: &str, settings: &Settings, width_cm: f64) -> TableCell {
        TableCell::new()
            .width(cm_to_twips(width_cm) as usize, WidthType::Dxa)
            .add_paragraph(Paragraph::new().add_run(self.table_run(text, settings)))
    }

    fn logo_cell(&self, resolver: &AssetResolver, settings: &Settings, doc: &mut DocBuilder) -> TableCell {
        let cell = TableCell::new()
            .width(cm_to_twips(LOGO_COLUMN_CM) as usize, WidthType::Dxa)
            .vertical_merge(VMergeType::Restart)
            .vertical_align(VAlignType::Center);

        let picture = match resolver.resolve(&settings.logo) {
            Some(path) => match load_picture(&path, LOGO_WIDTH_CM) {
                Ok(pic) => Some(pic),
                Err(e) => {
                    doc.warn(&format!("logo skipped: {:#}", e));
                    None
                }
            },
            None => {
                doc.warn(&format!("logo {:?} not found under {}", settings.logo, resolver.base_dir().display()));
                None
            }
        };
        let paragraph = match picture {
            Some(pic) => Paragraph::new().add_run(Run::new().add_image(pic)),
            None => Paragraph::new().add_run(self.table_run("LOGO\nNO ENCONTRADO", settings).bold()),
        };
        cell.add_paragraph(paragraph.align(AlignmentType::Center))
    }

    fn continued_logo_cell(&self) -> TableCell {
        TableCell::new()
            .width(cm_to_twips(LOGO_COLUMN_CM) as usize, WidthType::Dxa)
            .vertical_merge(VMergeType::Continue)
            .add_paragraph(Paragraph::new())
    }

    fn page_counter_cell(&self, settings: &Settings) -> TableCell {
        let size = pt_to_half_points(settings.table_size_pt);
        let field = |instr: &str| field_run(instr).fonts(fonts(&settings.table_font)).size(size);
        let paragraph = Paragraph::new()
            .add_run(self.table_run("Pagina: ", settings))
            .add_run(field("PAGE"))
            .add_run(self.table_run(" de ", settings))
            .add_run(field("NUMPAGES"));
        TableCell::new()
            .width(cm_to_twips(DATA_COLUMN_CM) as usize, WidthType::Dxa)
            .add_paragraph(paragraph)
    }

    /// The 4 × 5 control table: merged logo column, shaded
    /// "I + D + i + e" banner, process and record rows, then the
    /// code / version / date / page counter row.
    pub fn control_table(
        &self,
        header: &ControlHeader,
        settings: &Settings,
        resolver: &AssetResolver,
        doc: &mut DocBuilder,
    ) -> Table {
        let merged = DATA_COLUMN_CM * 3.0;
        let banner = TableCell::new()
            .width(cm_to_twips(DATA_COLUMN_CM * 4.0) as usize, WidthType::Dxa)
            .grid_span(4)
            .vertical_align(VAlignType::Center)
            .shading(Shading::new().fill(settings.header_color.trim_start_matches('#')))
            .add_paragraph(
                Paragraph::new()
                    .add_run(self.table_run("I + D + i + e", settings).bold())
                    .align(AlignmentType::Center),
            );

        let rows = vec![
            TableRow::new(vec![self.logo_cell(resolver, settings, doc), banner]),
            TableRow::new(vec![
                self.continued_logo_cell(),
                self.text_cell("PROCESO NIVEL 0:", settings, DATA_COLUMN_CM),
                self.text_cell(&header.process, settings, merged).grid_span(3),
            ]),
            TableRow::new(vec![
                self.continued_logo_cell(),
                self.text_cell("REGISTRO", settings, DATA_COLUMN_CM),
                self.text_cell(&header.record, settings, merged).grid_span(3),
            ]),
            TableRow::new(vec![
                self.continued_logo_cell(),
                self.text_cell(&format!("Codigo: {}", header.code), settings, DATA_COLUMN_CM),
                self.text_cell(&format!("Version: {}", header.version), settings, DATA_COLUMN_CM),
                self.text_cell(&format!("Fecha: {}", header.date), settings, DATA_COLUMN_CM),
                self.page_counter_cell(settings),
            ]),
        ];

        let mut grid = vec![cm_to_twips(LOGO_COLUMN_CM) as usize];
        grid.extend(std::iter::repeat(cm_to_twips(DATA_COLUMN_CM) as usize).take(4));
        Table::new(rows).set_grid(grid).layout(TableLayoutType::Fixed)
    }

    fn insert_control_table(&self, cfg: &ProyectoConfig, resolver: &AssetResolver, doc: &mut DocBuilder) {
        let table = self.control_table(&cfg.header, &cfg.settings, resolver, doc);
        doc.push_table(table);
        doc.push(Paragraph::new().line_spacing(spacing(0.0, 10.0, None)));
    }

    fn page_title(&self, doc: &mut DocBuilder, text: &str, size_pt: f64) {
        doc.line(text, &LineStyle::centered(size_pt).bold());
    }

    fn render_page(&self, page: &Page, settings: &Settings, doc: &mut DocBuilder) {
        match page.kind.as_str() {
            "caratula" | "lista" => {
                if let Some(title) = non_empty(&page.title) {
                    self.page_title(doc, title, 14.0);
                }
                for item in &page.items {
                    doc.paragraph(item.text());
                }
            }
            "indice" => {
                let title = non_empty(&page.title).unwrap_or("INDICE");
                self.page_title(doc, title, settings.size_pt);
                for item in &page.items {
                    let (text, indent, bold) = match item {
                        Item::Text(text) => (text.as_str(), 0.0, false),
                        Item::Entry { text, indent, bold } => (text.as_str(), *indent, *bold),
                    };
                    let mut run = text_run(text);
                    if bold {
                        run = run.bold();
                    }
                    let paragraph = indented(Paragraph::new().add_run(run), Some(indent * INDEX_STEP_CM), None, None);
                    doc.push(paragraph);
                }
            }
            "contenido_detallado" => {
                for (i, chapter) in page.chapters.iter().enumerate() {
                    if i > 0 {
                        doc.blank();
                    }
                    if let Some(title) = non_empty(&chapter.title) {
                        self.page_title(doc, title, 12.0);
                    }
                    for section in &chapter.sections {
                        if let Some(sub) = non_empty(&section.sub) {
                            doc.push(Paragraph::new().add_run(text_run(sub).bold()));
                        }
                        if let Some(text) = non_empty(&section.text) {
                            doc.justified(text);
                        }
                    }
                }
            }
            other => debug!("page type {:?} carries only the control table", other),
        }
    }

    /// Fill `doc` from a parsed configuration.
    pub fn build(&self, cfg: &ProyectoConfig, resolver: &AssetResolver, doc: &mut DocBuilder) {
        doc.base_font(&cfg.settings.font, cfg.settings.size_pt)
            .base_line_spacing(LINE_ONE_HALF);
        if cfg.pages.is_empty() {
            doc.warn("configuration has no pages");
        }
        for (i, page) in cfg.pages.iter().enumerate() {
            if i > 0 {
                doc.page_break();
            }
            self.insert_control_table(cfg, resolver, doc);
            self.render_page(page, &cfg.settings, doc);
        }
    }
}

impl Default for ProyectoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentGenerator for ProyectoGenerator {
    fn generate(&self, config: &Path, output: &Path, ctx: &GenerationContext) -> Result<GenerationReport> {
        let config = resolve_config_path(config, ctx.formats_dir.as_deref())?;
        let cfg: ProyectoConfig = load_json(&config)?;
        let resolver = AssetResolver::new(ctx.assets_base(&config));

        let mut doc = DocBuilder::new();
        self.build(&cfg, &resolver, &mut doc);

        let mut report = GenerationReport::new(output);
        report.paragraphs = doc.paragraph_count();
        report.tables = doc.table_count();
        report.warnings = doc.warnings().to_vec();
        doc.save(output)?;

        info!("proyecto generated: {} ({} pages)", output.display(), cfg.pages.len());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProyectoConfig {
        serde_json::from_str(
            r#"{
                "configuracion": {"fuente_normal": "Arial", "tamano_normal": 11, "ruta_logo": "nope/logo.png"},
                "paginas": [
                    {"tipo": "caratula", "titulo": "UNIVERSIDAD NACIONAL DEL CALLAO", "items": ["FACULTAD", "ESCUELA"]},
                    {"tipo": "indice", "items": [{"texto": "I. PLANTEAMIENTO", "indent": 0, "bold": true}, {"texto": "1.1 Descripcion", "indent": 1}]},
                    {"tipo": "contenido_detallado", "capitulos": [
                        {"titulo": "CAPITULO I", "secciones": [{"sub": "1.1", "texto": "Texto"}, {"sub": "", "texto": "Solo texto"}]},
                        {"titulo": "CAPITULO II", "secciones": []}
                    ]},
                    {"tipo": "en_blanco"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply_to_partial_settings() {
        let cfg = sample();
        assert_eq!(cfg.settings.table_font, "Arial Narrow");
        assert_eq!(cfg.settings.table_size_pt, 9.0);
        assert_eq!(cfg.settings.header_color, "D9D9D9");
        assert_eq!(cfg.header.code, "M.IDIE.01/R4");
        assert_eq!(cfg.header.date, "14/12/2023");
    }

    #[test]
    fn items_accept_strings_and_objects() {
        let cfg = sample();
        assert_eq!(cfg.pages[0].items[0], Item::Text("FACULTAD".into()));
        match &cfg.pages[1].items[1] {
            Item::Entry { text, indent, bold } => {
                assert_eq!(text, "1.1 Descripcion");
                assert_eq!(*indent, 1.0);
                assert!(!bold);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn every_page_gets_a_control_table() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = sample();
        let mut doc = DocBuilder::new();
        ProyectoGenerator::new().build(&cfg, &AssetResolver::new(dir.path()), &mut doc);

        assert_eq!(doc.table_count(), 4);
        // one missing-logo warning per table
        assert_eq!(doc.warnings().len(), 4);
        // spacer per table (4), page breaks (3), caratula title + 2 items,
        // indice title + 2 items, chapters: title, sub, text, text, blank, title
        assert_eq!(doc.paragraph_count(), 4 + 3 + 3 + 3 + 6);
    }

    #[test]
    fn generate_writes_docx() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("unac_proyecto_cuant.json");
        std::fs::write(&config, r#"{"paginas": [{"tipo": "lista", "titulo": "LISTA", "items": ["a"]}]}"#).unwrap();
        let out = dir.path().join("out/proyecto.docx");

        let report = ProyectoGenerator::new()
            .generate(&config, &out, &GenerationContext::default())
            .unwrap();
        assert!(out.exists());
        assert_eq!(report.tables, 1);
    }

    #[test]
    fn control_table_layout_in_the_package() {
        use crate::core::writer::package;

        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(8, 4).save(dir.path().join("logo.png")).unwrap();
        let config = dir.path().join("unac_proyecto_cual.json");
        std::fs::write(
            &config,
            r##"{"configuracion": {"ruta_logo": "logo.png", "color_encabezado": "#D9D9D9"},
                "paginas": [{"tipo": "lista", "titulo": "LISTA", "items": ["a"]}]}"##,
        )
        .unwrap();
        let out = dir.path().join("proyecto.docx");
        let report = ProyectoGenerator::new()
            .generate(&config, &out, &GenerationContext::default())
            .unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);

        let xml = package::part(&out, "word/document.xml");
        assert_eq!(package::attrs(&xml, "vMerge", "val"), ["restart", "continue", "continue", "continue"]);
        assert_eq!(package::attrs(&xml, "gridSpan", "val"), ["4", "3", "3"]);
        assert_eq!(package::attrs(&xml, "shd", "fill"), ["D9D9D9"]);
        assert_eq!(package::attrs(&xml, "tblLayout", "type"), ["fixed"]);
        assert_eq!(package::attrs(&xml, "gridCol", "w"), ["1701", "1928", "1928", "1928", "1928"]);
        assert_eq!(package::instr_texts(&xml), ["PAGE", "NUMPAGES"]);
        for text in [
            "I + D + i + e",
            "PROCESO NIVEL 0:",
            "INVESTIGACION CIENTIFICA Y TECNOLOGICA",
            "REGISTRO",
            "PROYECTO DE INVESTIGACION - TESIS",
            "Codigo: M.IDIE.01/R4",
            "Version: 01",
            "Fecha: 14/12/2023",
            "Pagina: ",
        ] {
            assert!(xml.contains(text), "missing {:?}", text);
        }
        assert!(!xml.contains("NO ENCONTRADO"));
    }

    #[test]
    fn generate_reports_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProyectoGenerator::new()
            .generate(&dir.path().join("x.json"), &dir.path().join("x.docx"), &GenerationContext::default())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<crate::DocgenError>(), Some(crate::DocgenError::ConfigNotFound(_))));
    }
}
