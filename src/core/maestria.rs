//! Master's thesis skeleton: cover, preliminary pages, indexes and the
//! chapter structure with `{{COMPLETAR}}` placeholders.

use crate::core::catalog::{catalog_path_for, update_catalog, CatalogEntry, CatalogInfo};
use crate::core::config::{load_json, resolve_config_path, string_or_number, AssetResolver};
use crate::core::writer::{DocBuilder, LineStyle, PageGeometry};
use crate::{DocumentGenerator, GenerationContext, GenerationReport};
use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;

pub const PLACEHOLDER: &str = "{{COMPLETAR}}";

/// `(level, size_pt, bold)` for Heading1..5.
const HEADING_LEVELS: [(u8, f64, bool); 5] = [(1, 14.0, true), (2, 12.0, true), (3, 12.0, false), (4, 12.0, true), (5, 12.0, false)];
const HEADING_RUN_PT: f64 = 12.0;

#[derive(Debug, Clone, Deserialize)]
pub struct MaestriaConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub universidad: Option<String>,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default = "yes")]
    pub open_after_generate: bool,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub page_setup: PageSetup,
    pub cover: Cover,
    #[serde(default)]
    pub pre_pages: Vec<PrePage>,
    #[serde(default)]
    pub toc: Toc,
    #[serde(default)]
    pub include_list_of_tables: bool,
    #[serde(default)]
    pub include_list_of_figures: bool,
    #[serde(default)]
    pub structure_rules: StructureRules,
    #[serde(default)]
    pub structure: Vec<StructureItem>,
}

fn default_output_name() -> String {
    "output.docx".to_string()
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageSetup {
    #[serde(default)]
    pub margins_cm: Margins,
    #[serde(default)]
    pub font: FontSetup,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for Margins {
    fn default() -> Self {
        let g = PageGeometry::default();
        Self { left: g.left_cm, right: g.right_cm, top: g.top_cm, bottom: g.bottom_cm }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FontSetup {
    pub name: String,
    pub size_pt: f64,
}

impl Default for FontSetup {
    fn default() -> Self {
        Self { name: "Arial".to_string(), size_pt: 12.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cover {
    pub logo_width_cm: f64,
    pub text_size_pt: f64,
    pub title_size_pt: f64,
    pub universidad_linea: String,
    pub unidad: String,
    pub titulo: String,
    pub grado_maestria: String,
    pub autor: String,
    pub asesor: String,
    pub linea: String,
    pub ciudad: String,
    #[serde(deserialize_with = "string_or_number")]
    pub anio: String,
    pub pais: String,
}

impl Default for Cover {
    fn default() -> Self {
        Self {
            logo_width_cm: 3.5,
            text_size_pt: 12.0,
            title_size_pt: 14.0,
            universidad_linea: String::new(),
            unidad: String::new(),
            titulo: String::new(),
            grado_maestria: String::new(),
            autor: String::new(),
            asesor: String::new(),
            linea: String::new(),
            ciudad: String::new(),
            anio: String::new(),
            pais: "PERU".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrePage {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_pre_page_level")]
    pub title_level: u8,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default = "yes")]
    pub page_break_after: bool,
}

fn default_pre_page_level() -> u8 {
    4
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Toc {
    pub min_level: u8,
    pub max_level: u8,
}

impl Default for Toc {
    fn default() -> Self {
        Self { min_level: 1, max_level: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructureRules {
    pub add_placeholder_after_heading: bool,
    pub page_break_after_level_1: bool,
}

impl Default for StructureRules {
    fn default() -> Self {
        Self { add_placeholder_after_heading: true, page_break_after_level_1: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructureItem {
    pub level: u8,
    pub title: String,
    #[serde(default = "yes")]
    pub placeholder: bool,
    /// Lines may be strings or numbers; they are written as text.
    #[serde(default)]
    pub lines: Vec<serde_json::Value>,
}

fn line_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl MaestriaConfig {
    fn catalog_info(&self, output: &Path) -> CatalogInfo {
        let id = self.id.clone().unwrap_or_else(|| {
            output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        CatalogInfo {
            id,
            universidad: self.universidad.clone(),
            tipo: self.tipo.clone(),
            version: self.version.clone(),
            descripcion: self.descripcion.clone(),
        }
    }
}

pub struct MaestriaGenerator;

impl MaestriaGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Heading runs are Arial 12 pt at every level; the heading styles keep
    /// their own sizes for the navigation pane and the TOC.
    fn heading_style(&self, level: u8) -> LineStyle {
        let bold = HEADING_LEVELS
            .iter()
            .find(|(l, _, _)| *l == level)
            .map(|&(_, _, bold)| bold)
            .unwrap_or(false);
        let style = LineStyle { size_pt: HEADING_RUN_PT, font: Some("Arial".to_string()), ..LineStyle::default() };
        if bold {
            style.bold()
        } else {
            style
        }
    }

    fn cover(&self, cfg: &MaestriaConfig, resolver: &AssetResolver, doc: &mut DocBuilder) {
        let c = &cfg.cover;
        let logo = cfg.logo_path.as_deref().and_then(|name| resolver.resolve(name));
        doc.center_logo(logo.as_deref(), c.logo_width_cm, 6.0);

        let text = |after: f64| LineStyle::centered(c.text_size_pt).uppercase().font("Arial").after(after);
        doc.center_line(&c.universidad_linea, text(6.0).bold());
        doc.center_line(&c.unidad, text(18.0));
        doc.center_line(
            &format!("\"{}\"", c.titulo),
            LineStyle::centered(c.title_size_pt).bold().uppercase().font("Arial").after(12.0),
        );
        doc.center_line(&format!("TESIS PARA OPTAR EL GRADO ACADEMICO DE {}", c.grado_maestria), text(18.0).bold());
        doc.center_line(&c.autor, text(6.0));
        doc.center_line(&c.asesor, text(6.0));
        doc.center_line(&format!("LINEA DE INVESTIGACION: {}", c.linea), text(18.0));
        doc.center_line(&format!("{}, {}", c.ciudad, c.anio), text(6.0));
        doc.center_line(&c.pais, text(0.0));
        doc.page_break();
    }

    fn pre_pages(&self, cfg: &MaestriaConfig, doc: &mut DocBuilder) {
        for page in &cfg.pre_pages {
            if !page.title.is_empty() {
                doc.heading(&page.title, page.title_level, &self.heading_style(page.title_level));
            }
            for line in &page.lines {
                doc.paragraph(line);
            }
            if page.page_break_after {
                doc.page_break();
            }
        }
    }

    fn indexes(&self, cfg: &MaestriaConfig, doc: &mut DocBuilder) {
        let (min, max) = (cfg.toc.min_level.max(1), cfg.toc.max_level.max(cfg.toc.min_level.max(1)));
        doc.toc_page("INDICE", min, max);
        if cfg.include_list_of_tables {
            doc.list_of_tables("INDICE DE TABLAS");
        }
        if cfg.include_list_of_figures {
            doc.list_of_figures("INDICE DE FIGURAS");
        }
    }

    /// With `page_break_after_level_1`, a level-1 item directly followed by
    /// another level-1 item ends its page. A chapter with subsections keeps
    /// them on its page and the last item never adds a trailing break.
    fn structure(&self, cfg: &MaestriaConfig, doc: &mut DocBuilder) {
        let rules = &cfg.structure_rules;
        for (i, item) in cfg.structure.iter().enumerate() {
            doc.heading(&item.title, item.level, &self.heading_style(item.level));
            if rules.add_placeholder_after_heading && item.placeholder {
                doc.paragraph(PLACEHOLDER);
            }
            for line in &item.lines {
                doc.paragraph(&line_text(line));
            }
            let next_is_chapter = cfg.structure.get(i + 1).is_some_and(|next| next.level == 1);
            if rules.page_break_after_level_1 && item.level == 1 && next_is_chapter {
                doc.page_break();
            }
        }
    }

    pub fn build(&self, cfg: &MaestriaConfig, resolver: &AssetResolver, doc: &mut DocBuilder) {
        let m = &cfg.page_setup.margins_cm;
        let font = &cfg.page_setup.font;
        doc.page_setup(PageGeometry {
            left_cm: m.left,
            right_cm: m.right,
            top_cm: m.top,
            bottom_cm: m.bottom,
            ..PageGeometry::default()
        })
        .base_font(&font.name, font.size_pt)
        .heading_styles(&font.name, &HEADING_LEVELS);

        self.cover(cfg, resolver, doc);
        self.pre_pages(cfg, doc);
        self.indexes(cfg, doc);
        self.structure(cfg, doc);
        doc.page_numbers("Arial", 10.0);
    }
}

impl Default for MaestriaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentGenerator for MaestriaGenerator {
    fn generate(&self, config: &Path, output: &Path, ctx: &GenerationContext) -> Result<GenerationReport> {
        let config = resolve_config_path(config, ctx.formats_dir.as_deref())?;
        let cfg: MaestriaConfig = load_json(&config)?;
        let resolver = AssetResolver::new(ctx.assets_base(&config));

        let mut doc = DocBuilder::new();
        self.build(&cfg, &resolver, &mut doc);

        let mut report = GenerationReport::new(output);
        report.paragraphs = doc.paragraph_count();
        report.tables = doc.table_count();
        report.warnings = doc.warnings().to_vec();
        report.open_after = cfg.open_after_generate;
        doc.save(output)?;
        info!("maestria generated: {} ({} structure items)", output.display(), cfg.structure.len());

        if ctx.catalog {
            let updated = CatalogEntry::for_output(&cfg.catalog_info(output), output)
                .and_then(|entry| update_catalog(&catalog_path_for(output), &entry));
            if let Err(e) = updated {
                warn!("catalog not updated: {:#}", e);
                report.warnings.push(format!("catalog not updated: {:#}", e));
            }
        }
        Ok(report)
    }

    fn default_output_name(&self, config: &Path) -> Result<String> {
        let cfg: MaestriaConfig = load_json(config)?;
        Ok(cfg.output_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "unac_maestria_cuant",
        "universidad": "UNAC",
        "tipo": "maestria",
        "version": "1.0",
        "descripcion": "Tesis de maestria cuantitativa",
        "output_name": "Maestria_Cuantitativa.docx",
        "page_setup": {"margins_cm": {"left": 3.5, "right": 2.5, "top": 3, "bottom": 3}, "font": {"name": "Arial", "size_pt": 12}},
        "cover": {
            "universidad_linea": "Universidad Nacional del Callao",
            "unidad": "Escuela de Posgrado",
            "titulo": "Titulo de la tesis",
            "grado_maestria": "Maestro en Gestion",
            "autor": "Autor",
            "asesor": "Asesor",
            "linea": "Gestion",
            "ciudad": "Callao",
            "anio": 2024
        },
        "pre_pages": [
            {"title": "DEDICATORIA", "lines": ["A mis padres"]},
            {"lines": ["Pagina sin titulo"], "page_break_after": false}
        ],
        "include_list_of_tables": true,
        "structure": [
            {"level": 1, "title": "I. PLANTEAMIENTO DEL PROBLEMA"},
            {"level": 2, "title": "1.1 Descripcion", "lines": ["Linea extra", 2024]},
            {"level": 1, "title": "II. MARCO TEORICO", "placeholder": false}
        ]
    }"#;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg: MaestriaConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.cover.pais, "PERU");
        assert_eq!(cfg.cover.logo_width_cm, 3.5);
        assert_eq!(cfg.pre_pages[0].title_level, 4);
        assert!(cfg.pre_pages[0].page_break_after);
        assert_eq!((cfg.toc.min_level, cfg.toc.max_level), (1, 3));
        assert!(cfg.structure_rules.add_placeholder_after_heading);
        assert!(cfg.open_after_generate);
    }

    #[test]
    fn structure_layout() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: MaestriaConfig = serde_json::from_str(SAMPLE).unwrap();
        let mut doc = DocBuilder::new();
        MaestriaGenerator::new().build(&cfg, &AssetResolver::new(dir.path()), &mut doc);

        // no logo_path configured
        assert_eq!(doc.warnings().len(), 1);
        let cover = 9 + 1;
        let pre_pages = 3 + 1;
        // toc title/field/break, list of tables title/field/break
        let indexes = 3 + 3;
        // item 1: heading + placeholder; item 2: heading + placeholder + 2 lines;
        // item 3: heading
        let structure = 2 + 4 + 1;
        assert_eq!(doc.paragraph_count(), cover + pre_pages + indexes + structure);
    }

    #[test]
    fn page_breaks_only_between_consecutive_chapters() {
        let mut cfg: MaestriaConfig = serde_json::from_str(SAMPLE).unwrap();
        cfg.structure_rules.add_placeholder_after_heading = false;
        cfg.structure = serde_json::from_str(
            r#"[
                {"level": 1, "title": "INTRODUCCION"},
                {"level": 1, "title": "I. PLANTEAMIENTO"},
                {"level": 2, "title": "1.1 Descripcion"},
                {"level": 1, "title": "II. MARCO TEORICO"}
            ]"#,
        )
        .unwrap();

        let mut doc = DocBuilder::new();
        MaestriaGenerator::new().structure(&cfg, &mut doc);
        // four headings, one break after INTRODUCCION
        assert_eq!(doc.paragraph_count(), 4 + 1);

        cfg.structure_rules.page_break_after_level_1 = false;
        let mut doc = DocBuilder::new();
        MaestriaGenerator::new().structure(&cfg, &mut doc);
        assert_eq!(doc.paragraph_count(), 4);
    }

    #[test]
    fn heading_runs_are_arial_12() {
        let generator = MaestriaGenerator::new();
        for level in 1..=5 {
            let style = generator.heading_style(level);
            assert_eq!(style.size_pt, 12.0);
            assert_eq!(style.font.as_deref(), Some("Arial"));
        }
        assert!(generator.heading_style(1).bold);
        assert!(!generator.heading_style(3).bold);
    }

    #[test]
    fn index_and_footer_fields_in_the_package() {
        use crate::core::writer::package;

        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("unac_maestria_cuant.json");
        std::fs::write(&config, SAMPLE).unwrap();
        let out = dir.path().join("maestria.docx");
        MaestriaGenerator::new()
            .generate(&config, &out, &GenerationContext::default())
            .unwrap();

        let body = package::instr_texts(&package::part(&out, "word/document.xml"));
        assert!(body.iter().any(|i| i == r#"TOC \o "1-3" \h \z \u"#), "{:?}", body);
        assert!(body.iter().any(|i| i == r#"TOC \h \z \c "Tabla""#), "{:?}", body);

        let footers = package::parts(&out, "word/footer");
        assert!(!footers.is_empty());
        assert!(footers.iter().any(|xml| package::instr_texts(xml).iter().any(|i| i == "PAGE")));
    }

    #[test]
    fn lines_accept_numbers() {
        assert_eq!(line_text(&serde_json::json!("a")), "a");
        assert_eq!(line_text(&serde_json::json!(2024)), "2024");
    }

    #[test]
    fn generate_updates_catalog_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("unac_maestria_cuant.json");
        std::fs::write(&config, SAMPLE).unwrap();
        let out = dir.path().join("out").join("Maestria.docx");

        let generator = MaestriaGenerator::new();
        assert_eq!(generator.default_output_name(&config).unwrap(), "Maestria_Cuantitativa.docx");

        generator.generate(&config, &out, &GenerationContext::default()).unwrap();
        assert!(!dir.path().join("out").join("catalog.json").exists());

        let ctx = GenerationContext::default().with_catalog(true);
        generator.generate(&config, &out, &ctx).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("out").join("catalog.json")).unwrap();
        let entries: Vec<CatalogEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "unac_maestria_cuant");
        assert_eq!(entries[0].file, "Maestria.docx");
    }
}
