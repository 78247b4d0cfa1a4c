use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat description of a .docx: page setup, headers/footers and the body
/// elements in document order. Field names follow the JSON files produced
/// by the earlier extraction scripts so existing files keep loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentStructure {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(rename = "configuracion_pagina", default)]
    pub page: Option<PageConfig>,
    #[serde(rename = "secciones", default)]
    pub sections: Vec<PageConfig>,
    #[serde(rename = "elementos", default)]
    pub elements: Vec<Element>,
    #[serde(rename = "encabezados", default)]
    pub headers: Vec<HeaderFooter>,
    #[serde(rename = "pies_pagina", default)]
    pub footers: Vec<HeaderFooter>,
    #[serde(rename = "estilos_usados", default)]
    pub styles_used: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(rename = "autor", default)]
    pub author: String,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "asunto", default)]
    pub subject: String,
    #[serde(rename = "creado", default)]
    pub created: String,
    #[serde(rename = "modificado", default)]
    pub modified: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageConfig {
    #[serde(rename = "seccion_num", default)]
    pub index: usize,
    #[serde(rename = "ancho_cm")]
    pub width_cm: f64,
    #[serde(rename = "alto_cm")]
    pub height_cm: f64,
    #[serde(rename = "margen_superior_cm")]
    pub top_cm: f64,
    #[serde(rename = "margen_inferior_cm")]
    pub bottom_cm: f64,
    #[serde(rename = "margen_izquierdo_cm")]
    pub left_cm: f64,
    #[serde(rename = "margen_derecho_cm")]
    pub right_cm: f64,
    #[serde(rename = "orientacion", default)]
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tipo")]
pub enum Element {
    #[serde(rename = "parrafo")]
    Paragraph(ParagraphInfo),
    #[serde(rename = "tabla")]
    Table(TableInfo),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParagraphInfo {
    #[serde(rename = "texto", default)]
    pub text: String,
    #[serde(rename = "estilo", default = "default_style")]
    pub style: String,
    #[serde(rename = "alineacion", default = "default_alignment")]
    pub alignment: String,
    #[serde(rename = "sangria_izquierda_cm", skip_serializing_if = "Option::is_none", default)]
    pub left_indent_cm: Option<f64>,
    #[serde(rename = "sangria_derecha_cm", skip_serializing_if = "Option::is_none", default)]
    pub right_indent_cm: Option<f64>,
    #[serde(rename = "primera_linea_cm", skip_serializing_if = "Option::is_none", default)]
    pub first_line_cm: Option<f64>,
    #[serde(rename = "espacio_antes_pt", skip_serializing_if = "Option::is_none", default)]
    pub space_before_pt: Option<f64>,
    #[serde(rename = "espacio_despues_pt", skip_serializing_if = "Option::is_none", default)]
    pub space_after_pt: Option<f64>,
    /// Multiple of single spacing (e.g. 1.5); above 5 an exact height in
    /// points, or in EMU when above 1000.
    #[serde(rename = "interlineado", skip_serializing_if = "Option::is_none", default)]
    pub line_spacing: Option<f64>,
    #[serde(default)]
    pub runs: Vec<RunInfo>,
}

fn default_style() -> String {
    "Normal".to_string()
}

fn default_alignment() -> String {
    "left".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunInfo {
    #[serde(rename = "texto", default)]
    pub text: String,
    #[serde(rename = "negrita", default)]
    pub bold: bool,
    #[serde(rename = "cursiva", default)]
    pub italic: bool,
    #[serde(rename = "subrayado", default)]
    pub underline: bool,
    #[serde(rename = "tachado", default)]
    pub strike: bool,
    #[serde(rename = "fuente", skip_serializing_if = "Option::is_none", default)]
    pub font: Option<String>,
    #[serde(rename = "tamaño_pt", skip_serializing_if = "Option::is_none", default)]
    pub size_pt: Option<f64>,
    #[serde(rename = "color_rgb", skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
    #[serde(rename = "resaltado", skip_serializing_if = "Option::is_none", default)]
    pub highlight: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableInfo {
    #[serde(rename = "filas")]
    pub rows: usize,
    #[serde(rename = "columnas")]
    pub columns: usize,
    #[serde(rename = "estilo", default = "default_table_style")]
    pub style: String,
    #[serde(rename = "contenido", default)]
    pub content: Vec<Vec<CellInfo>>,
}

pub const NO_TABLE_STYLE: &str = "Sin estilo";

fn default_table_style() -> String {
    NO_TABLE_STYLE.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellInfo {
    #[serde(rename = "texto", default)]
    pub text: String,
    #[serde(rename = "parrafos", default)]
    pub paragraphs: Vec<ParagraphInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeaderFooter {
    #[serde(rename = "seccion")]
    pub section: usize,
    #[serde(rename = "elementos", default)]
    pub elements: Vec<ParagraphInfo>,
}

impl DocumentStructure {
    pub fn paragraph_count(&self) -> usize {
        self.elements.iter().filter(|e| matches!(e, Element::Paragraph(_))).count()
    }

    pub fn table_count(&self) -> usize {
        self.elements.iter().filter(|e| matches!(e, Element::Table(_))).count()
    }

    /// Page configuration used when rebuilding: the explicit one, else the
    /// first section.
    pub fn main_page(&self) -> Option<&PageConfig> {
        self.page.as_ref().or_else(|| self.sections.first())
    }

    pub fn record_style(&mut self, style: &str) {
        *self.styles_used.entry(style.to_string()).or_insert(0) += 1;
    }
}

impl HeaderFooter {
    pub fn has_text(&self) -> bool {
        self.elements.iter().any(|p| !p.text.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_are_tagged_by_tipo() {
        let json = r#"{
            "elementos": [
                {"tipo": "parrafo", "texto": "Hola", "runs": [{"texto": "Hola", "negrita": true, "tamaño_pt": 14.0}]},
                {"tipo": "tabla", "filas": 1, "columnas": 2, "contenido": [[{"texto": "a"}, {"texto": "b"}]]}
            ]
        }"#;
        let doc: DocumentStructure = serde_json::from_str(json).unwrap();
        assert_eq!(doc.paragraph_count(), 1);
        assert_eq!(doc.table_count(), 1);
        match &doc.elements[0] {
            Element::Paragraph(p) => {
                assert_eq!(p.style, "Normal");
                assert_eq!(p.alignment, "left");
                assert!(p.runs[0].bold);
                assert_eq!(p.runs[0].size_pt, Some(14.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &doc.elements[1] {
            Element::Table(t) => assert_eq!(t.style, NO_TABLE_STYLE),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn optional_paragraph_fields_are_omitted() {
        let p = ParagraphInfo { text: "x".into(), style: "Normal".into(), alignment: "left".into(), ..Default::default() };
        let value = serde_json::to_value(Element::Paragraph(p)).unwrap();
        assert_eq!(value["tipo"], "parrafo");
        assert!(value.get("sangria_izquierda_cm").is_none());
        assert!(value.get("interlineado").is_none());
    }

    #[test]
    fn main_page_prefers_explicit_config() {
        let page = PageConfig {
            index: 0,
            width_cm: 21.0,
            height_cm: 29.7,
            top_cm: 3.0,
            bottom_cm: 3.0,
            left_cm: 3.5,
            right_cm: 2.5,
            orientation: Orientation::Vertical,
        };
        let mut doc = DocumentStructure { sections: vec![page.clone()], ..Default::default() };
        assert_eq!(doc.main_page(), Some(&page));
        let mut landscape = page.clone();
        landscape.orientation = Orientation::Horizontal;
        doc.page = Some(landscape.clone());
        assert_eq!(doc.main_page(), Some(&landscape));
    }

    #[test]
    fn record_style_counts() {
        let mut doc = DocumentStructure::default();
        doc.record_style("Normal");
        doc.record_style("Normal");
        doc.record_style("Heading 1");
        assert_eq!(doc.styles_used["Normal"], 2);
        assert_eq!(doc.styles_used["Heading 1"], 1);
    }
}
