use crate::core::layout::{DocumentStructure, Element, HeaderFooter, Orientation, ParagraphInfo, RunInfo, TableInfo};
use crate::core::writer::{cm_to_twips, fonts, indented, pt_to_half_points, pt_to_twips, text_run, Align, DocBuilder, PageGeometry};
use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use docx_rs::{LineSpacing, LineSpacingType, Paragraph, Run, Table, TableCell, TableRow, WidthType};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

const EMU_PER_PT: f64 = 12_700.0;

/// Interline value of an extracted paragraph as `w:line` twips and rule.
/// Up to 5 it is a multiple of single spacing, above 1000 an exact height in
/// EMU, anything between an exact height in points.
fn line_rule(line: f64) -> (i64, LineSpacingType) {
    if line <= 5.0 {
        return ((line * 240.0).round() as i64, LineSpacingType::Auto);
    }
    let points = if line > 1000.0 { line / EMU_PER_PT } else { line };
    (pt_to_twips(points), LineSpacingType::Exact)
}

/// Writer rebuilds a document from its extracted structure.
pub trait Writer {
    fn write<P: AsRef<Path>>(&self, structure: &DocumentStructure, out_path: P) -> Result<ReplicationReport>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationReport {
    pub output: PathBuf,
    pub replicated: usize,
    pub skipped: usize,
}

/// `replica_<YYYYMMDD_HHMMSS>.docx`
pub fn default_output_name(now: DateTime<Local>) -> String {
    format!("replica_{}.docx", now.format("%Y%m%d_%H%M%S"))
}

/// Accepts `RRGGBB`, `#RRGGBB` and `RGBColor(0xRRGGBB)`.
pub fn parse_color(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("RGBColor(")
        .and_then(|rest| rest.strip_suffix(')'))
        .map(|inner| inner.trim().trim_start_matches("0x").trim_start_matches("0X"))
        .unwrap_or_else(|| trimmed.trim_start_matches('#'));
    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| hex.to_ascii_uppercase())
}

/// `Heading 2` → `Heading2`, for styles the builder defines.
fn heading_style_id(style: &str) -> Option<String> {
    let level = style.strip_prefix("Heading ")?.trim().parse::<u8>().ok()?;
    (1..=5).contains(&level).then(|| format!("Heading{}", level))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocxReplicator;

impl DocxReplicator {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, info: &RunInfo) -> Run {
        let mut run = text_run(&info.text);
        if info.bold {
            run = run.bold();
        }
        if info.italic {
            run = run.italic();
        }
        if info.underline {
            run = run.underline("single");
        }
        if info.strike {
            run = run.strike();
        }
        if let Some(font) = &info.font {
            run = run.fonts(fonts(font));
        }
        if let Some(size) = info.size_pt.filter(|s| *s > 0.0) {
            run = run.size(pt_to_half_points(size));
        }
        if let Some(color) = info.color.as_deref().and_then(parse_color) {
            run = run.color(color);
        }
        if let Some(highlight) = info.highlight.as_deref().filter(|h| h.chars().all(|c| c.is_ascii_alphabetic())) {
            run = run.highlight(highlight);
        }
        run
    }

    fn line_spacing(&self, info: &ParagraphInfo) -> Option<LineSpacing> {
        if info.space_before_pt.is_none() && info.space_after_pt.is_none() && info.line_spacing.is_none() {
            return None;
        }
        let mut spacing = LineSpacing::new();
        if let Some(before) = info.space_before_pt {
            spacing = spacing.before(pt_to_twips(before).try_into().unwrap_or_default());
        }
        if let Some(after) = info.space_after_pt {
            spacing = spacing.after(pt_to_twips(after).try_into().unwrap_or_default());
        }
        if let Some(line) = info.line_spacing.filter(|l| *l > 0.0) {
            let (twips, rule) = line_rule(line);
            spacing = spacing.line(twips.try_into().unwrap_or(240)).line_rule(rule);
        }
        Some(spacing)
    }

    pub fn paragraph(&self, info: &ParagraphInfo) -> Paragraph {
        let mut paragraph = Paragraph::new().align(Align::parse(&info.alignment).to_docx());
        if let Some(id) = heading_style_id(&info.style) {
            paragraph = paragraph.style(&id);
        }
        paragraph = indented(paragraph, info.left_indent_cm, info.right_indent_cm, info.first_line_cm);
        if let Some(spacing) = self.line_spacing(info) {
            paragraph = paragraph.line_spacing(spacing);
        }

        if info.runs.is_empty() {
            if !info.text.is_empty() {
                paragraph = paragraph.add_run(text_run(&info.text));
            }
        } else {
            for run in &info.runs {
                paragraph = paragraph.add_run(self.run(run));
            }
        }
        paragraph
    }

    /// Rebuild a table as a plain grid spread over the usable page width.
    pub fn table(&self, info: &TableInfo, usable_width_cm: f64) -> Result<Table> {
        let rows = info.rows.max(info.content.len());
        let columns = info
            .columns
            .max(info.content.iter().map(Vec::len).max().unwrap_or(0));
        if rows == 0 || columns == 0 {
            bail!("table has {} rows and {} columns", rows, columns);
        }
        if info.style != crate::core::layout::NO_TABLE_STYLE {
            debug!("table style {:?} is not carried over", info.style);
        }

        let column_twips = (cm_to_twips(usable_width_cm).max(0) as usize) / columns;
        let table_rows: Vec<TableRow> = (0..rows)
            .map(|r| {
                let cells = (0..columns)
                    .map(|c| {
                        let mut cell = TableCell::new().width(column_twips, WidthType::Dxa);
                        match info.content.get(r).and_then(|row| row.get(c)) {
                            Some(content) if !content.paragraphs.is_empty() => {
                                for p in &content.paragraphs {
                                    cell = cell.add_paragraph(self.paragraph(p));
                                }
                            }
                            Some(content) => {
                                cell = cell.add_paragraph(Paragraph::new().add_run(text_run(&content.text)));
                            }
                            None => cell = cell.add_paragraph(Paragraph::new()),
                        }
                        cell
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();

        Ok(Table::new(table_rows).set_grid(vec![column_twips; columns]))
    }

    fn header_footer_paragraphs(&self, blocks: &[HeaderFooter]) -> Vec<Paragraph> {
        blocks
            .iter()
            .find(|b| b.section == 0)
            .or_else(|| blocks.first())
            .map(|b| b.elements.iter().map(|p| self.paragraph(p)).collect())
            .unwrap_or_default()
    }

    /// Fill a builder with the structure; returns (replicated, skipped).
    pub fn build(&self, structure: &DocumentStructure, doc: &mut DocBuilder) -> Result<(usize, usize)> {
        let mut geometry = PageGeometry::default();
        if let Some(page) = structure.main_page() {
            geometry = PageGeometry {
                width_cm: page.width_cm,
                height_cm: page.height_cm,
                left_cm: page.left_cm,
                right_cm: page.right_cm,
                top_cm: page.top_cm,
                bottom_cm: page.bottom_cm,
                landscape: page.orientation == Orientation::Horizontal,
            };
        }
        let usable_width = if geometry.landscape {
            geometry.width_cm.max(geometry.height_cm)
        } else {
            geometry.width_cm
        } - geometry.left_cm
            - geometry.right_cm;
        doc.page_setup(geometry);
        doc.heading_styles("Arial", &[(1, 14.0, true), (2, 13.0, true), (3, 12.0, true), (4, 12.0, true), (5, 12.0, false)]);

        doc.header_paragraphs(self.header_footer_paragraphs(&structure.headers));
        doc.footer_paragraphs(self.header_footer_paragraphs(&structure.footers));

        let (mut replicated, mut skipped) = (0, 0);
        for (i, element) in structure.elements.iter().enumerate() {
            match element {
                Element::Paragraph(p) => {
                    doc.push(self.paragraph(p));
                    replicated += 1;
                }
                Element::Table(t) => match self.table(t, usable_width) {
                    Ok(table) => {
                        doc.push_table(table);
                        replicated += 1;
                    }
                    Err(e) => {
                        warn!("element {} skipped: {:#}", i, e);
                        skipped += 1;
                    }
                },
            }
            if (i + 1) % 20 == 0 {
                debug!("{}/{} elements replicated", i + 1, structure.elements.len());
            }
        }

        if replicated == 0 && !structure.elements.is_empty() {
            bail!("none of the {} elements could be replicated", structure.elements.len());
        }
        Ok((replicated, skipped))
    }
}

impl Writer for DocxReplicator {
    fn write<P: AsRef<Path>>(&self, structure: &DocumentStructure, out_path: P) -> Result<ReplicationReport> {
        let out_path = out_path.as_ref();
        let mut doc = DocBuilder::new();
        let (replicated, skipped) = self.build(structure, &mut doc)?;
        doc.save(out_path)?;
        info!("replicated {} elements into {}", replicated, out_path.display());
        Ok(ReplicationReport { output: out_path.to_path_buf(), replicated, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::CellInfo;
    use chrono::TimeZone;

    #[test]
    fn colors_in_all_extracted_forms() {
        assert_eq!(parse_color("ff0000").as_deref(), Some("FF0000"));
        assert_eq!(parse_color("#00ff00").as_deref(), Some("00FF00"));
        assert_eq!(parse_color("RGBColor(0x595959)").as_deref(), Some("595959"));
        assert_eq!(parse_color("auto"), None);
        assert_eq!(parse_color("RGBColor(0x12)"), None);
    }

    #[test]
    fn heading_styles_map_to_builder_ids() {
        assert_eq!(heading_style_id("Heading 1").as_deref(), Some("Heading1"));
        assert_eq!(heading_style_id("Heading 9"), None);
        assert_eq!(heading_style_id("Normal"), None);
    }

    #[test]
    fn interline_multiples_points_and_emu() {
        assert_eq!(line_rule(1.5), (360, LineSpacingType::Auto));
        assert_eq!(line_rule(1.0), (240, LineSpacingType::Auto));
        assert_eq!(line_rule(18.0), (360, LineSpacingType::Exact));
        // 152400 EMU is 12 pt
        assert_eq!(line_rule(152_400.0), (240, LineSpacingType::Exact));
    }

    #[test]
    fn output_name_uses_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(default_output_name(now), "replica_20240506_070809.docx");
    }

    #[test]
    fn empty_tables_are_rejected() {
        let info = TableInfo { rows: 0, columns: 0, style: "Sin estilo".into(), content: vec![] };
        assert!(DocxReplicator::new().table(&info, 15.0).is_err());
    }

    #[test]
    fn short_rows_are_padded() {
        let info = TableInfo {
            rows: 2,
            columns: 2,
            style: "Sin estilo".into(),
            content: vec![vec![CellInfo { text: "a".into(), paragraphs: vec![] }]],
        };
        assert!(DocxReplicator::new().table(&info, 15.0).is_ok());
    }

    #[test]
    fn all_elements_failing_is_an_error() {
        let structure = DocumentStructure {
            elements: vec![Element::Table(TableInfo::default())],
            ..Default::default()
        };
        let mut doc = DocBuilder::new();
        assert!(DocxReplicator::new().build(&structure, &mut doc).is_err());
    }

    #[test]
    fn skipped_elements_are_counted() {
        let structure = DocumentStructure {
            elements: vec![
                Element::Paragraph(ParagraphInfo { text: "Hola".into(), ..Default::default() }),
                Element::Table(TableInfo::default()),
            ],
            ..Default::default()
        };
        let mut doc = DocBuilder::new();
        let (replicated, skipped) = DocxReplicator::new().build(&structure, &mut doc).unwrap();
        assert_eq!((replicated, skipped), (1, 1));
        assert_eq!(doc.paragraph_count(), 1);
    }
}
