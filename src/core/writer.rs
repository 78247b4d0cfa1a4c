use anyhow::{Context, Result};
use docx_rs::{
    AlignmentType, BreakType, Docx, FieldCharType, Footer, Header, InstrText, LineSpacing,
    LineSpacingType, PageMargin, PageOrientationType, Paragraph, Pic, Run, RunFonts,
    SpecialIndentType, Style, StyleType, Table,
};
use log::{debug, warn};
use std::fs::File;
use std::path::Path;

pub const TWIPS_PER_CM: f64 = 1440.0 / 2.54;
pub const EMU_PER_CM: f64 = 360_000.0;

/// Single and one-and-a-half line spacing in 240ths of a line.
pub const LINE_SINGLE: i64 = 240;
pub const LINE_ONE_HALF: i64 = 360;

pub fn cm_to_twips(cm: f64) -> i64 {
    (cm * TWIPS_PER_CM).round() as i64
}

pub fn pt_to_twips(pt: f64) -> i64 {
    (pt * 20.0).round() as i64
}

/// Font sizes in WordprocessingML are half-points.
pub fn pt_to_half_points(pt: f64) -> usize {
    (pt * 2.0).round().max(1.0) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "center" | "centro" => Align::Center,
            "right" | "derecha" => Align::Right,
            "justify" | "both" | "justificado" => Align::Justify,
            _ => Align::Left,
        }
    }

    pub(crate) fn to_docx(self) -> AlignmentType {
        match self {
            Align::Left => AlignmentType::Left,
            Align::Center => AlignmentType::Center,
            Align::Right => AlignmentType::Right,
            Align::Justify => AlignmentType::Both,
        }
    }
}

/// Page size, margins and orientation in centimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width_cm: f64,
    pub height_cm: f64,
    pub left_cm: f64,
    pub right_cm: f64,
    pub top_cm: f64,
    pub bottom_cm: f64,
    pub landscape: bool,
}

impl Default for PageGeometry {
    fn default() -> Self {
        // A4 with the institutional margins
        Self {
            width_cm: 21.0,
            height_cm: 29.7,
            left_cm: 3.5,
            right_cm: 2.5,
            top_cm: 3.0,
            bottom_cm: 3.0,
            landscape: false,
        }
    }
}

/// Formatting of a single-run paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub size_pt: f64,
    pub bold: bool,
    pub italic: bool,
    pub uppercase: bool,
    pub before_pt: f64,
    pub after_pt: f64,
    /// `None` leaves the paragraph on the document's base alignment.
    pub align: Option<Align>,
    pub font: Option<String>,
    pub color: Option<String>,
    pub line: Option<i64>,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            size_pt: 12.0,
            bold: false,
            italic: false,
            uppercase: false,
            before_pt: 0.0,
            after_pt: 0.0,
            align: None,
            font: None,
            color: None,
            line: None,
        }
    }
}

impl LineStyle {
    pub fn centered(size_pt: f64) -> Self {
        Self { size_pt, align: Some(Align::Center), ..Self::default() }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }

    pub fn before(mut self, pt: f64) -> Self {
        self.before_pt = pt;
        self
    }

    pub fn after(mut self, pt: f64) -> Self {
        self.after_pt = pt;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn font<S: Into<String>>(mut self, font: S) -> Self {
        self.font = Some(font.into());
        self
    }

    pub fn color<S: Into<String>>(mut self, color: S) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn single_spaced(mut self) -> Self {
        self.line = Some(LINE_SINGLE);
        self
    }
}

pub fn fonts(name: &str) -> RunFonts {
    RunFonts::new().ascii(name).hi_ansi(name).cs(name).east_asia(name)
}

/// Text run; embedded newlines become line breaks.
pub fn text_run(text: &str) -> Run {
    let mut run = Run::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    run
}

/// A complex field (`begin` / `instrText` / `end`). Word computes the value
/// when fields are updated.
pub fn field_run(instr: &str) -> Run {
    Run::new()
        .add_field_char(FieldCharType::Begin, true)
        .add_instr_text(InstrText::Unsupported(format!(" {} ", instr.trim())))
        .add_field_char(FieldCharType::Separate, false)
        .add_field_char(FieldCharType::End, false)
}

pub fn toc_instr(min_level: u8, max_level: u8) -> String {
    format!("TOC \\o \"{}-{}\" \\h \\z \\u", min_level, max_level)
}

pub fn caption_list_instr(label: &str) -> String {
    format!("TOC \\h \\z \\c \"{}\"", label)
}

pub fn spacing(before_pt: f64, after_pt: f64, line: Option<i64>) -> LineSpacing {
    let mut spacing = LineSpacing::new()
        .before(pt_to_twips(before_pt).try_into().unwrap_or_default())
        .after(pt_to_twips(after_pt).try_into().unwrap_or_default());
    if let Some(line) = line {
        spacing = spacing
            .line(line.try_into().unwrap_or(240))
            .line_rule(LineSpacingType::Auto);
    }
    spacing
}

pub fn styled_run(text: &str, style: &LineStyle) -> Run {
    let content = if style.uppercase { text.to_uppercase() } else { text.to_string() };
    let mut run = text_run(&content).size(pt_to_half_points(style.size_pt));
    if style.bold {
        run = run.bold();
    }
    if style.italic {
        run = run.italic();
    }
    if let Some(font) = &style.font {
        run = run.fonts(fonts(font));
    }
    if let Some(color) = &style.color {
        run = run.color(color.trim_start_matches('#'));
    }
    run
}

pub fn styled_paragraph(text: &str, style: &LineStyle) -> Paragraph {
    let paragraph = Paragraph::new()
        .add_run(styled_run(text, style))
        .line_spacing(spacing(style.before_pt, style.after_pt, style.line));
    match style.align {
        Some(align) => paragraph.align(align.to_docx()),
        None => paragraph,
    }
}

pub fn page_break_paragraph() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

pub fn indented(paragraph: Paragraph, left_cm: Option<f64>, right_cm: Option<f64>, first_line_cm: Option<f64>) -> Paragraph {
    if left_cm.is_none() && right_cm.is_none() && first_line_cm.is_none() {
        return paragraph;
    }
    let special = first_line_cm.map(|cm| {
        let twips = cm_to_twips(cm);
        if twips < 0 {
            SpecialIndentType::Hanging((-twips).try_into().unwrap_or_default())
        } else {
            SpecialIndentType::FirstLine(twips.try_into().unwrap_or_default())
        }
    });
    paragraph.indent(
        left_cm.map(|cm| cm_to_twips(cm).try_into().unwrap_or_default()),
        special,
        right_cm.map(|cm| cm_to_twips(cm).try_into().unwrap_or_default()),
        None,
    )
}

/// Decode an image far enough to know its size, then scale it to `width_cm`
/// keeping the aspect ratio.
pub fn load_picture(path: &Path, width_cm: f64) -> Result<Pic> {
    let bytes = std::fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
    let img = image::load_from_memory(&bytes).with_context(|| format!("decoding image {}", path.display()))?;
    let (w, h) = (img.width().max(1) as f64, img.height() as f64);
    let width_emu = width_cm * EMU_PER_CM;
    let height_emu = width_emu * h / w;
    Ok(Pic::new(&bytes).size(width_emu.round() as u32, height_emu.round() as u32))
}

enum Block {
    Paragraph(Box<Paragraph>),
    Table(Box<Table>),
}

/// Accumulates document content in order and packs it into a .docx.
pub struct DocBuilder {
    blocks: Vec<Block>,
    geometry: PageGeometry,
    font: String,
    size_pt: f64,
    line: Option<i64>,
    align: Option<Align>,
    styles: Vec<Style>,
    header: Option<Header>,
    footer: Option<Footer>,
    paragraphs: usize,
    tables: usize,
    warnings: Vec<String>,
}

impl Default for DocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocBuilder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            geometry: PageGeometry::default(),
            font: "Arial".to_string(),
            size_pt: 12.0,
            line: None,
            align: None,
            styles: Vec::new(),
            header: None,
            footer: None,
            paragraphs: 0,
            tables: 0,
            warnings: Vec::new(),
        }
    }

    pub fn page_setup(&mut self, geometry: PageGeometry) -> &mut Self {
        self.geometry = geometry;
        self
    }

    pub fn base_font(&mut self, name: &str, size_pt: f64) -> &mut Self {
        self.font = name.to_string();
        self.size_pt = size_pt;
        self
    }

    /// Line spacing of the Normal style, in 240ths of a line.
    pub fn base_line_spacing(&mut self, line: i64) -> &mut Self {
        self.line = Some(line);
        self
    }

    /// Alignment given to every body paragraph that does not set its own.
    pub fn base_alignment(&mut self, align: Align) -> &mut Self {
        self.align = Some(align);
        self
    }

    /// Define `Heading1..N` paragraph styles as `(level, size_pt, bold)`.
    pub fn heading_styles(&mut self, font: &str, levels: &[(u8, f64, bool)]) -> &mut Self {
        for &(level, size_pt, bold) in levels {
            let mut style = Style::new(format!("Heading{}", level), StyleType::Paragraph)
                .name(format!("heading {}", level))
                .size(pt_to_half_points(size_pt))
                .fonts(fonts(font));
            if bold {
                style = style.bold();
            }
            self.styles.push(style);
        }
        self
    }

    pub fn push(&mut self, mut paragraph: Paragraph) -> &mut Self {
        if let Some(align) = self.align {
            if paragraph.property.alignment.is_none() {
                paragraph = paragraph.align(align.to_docx());
            }
        }
        self.paragraphs += 1;
        self.blocks.push(Block::Paragraph(Box::new(paragraph)));
        self
    }

    pub fn push_table(&mut self, table: Table) -> &mut Self {
        self.tables += 1;
        self.blocks.push(Block::Table(Box::new(table)));
        self
    }

    pub fn line(&mut self, text: &str, style: &LineStyle) -> &mut Self {
        self.push(styled_paragraph(text, style))
    }

    pub fn center_line(&mut self, text: &str, style: LineStyle) -> &mut Self {
        let style = style.align(Align::Center);
        self.line(text, &style)
    }

    /// Plain paragraph in the document's base font.
    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        self.push(Paragraph::new().add_run(text_run(text)))
    }

    pub fn justified(&mut self, text: &str) -> &mut Self {
        self.push(Paragraph::new().add_run(text_run(text)).align(AlignmentType::Both))
    }

    pub fn blank(&mut self) -> &mut Self {
        self.push(Paragraph::new())
    }

    /// Heading paragraph bound to `HeadingN` with the matching outline level,
    /// so TOC fields list it.
    pub fn heading(&mut self, text: &str, level: u8, style: &LineStyle) -> &mut Self {
        let level = level.clamp(1, 9);
        let paragraph = styled_paragraph(text, style)
            .style(&format!("Heading{}", level))
            .outline_lvl((level - 1) as usize);
        self.push(paragraph)
    }

    /// Italic grey guidance note for the student.
    pub fn guide_note(&mut self, text: &str) -> &mut Self {
        if text.trim().is_empty() {
            return self;
        }
        let style = LineStyle {
            size_pt: 10.0,
            italic: true,
            after_pt: 12.0,
            align: Some(Align::Justify),
            font: Some(self.font.clone()),
            color: Some("595959".to_string()),
            ..LineStyle::default()
        };
        self.line(&format!("Nota: {}", text), &style)
    }

    pub fn page_break(&mut self) -> &mut Self {
        self.push(page_break_paragraph())
    }

    pub fn field(&mut self, instr: &str) -> &mut Self {
        self.push(Paragraph::new().add_run(field_run(instr)))
    }

    fn index_title(&mut self, title: &str) {
        let style = LineStyle::centered(12.0).bold().font(self.font.clone());
        self.line(title, &style);
    }

    pub fn toc_page(&mut self, title: &str, min_level: u8, max_level: u8) -> &mut Self {
        self.index_title(title);
        self.field(&toc_instr(min_level, max_level));
        self.page_break()
    }

    pub fn list_of_tables(&mut self, title: &str) -> &mut Self {
        self.index_title(title);
        self.field(&caption_list_instr("Tabla"));
        self.page_break()
    }

    pub fn list_of_figures(&mut self, title: &str) -> &mut Self {
        self.index_title(title);
        self.field(&caption_list_instr("Figura"));
        self.page_break()
    }

    /// Right-aligned `PAGE` field in the footer.
    pub fn page_numbers(&mut self, font: &str, size_pt: f64) -> &mut Self {
        let run = field_run("PAGE").fonts(fonts(font)).size(pt_to_half_points(size_pt));
        let paragraph = Paragraph::new().add_run(run).align(AlignmentType::Right);
        self.footer = Some(Footer::new().add_paragraph(paragraph));
        self
    }

    pub fn header_paragraphs(&mut self, paragraphs: Vec<Paragraph>) -> &mut Self {
        if !paragraphs.is_empty() {
            self.header = Some(paragraphs.into_iter().fold(Header::new(), Header::add_paragraph));
        }
        self
    }

    pub fn footer_paragraphs(&mut self, paragraphs: Vec<Paragraph>) -> &mut Self {
        if !paragraphs.is_empty() {
            self.footer = Some(paragraphs.into_iter().fold(Footer::new(), Footer::add_paragraph));
        }
        self
    }

    /// Centered logo. Returns false (and records a warning) when the image
    /// is missing or cannot be decoded.
    pub fn center_logo(&mut self, path: Option<&Path>, width_cm: f64, after_pt: f64) -> bool {
        let Some(path) = path else {
            self.warn("logo not found");
            return false;
        };
        match load_picture(path, width_cm) {
            Ok(pic) => {
                let paragraph = Paragraph::new()
                    .add_run(Run::new().add_image(pic))
                    .align(AlignmentType::Center)
                    .line_spacing(spacing(0.0, after_pt, None));
                self.push(paragraph);
                true
            }
            Err(e) => {
                self.warn(&format!("logo skipped: {:#}", e));
                false
            }
        }
    }

    pub fn warn(&mut self, message: &str) {
        warn!("{}", message);
        self.warnings.push(message.to_string());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs
    }

    pub fn table_count(&self) -> usize {
        self.tables
    }

    fn into_docx(self) -> Docx {
        let g = &self.geometry;
        let (w, h) = if g.landscape && g.width_cm < g.height_cm {
            (g.height_cm, g.width_cm)
        } else {
            (g.width_cm, g.height_cm)
        };
        let margin = PageMargin::new()
            .top(cm_to_twips(g.top_cm).try_into().unwrap_or_default())
            .bottom(cm_to_twips(g.bottom_cm).try_into().unwrap_or_default())
            .left(cm_to_twips(g.left_cm).try_into().unwrap_or_default())
            .right(cm_to_twips(g.right_cm).try_into().unwrap_or_default());

        let mut docx = Docx::new()
            .page_size(cm_to_twips(w) as u32, cm_to_twips(h) as u32)
            .page_margin(margin)
            .default_fonts(fonts(&self.font))
            .default_size(pt_to_half_points(self.size_pt));
        if let Some(line) = self.line {
            docx = docx.default_line_spacing(
                LineSpacing::new()
                    .line(line.try_into().unwrap_or(240))
                    .line_rule(LineSpacingType::Auto),
            );
        }
        if g.landscape {
            docx = docx.page_orient(PageOrientationType::Landscape);
        }
        for style in self.styles {
            docx = docx.add_style(style);
        }
        if let Some(header) = self.header {
            docx = docx.header(header);
        }
        if let Some(footer) = self.footer {
            docx = docx.footer(footer);
        }
        for block in self.blocks {
            docx = match block {
                Block::Paragraph(p) => docx.add_paragraph(*p),
                Block::Table(t) => docx.add_table(*t),
            };
        }
        docx
    }

    /// Pack the document to `path`, creating parent directories.
    pub fn save(self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!("packing {} paragraphs, {} tables into {}", self.paragraphs, self.tables, path.display());
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        self.into_docx()
            .build()
            .pack(file)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod package {
    //! Reads parts of a saved .docx back for assertions.

    use roxmltree::{Document, Node};
    use std::io::Read;
    use std::path::Path;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    pub fn part(path: &Path, name: &str) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut xml = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut xml).unwrap();
        xml
    }

    /// Every part whose name starts with `prefix`, e.g. `word/footer`.
    pub fn parts(path: &Path, prefix: &str) -> Vec<String> {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with(prefix))
            .map(str::to_string)
            .collect();
        names
            .iter()
            .map(|name| {
                let mut xml = String::new();
                archive.by_name(name).unwrap().read_to_string(&mut xml).unwrap();
                xml
            })
            .collect()
    }

    fn is_w(node: &Node, tag: &str) -> bool {
        node.is_element() && node.tag_name().name() == tag && node.tag_name().namespace() == Some(W_NS)
    }

    /// `w:<attr>` of every `w:<tag>` element, in document order.
    pub fn attrs(xml: &str, tag: &str, attr: &str) -> Vec<String> {
        let doc = Document::parse(xml).unwrap();
        doc.descendants()
            .filter(|n| is_w(n, tag))
            .filter_map(|n| n.attribute((W_NS, attr)).map(str::to_string))
            .collect()
    }

    pub fn instr_texts(xml: &str) -> Vec<String> {
        let doc = Document::parse(xml).unwrap();
        doc.descendants()
            .filter(|n| is_w(n, "instrText"))
            .map(|n| n.text().unwrap_or_default().trim().to_string())
            .collect()
    }

    /// Paragraph-level `w:jc` of every body paragraph outside tables.
    pub fn paragraph_alignments(xml: &str) -> Vec<Option<String>> {
        let doc = Document::parse(xml).unwrap();
        let Some(body) = doc.descendants().find(|n| is_w(n, "body")) else {
            return Vec::new();
        };
        body.children()
            .filter(|n| is_w(n, "p"))
            .map(|p| {
                p.children()
                    .find(|n| is_w(n, "pPr"))
                    .and_then(|ppr| ppr.children().find(|n| is_w(n, "jc")))
                    .and_then(|jc| jc.attribute((W_NS, "val")).map(str::to_string))
            })
            .collect()
    }
}
