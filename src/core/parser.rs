use crate::core::layout::{
    CellInfo, DocumentMetadata, DocumentStructure, Element, HeaderFooter, Orientation, PageConfig,
    ParagraphInfo, RunInfo, TableInfo, NO_TABLE_STYLE,
};
use crate::core::writer::TWIPS_PER_CM;
use anyhow::{Context, Result};
use log::{debug, info};
use memmap2::Mmap;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Files above this size are memory-mapped instead of read into memory.
const MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

pub trait Parser {
    /// Parse a .docx at `path` into its flat structure description.
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<DocumentStructure>;
}

/// Extracts page setup, headers/footers, paragraphs and tables from a .docx
/// using `zip` + `roxmltree`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxParser;

impl Parser for DocxParser {
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<DocumentStructure> {
        let path = path.as_ref();
        let file_size = std::fs::metadata(path)
            .with_context(|| format!("cannot open {}", path.display()))?
            .len();

        let structure = if file_size > MMAP_THRESHOLD {
            let file = File::open(path)?;
            // The mapping is read-only and dropped before returning
            let mmap = unsafe { Mmap::map(&file)? };
            self.parse_reader(Cursor::new(&mmap[..]))?
        } else {
            self.parse_reader(Cursor::new(std::fs::read(path)?))?
        };

        info!(
            "extracted {} paragraphs and {} tables from {}",
            structure.paragraph_count(),
            structure.table_count(),
            path.display()
        );
        Ok(structure)
    }
}

/// Raw XML parts of a package that the extractor looks at.
struct Package {
    document: String,
    styles: Option<String>,
    core: Option<String>,
    rels: Option<String>,
    parts: HashMap<String, String>,
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

impl Package {
    fn load<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).context("not a .docx (zip) package")?;
        let document = read_part(&mut archive, "word/document.xml")?
            .context("package has no word/document.xml")?;
        let styles = read_part(&mut archive, "word/styles.xml")?;
        let core = read_part(&mut archive, "docProps/core.xml")?;
        let rels = read_part(&mut archive, "word/_rels/document.xml.rels")?;

        let names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("word/header") || n.starts_with("word/footer"))
            .map(str::to_string)
            .collect();
        let mut parts = HashMap::new();
        for name in names {
            if let Some(xml) = read_part(&mut archive, &name)? {
                parts.insert(name, xml);
            }
        }

        Ok(Self { document, styles, core, rels, parts })
    }
}

fn is_w(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(W_NS)
}

fn w_child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_w(n, name))
}

fn w_val<'a>(node: &Node<'a, '_>) -> Option<&'a str> {
    node.attribute((W_NS, "val"))
}

fn w_attr_i64(node: &Node, name: &str) -> Option<i64> {
    node.attribute((W_NS, name)).and_then(|v| v.parse::<f64>().ok()).map(|v| v as i64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn twips_to_cm(twips: i64) -> f64 {
    round2(twips as f64 / TWIPS_PER_CM)
}

/// On/off properties (`w:b`, `w:i`, ...) are on when present unless their
/// value says otherwise.
fn toggle(node: Option<Node>) -> bool {
    match node {
        None => false,
        Some(n) => !matches!(w_val(&n), Some("false") | Some("0") | Some("off") | Some("none")),
    }
}

/// `heading 1` in styles.xml is shown as `Heading 1` by Word.
fn display_style_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl DocxParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a package from any seekable reader (file, bytes in memory).
    pub fn parse_reader<R: Read + Seek>(&self, reader: R) -> Result<DocumentStructure> {
        let package = Package::load(reader)?;
        let styles = match &package.styles {
            Some(xml) => self.parse_style_names(xml)?,
            None => HashMap::new(),
        };
        let rels = match &package.rels {
            Some(xml) => self.parse_relationships(xml)?,
            None => HashMap::new(),
        };

        let mut structure = DocumentStructure::default();
        if let Some(core) = &package.core {
            structure.metadata = self.parse_core_properties(core)?;
        }

        let doc = Document::parse(&package.document).context("word/document.xml is not valid XML")?;
        let body = doc
            .root_element()
            .children()
            .find(|n| is_w(n, "body"))
            .context("word/document.xml has no body")?;

        let ctx = ParseContext { styles: &styles };
        let mut section_props: Vec<Node> = Vec::new();

        for child in body.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "p" if is_w(&child, "p") => {
                    let paragraph = ctx.paragraph(&child);
                    structure.record_style(&paragraph.style);
                    structure.elements.push(Element::Paragraph(paragraph));
                    // A section break lives in the last paragraph of the section
                    if let Some(sect) = w_child(&child, "pPr").and_then(|ppr| w_child(&ppr, "sectPr")) {
                        section_props.push(sect);
                    }
                }
                "tbl" if is_w(&child, "tbl") => {
                    structure.elements.push(Element::Table(ctx.table(&child)));
                }
                "sectPr" if is_w(&child, "sectPr") => section_props.push(child),
                other => debug!("skipping body element {}", other),
            }
        }

        for (index, sect) in section_props.iter().enumerate() {
            structure.sections.push(self.page_config(sect, index));

            if let Some(header) = self.header_footer(sect, "headerReference", index, &rels, &package, &ctx)? {
                structure.headers.push(header);
            }
            if let Some(footer) = self.header_footer(sect, "footerReference", index, &rels, &package, &ctx)? {
                structure.footers.push(footer);
            }
        }
        structure.page = structure.sections.first().cloned();

        Ok(structure)
    }

    fn parse_style_names(&self, xml: &str) -> Result<HashMap<String, String>> {
        let doc = Document::parse(xml)?;
        let mut names = HashMap::new();
        for style in doc.root_element().children().filter(|n| is_w(n, "style")) {
            if let Some(id) = style.attribute((W_NS, "styleId")) {
                let name = w_child(&style, "name").and_then(|n| w_val(&n)).unwrap_or(id);
                names.insert(id.to_string(), display_style_name(name));
            }
        }
        Ok(names)
    }

    fn parse_relationships(&self, xml: &str) -> Result<HashMap<String, String>> {
        let doc = Document::parse(xml)?;
        let mut rels = HashMap::new();
        for rel in doc.root_element().children().filter(|n| n.tag_name().name() == "Relationship") {
            if let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) {
                let part = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("word/{}", target),
                };
                rels.insert(id.to_string(), part);
            }
        }
        Ok(rels)
    }

    fn parse_core_properties(&self, xml: &str) -> Result<DocumentMetadata> {
        let doc = Document::parse(xml)?;
        let mut meta = DocumentMetadata::default();
        for node in doc.root_element().children().filter(|n| n.is_element()) {
            let text = node.text().unwrap_or("").trim().to_string();
            match node.tag_name().name() {
                "creator" => meta.author = text,
                "title" => meta.title = text,
                "subject" => meta.subject = text,
                "created" => meta.created = text,
                "modified" => meta.modified = text,
                _ => {}
            }
        }
        Ok(meta)
    }

    fn page_config(&self, sect: &Node, index: usize) -> PageConfig {
        let size = w_child(sect, "pgSz");
        let margins = w_child(sect, "pgMar");
        let size_attr = |name: &str, default: i64| size.and_then(|n| w_attr_i64(&n, name)).unwrap_or(default);
        let margin_attr = |name: &str| margins.and_then(|n| w_attr_i64(&n, name)).unwrap_or(0);

        let landscape = size
            .and_then(|n| n.attribute((W_NS, "orient")))
            .map(|o| o == "landscape")
            .unwrap_or(false);

        PageConfig {
            index,
            width_cm: twips_to_cm(size_attr("w", 11906)),
            height_cm: twips_to_cm(size_attr("h", 16838)),
            top_cm: twips_to_cm(margin_attr("top")),
            bottom_cm: twips_to_cm(margin_attr("bottom")),
            left_cm: twips_to_cm(margin_attr("left")),
            right_cm: twips_to_cm(margin_attr("right")),
            orientation: if landscape { Orientation::Horizontal } else { Orientation::Vertical },
        }
    }

    /// Resolve the default header/footer of a section and keep it only when
    /// it carries visible text.
    fn header_footer(
        &self,
        sect: &Node,
        reference: &str,
        index: usize,
        rels: &HashMap<String, String>,
        package: &Package,
        ctx: &ParseContext,
    ) -> Result<Option<HeaderFooter>> {
        let refs: Vec<Node> = sect.children().filter(|n| is_w(n, reference)).collect();
        let chosen = refs
            .iter()
            .find(|n| n.attribute((W_NS, "type")).unwrap_or("default") == "default")
            .or_else(|| refs.first());
        let Some(node) = chosen else {
            return Ok(None);
        };
        let Some(part) = node.attribute((R_NS, "id")).and_then(|id| rels.get(id)) else {
            return Ok(None);
        };
        let Some(xml) = package.parts.get(part) else {
            debug!("{} points at missing part {}", reference, part);
            return Ok(None);
        };

        let doc = Document::parse(xml).with_context(|| format!("{} is not valid XML", part))?;
        let elements = doc
            .root_element()
            .children()
            .filter(|n| is_w(n, "p"))
            .map(|p| ctx.paragraph(&p))
            .collect();
        let block = HeaderFooter { section: index, elements };
        Ok(block.has_text().then_some(block))
    }
}

struct ParseContext<'s> {
    styles: &'s HashMap<String, String>,
}

impl ParseContext<'_> {
    fn style_name(&self, id: &str) -> String {
        self.styles.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    /// Runs that belong to this paragraph (directly or through hyperlinks),
    /// not to paragraphs nested inside text boxes.
    fn owned_runs<'a, 'input>(&self, p: &Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        p.descendants()
            .filter(|n| is_w(n, "r"))
            .filter(|r| r.ancestors().skip(1).find(|a| is_w(a, "p")).map(|a| a.id()) == Some(p.id()))
            .collect()
    }

    fn run_text(&self, r: &Node) -> String {
        let mut text = String::new();
        for child in r.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "t" => text.push_str(child.text().unwrap_or("")),
                "tab" => text.push('\t'),
                "br" | "cr" => text.push('\n'),
                _ => {}
            }
        }
        text
    }

    fn run(&self, r: &Node) -> RunInfo {
        let mut info = RunInfo { text: self.run_text(r), ..RunInfo::default() };
        let Some(rpr) = w_child(r, "rPr") else {
            return info;
        };

        info.bold = toggle(w_child(&rpr, "b"));
        info.italic = toggle(w_child(&rpr, "i"));
        info.underline = toggle(w_child(&rpr, "u"));
        info.strike = toggle(w_child(&rpr, "strike"));

        if let Some(fonts) = w_child(&rpr, "rFonts") {
            info.font = fonts
                .attribute((W_NS, "ascii"))
                .or_else(|| fonts.attribute((W_NS, "hAnsi")))
                .map(str::to_string);
        }
        if let Some(sz) = w_child(&rpr, "sz").and_then(|n| w_attr_i64(&n, "val")) {
            info.size_pt = Some(sz as f64 / 2.0);
        }
        if let Some(color) = w_child(&rpr, "color").and_then(|n| w_val(&n)) {
            if !color.eq_ignore_ascii_case("auto") {
                info.color = Some(color.to_ascii_uppercase());
            }
        }
        if let Some(highlight) = w_child(&rpr, "highlight").and_then(|n| w_val(&n)) {
            info.highlight = Some(highlight.to_string());
        }
        info
    }

    fn paragraph(&self, p: &Node) -> ParagraphInfo {
        let runs: Vec<RunInfo> = self.owned_runs(p).iter().map(|r| self.run(r)).collect();
        let mut info = ParagraphInfo {
            text: runs.iter().map(|r| r.text.as_str()).collect(),
            style: "Normal".to_string(),
            alignment: "left".to_string(),
            runs,
            ..ParagraphInfo::default()
        };

        let Some(ppr) = w_child(p, "pPr") else {
            return info;
        };

        if let Some(id) = w_child(&ppr, "pStyle").and_then(|n| w_val(&n)) {
            info.style = self.style_name(id);
        }

        if let Some(jc) = w_child(&ppr, "jc").and_then(|n| w_val(&n)) {
            info.alignment = match jc {
                "center" => "center",
                "right" | "end" => "right",
                "both" | "distribute" => "justify",
                _ => "left",
            }
            .to_string();
        }

        if let Some(ind) = w_child(&ppr, "ind") {
            let nonzero = |v: Option<i64>| v.filter(|v| *v != 0).map(twips_to_cm);
            info.left_indent_cm = nonzero(w_attr_i64(&ind, "left").or_else(|| w_attr_i64(&ind, "start")));
            info.right_indent_cm = nonzero(w_attr_i64(&ind, "right").or_else(|| w_attr_i64(&ind, "end")));
            info.first_line_cm = nonzero(
                w_attr_i64(&ind, "firstLine").or_else(|| w_attr_i64(&ind, "hanging").map(|h| -h)),
            );
        }

        if let Some(spacing) = w_child(&ppr, "spacing") {
            let points = |name: &str| {
                w_attr_i64(&spacing, name)
                    .filter(|v| *v != 0)
                    .map(|v| round2(v as f64 / 20.0))
            };
            info.space_before_pt = points("before");
            info.space_after_pt = points("after");
            if let Some(line) = w_attr_i64(&spacing, "line") {
                let rule = spacing.attribute((W_NS, "lineRule")).unwrap_or("auto");
                info.line_spacing = Some(if rule == "auto" {
                    round2(line as f64 / 240.0)
                } else {
                    round2(line as f64 / 20.0)
                });
            }
        }

        info
    }

    fn table(&self, tbl: &Node) -> TableInfo {
        let rows: Vec<Node> = tbl.children().filter(|n| is_w(n, "tr")).collect();

        let content: Vec<Vec<CellInfo>> = rows
            .iter()
            .map(|tr| {
                tr.children()
                    .filter(|n| is_w(n, "tc"))
                    .map(|tc| {
                        let paragraphs: Vec<ParagraphInfo> =
                            tc.children().filter(|n| is_w(n, "p")).map(|p| self.paragraph(&p)).collect();
                        let text = paragraphs.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");
                        CellInfo { text, paragraphs }
                    })
                    .collect()
            })
            .collect();

        let grid_columns = w_child(tbl, "tblGrid")
            .map(|g| g.children().filter(|n| is_w(n, "gridCol")).count())
            .unwrap_or(0);
        let widest_row = content.iter().map(Vec::len).max().unwrap_or(0);

        let style = w_child(tbl, "tblPr")
            .and_then(|pr| w_child(&pr, "tblStyle"))
            .and_then(|n| w_val(&n))
            .map(|id| self.style_name(id))
            .unwrap_or_else(|| NO_TABLE_STYLE.to_string());

        TableInfo {
            rows: rows.len(),
            columns: grid_columns.max(widest_row),
            style,
            content,
        }
    }
}
