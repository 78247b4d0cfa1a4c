use thesis_docgen::core::layout::Element;
use thesis_docgen::core::parser::{DocxParser, Parser};
use std::path::Path;

/// Print a short summary of every .docx under a directory (default `./plantillas`).
fn main() -> anyhow::Result<()> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| "./plantillas".to_string());
    let data_dir = Path::new(&dir);
    if !data_dir.exists() {
        println!("No {} directory found. Place .docx files there or pass a directory.", data_dir.display());
        return Ok(());
    }

    let parser = DocxParser::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "docx").unwrap_or(false) {
            println!("Parsing {}", path.display());
            let structure = parser.parse(&path)?;
            println!(
                "  {} paragraphs, {} tables, {} sections",
                structure.paragraph_count(),
                structure.table_count(),
                structure.sections.len()
            );
            for (style, count) in &structure.styles_used {
                println!("  {:<24} {}", style, count);
            }
            for element in structure.elements.iter().take(5) {
                match element {
                    Element::Paragraph(p) => println!("  [{}] {}", p.style, p.text),
                    Element::Table(t) => println!("  [tabla {}x{}]", t.rows, t.columns),
                }
            }
        }
    }

    Ok(())
}
