use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thesis_docgen::core::config::{load_json, resolve_config_path};
use thesis_docgen::core::layout::DocumentStructure;
use thesis_docgen::core::parser::{DocxParser, Parser as _};
use thesis_docgen::core::registry::{FormatKind, Registry, SubType, FORMAT_ALIASES};
use thesis_docgen::core::replicator::{default_output_name, DocxReplicator, Writer};
use thesis_docgen::server::{self, AppState};
use thesis_docgen::utils::document_processor::{BatchOutcome, DocumentProcessor};
use thesis_docgen::GenerationContext;

#[derive(Parser)]
#[command(name = "thesis_docgen")]
#[command(about = "Generador de formatos de tesis UNAC (.docx) desde configuraciones JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one document from a JSON configuration
    Generate {
        /// proyecto, informe (pregrado) or maestria
        format: String,
        /// Path to the JSON configuration
        config: PathBuf,
        /// Output .docx (defaults to a name derived from the configuration)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory searched when the configuration path does not exist
        #[arg(long, env = "DOCGEN_FORMATS_DIR")]
        formats_dir: Option<PathBuf>,
        /// Base directory for logos and other assets
        #[arg(long, env = "DOCGEN_ASSETS_DIR")]
        assets_dir: Option<PathBuf>,
        /// Open the document with the system viewer afterwards
        #[arg(long)]
        open: bool,
    },

    /// Generate every JSON configuration under a directory
    Batch {
        /// Directory walked for *.json configurations
        input: PathBuf,
        /// Directory receiving the .docx files
        output: PathBuf,
    },

    /// Extract the structure of a .docx into JSON
    Extract {
        /// Source .docx
        docx: PathBuf,
        /// Output JSON (defaults to plantillas/estructura_completa.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild a .docx from an extracted JSON structure
    Replicate {
        /// Structure JSON produced by `extract`
        json: PathBuf,
        /// Output directory
        #[arg(short = 'o', long = "output-dir", default_value = "generados")]
        dir: PathBuf,
    },

    /// Run the HTTP server
    Serve {
        #[arg(long, env = "DOCGEN_ADDR", default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
        /// Directory holding formats/, view/ and assets/
        #[arg(long, env = "DOCGEN_BASE_DIR", default_value = ".")]
        base_dir: PathBuf,
        /// Where generated documents are written (defaults to <base-dir>/docs)
        #[arg(long, env = "DOCGEN_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },

    /// List the supported formats and sub types
    Formats,
}

fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("[ERROR] {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate { format, config, output, formats_dir, assets_dir, open } => {
            generate(&format, &config, output, formats_dir, assets_dir, open)
        }
        Commands::Batch { input, output } => batch(&input, &output),
        Commands::Extract { docx, output } => extract(&docx, output),
        Commands::Replicate { json, dir } => replicate(&json, &dir),
        Commands::Serve { addr, base_dir, output_dir } => serve(addr, base_dir, output_dir),
        Commands::Formats => {
            for kind in FormatKind::ALL {
                let subs: Vec<&str> = SubType::ALL.iter().map(SubType::as_str).collect();
                println!("{:<10} {}", kind, subs.join(", "));
            }
            for (alias, kind) in FORMAT_ALIASES {
                println!("{:<10} -> {}", alias, kind);
            }
            Ok(())
        }
    }
}

fn generate(
    format: &str,
    config: &Path,
    output: Option<PathBuf>,
    formats_dir: Option<PathBuf>,
    assets_dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let kind: FormatKind = format.parse()?;
    let generator = kind.generator();

    let mut ctx = GenerationContext::default().with_catalog(true);
    if let Some(dir) = formats_dir {
        ctx = ctx.with_formats_dir(dir);
    }
    if let Some(dir) = assets_dir {
        ctx = ctx.with_assets_dir(dir);
    }

    let config = resolve_config_path(config, ctx.formats_dir.as_deref())?;
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(generator.default_output_name(&config)?),
    };

    let report = generator.generate(&config, &output, &ctx)?;
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    println!("[OK] Documento generado: {}", output.display());

    if open && report.open_after {
        if let Err(e) = open::that(&output) {
            warn!("could not open {}: {}", output.display(), e);
        }
    }
    Ok(())
}

fn batch(input: &Path, output: &Path) -> Result<()> {
    let processor = DocumentProcessor::new(GenerationContext::default());
    let report = processor.process_documents(input, output)?;
    for outcome in &report.outcomes {
        match outcome {
            BatchOutcome::Generated { config, output, kind } => {
                println!("[OK] {} ({}) -> {}", config.display(), kind, output.display())
            }
            BatchOutcome::Failed { config, error } => println!("[FAIL] {}: {}", config.display(), error),
            BatchOutcome::Skipped { config, reason } => println!("[SKIP] {}: {}", config.display(), reason),
        }
    }
    if report.failed() > 0 {
        anyhow::bail!("{} of {} configurations failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}

fn extract(docx: &Path, output: Option<PathBuf>) -> Result<()> {
    let structure = DocxParser::new().parse(docx)?;
    let output = output.unwrap_or_else(|| Path::new("plantillas").join("estructura_completa.json"));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, serde_json::to_string_pretty(&structure)?)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "{} paragraphs, {} tables, {} sections",
        structure.paragraph_count(),
        structure.table_count(),
        structure.sections.len()
    );
    println!("[OK] Estructura guardada en: {}", output.display());
    Ok(())
}

fn replicate(json: &Path, dir: &Path) -> Result<()> {
    let structure: DocumentStructure = load_json(json)?;
    let output = dir.join(default_output_name(chrono::Local::now()));
    let report = DocxReplicator::new().write(&structure, &output)?;
    println!(
        "[OK] Documento guardado: {} ({}/{} elementos)",
        report.output.display(),
        report.replicated,
        structure.elements.len()
    );
    Ok(())
}

fn serve(addr: SocketAddr, base_dir: PathBuf, output_dir: Option<PathBuf>) -> Result<()> {
    let mut registry = Registry::new(&base_dir);
    if let Some(dir) = output_dir {
        registry = registry.with_output_dir(dir);
    }
    std::fs::create_dir_all(registry.output_dir())
        .with_context(|| format!("creating {}", registry.output_dir().display()))?;
    let state = AppState::new(&base_dir).with_registry(registry);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(addr, state))
}
