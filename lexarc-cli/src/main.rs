/*!
Lexarc CLI - Command-line interface for the lexarc project archive engine.

Provides utilities for inspecting, verifying, packing, and recovering
project archives without a full authoring frontend.
*/

use clap::{Parser, Subcommand, ValueEnum};
use lexarc_core::{
    is_archive_file, ArchiveEngine, ArchiveReader, EngineConfig, FontSlot, ProjectModel,
    XmlDocumentCodec,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "lexarc")]
#[command(about = "CLI for lexarc project archives")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FontKind {
    Conlang,
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an archive and report its health
    Verify {
        /// Archive file to verify
        archive: PathBuf,
    },
    /// Show the contents of an archive
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },
    /// Pack a loose project directory into an archive
    Pack {
        /// Directory holding the project tree
        directory: PathBuf,
        /// Archive file to create
        target: PathBuf,
    },
    /// Unpack an archive into a directory
    Unpack {
        /// Archive file to unpack
        archive: PathBuf,
        /// Directory to unpack into
        target: PathBuf,
    },
    /// Export an embedded font to a standalone file
    ExportFont {
        /// Archive file holding the font
        archive: PathBuf,
        /// Which font slot to export
        #[arg(value_enum)]
        slot: FontKind,
        /// Export path (.ttf appended when missing)
        output: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = ArchiveEngine::new(config, XmlDocumentCodec::new())?;

    match cli.command {
        Commands::Verify { archive } => verify(&engine, &archive)?,
        Commands::Info { archive } => info(&archive)?,
        Commands::Pack { directory, target } => {
            engine.pack_project_directory(&directory, &target)?;
            println!("Packed {} -> {}", directory.display(), target.display());
        }
        Commands::Unpack { archive, target } => {
            lexarc_core::unpack_archive(&archive, &target)?;
            println!("Unpacked {} -> {}", archive.display(), target.display());
        }
        Commands::ExportFont {
            archive,
            slot,
            output,
        } => {
            let slot = match slot {
                FontKind::Conlang => FontSlot::Conlang,
                FontKind::Local => FontSlot::Local,
            };
            engine.export_font(&archive, slot, &output)?;
            println!("Exported font to {}", output.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn verify(engine: &ArchiveEngine<XmlDocumentCodec>, archive: &PathBuf) -> Result<(), anyhow::Error> {
    info!("Verifying {}", archive.display());

    let mut model = ProjectModel::new();
    let report = engine.load_project(archive, &mut model, None)?;

    if report.is_clean() {
        println!("OK: {} loads clean", archive.display());
    } else {
        if !report.errors().is_empty() {
            println!("Errors:\n{}", report.errors().trim_end());
        }
        if !report.warnings().is_empty() {
            println!("Warnings:\n{}", report.warnings().trim_end());
        }
        anyhow::bail!("{} did not load clean", archive.display());
    }

    Ok(())
}

fn info(archive: &PathBuf) -> Result<(), anyhow::Error> {
    if !is_archive_file(archive)? {
        anyhow::bail!("{} is not a project archive", archive.display());
    }

    let reader = ArchiveReader::open(archive)?;
    let names = reader.entry_names();

    println!("{}: {} entries", archive.display(), names.len());
    for name in names {
        println!("  {name}");
    }

    Ok(())
}
