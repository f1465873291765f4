//! Generate the C CAN library (pack/unpack, demux, board init with filters) from a `.can` description.
//!
//! Usage:
//!   canlib_gen generate network.can [--output-dir DIR] [--config canlib.toml] [--no-demux]
//!   canlib_gen masks network.can
//!   canlib_gen config [--output canlib.toml]
//!
//! `-v` / `-vv` raise the log level (logs go to stderr).

use anyhow::{Context, Result};
use canlib_gen::config::log_level;
use canlib_gen::emit::write_library;
use canlib_gen::{generate, parse, GeneratedLibrary, GeneratorConfig, ResolvedNetwork};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "canlib_gen")]
#[command(about = "Generate CAN pack/unpack code and acceptance filters from a bus description")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the C header and source
    Generate {
        /// Network description file
        description: PathBuf,

        /// Generator configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory (overrides the configuration)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Do not emit the identifier demux switch
        #[arg(long)]
        no_demux: bool,
    },

    /// Print the acceptance filter of every programmed board
    Masks {
        /// Network description file
        description: PathBuf,
    },

    /// Write a default configuration file
    Config {
        #[arg(short, long, default_value = "canlib.toml")]
        output: PathBuf,
    },
}

fn load(description: &Path) -> Result<GeneratedLibrary> {
    let src = std::fs::read_to_string(description)
        .with_context(|| format!("Failed to read {}", description.display()))?;
    let network = parse(&src)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("{}", description.display()))?;
    let resolved = ResolvedNetwork::resolve(network)
        .with_context(|| format!("{}: invalid network", description.display()))?;
    let library = generate(resolved).with_context(|| format!("{}: generation failed", description.display()))?;
    Ok(library)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = log_level(cli.verbose);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.command {
        Commands::Generate {
            description,
            config,
            output_dir,
            no_demux,
        } => {
            let mut cfg = match config {
                Some(path) => GeneratorConfig::load_from_file(&path)?,
                None => GeneratorConfig::default(),
            };
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if no_demux {
                cfg.emit_demux = false;
            }
            let library = load(&description)?;
            let (h, c) = write_library(&library, &cfg)?;
            println!("{}", h.display());
            println!("{}", c.display());
        }
        Commands::Masks { description } => {
            let library = load(&description)?;
            for f in &library.filters {
                if f.subscribed {
                    println!(
                        "{} on {}: mask {:#x} ({:#b}), id {:#x}",
                        f.board, f.bus, f.filter.mask, f.filter.mask, f.filter.reference
                    );
                } else {
                    println!("{} on {}: publish only, no filter", f.board, f.bus);
                }
            }
        }
        Commands::Config { output } => {
            let text = GeneratorConfig::default().to_toml()?;
            std::fs::write(&output, text)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            eprintln!("wrote {}", output.display());
        }
    }
    Ok(())
}
