//! Decode one CAN frame against a `.can` description.
//!
//! Usage:
//!   decode_frame network.can --bus map --id 0x100 0ff01234
//!
//! Payload bytes are given as hex. Prints each segment value; enum values
//! show the variant name when the raw value matches one. `-v` / `-vv` raise
//! the log level (logs go to stderr, WARN by default).

use anyhow::{bail, Context, Result};
use canlib_gen::config::log_level;
use canlib_gen::dump::format_values;
use canlib_gen::{generate, parse, Demux, Frame, FrameDecodeResult, ResolvedNetwork};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "decode_frame")]
#[command(about = "Decode a CAN payload using a bus description")]
struct Cli {
    /// Network description file
    description: PathBuf,

    /// Bus the frame was received on
    #[arg(short, long)]
    bus: String,

    /// Frame identifier (decimal or 0x-prefixed hex)
    #[arg(short, long, value_parser = parse_id)]
    id: u32,

    /// Payload bytes as hex
    data: String,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_id(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => s.parse().map_err(|e: std::num::ParseIntError| e.to_string()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = log_level(cli.verbose);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let src = std::fs::read_to_string(&cli.description)
        .with_context(|| format!("Failed to read {}", cli.description.display()))?;
    let network = parse(&src).map_err(anyhow::Error::msg)?;
    let library = generate(ResolvedNetwork::resolve(network)?)?;
    if library.bus(&cli.bus).is_none() {
        bail!("unknown bus {}", cli.bus);
    }

    let data = hex::decode(cli.data.trim()).context("payload is not valid hex")?;
    if data.len() > 8 {
        bail!("payload is {} bytes, a CAN frame carries at most 8", data.len());
    }
    let demux = Demux::new(&library);
    let frame = Frame { id: cli.id, data };
    match demux.decode(&cli.bus, &frame)? {
        FrameDecodeResult::Decoded { message, values } => {
            let codec = library
                .codec(&message)
                .with_context(|| format!("no codec for {}", message))?;
            print!("{}", format_values(codec, &values, &library.network));
        }
        FrameDecodeResult::Unknown { identifier } => {
            println!("unknown identifier {:#x} on bus {}", identifier, cli.bus);
        }
    }
    Ok(())
}
