//! fwcodec CLI
//!
//! Command-line front-end for decoding, identifying, and encoding
//! Behringer DEQ-family firmware update streams.

use clap::{Parser, Subcommand, ValueEnum};
use fwcodec::formatter::{DecodeSummary, HumanFormatter, JsonFormatter, ShortFormatter, SummaryFormatter};
use fwcodec::types::RenderPolicy;
use fwcodec::{decode, encode, partition, profile, CodecError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Firmware codec for Behringer DEQ-family signal processors.
#[derive(Parser, Debug)]
#[command(name = "fwcodec")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a SysEx capture or raw flash dump and partition it into named images
    Decode {
        /// Input file: a .syx capture or a raw flash dump
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "human")]
        format: OutputFormat,

        /// How to render gaps in the flash block map
        #[arg(long, default_value = "gap-sensitive")]
        policy: PolicyArg,

        /// Write each named image to this directory instead of only summarizing
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Identify the device profile of a firmware file without a full decode
    Identify {
        /// Input file: a .syx capture or a raw flash dump
        input: PathBuf,
    },

    /// Encode a cleartext buffer as a SysEx event stream
    Encode {
        /// Cleartext input file
        input: PathBuf,

        /// Where to write the encoded SysEx stream
        #[arg(short, long)]
        output: PathBuf,

        /// Device profile name (see `fwcodec identify` output for names)
        #[arg(short, long)]
        profile: String,

        /// Target flash address, decimal or 0x-prefixed hex
        #[arg(short, long, value_parser = parse_address)]
        address: u32,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact single-line output
    Short,
}

/// Gap-rendering policy, as exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Stop at the first missing block
    GapSensitive,
    /// Fill missing blocks with 0xFF
    GapFill,
}

impl From<PolicyArg> for RenderPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::GapSensitive => RenderPolicy::GapSensitive,
            PolicyArg::GapFill => RenderPolicy::GapFill,
        }
    }
}

fn parse_address(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => s.parse::<u32>().map_err(|e| e.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("fwcodec=debug")
            .init();
    }

    let result = match &args.command {
        Command::Decode {
            input,
            format,
            policy,
            output_dir,
        } => run_decode(input, *format, (*policy).into(), output_dir.as_deref()),
        Command::Identify { input } => run_identify(input),
        Command::Encode {
            input,
            output,
            profile,
            address,
        } => run_encode(input, output, profile, *address),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_decode(
    input: &Path,
    format: OutputFormat,
    policy: RenderPolicy,
    output_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    let bundle = decode(&data)?;
    let images = partition(&bundle, policy)?;

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
        for image in &images {
            let name = format!("{:?}", image.label).to_lowercase();
            std::fs::write(dir.join(format!("{name}.bin")), &image.data)?;
        }
        let messages_json = serde_json::to_string_pretty(&bundle.messages)?;
        std::fs::write(dir.join("messages.json"), messages_json)?;
    }

    let summary = DecodeSummary::new(&bundle, &images);
    match format {
        OutputFormat::Human => print!("{}", HumanFormatter::new().format_summary(&summary)),
        OutputFormat::Json => println!("{}", JsonFormatter.render(&summary)?),
        OutputFormat::Short => print!("{}", ShortFormatter.format_summary(&summary)),
    }

    Ok(())
}

fn run_identify(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    let bundle = decode(&data)?;
    match bundle.profile {
        Some(p) => println!("{} ({:?})", p.name, bundle.profile_match),
        None => println!("unidentified"),
    }
    Ok(())
}

fn run_encode(
    input: &Path,
    output: &Path,
    profile_name: &str,
    address: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let device_profile = profile::by_name(profile_name)
        .ok_or_else(|| CodecError::UnsupportedDevice(profile_name.to_string()))?;
    let data = std::fs::read(input)?;
    let wire = encode(device_profile, address, &data, &BTreeMap::new())?;
    std::fs::write(output, wire)?;
    Ok(())
}
