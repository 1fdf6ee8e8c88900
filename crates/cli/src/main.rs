use anyhow::Context;
use clap::{Parser, Subcommand};
use fhir::BundleType;
use hl7fr_core::{capabilities, ConversionError, ConversionOptions, ConversionWarning, Converter};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hl7fr")]
#[command(about = "Convert HL7 v2.x messages into FHIR R4 bundles (FR Core)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a message into a bundle
    Convert {
        /// Message file, or `-` for standard input
        input: PathBuf,
        /// Options file (.yaml, .yml or .json)
        #[arg(long, env = "HL7FR_OPTIONS")]
        options: Option<PathBuf>,
        /// Bundle type (message, transaction, collection); anything but `message` drops the
        /// MessageHeader
        #[arg(long, value_parser = parse_bundle_type)]
        bundle_type: Option<BundleType>,
        /// Skip the French extension-segment enrichment
        #[arg(long)]
        no_french: bool,
        /// Do not generate a MessageHeader
        #[arg(long)]
        no_message_header: bool,
        /// Seed for reproducible resource ids
        #[arg(long, env = "HL7FR_ID_SEED")]
        seed: Option<String>,
        /// Write single-line JSON
        #[arg(long)]
        compact: bool,
        /// Output file (standard output when absent)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the message type, event and structure of a message
    Detect {
        /// Message file, or `-` for standard input
        input: PathBuf,
    },
    /// Dump the parsed field tree as JSON
    Parse {
        /// Message file, or `-` for standard input
        input: PathBuf,
    },
    /// List the supported message families
    Capabilities,
}

fn parse_bundle_type(value: &str) -> Result<BundleType, String> {
    match BundleType::parse(value) {
        Some(BundleType::Batch) | None => Err(format!(
            "unsupported bundle type '{value}' (expected message, transaction or collection)"
        )),
        Some(bundle_type) => Ok(bundle_type),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ConversionError>() {
                Some(conversion) => eprintln!("{}: {}", conversion.kind(), conversion),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hl7fr=info".parse()?)
                .add_directive("hl7v2=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            options,
            bundle_type,
            no_french,
            no_message_header,
            seed,
            compact,
            output,
        } => {
            let mut options = match options {
                Some(path) => ConversionOptions::from_path(&path)?,
                None => ConversionOptions::default(),
            };
            if no_french {
                options.french_mode = false;
            }
            if no_message_header {
                options.generate_message_header = false;
            }
            if let Some(bundle_type) = bundle_type {
                options.generate_message_header = bundle_type == BundleType::Message;
                options.bundle_type = Some(bundle_type);
            }
            if seed.is_some() {
                options.id_seed = seed;
            }
            options.validate()?;

            let raw = read_message(&input)?;
            let outcome = Converter::bundled()?.convert(&raw, &options)?;
            let json = if compact {
                outcome.bundle.to_json()?
            } else {
                outcome.bundle.to_json_pretty()?
            };
            write_output(output.as_deref(), &json)?;
        }
        Commands::Detect { input } => {
            let detected = hl7fr_core::detect(&read_message(&input)?)?;
            println!("{}", serde_json::to_string_pretty(&detected)?);
        }
        Commands::Parse { input } => {
            let message = hl7v2::parse(&read_message(&input)?).map_err(ConversionError::from)?;
            for warning in message.warnings() {
                tracing::warn!("{}", ConversionWarning::from(warning));
            }
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
        Commands::Capabilities => {
            println!("{}", serde_json::to_string_pretty(capabilities())?);
        }
    }

    Ok(())
}

/// Reads a message file (or stdin for `-`). Bytes that are not UTF-8 are read as Latin-1.
fn read_message(path: &Path) -> anyhow::Result<String> {
    let bytes = if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("failed to read standard input")?;
        buffer
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::info!("input is not UTF-8; decoding as Latin-1");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    })
}

fn write_output(path: Option<&Path>, json: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
