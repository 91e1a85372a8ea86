use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

/// Compile a text module to a binary module.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file; standard input when omitted.
    input: Option<PathBuf>,

    /// Output file. Defaults to the input path with a `.wasm` extension, or
    /// standard output when reading standard input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, help = "Print the module as hex instead of writing binary")]
    hex: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let source = match &cli.input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read input file {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let bytes = watc::compile(&source).with_context(|| match &cli.input {
        Some(path) => format!("failed to compile {}", path.display()),
        None => "failed to compile standard input".to_string(),
    })?;
    log::info!("compiled {} bytes", bytes.len());

    let rendered = if cli.hex {
        let mut text = hex::encode(&bytes).into_bytes();
        text.push(b'\n');
        text
    } else {
        bytes
    };

    match output_path(&cli) {
        Some(path) => {
            fs::write(&path, &rendered).with_context(|| format!("failed to write output file {}", path.display()))
        }
        None => io::stdout()
            .write_all(&rendered)
            .context("failed to write standard output"),
    }
}

fn output_path(cli: &Cli) -> Option<PathBuf> {
    match (&cli.output, &cli.input) {
        (Some(output), _) => Some(output.clone()),
        (None, Some(input)) if !cli.hex => Some(default_output(input)),
        _ => None,
    }
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("wasm")
}
