use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use profdiff_core::{Config, compare_with, detect_format, parse_value_with_stats};
use profdiff_protocol::NormalizedProfile;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "profdiff")]
#[command(about = "Normalize and compare V8 / Hermes CPU profiles")]
#[command(version)]
struct Cli {
    /// JSON config file (partial files are filled with defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log parse diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print which capture format a file is
    Detect { file: PathBuf },
    /// Print the normalized profile as JSON
    Inspect { file: PathBuf },
    /// Print the comparison of two captures as JSON
    Compare { left: PathBuf, right: PathBuf },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Config::from_json(&data).with_context(|| format!("parsing config {}", path.display()))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn load_profile(path: &Path, config: &Config) -> Result<NormalizedProfile> {
    let value = read_json(path)?;
    let (profile, stats) = parse_value_with_stats(&value, &config.parse);
    tracing::info!(
        file = %path.display(),
        format = %stats.format,
        functions = stats.function_count,
        samples = stats.sample_count,
        roots = stats.root_count,
        "loaded profile"
    );
    for hot in &stats.top_functions {
        tracing::debug!(name = %hot.name, self_ms = hot.self_time_ms, "hot function");
    }
    Ok(profile)
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Detect { file } => {
            let format = detect_format(&read_json(&file)?);
            writeln!(std::io::stdout().lock(), "{format}")?;
        }
        Command::Inspect { file } => {
            write_json(&load_profile(&file, &config)?)?;
        }
        Command::Compare { left, right } => {
            let left = load_profile(&left, &config)?;
            let right = load_profile(&right, &config)?;
            write_json(&compare_with(&left, &right, &config.diff))?;
        }
    }
    Ok(())
}
