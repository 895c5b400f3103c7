//! otelgate command-line tool.
//!
//! - `check-config <path>`: strict-parse and validate a gateway config
//! - `decode --signal <s> [--content-type <ct>] [--config <path>] <file>`: decode one
//!   export request and print its canonical JSON form

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use otelgate_core::error::{OtelGateError, Result};
use otelgate_core::protocol::{media, PayloadFormat};
use otelgate_core::{Decoder, Signal};
use otelgate_gateway::config::{self, GatewayConfig};

#[derive(Parser)]
#[command(name = "otelgate")]
#[command(about = "OTLP payload decoding and admission control")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a gateway config file
    CheckConfig {
        /// Path to the YAML config
        path: PathBuf,
    },

    /// Decode an OTLP export request and print it as canonical JSON
    Decode {
        /// traces, metrics or logs
        #[arg(short, long)]
        signal: Signal,

        /// Media type of the payload
        #[arg(long, default_value = media::PROTOBUF)]
        content_type: String,

        /// Gateway config supplying decoder options
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Payload file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::CheckConfig { path } => check_config(&path),
        Commands::Decode {
            signal,
            content_type,
            config,
            file,
        } => decode(signal, &content_type, config.as_deref(), &file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {e}", e.client_code().as_str());
            ExitCode::FAILURE
        }
    }
}

fn check_config(path: &Path) -> Result<()> {
    let cfg = config::load_from_file(path)?;
    tracing::info!(path = %path.display(), "config ok");
    println!(
        "ok: window_ms={} max_requests={} max_concurrent={} max_entries={} sweep_interval_ms={} bytes_encoding={:?} max_body_bytes={}",
        cfg.admission.window_ms,
        cfg.admission.max_requests,
        cfg.admission.max_concurrent,
        cfg.admission.max_entries,
        cfg.admission.sweep_interval_ms,
        cfg.decoder.bytes_encoding,
        cfg.decoder.max_body_bytes,
    );
    Ok(())
}

fn decode(signal: Signal, content_type: &str, config: Option<&Path>, file: &Path) -> Result<()> {
    let cfg = match config {
        Some(path) => config::load_from_file(path)?,
        None => GatewayConfig::default(),
    };
    let decoder = Decoder::otlp(cfg.decoder.options())?;

    let raw = fs::read(file).map_err(|e| {
        OtelGateError::Internal(format!("read payload failed ({}): {e}", file.display()))
    })?;

    let out = match PayloadFormat::from_content_type(Some(content_type))? {
        PayloadFormat::Json => {
            let body: Value = serde_json::from_slice(&raw)
                .map_err(|e| OtelGateError::Malformed(format!("invalid json: {e}")))?;
            decoder.decode(signal, Some(content_type), body, None)?
        }
        PayloadFormat::Protobuf => {
            decoder.decode(signal, Some(content_type), Value::Null, Some(Bytes::from(raw)))?
        }
    };

    let pretty = serde_json::to_string_pretty(&out)
        .map_err(|e| OtelGateError::Internal(format!("render failed: {e}")))?;
    println!("{pretty}");
    Ok(())
}
