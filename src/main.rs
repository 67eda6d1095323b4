//! cert-chain CLI
//!
//! Generates a three-tier certificate chain (Root CA → Intermediate CA →
//! server certificate) for a hostname and exports it in PEM, DER, PKCS#12
//! and Java-keystore formats, with a summary document describing every
//! artifact produced.
//!
//! ```bash
//! cert-chain api.internal.example.com
//! cert-chain api.internal.example.com --output-dir /srv/pki --verbose
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use cert_chain::configs::AppConfig;
use cert_chain::manifest::ArtifactStatus;
use cert_chain::pipeline::{self, GenerateOptions};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Generate a complete certificate chain for a server hostname.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Fully qualified domain name the server certificate is issued for
    fqdn: String,

    /// Directory the per-run output directory is created under
    #[arg(long, default_value = "./certs")]
    output_dir: PathBuf,

    /// Enable debug logging for each pipeline stage
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    match generate() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("✗ {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn generate() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "cert_chain=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    println!("=== Certificate Chain Generator ===\n");

    let config = AppConfig::load().context("Failed to load configuration")?;
    let opts = GenerateOptions {
        fqdn: cli.fqdn,
        output_dir: cli.output_dir,
        config,
    };
    let report = pipeline::run(&opts)
        .with_context(|| format!("Failed to generate certificate chain for {}", opts.fqdn))?;

    println!("\nArtifacts in {}:", report.layout.run_dir.display());
    for record in report.manifest.records() {
        let marker = match &record.status {
            ArtifactStatus::Written => "✓",
            ArtifactStatus::Degraded { .. } => "~",
            ArtifactStatus::Failed { .. } => "✗",
        };
        println!(
            "  {} {} ({})",
            marker,
            record.path.display(),
            record.purpose
        );
    }

    let failures = report.manifest.failures();
    if failures.is_empty() {
        println!("\n✓ All exports completed");
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "\n~ Completed with {} failed export(s); see {}",
            failures.len(),
            report.layout.summary().display()
        );
        Ok(ExitCode::SUCCESS)
    }
}
