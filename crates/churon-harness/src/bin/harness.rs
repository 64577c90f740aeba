//! CLI entrypoint for the churon build-time audit.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Audit tooling for the churon shared object.
#[derive(Debug, Parser)]
#[command(name = "churon-harness")]
#[command(about = "Build-time audit for the churon shared object")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the exported and internal symbols of a built module.
    Audit {
        /// Path to the shared object (e.g. target/release/libchuron.so).
        #[arg(long)]
        artifact: PathBuf,
        /// Target OS the artifact was built for (defaults to the host OS).
        #[arg(long, default_value = std::env::consts::OS)]
        target_os: String,
        /// Output JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a structured JSONL log written through CHURON_LOG.
    ValidateLog {
        /// Log file path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn write_or_print(body: &str, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, body)?;
        eprintln!("Wrote audit report to {}", path.display());
    } else {
        println!("{body}");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Audit {
            artifact,
            target_os,
            output,
        } => {
            let audit = churon_harness::audit_file(&artifact, &target_os)?;
            write_or_print(&serde_json::to_string_pretty(&audit)?, output)?;

            if !audit.passed() {
                for failure in &audit.failures {
                    eprintln!("FAIL: {failure}");
                }
                return Err(format!(
                    "Artifact audit failed: {} problem(s) in {}",
                    audit.failures.len(),
                    artifact.display()
                )
                .into());
            }
            eprintln!("Artifact audit passed for {}", artifact.display());
        }
        Command::ValidateLog { log } => {
            let report = churon_harness::check_log_file(&log)?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.passed() {
                return Err(format!(
                    "Log validation failed: {} error(s) in {}",
                    report.errors.len(),
                    log.display()
                )
                .into());
            }
        }
    }

    Ok(())
}
