//! cbind CLI
//!
//! Command-line interface for header extraction.

use anyhow::Result;
use clap::{Parser, Subcommand};
use regex::Regex;
use tracing_subscriber::EnvFilter;

use cbind_core::{ExtractRequest, Registrar, ScopeRegistry};

#[derive(Parser)]
#[command(name = "cbind")]
#[command(author, version, about = "C header binding extraction tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract declarations from one or more headers
    Extract {
        /// Header names or paths (e.g. stdio.h, /usr/include/zlib.h)
        #[arg(value_name = "HEADER", required = true)]
        headers: Vec<String>,

        /// Keep names matching this pattern even when excluded
        #[arg(long, value_name = "REGEX")]
        include: Option<String>,

        /// Skip names matching this pattern
        #[arg(long, value_name = "REGEX")]
        exclude: Option<String>,

        /// Library to bind function symbols to
        #[arg(short, long, default_value = cbind_core::DEFAULT_LIBRARY)]
        library: String,

        /// Suppress informational logs
        #[arg(short, long)]
        quiet: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the discovered system include search path
    Paths,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = matches!(&cli.command, Commands::Extract { quiet: true, .. });
    let default_filter = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Extract {
            headers,
            include,
            exclude,
            library,
            quiet,
            format,
        } => cmd_extract(headers, include, exclude, library, quiet, &format),
        Commands::Paths => cmd_paths(),
    }
}

fn cmd_extract(
    headers: Vec<String>,
    include: Option<String>,
    exclude: Option<String>,
    library: String,
    quiet: bool,
    format: &str,
) -> Result<()> {
    let mut request = ExtractRequest::new(headers).with_library(library);
    if let Some(pattern) = include {
        request = request.with_include(Regex::new(&pattern)?);
    }
    if let Some(pattern) = exclude {
        request = request.with_exclude(Regex::new(&pattern)?);
    }
    request.quiet = quiet;

    let decls = cbind_extract::extract(request)?;

    let mut registry = ScopeRegistry::new();
    for decl in &decls {
        registry.register(decl);
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(registry.registered())?);
        }
        _ => {
            for decl in registry.registered() {
                println!("{}", decl);
            }
            if !registry.skipped().is_empty() {
                println!(
                    "# skipped {} already-defined name(s)",
                    registry.skipped().len()
                );
            }
            println!(
                "# {} declaration(s), {} indexed constant value(s)",
                registry.registered().len(),
                registry.constant_index().len()
            );
        }
    }

    Ok(())
}

fn cmd_paths() -> Result<()> {
    for dir in cbind_extract::search::discover() {
        println!("{}", dir.display());
    }
    Ok(())
}
