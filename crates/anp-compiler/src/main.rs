//! anpc - admin network policy compiler entry point.
//!
//! Reads a policy set file, runs one reconciliation pass and prints the
//! compiled objects.

use std::path::PathBuf;
use std::process::ExitCode;

use anp_compiler::{CompilerConfig, PolicyCompiler, PolicySetDocument};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "anpc", version, about = "Compile admin network policies into ACLs")]
struct Args {
    /// Policy set file (YAML, or JSON with a .json extension)
    policies: PathBuf,

    /// Compiler configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable the IPv4 address family (overrides the config file)
    #[arg(long)]
    ipv4: Option<bool>,

    /// Enable the IPv6 address family (overrides the config file)
    #[arg(long)]
    ipv6: Option<bool>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(ipv4) = args.ipv4 {
        config.ipv4_mode = ipv4;
    }
    if let Some(ipv6) = args.ipv6 {
        config.ipv6_mode = ipv6;
    }
    let compiler = PolicyCompiler::new(&config)?;

    info!("Loading policies from {}", args.policies.display());
    let document = PolicySetDocument::load(&args.policies)?;
    let snapshot = document
        .to_policies()
        .with_context(|| format!("invalid policy set {}", args.policies.display()))?;

    let report = compiler.reconcile(&snapshot);
    for failure in &report.failures {
        error!(
            "{} policy {} not compiled: {}",
            failure.flavor, failure.policy, failure.error
        );
    }
    info!(
        "Compiled {} of {} policies",
        report.compiled.len(),
        snapshot.len()
    );

    let rendered = match args.output {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Yaml => serde_yaml::to_string(&report)?,
    };
    println!("{}", rendered);

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
