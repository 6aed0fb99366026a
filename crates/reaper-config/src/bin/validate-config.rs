//! Config validation CLI tool
//!
//! Validates a reaper configuration file and reports each node's normalized
//! retention policy.

use clap::Parser;
use reaper_config::{CURRENT_CONFIG_VERSION, ConfigError, Policy, RetentionPolicy};
use reaper_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Validate a reaper configuration file
#[derive(Parser, Debug)]
#[command(name = "validate-config")]
#[command(about = "Validates a reaper configuration file", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/reaper/config.toml)
    #[arg(default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Print the normalized policies as JSON
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Check file exists
    if !args.config.exists() {
        eprintln!("Error: Configuration file not found: {}", args.config.display());
        return ExitCode::from(2);
    }

    match reaper_config::load_config(&args.config) {
        Ok(policy) if args.json => match serde_json::to_string_pretty(&json_summary(&policy)) {
            Ok(out) => {
                println!("{}", out);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize summary: {}", e);
                ExitCode::from(1)
            }
        },
        Ok(policy) => {
            print_summary(&policy);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

fn print_summary(policy: &Policy) {
    println!("✓ Configuration is valid");
    println!();
    println!("Summary:");
    println!("  Config version: {}", CURRENT_CONFIG_VERSION);
    println!(
        "  Evaluator: {} (tick every {})",
        if policy.evaluator.disabled { "disabled" } else { "enabled" },
        format_duration(policy.evaluator.tick_interval)
    );
    println!("  Nodes: {}", policy.nodes.len());

    if !policy.nodes.is_empty() {
        println!();
        println!("Nodes:");
        for node in &policy.nodes {
            let label = node.label.as_deref().unwrap_or(node.id.as_str());
            println!("  - {} [{}]: {}", node.id, describe(&node.retention), label);
        }
    }

    if !policy.notices.is_empty() {
        println!();
        println!("Notices:");
        for (node_id, notice) in &policy.notices {
            println!("  - {}: {}", node_id, notice);
        }
    }
}

fn describe(retention: &RetentionPolicy) -> String {
    match (retention.idle_enabled(), retention.cycle_enabled()) {
        (true, true) => format!(
            "idle {}m within {}m of billing boundary",
            retention.idle_termination_minutes, retention.cycle_termination_minutes
        ),
        (true, false) => format!("idle {}m", retention.idle_termination_minutes),
        (false, true) => format!(
            "within {}m of billing boundary",
            retention.cycle_termination_minutes
        ),
        (false, false) => "never terminated".to_string(),
    }
}

fn json_summary(policy: &Policy) -> serde_json::Value {
    let nodes: Vec<_> = policy
        .nodes
        .iter()
        .map(|node| {
            serde_json::json!({
                "id": node.id,
                "label": node.label,
                "retention": node.retention,
            })
        })
        .collect();

    let notices: Vec<_> = policy
        .notices
        .iter()
        .map(|(node_id, notice)| {
            serde_json::json!({
                "node": node_id,
                "notice": notice.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "config_version": CURRENT_CONFIG_VERSION,
        "evaluator": {
            "disabled": policy.evaluator.disabled,
            "tick_interval_seconds": policy.evaluator.tick_interval.as_secs(),
        },
        "nodes": nodes,
        "notices": notices,
    })
}
