//! palisade Reference Graph: Demo CLI
//!
//! Runs one or all of the three reference graph scenarios. Each scenario
//! attaches a real rule tree to an in-memory graph schema over mock data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- secret-code
//!   cargo run -p demo -- ownership
//!   cargo run -p demo -- caching

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use palisade_contracts::error::PalisadeResult;
use palisade_ref_graph::scenarios::{caching, ownership, secret_code};

// ── CLI definition ────────────────────────────────────────────────────────────

/// palisade: field-level authorization for graph schemas.
///
/// Each subcommand runs one or all of the reference scenarios, showing rule
/// evaluation, fragment dependencies, and per-request caching.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "palisade reference graph demo",
    long_about = "Runs palisade reference scenarios showing field rules, reasoned denials,\n\
                  two-pass fragment execution, and per-request rule caching."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: Secret Code (context check, reasons, hidden faults).
    SecretCode,
    /// Scenario 2: Ownership (fragment dependencies, two-pass execution).
    Ownership,
    /// Scenario 3: Caching (predicate calls per cache policy).
    Caching,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for rule and cache traces.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::SecretCode => secret_code::run_scenario().await,
        Command::Ownership => ownership::run_scenario().await,
        Command::Caching => caching::run_scenario().await,
    };

    match result {
        Ok(()) => {
            info!("demo finished");
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_all() -> PalisadeResult<()> {
    secret_code::run_scenario().await?;
    ownership::run_scenario().await?;
    caching::run_scenario().await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("palisade: Field-level Authorization");
    println!("Reference Graph Demo");
    println!("====================================");
    println!();
    println!("Per field access:");
    println!("  [1] Resolve the rule: Type.field → Type.* → * → fallback");
    println!("  [2] Evaluate it through the per-request cache");
    println!("  [3] Authorized → run the resolver; otherwise surface the denial");
    println!("  [4] Rules with fragments run in a second pass over first-pass data");
    println!();
}
