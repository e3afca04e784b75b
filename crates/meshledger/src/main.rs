//! `meshledger` command-line entry point.
//!
//! `meshledger` and `meshledger run` execute a run and print its summary.
//! `meshledger verify` checks an existing output root. Logs go to stderr;
//! stdout carries exactly one JSON document.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meshledger::core::{Keyring, RootSecret};
use meshledger::store::layout::DEFAULT_LEDGER;
use meshledger::{LedgerError, RunArgs, Verifier};

#[derive(Parser)]
#[command(name = "meshledger", version, about = "Hash-chained capsule ledger for mesh workloads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every mesh and roll up (the default)
    Run(RunArgs),
    /// Verify an existing output root
    Verify(VerifyArgs),
}

#[derive(Args)]
struct VerifyArgs {
    /// Output root to verify
    #[arg(long, env = "OUTDIR", default_value = "./ledger")]
    outdir: PathBuf,

    /// Ledger file name
    #[arg(long, env = "LEDGER_NAME", default_value = DEFAULT_LEDGER)]
    ledger_name: String,

    /// Recompute every MAC and hint (needs MESH_SECRET and SEED)
    #[arg(long)]
    with_keys: bool,

    #[arg(long, env = "MESH_SECRET", default_value = "", hide_env_values = true, hide_default_value = true)]
    secret: String,

    #[arg(long, env = "SEED", default_value = "TrueNorth")]
    seed: String,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail("ConfigError", &e.to_string()),
    };

    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            let kind = e
                .downcast_ref::<LedgerError>()
                .map(LedgerError::kind)
                .unwrap_or("IOError");
            fail(kind, &format!("{e:#}"))
        }
    }
}

/// Run the command and print its JSON. Returns whether it reported `ok`.
fn execute(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Some(Commands::Verify(args)) => {
            let verifier = if args.with_keys {
                if args.secret.is_empty() {
                    return Err(LedgerError::Config("--with-keys needs MESH_SECRET".into()).into());
                }
                let keyring = Keyring::new(RootSecret::parse(&args.secret), args.seed);
                Verifier::with_keys(&args.outdir, keyring)?
            } else {
                Verifier::new(&args.outdir)
            };
            let report = verifier.verify_run(&args.ledger_name)?;
            println!("{}", serde_json::to_string(&report)?);
            Ok(report.ok)
        }
        Some(Commands::Run(args)) => run(args),
        None => run(cli.run),
    }
}

fn run(args: RunArgs) -> anyhow::Result<bool> {
    let config = args.into_config()?;
    let summary = meshledger::run(config)?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(summary.ok)
}

fn fail(kind: &str, error: &str) -> ExitCode {
    eprintln!("{}", json!({ "ok": false, "kind": kind, "error": error }));
    ExitCode::FAILURE
}
