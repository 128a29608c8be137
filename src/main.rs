use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subsync::health::CheckResult;
use subsync::{
    Config, GitClient, HealthCheck, ProcessRunner, ReconcileOutcome, RunOutcome, StatusOutcome,
    SyncEngine, SyncOptions, TerminalOperator,
};

#[derive(Parser)]
#[command(name = "subsync")]
#[command(about = "Keep git submodules pulled, pushed and pinned in their parent repository")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Parent repository working tree
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Submodule path to manage (repeatable, replaces the configured list)
    #[arg(short = 's', long = "submodule", global = true)]
    submodules: Vec<String>,

    /// Integration branch to pull in every submodule
    #[arg(short, long, global = true)]
    branch: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull, reconcile and re-pin submodules (default)
    Sync {
        /// Work on the current working trees without pulling first
        #[arg(long)]
        skip_update: bool,

        /// Answer yes to push confirmations
        #[arg(short, long)]
        yes: bool,
    },

    /// Show each submodule's divergence without changing anything
    Status {
        /// Pull every submodule before checking
        #[arg(long)]
        update: bool,
    },

    /// System health check and diagnostics
    Doctor,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_init = matches!(cli.command, Some(Commands::Init { .. }));
    let config = load_config(cli.config.clone(), is_init)?.with_overrides(
        cli.repo.clone(),
        cli.submodules.clone(),
        cli.branch.clone(),
    )?;

    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting subsync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => cmd_sync(false, false, config).await,
        Some(Commands::Sync { skip_update, yes }) => cmd_sync(skip_update, yes, config).await,
        Some(Commands::Status { update }) => cmd_status(update, config).await,
        Some(Commands::Doctor) => cmd_doctor(&config).await,
        Some(Commands::Init { force }) => cmd_init(cli.config, force, &config),
    }
}

/// Initialize logging: RUST_LOG wins, then --verbose, then the configured level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    // stdout belongs to the operator conversation
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location.
/// `init` may name a file that does not exist yet.
fn load_config(config_path: Option<PathBuf>, allow_missing: bool) -> Result<Config> {
    match config_path {
        Some(path) if allow_missing && !path.exists() => Ok(Config::default()),
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

fn engine(config: Config, assume_yes: bool) -> SyncEngine {
    let runner = Arc::new(ProcessRunner::new(config.git.binary.clone()));
    let operator = Arc::new(TerminalOperator::new(assume_yes));
    SyncEngine::new(config, runner, operator)
}

/// Pull, reconcile and re-pin
async fn cmd_sync(skip_update: bool, assume_yes: bool, config: Config) -> Result<()> {
    let engine = engine(config, assume_yes);

    println!(
        "🔄 Synchronizing submodules of {}",
        engine.config().repository_path().display()
    );
    if skip_update {
        println!("⏭️  Skipping submodule update");
    }

    let outcome = engine.run(SyncOptions { skip_update }).await?;

    match &outcome {
        RunOutcome::Aborted(failure) => {
            println!("\n❌ Synchronization aborted: {}", failure);
        }
        RunOutcome::Done(summary) => {
            println!("\n🎉 Synchronization Complete!");
            println!("   📊 Submodules: {}", summary.reports.len());
            println!("   🔀 Divergent: {}", summary.divergent_count());
            println!("   ✅ Reconciled: {}", summary.reconciled_count());
            println!("   ❌ Failed: {}", summary.failed_count());
            match &summary.repin {
                Some(repin) => println!("   📌 Parent: {}", repin),
                None => println!("   📌 Parent: not needed"),
            }
            println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

            if summary.failed_count() > 0 {
                println!("\n🔍 Failed Submodules:");
                for report in &summary.reports {
                    if let Some(error) = &report.error {
                        println!("   ❌ {}: {}", report.path, error);
                    }
                    if let Some(outcome @ ReconcileOutcome::Failed { .. }) = &report.reconcile {
                        println!("   ❌ {}: {}", report.path, outcome);
                    }
                }
            }
        }
    }

    if outcome.exit_code() != 0 {
        std::process::exit(outcome.exit_code());
    }
    Ok(())
}

/// Dry run: print divergence per submodule
async fn cmd_status(update: bool, config: Config) -> Result<()> {
    let engine = engine(config, false);

    println!("🔍 Checking submodules...");
    let reports = match engine.status(update).await? {
        StatusOutcome::Reports(reports) => reports,
        StatusOutcome::Aborted(failure) => {
            println!("❌ Update aborted: {}", failure);
            std::process::exit(1);
        }
    };

    if reports.is_empty() {
        println!("⚠️  No submodules configured or found in .gitmodules");
        return Ok(());
    }

    let mut divergent = 0;
    for report in &reports {
        match (&report.divergence, &report.error) {
            (Some(state), _) if state.is_divergent() => {
                divergent += 1;
                println!(
                    "   🔀 {}: {}",
                    report.path,
                    subsync::sync::describe(state)
                );
            }
            (Some(_), _) => println!("   ✅ {}: up to date", report.path),
            (None, error) => println!(
                "   ❌ {}: {}",
                report.path,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    println!("\n📈 Summary:");
    println!("   🔀 Divergent submodules: {}", divergent);
    println!("   📊 Total submodules: {}", reports.len());

    if divergent > 0 {
        println!("\n💡 Tip: run 'subsync sync' to commit and push them");
    }

    Ok(())
}

/// System health check and diagnostics
async fn cmd_doctor(config: &Config) -> Result<()> {
    let git = GitClient::new(Arc::new(ProcessRunner::new(config.git.binary.clone())));
    let health = HealthCheck::run(config, &git).await;
    print_health_report(&health);
    Ok(())
}

/// Write a starter configuration file
fn cmd_init(config_path: Option<PathBuf>, force: bool, config: &Config) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if path.exists() && !force {
        bail!(
            "Configuration already exists at {:?} (use --force to overwrite)",
            path
        );
    }

    config.save(&path)?;

    println!("✅ subsync initialized successfully!");
    println!("   Config: {:?}", path);
    println!("   Repository: {}", config.repository);
    if config.submodules.is_empty() {
        println!("   Submodules: read from .gitmodules");
    } else {
        println!("   Submodules: {}", config.submodules.join(", "));
    }
    println!("   Integration branch: {}", config.integration_branch);

    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 subsync System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let warnings = health.warnings();
    if !warnings.is_empty() {
        println!("⚠️  {} warning(s):", warnings.len());
        for warning in warnings {
            println!("   {}", warning.message);
        }
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
