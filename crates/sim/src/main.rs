//! Scenario runner for the gameplay effect system.
//!
//! Loads effect content (bundled, or from a data directory) and runs RON
//! scenarios against authoritative entities mirrored by predicting clients.

mod config;
mod logging;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gameplay_content::ContentFactory;

use config::SimConfig;
use scenario::{Runner, Scenario};

/// Gameplay effect scenario runner
#[derive(Parser)]
#[command(name = "gameplay-sim")]
#[command(about = "Runs effect scenarios and validates content", long_about = None)]
#[command(version)]
struct Cli {
    /// Content directory (config.toml, effects.ron, attributes.ron).
    /// Overrides GAMEPLAY_DATA_DIR; missing files fall back to the bundled copies
    #[arg(short, long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Also write logs to this file. Overrides GAMEPLAY_LOG_FILE
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Run one or more scenario files
    Run(RunArgs),

    /// Load and validate content without running anything
    Validate,
}

#[derive(Parser)]
struct RunArgs {
    /// Scenario files (RON)
    #[arg(value_name = "SCENARIO", required = true)]
    scenarios: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// One line per scenario plus failures
    Summary,
    /// Full JSON reports
    Json,
}

fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let env = SimConfig::from_env();
    let log_file = cli.log_file.or(env.log_file);
    let _guard = logging::setup_logging(&env.log_level, log_file.as_deref())?;

    let factory = match cli.data_dir.or(env.data_dir) {
        Some(dir) => ContentFactory::new(dir),
        None => ContentFactory::bundled(),
    };

    match cli.command {
        Command::Run(args) => run(&factory, args),
        Command::Validate => validate(&factory),
    }
}

fn validate(factory: &ContentFactory) -> Result<()> {
    let config = factory.load_config()?;
    let library = factory.load_effects()?;
    let sets = factory.load_attribute_sets()?;
    println!(
        "content ok: {} effects, {} attribute sets, rng_seed {}",
        library.len(),
        sets.len(),
        config.rng_seed
    );
    Ok(())
}

fn run(factory: &ContentFactory, args: RunArgs) -> Result<()> {
    let runner = Runner::new(factory.build_context()?, factory.load_attribute_sets()?);

    let mut reports = Vec::new();
    for path in &args.scenarios {
        let scenario = Scenario::load(path)?;
        let report = runner
            .run(&scenario)
            .with_context(|| format!("Scenario {} aborted", path.display()))?;
        reports.push(report);
    }

    match args.format {
        OutputFormat::Summary => {
            for report in &reports {
                let status = if report.passed() { "PASS" } else { "FAIL" };
                println!(
                    "{status} {}: {} steps, {} applied, {} rejected, {} checks",
                    report.scenario, report.steps, report.applied, report.rejected, report.checks
                );
                for failure in &report.failures {
                    println!("    {failure}");
                }
                for (entity, digest) in &report.digests {
                    println!("    entity {entity} digest {digest}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    let failed = reports.iter().filter(|report| !report.passed()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} scenarios failed", failed, reports.len());
    }
    Ok(())
}
