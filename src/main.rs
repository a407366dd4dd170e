// src/main.rs
// FAIRNESS SIM - PIPELINE CLI
// Runs the negotiation simulation, then summarizes, models, plots and picks
// qualitative edge cases from the results. One subcommand per stage.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod brain;
mod config;
mod edge_cases;
mod error;
mod models;
mod normalize;
mod plots;
mod reporter;
mod scenarios;
mod simulation;

use brain::{Brain, DemoBrain, OpenAiBrain};
use config::Settings;
use error::Result;
use reporter::Reporter;
use simulation::Design;

const EDGE_CASE_PREVIEW: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "fairness-sim",
    version,
    about = "LLM negotiation fairness simulation and analysis"
)]
struct Cli {
    /// Settings file (defaults to ./fairness.toml when present)
    #[arg(long, global = true, env = "FAIRNESS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct SimulateArgs {
    /// Iterations per condition and split
    #[arg(long)]
    iterations: Option<u32>,

    /// Base seed; iteration i proposes with seed + i
    #[arg(long)]
    seed: Option<u64>,

    /// Use the offline demo generator instead of the chat API
    #[arg(long)]
    demo: bool,

    /// Raw results file
    #[arg(long)]
    out: Option<PathBuf>,
}

impl SimulateArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(iterations) = self.iterations {
            settings.simulation.iterations = iterations;
        }
        if let Some(seed) = self.seed {
            settings.simulation.base_seed = seed;
        }
        if let Some(out) = &self.out {
            settings.paths.raw = out.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate proposals and evaluations and save the raw records
    Simulate(SimulateArgs),
    /// Flatten raw records and write the summary table
    Summarize,
    /// Decision tree feature importances per context
    Tree,
    /// Ridge and Lasso logistic coefficients per context
    Logistic,
    /// Render the acceptance and fairness charts
    Plot,
    /// Export rejected even splits and accepted skewed splits
    EdgeCases,
    /// summarize, tree, logistic, plot and edge-cases in sequence
    Analyze,
    /// simulate followed by analyze
    Run(SimulateArgs),
}

async fn simulate(settings: &Settings, demo: bool) -> Result<()> {
    let design = Design::from_settings(settings)?;
    let brain: Box<dyn Brain> = if demo {
        tracing::info!(seed = settings.simulation.base_seed, "offline demo generator selected");
        Box::new(DemoBrain::new(settings.simulation.base_seed))
    } else {
        Box::new(OpenAiBrain::new(&settings.llm)?)
    };

    tracing::info!(
        evaluations = design.total_evaluations(),
        iterations = design.iterations,
        model = %settings.llm.model,
        "simulation starting"
    );
    let records = simulation::run_simulations(brain.as_ref(), &design).await?;
    simulation::save_raw(&settings.paths.raw, &records)?;
    println!(
        "✅ Saved {} evaluations to {}",
        records.len(),
        settings.paths.raw.display()
    );
    Ok(())
}

fn summarize(settings: &Settings) -> Result<()> {
    let records = simulation::load_raw(&settings.paths.raw)?;
    let outcome = normalize::flatten(&records);
    Reporter::print_run_summary(&outcome.rows, outcome.skipped);

    let summary = aggregate::summarize(&outcome.rows);
    aggregate::write_summary(&settings.paths.summary, &summary)?;
    Reporter::print_summary_table(&summary);
    Ok(())
}

fn tree(settings: &Settings) -> Result<()> {
    let rows = aggregate::read_summary(&settings.paths.summary)?;
    let report = models::fit_trees(&rows, settings)?;
    Reporter::print_accuracies(&report.accuracies);
    Reporter::print_importances(&report.importances);
    Reporter::print_failures("decision tree", &report.failures);
    Reporter::export_csv(&settings.paths.importance, &report.importances)?;
    Ok(())
}

fn logistic(settings: &Settings) -> Result<()> {
    let rows = aggregate::read_summary(&settings.paths.summary)?;
    let report = models::fit_logistic(&rows, settings)?;
    Reporter::print_accuracies(&report.accuracies);
    Reporter::print_coefficients(&report.coefficients);
    Reporter::print_failures("logistic", &report.failures);
    Reporter::export_csv(&settings.paths.coefficients, &report.coefficients)?;
    Ok(())
}

fn plot(settings: &Settings) -> Result<()> {
    let rows = aggregate::read_summary(&settings.paths.summary)?;
    let splits = settings.simulation.parsed_splits()?;
    let written = plots::render_all(&rows, &splits, &settings.paths.images)?;
    println!("📊 {} chart files in {}", written.len(), settings.paths.images.display());
    Ok(())
}

fn edge_cases(settings: &Settings) -> Result<()> {
    let records = simulation::load_raw(&settings.paths.raw)?;
    let cases = edge_cases::select_edge_cases(&records);
    Reporter::export_csv(&settings.paths.edge_cases, &cases)?;
    Reporter::print_edge_cases(&cases, EDGE_CASE_PREVIEW);
    Ok(())
}

fn analyze(settings: &Settings) -> Result<()> {
    summarize(settings)?;
    tree(settings)?;
    logistic(settings)?;
    plot(settings)?;
    edge_cases(settings)
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Simulate(args) => {
            args.apply(&mut settings);
            simulate(&settings, args.demo).await
        }
        Command::Summarize => summarize(&settings),
        Command::Tree => tree(&settings),
        Command::Logistic => logistic(&settings),
        Command::Plot => plot(&settings),
        Command::EdgeCases => edge_cases(&settings),
        Command::Analyze => analyze(&settings),
        Command::Run(args) => {
            args.apply(&mut settings);
            simulate(&settings, args.demo).await?;
            analyze(&settings)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pipeline stopped");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
