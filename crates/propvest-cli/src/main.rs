mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use propvest_core::{ProjectionEngine, TemplateRegistry};

use commands::monte_carlo::MonteCarloArgs;
use commands::scoring::QuickScoreArgs;
use commands::templates::TemplatesArgs;
use commands::InputArgs;

/// Real estate deal analysis and risk simulation
#[derive(Parser)]
#[command(
    name = "propvest",
    version,
    about = "Real estate deal analysis and risk simulation",
    long_about = "A CLI for projecting real estate deals with decimal precision. \
                  Supports cash-flow projections, investment metrics, one- and two-way \
                  sensitivity, Monte Carlo simulation, scenario comparison, break-even \
                  solving and composite deal scoring."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// JSON or YAML file of property-type templates merged over the built-in set
    #[arg(long, global = true)]
    templates: Option<String>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a deal's cash flows and compute its metrics
    Project(InputArgs),
    /// One-way (tornado) sensitivity analysis
    Sensitivity(InputArgs),
    /// Two-way sensitivity grid
    Heatmap(InputArgs),
    /// Monte Carlo simulation of a deal metric
    MonteCarlo(MonteCarloArgs),
    /// Compare named scenarios against the base deal
    Scenarios(InputArgs),
    /// Solve the break-even value of each variable
    BreakEven(InputArgs),
    /// Composite deal score from a full set of deal inputs
    Score(InputArgs),
    /// Abbreviated score from cap rate, cash-on-cash and DSCR
    QuickScore(QuickScoreArgs),
    /// List or describe property-type templates
    Templates(TemplatesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn load_registry(path: Option<&str>) -> Result<TemplateRegistry, Box<dyn std::error::Error>> {
    let standard = TemplateRegistry::standard();
    match path {
        Some(p) => Ok(standard.merged_with(input::file::read_templates(p)?)?),
        None => Ok(standard),
    }
}

fn run(cli: Cli) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let registry = load_registry(cli.templates.as_deref())?;
    let engine = ProjectionEngine::new(&registry);

    match cli.command {
        Commands::Project(args) => commands::analysis::run_project(&engine, args),
        Commands::Sensitivity(args) => commands::analysis::run_sensitivity(&engine, args),
        Commands::Heatmap(args) => commands::analysis::run_heat_map(&engine, args),
        Commands::MonteCarlo(args) => commands::monte_carlo::run_monte_carlo(&engine, args),
        Commands::Scenarios(args) => commands::analysis::run_scenarios(&engine, args),
        Commands::BreakEven(args) => commands::analysis::run_break_even(&engine, args),
        Commands::Score(args) => commands::scoring::run_score(&engine, args),
        Commands::QuickScore(args) => commands::scoring::run_quick_score(&engine, args),
        Commands::Templates(args) => commands::templates::run_templates(&registry, args),
        Commands::Version => Ok(serde_json::json!({
            "name": "propvest",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = cli.output.clone();

    match run(cli) {
        Ok(value) => {
            output::format_output(&format, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
