#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use relance::config::{PipelineConfig, RiskModelConfig};
use relance::data::{extract_columns, load_records, records_to_frame};
use relance::export::{DEFAULT_COHORT_FILE, save_cohort_csv, save_table_csv};
use relance::indicators::{CampaignIndicators, RiskHistogram};
use relance::select::{select_cohort, threshold_grid};
use relance::synthetic::PopulationBuilder;
use relance::{ScoreCache, score_with_config};

const PREVIEW_ROWS: usize = 10;
const SWEEP_STEPS: usize = 20;

#[derive(Args)]
pub struct ModelArgs {
    /// TOML configuration file ([model] table and default_threshold)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of trees in the forest (overrides the configuration file)
    #[arg(long, value_name = "N")]
    pub trees: Option<usize>,

    /// Seed for the held-out split and tree growth (overrides the configuration file)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ModelArgs {
    fn resolve(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                println!("Loading configuration from: {}", path.display());
                PipelineConfig::load(path)?
            }
            None => PipelineConfig::default(),
        };
        if let Some(trees) = self.trees {
            config.model.n_trees = trees;
        }
        if let Some(seed) = self.seed {
            config.model.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Path to the record CSV (ID_Assuré, Âge, Sexe, ... Participation_post_relance)
    pub data: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Where to write the scored table
    #[arg(long, default_value = "scored.csv")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct SelectArgs {
    /// Path to the record CSV
    pub data: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Priority threshold in [0, 1]; records with a risk at or above it are selected
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Where to write the prioritized cohort
    #[arg(long, default_value = DEFAULT_COHORT_FILE)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct SweepArgs {
    /// Path to the record CSV
    pub data: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of records to generate
    #[arg(long, default_value = "1000")]
    pub rows: usize,

    /// Seed of the generator
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Where to write the generated records
    #[arg(long, default_value = "donnees_prevention.csv")]
    pub output: PathBuf,
}

#[derive(Parser)]
#[command(
    name = "relance",
    about = "Outreach risk scoring for preventive-health campaigns",
    long_about = "Scores each insured individual with the probability of not participating in a \
                 prevention campaign even after outreach, and exports the prioritized cohort \
                 for a chosen threshold."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the risk model and attach Score_risque to every record
    #[command(about = "Score every record (outputs: scored.csv)")]
    Score(ScoreArgs),

    /// Select and export the records at or above a risk threshold
    #[command(about = "Export the prioritized cohort (outputs: prioritaires_score.csv)")]
    Select(SelectArgs),

    /// Report cohort sizes across the whole threshold range
    #[command(about = "Cohort size for every threshold from 0 to 1 in steps of 0.05")]
    Sweep(SweepArgs),

    /// Print campaign indicators for a record file
    #[command(about = "Participation and isolation indicators")]
    Summary {
        /// Path to the record CSV
        data: PathBuf,
    },

    /// Generate a synthetic record file for demonstrations
    #[command(about = "Generate synthetic campaign records")]
    Simulate(SimulateArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn run_score(args: ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.model.resolve()?;
    let table = load_records(&args.data)?;
    println!("Loaded {} records from: {}", table.height(), args.data.display());

    println!(
        "Training random forest ({} trees, seed {})...",
        config.model.n_trees, config.model.seed
    );
    let scored = score_with_config(&table, &config.model)?;
    if let Some(report) = &scored.holdout {
        println!(
            "Held-out rows: {} | accuracy: {:.2}% | Brier score: {:.4}",
            report.rows,
            100.0 * report.accuracy,
            report.brier_score
        );
    }

    print_histogram(&RiskHistogram::from_scored(&scored.frame)?);
    save_table_csv(&scored.frame, &args.output)?;
    println!("Scored table saved to: {}", args.output.display());
    Ok(())
}

fn run_select(args: SelectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.model.resolve()?;
    let threshold = args.threshold.unwrap_or(config.default_threshold);
    relance::select::validate_threshold(threshold)?;

    let table = load_records(&args.data)?;
    let scored = score_with_config(&table, &config.model)?;
    let cohort = select_cohort(&scored.frame, threshold)?;

    println!(
        "{} high-risk records identified at threshold {:.2}.",
        cohort.count(),
        threshold
    );
    for member in cohort.members()?.iter().take(PREVIEW_ROWS) {
        println!(
            "  {:<12} {:>3}  {:<3} {:.3}",
            member.id, member.age, member.sex, member.risk
        );
    }
    if cohort.count() > PREVIEW_ROWS {
        println!("  ... {} more", cohort.count() - PREVIEW_ROWS);
    }

    save_cohort_csv(&cohort, &args.output)?;
    println!("Prioritized cohort saved to: {}", args.output.display());
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.model.resolve()?;
    let table = load_records(&args.data)?;
    let mut cache = ScoreCache::new(config.model);

    println!("threshold\tselected");
    for threshold in threshold_grid(SWEEP_STEPS) {
        let cohort = cache.select(&table, threshold)?;
        println!("{:.2}\t{}", threshold, cohort.count());
    }
    log::debug!("Sweep used {} model fit(s)", cache.fits());
    Ok(())
}

fn run_summary(data: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_records(data)?;
    let columns = extract_columns(&table)?;
    println!("{}", CampaignIndicators::compute(&columns));
    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let records = PopulationBuilder::new(args.rows).seed(args.seed).build();
    let table = records_to_frame(&records)?;
    save_table_csv(&table, &args.output)?;
    println!(
        "Generated {} records (seed {}) in: {}",
        records.len(),
        args.seed,
        args.output.display()
    );
    Ok(())
}

fn print_histogram(histogram: &RiskHistogram) {
    let widest = histogram.counts.iter().copied().max().unwrap_or(0).max(1);
    println!("Risk score distribution:");
    for (edge, &count) in RiskHistogram::edges().zip(histogram.counts.iter()) {
        let bar = "#".repeat((40 * count).div_ceil(widest));
        println!("  {:.2}  {:>6}  {}", edge, count, bar);
    }
}

fn default_model_config() -> RiskModelConfig {
    PipelineConfig::default().model
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Score(args)) => run_score(args),
        Some(Commands::Select(args)) => run_select(args),
        Some(Commands::Sweep(args)) => run_sweep(args),
        Some(Commands::Summary { data }) => run_summary(&data),
        Some(Commands::Simulate(args)) => run_simulate(args),
        Some(Commands::Version) => {
            let model = default_model_config();
            println!("relance {}", env!("CARGO_PKG_VERSION"));
            println!(
                "Default model: {} trees, seed {}, {:.0}% held out",
                model.n_trees,
                model.seed,
                100.0 * model.test_fraction
            );
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
