//! Pitwall CLI - Command-line interface for race winner predictions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pitwall::config::{FusionConfig, Settings};
use pitwall::data::{CsvSource, RaceDataSource, ResponseCache};
#[cfg(feature = "jolpica")]
use pitwall::data::{ClientConfig, JolpicaClient};
use pitwall::explain::display_name;
use pitwall::features::{RaceCountMode, DEFAULT_WINDOW};
use pitwall::pipeline::{PredictorSettings, RacePredictor};
use pitwall::{Prediction, RaceInfo, RaceResult, SourceError};

#[derive(Parser)]
#[command(name = "pitwall")]
#[command(author, version, about = "F1 race winner prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Read races.csv / results.csv from this directory instead of the API
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,

    /// Response cache directory (overrides PITWALL_CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the winner of a round
    Predict {
        #[arg(short, long)]
        season: u32,

        #[arg(short, long)]
        round: u32,

        /// Lookback window in rounds
        #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
        window: u32,

        /// Softmax temperature (overrides the priors file)
        #[arg(long)]
        temperature: Option<f64>,

        /// JSON file with temperature and constructor priors
        #[arg(long)]
        priors: Option<PathBuf>,

        /// Count only non-finishes towards race_count
        #[arg(long)]
        legacy_race_count: bool,

        /// Number of drivers to show
        #[arg(long, default_value = "10")]
        top: usize,

        /// Print the full prediction as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the calendar of a season
    Races {
        #[arg(short, long)]
        season: u32,
    },

    /// Delete every cached API response
    ClearCache,
}

/// Options for one prediction run
struct PredictOptions {
    window: u32,
    temperature: Option<f64>,
    priors: Option<PathBuf>,
    legacy_race_count: bool,
    top: usize,
    json: bool,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            temperature: None,
            priors: None,
            legacy_race_count: false,
            top: 10,
            json: false,
        }
    }
}

/// Whichever data source the command line selected
enum Source {
    Csv(CsvSource),
    #[cfg(feature = "jolpica")]
    Remote(JolpicaClient),
}

impl RaceDataSource for Source {
    async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
        match self {
            Source::Csv(csv) => csv.races(season).await,
            #[cfg(feature = "jolpica")]
            Source::Remote(client) => client.races(season).await,
        }
    }

    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError> {
        match self {
            Source::Csv(csv) => csv.results(season, round).await,
            #[cfg(feature = "jolpica")]
            Source::Remote(client) => client.results(season, round).await,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let mut settings = Settings::from_env();
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = dir.clone();
    }
    let csv_dir = cli.csv_dir.as_deref();

    if cli.interactive {
        run_interactive(&rt, open_source(csv_dir, &settings)?)?;
    } else if let Some(command) = cli.command {
        match command {
            Commands::Predict {
                season,
                round,
                window,
                temperature,
                priors,
                legacy_race_count,
                top,
                json,
            } => {
                let options = PredictOptions {
                    window,
                    temperature,
                    priors,
                    legacy_race_count,
                    top,
                    json,
                };
                let source = open_source(csv_dir, &settings)?;
                predict_race(&rt, &source, season, round, &options)?;
            }
            Commands::Races { season } => {
                let source = open_source(csv_dir, &settings)?;
                list_races(&rt, &source, season)?;
            }
            Commands::ClearCache => {
                clear_cache(&settings.cache_dir)?;
            }
        }
    } else {
        println!("Use --help for usage information or --interactive for interactive mode.");
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_source(csv_dir: Option<&Path>, settings: &Settings) -> Result<Source> {
    if let Some(dir) = csv_dir {
        let csv = CsvSource::load(dir)
            .with_context(|| format!("Failed to load CSV data from {:?}", dir))?;
        return Ok(Source::Csv(csv));
    }
    open_remote(settings)
}

#[cfg(feature = "jolpica")]
fn open_remote(settings: &Settings) -> Result<Source> {
    let cache = ResponseCache::open(&settings.cache_dir)
        .with_context(|| format!("Failed to open cache at {:?}", settings.cache_dir))?;
    let client = JolpicaClient::new(ClientConfig::from_settings(settings), Some(cache))
        .context("Failed to create HTTP client")?;
    Ok(Source::Remote(client))
}

#[cfg(not(feature = "jolpica"))]
fn open_remote(settings: &Settings) -> Result<Source> {
    let _ = settings;
    anyhow::bail!("Built without the `jolpica` feature; pass --csv-dir")
}

fn clear_cache(dir: &Path) -> Result<()> {
    let cache =
        ResponseCache::open(dir).with_context(|| format!("Failed to open cache at {:?}", dir))?;
    let removed = cache
        .clear()
        .with_context(|| format!("Failed to clear cache at {:?}", cache.dir()))?;
    println!(
        "{}: {} entries from {:?}",
        "Cleared".green(),
        removed,
        cache.dir()
    );
    Ok(())
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid spinner template")?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn fusion_config(options: &PredictOptions) -> Result<FusionConfig> {
    let config = match &options.priors {
        Some(path) => FusionConfig::load_from_file(path)
            .with_context(|| format!("Failed to load priors from {:?}", path))?,
        None => FusionConfig::default(),
    };
    match options.temperature {
        Some(t) => Ok(config.with_temperature(t)?),
        None => Ok(config),
    }
}

fn predict_race(
    rt: &tokio::runtime::Runtime,
    source: &Source,
    season: u32,
    round: u32,
    options: &PredictOptions,
) -> Result<()> {
    let settings = PredictorSettings {
        window: options.window,
        race_count_mode: if options.legacy_race_count {
            RaceCountMode::DnfOnly
        } else {
            RaceCountMode::Entered
        },
        fusion: fusion_config(options)?,
    };
    let predictor = RacePredictor::new(source, settings)?;

    let pb = spinner(&format!("Predicting {} round {}...", season, round))?;
    let prediction = rt.block_on(predictor.predict(season, round));
    pb.finish_and_clear();

    let prediction = prediction
        .with_context(|| format!("Failed to predict season {} round {}", season, round))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&prediction, options.top);
    }

    Ok(())
}

fn print_prediction(prediction: &Prediction, top: usize) {
    let circuit = &prediction.circuit;
    println!(
        "{}: {} round {} / {} ({})",
        "Prediction".green(),
        prediction.season,
        prediction.round,
        circuit.circuit_name,
        circuit.location
    );
    println!();

    println!("{}", "Circuit profile:".yellow().bold());
    if prediction.circuit_observed {
        println!("  Qualifying importance: {:.3}", circuit.qualifying_importance);
        println!("  Overtaking difficulty: {:.3}", circuit.overtaking_difficulty);
        println!("  Safety car risk:       {:.3}", circuit.safety_car_risk);
    } else {
        println!(
            "  {}",
            "Round not run yet, default circuit factors used.".dimmed()
        );
    }
    if let Some(laps) = circuit.lap_count {
        println!("  Laps:                  {}", laps);
    }
    println!();

    let result = &prediction.result;
    if result.is_empty() {
        println!(
            "{}",
            "Not enough prior results to make a prediction.".yellow()
        );
        return;
    }

    println!("{}", "Win probabilities:".yellow().bold());
    println!(
        "{:>4} {:<24} {:<16} {:>7} {:>6} {:>6}",
        "Pos", "Driver", "Team", "Win", "Form", "DNF"
    );
    println!("{}", "-".repeat(68));

    for (i, (driver, prob)) in result.ranking().into_iter().take(top).enumerate() {
        let team = prediction
            .assignment
            .get(driver)
            .map(|t| display_name(t))
            .unwrap_or_else(|| "-".to_string());
        let (form, dnf) = prediction
            .drivers
            .get(driver)
            .map(|s| (s.form_score, s.dnf_risk))
            .unwrap_or_default();

        let line = format!(
            "{:>4} {:<24} {:<16} {:>6.1}% {:>6.3} {:>6.3}",
            i + 1,
            truncate_name(&display_name(driver), 24),
            truncate_name(&team, 16),
            prob * 100.0,
            form,
            dnf
        );
        if result.podium.iter().any(|p| p == driver) {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    println!();

    if let Some(winner) = &result.winner {
        println!("{} {}", "Winner:".bold(), display_name(winner).cyan().bold());
        let podium: Vec<String> = result.podium.iter().map(|d| display_name(d)).collect();
        println!("{} {}", "Podium:".bold(), podium.join(", "));
        println!();
    }

    println!("{}", "Why:".yellow().bold());
    for line in &prediction.explanations {
        println!("  - {}", line);
    }
}

fn list_races(rt: &tokio::runtime::Runtime, source: &Source, season: u32) -> Result<()> {
    println!("{}: {}", "Listing races for".green(), season);
    println!();

    let pb = spinner("Loading calendar...")?;
    let races = rt.block_on(source.races(season));
    pb.finish_and_clear();

    let races = races.with_context(|| format!("Failed to list races for {}", season))?;
    if races.is_empty() {
        println!("{}", "No races found for this season.".yellow());
        return Ok(());
    }

    println!("{:>5} {:<28} {:<36}", "Round", "Race", "Location");
    println!("{}", "-".repeat(70));
    for race in &races {
        println!(
            "{:>5} {:<28} {:<36}",
            race.round,
            truncate_name(&race.race_name, 28),
            truncate_name(&race.location(), 36)
        );
    }
    println!();
    println!("Total: {} races", races.len());

    Ok(())
}

fn run_interactive(rt: &tokio::runtime::Runtime, source: Source) -> Result<()> {
    println!("{}", "Interactive mode".green().bold());
    println!();

    let theme = ColorfulTheme::default();

    loop {
        let options = vec!["Predict a race", "List races", "Quit"];

        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => {
                let season: u32 = Input::with_theme(&theme)
                    .with_prompt("Season")
                    .interact_text()?;

                let round: u32 = Input::with_theme(&theme)
                    .with_prompt("Round")
                    .interact_text()?;

                let window: u32 = Input::with_theme(&theme)
                    .with_prompt("Lookback window")
                    .default(DEFAULT_WINDOW)
                    .interact_text()?;

                println!();
                let options = PredictOptions {
                    window,
                    ..PredictOptions::default()
                };
                predict_race(rt, &source, season, round, &options)?;
                println!();
            }
            1 => {
                let season: u32 = Input::with_theme(&theme)
                    .with_prompt("Season")
                    .interact_text()?;

                println!();
                list_races(rt, &source, season)?;
                println!();
            }
            2 => {
                println!("Goodbye!");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Truncate name to fit display width
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}
