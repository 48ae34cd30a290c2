//! Batch runner for arena encounters.
//!
//! Runs a preset line-up many times with consecutive seeds and prints how
//! often each side wins.
//!
//! ```bash
//! cargo run -p arena-sim -- --preset troll-hunt --runs 500 --seed 1
//! cargo run -p arena-sim -- --preset duel --runs 1 -vv
//! ```

use anyhow::{bail, Context, Result};
use arena_core::catalog::{self, Preset};
use arena_core::{BatchSummary, EncounterConfig, EncounterError, EncounterOutcome, Placement};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

/// Run arena encounters and tabulate win rates
#[derive(Parser, Debug)]
#[command(name = "arena-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Preset line-up to run
    #[arg(short, long, default_value = "goblin-ambush")]
    preset: String,

    /// Number of encounters
    #[arg(short = 'n', long, default_value_t = 100)]
    runs: u32,

    /// Seed of the first encounter; run i uses seed + i
    #[arg(short, long)]
    seed: Option<u64>,

    /// Grid width in cells
    #[arg(long)]
    width: Option<i32>,

    /// Grid height in cells
    #[arg(long)]
    height: Option<i32>,

    /// Round ceiling per encounter
    #[arg(long)]
    max_rounds: Option<u32>,

    /// How combatants are placed
    #[arg(long, value_enum)]
    placement: Option<PlacementArg>,

    /// Load the encounter configuration from a JSON file; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// List the presets and exit
    #[arg(long)]
    list: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlacementArg {
    Random,
    Lines,
}

impl From<PlacementArg> for Placement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Random => Placement::Random,
            PlacementArg::Lines => Placement::Lines,
        }
    }
}

impl Args {
    fn encounter_config(&self) -> Result<EncounterConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => EncounterConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.width.is_some() || self.height.is_some() {
            let width = self.width.unwrap_or(config.width);
            let height = self.height.unwrap_or(config.height);
            config = config.with_size(width, height);
        }
        if let Some(rounds) = self.max_rounds {
            config.max_rounds = rounds;
        }
        if let Some(placement) = self.placement {
            config.placement = placement.into();
        }
        if config.width < 1 || config.height < 1 {
            bail!("grid must be at least 1x1, got {}x{}", config.width, config.height);
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_once(preset: &Preset, config: EncounterConfig) -> Result<EncounterOutcome, EncounterError> {
    let mut encounter = preset.encounter(config)?;
    encounter.run()
}

fn print_presets() {
    println!("{:<16} DESCRIPTION", "PRESET");
    for preset in catalog::PRESETS {
        println!("{:<16} {}", preset.name, preset.description);
    }
}

fn print_summary(preset: &Preset, summary: &BatchSummary) {
    println!("{} ({} runs)", preset.name, summary.runs);
    println!();
    println!("{:<12} {:>6} {:>8}", "SIDE", "WINS", "RATE");
    for (side, wins) in &summary.wins {
        println!(
            "{:<12} {:>6} {:>7.1}%",
            side.as_str(),
            wins,
            summary.win_rate(side) * 100.0
        );
    }
    println!();
    println!("draws:          {}", summary.draws);
    println!("failed:         {}", summary.failures);
    println!("average rounds: {:.1}", summary.average_rounds());
}

/// Per-combatant table for a single fight.
fn print_fight(outcome: &EncounterOutcome) {
    match &outcome.winner {
        Some(side) => println!("{} wins after {} rounds", side.as_str(), outcome.rounds),
        None => println!("nobody wins after {} rounds", outcome.rounds),
    }
    println!();
    println!(
        "{:<14} {:<10} {:>7} {:>7} {:>6}  STATUS",
        "NAME", "SIDE", "HP", "DAMAGE", "HITS"
    );
    for c in &outcome.report.combatants {
        let hits: u32 = c.attacks.values().map(|s| s.hits).sum();
        let attempts: u32 = c.attacks.values().map(|s| s.attempts()).sum();
        println!(
            "{:<14} {:<10} {:>7} {:>7} {:>6}  {}",
            c.name,
            c.side.as_str(),
            format!("{}/{}", c.hp, c.max_hp),
            c.total_damage(),
            format!("{hits}/{attempts}"),
            c.status
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list {
        print_presets();
        return Ok(());
    }

    let Some(preset) = catalog::preset(&args.preset) else {
        bail!(
            "unknown preset '{}' (try --list)",
            args.preset
        );
    };
    let config = args.encounter_config()?;
    info!(preset = preset.name, runs = args.runs, seed = config.seed, "starting batch");

    let mut summary = BatchSummary::new();
    let mut last = None;
    for i in 0..args.runs {
        let seed = config.seed.wrapping_add(u64::from(i));
        match run_once(preset, config.clone().with_seed(seed)) {
            Ok(outcome) => {
                summary.record(&outcome.report);
                last = Some(outcome);
            }
            Err(EncounterError::RoundLimit(limit)) => {
                warn!(seed, limit, "encounter hit the round limit, skipping");
                summary.record_failure();
            }
            Err(e) => return Err(e).with_context(|| format!("preset {}", preset.name)),
        }
    }

    if args.json {
        match (&last, args.runs) {
            (Some(outcome), 1) => println!("{}", outcome.report.to_json()?),
            _ => println!("{}", serde_json::to_string_pretty(&summary)?),
        }
        return Ok(());
    }

    match (&last, args.runs) {
        (Some(outcome), 1) => print_fight(outcome),
        _ => print_summary(preset, &summary),
    }
    Ok(())
}
