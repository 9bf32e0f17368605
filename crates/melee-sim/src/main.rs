//! melee-sim - runs batches of scripted skirmishes against the battle engine.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod skirmish;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use melee_core::world::DEFAULT_MONSTER_HP;
use melee_core::EngineConfig;
use rayon::prelude::*;
use tracing::Level;

use skirmish::{SkirmishReport, SkirmishSpec, Victor};

/// Headless skirmish runner for the melee battle engine
#[derive(Parser, Debug)]
#[command(name = "melee-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base seed; skirmish i uses seed + i
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of skirmishes to run
    #[arg(short = 'n', long, default_value = "100")]
    skirmishes: u64,

    /// Players per skirmish
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u16).range(1..))]
    players: u16,

    /// Monsters per skirmish
    #[arg(long, default_value = "3")]
    monsters: u16,

    /// Starting hit points of each player
    #[arg(long, default_value = "30")]
    player_hp: i32,

    /// Starting hit points of each monster
    #[arg(long, default_value_t = DEFAULT_MONSTER_HP)]
    monster_hp: i32,

    /// Submitted actions before a skirmish is called a stalemate
    #[arg(long, default_value = "500")]
    max_turns: u32,

    /// Engine config as JSON (damage ranges, block chance)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worker threads (default: all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Print every report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Default)]
struct Summary {
    skirmishes: usize,
    player_wins: usize,
    monster_wins: usize,
    stalemates: usize,
    average_turns: f64,
    average_battles: f64,
}

impl Summary {
    fn from_reports(reports: &[SkirmishReport]) -> Self {
        let mut summary = Self {
            skirmishes: reports.len(),
            ..Self::default()
        };
        if reports.is_empty() {
            return summary;
        }
        let mut turns = 0u64;
        let mut battles = 0usize;
        for report in reports {
            match report.victor {
                Victor::Players => summary.player_wins += 1,
                Victor::Monsters => summary.monster_wins += 1,
                Victor::Stalemate => summary.stalemates += 1,
            }
            turns += u64::from(report.turns);
            battles += report.battles;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            summary.average_turns = turns as f64 / reports.len() as f64;
            summary.average_battles = battles as f64 / reports.len() as f64;
        }
        summary
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_json_str(&text).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(num_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .context("failed to size the thread pool")?;
    }

    let spec = SkirmishSpec {
        players: usize::from(args.players),
        monsters: usize::from(args.monsters),
        player_hp: args.player_hp,
        monster_hp: args.monster_hp,
        max_turns: args.max_turns,
    };

    let reports = (0..args.skirmishes)
        .into_par_iter()
        .map(|i| skirmish::run(&spec, &config, args.seed.wrapping_add(i)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let summary = Summary::from_reports(&reports);
    println!(
        "{} skirmishes ({} players vs {} monsters, seeds {}..)",
        summary.skirmishes, spec.players, spec.monsters, args.seed
    );
    println!("  player wins:  {}", summary.player_wins);
    println!("  monster wins: {}", summary.monster_wins);
    println!("  stalemates:   {}", summary.stalemates);
    println!("  avg turns:    {:.1}", summary.average_turns);
    println!("  avg battles:  {:.1}", summary.average_battles);
    Ok(())
}
