use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use paddock::{Board, CellKind, Optimality, Outcome, SolveOptions, Solution};
use tracing_subscriber::EnvFilter;

/// Place blockers on an enclosure puzzle map to maximize the score reachable from the start.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Map file, one row per line; `-` reads from stdin.
    map: PathBuf,

    /// Maximum number of blockers to place.
    #[arg(short, long)]
    budget: usize,

    /// Give up on proving optimality after this many seconds.
    ///
    /// Best effort: the limit is checked between SAT calls, so one long call can run past it.
    #[arg(long)]
    time_limit: Option<f64>,

    /// Stop after this many improving placements.
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Render with symbols instead of map characters.
    #[arg(long)]
    emoji: bool,
}

fn emoji(kind: CellKind) -> &'static str {
    match kind {
        CellKind::Start => "🐴",
        CellKind::Land => "🟩",
        CellKind::Water => "🟦",
        CellKind::Blocker => "🟥",
        CellKind::Portal { .. } => "🌀",
        CellKind::Bonus => "🍒",
        CellKind::GoldBonus => "💰",
        CellKind::Hazard => "🐝",
    }
}

fn render_emoji(solution: &Solution) -> String {
    let grid = solution.grid()
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|kind| emoji(*kind)).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");
    let reachable = solution.reachable()
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|r| if *r { "✅" } else { "❌" }).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");

    format!("{grid}\n{reachable}\n")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let map = if args.map.as_os_str() == "-" {
        let mut map = String::new();
        std::io::stdin().read_to_string(&mut map).context("reading map from stdin")?;
        map
    } else {
        std::fs::read_to_string(&args.map).with_context(|| format!("reading map from {}", args.map.display()))?
    };

    let board: Board = map.parse()?;

    let mut options = SolveOptions::default();
    if let Some(seconds) = args.time_limit {
        options = options.with_time_limit(Duration::try_from_secs_f64(seconds).context("invalid time limit")?);
    }
    if let Some(rounds) = args.max_rounds {
        options = options.with_max_improvements(rounds);
    }

    match board.solve(args.budget, &options)? {
        Outcome::Solved(solution) => {
            println!("Blockers used: {}", solution.blockers());
            println!("Objective value: {}", solution.objective());
            if solution.optimality() == Optimality::BestFound {
                println!("(best found, not proven optimal)");
            }

            if args.emoji {
                print!("{}", render_emoji(&solution));
            } else {
                print!("{solution}");
                println!();
                print!("{}", solution.render_reachable());
            }
        }
        Outcome::Infeasible => {
            println!("unsat");
            std::process::exit(1);
        }
        Outcome::Undecided => bail!("no placement found before the search was stopped"),
    }

    Ok(())
}
