//! Ren-Go command line.
//!
//! - `ren-go scores --out samples.bin` - Generate scorer training samples
//! - `ren-go selfplay --out games.bin` - Write rollout games to an archive
//! - `ren-go verify games.bin` - Check an archive

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use ren_go::archive::{self, ArchiveWriter};
use ren_go::board::{Board, BoardContext, GameState};
use ren_go::constants::{BLACK, KOMI, MAX_MOVES};
use ren_go::geometry::Geometry;
use ren_go::playout::{ScoreRules, win};
use ren_go::sample::{SampleConfig, generate_sample};
use ren_go::tables::ProbTables;

/// Ren-Go: incremental Go board and rollout tools
#[derive(Parser)]
#[command(name = "ren-go")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Board size
    #[arg(long, global = true, default_value_t = 19)]
    size: usize,

    /// Komi
    #[arg(long, global = true, default_value_t = KOMI)]
    komi: f64,

    /// Charge passes as points when scoring
    #[arg(long, global = true)]
    japanese: bool,

    /// Probability table file (neutral weights if omitted)
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    /// Random seed
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate scorer training samples
    Scores {
        /// Output file
        #[arg(long)]
        out: PathBuf,
        /// Number of samples to write
        #[arg(long, default_value_t = 1000)]
        count: usize,
        /// Rollouts per sample
        #[arg(long, default_value_t = 1000)]
        rollouts: usize,
        /// Games are cut at a random length below this
        #[arg(long, default_value_t = 300)]
        max_steps: usize,
        /// Run rollouts on all cores
        #[arg(long)]
        parallel: bool,
    },
    /// Play weighted games and store them in an archive
    Selfplay {
        /// Output archive
        #[arg(long)]
        out: PathBuf,
        /// Number of games
        #[arg(long, default_value_t = 100)]
        games: usize,
    },
    /// Check an archive and print its move count
    Verify {
        /// Archive file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let opts = &cli.global;

    let mut rng = match opts.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    let rules = ScoreRules {
        komi: opts.komi,
        japanese: opts.japanese,
    };

    match &cli.command {
        Commands::Scores {
            out,
            count,
            rollouts,
            max_steps,
            parallel,
        } => {
            let ctx = load_context(opts)?;
            let cfg = SampleConfig {
                max_steps: *max_steps,
                rollouts: *rollouts,
                rules,
                parallel: *parallel,
            };
            run_scores(&ctx, &cfg, out, *count, &mut rng)
        }
        Commands::Selfplay { out, games } => {
            let ctx = load_context(opts)?;
            run_selfplay(&ctx, &rules, out, *games, &mut rng)
        }
        Commands::Verify { path } => run_verify(path),
    }
}

fn load_context(opts: &GlobalOpts) -> Result<Arc<BoardContext>> {
    let geom = Geometry::new(opts.size)?;
    let tables = match &opts.tables {
        Some(path) => ProbTables::load(&geom, path)
            .with_context(|| format!("failed to load tables from {}", path.display()))?,
        None => ProbTables::neutral(&geom),
    };
    Ok(BoardContext::with_tables(geom, tables))
}

fn run_scores(
    ctx: &Arc<BoardContext>,
    cfg: &SampleConfig,
    out: &Path,
    count: usize,
    rng: &mut fastrand::Rng,
) -> Result<()> {
    let file = File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0;
    while written < count {
        let Some(sample) = generate_sample(ctx, cfg, rng) else {
            continue;
        };
        writer.write_all(&sample)?;
        written += 1;
        if written % 100 == 0 {
            info!("{written}/{count} samples");
        }
    }
    writer.flush()?;
    println!("wrote {written} samples to {}", out.display());
    Ok(())
}

fn run_selfplay(
    ctx: &Arc<BoardContext>,
    rules: &ScoreRules,
    out: &Path,
    games: usize,
    rng: &mut fastrand::Rng,
) -> Result<()> {
    let mut writer = ArchiveWriter::create(out, Arc::clone(ctx))
        .with_context(|| format!("failed to create {}", out.display()))?;

    let mut total_moves = 0;
    for i in 0..games {
        let mut b = Board::with_seed(Arc::clone(ctx), rng.u64(..));
        while b.state() != GameState::Ended && b.move_count() <= MAX_MOVES {
            b.select_move();
        }
        // Result from black's side: 1 black won, -1 white won.
        let result = if win(&b, BLACK, rules) != 0 { 1 } else { -1 };
        let n = writer.encode_game(b.history(), result)?;
        if n > 0 {
            total_moves += b.history().len();
        }
        info!("game {}: {} moves, result {result}", i + 1, b.history().len());
    }
    writer.finish()?;
    println!("wrote {games} games, {total_moves} moves to {}", out.display());
    Ok(())
}

fn run_verify(path: &Path) -> Result<()> {
    // The board size comes from the archive header.
    let total = archive::verify(path)
        .with_context(|| format!("{} failed verification", path.display()))?;
    println!("{total} moves");
    Ok(())
}
