use clap::Parser;
use expectimax_2048::engine::{self as GameEngine, Board};
use expectimax_2048::expectimax::{Expectimax, ExpectimaxConfig, SearchDepth};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "expectimax-2048", version, about = "Play 2048 with an expectimax policy")]
struct Args {
    /// Search depth in player moves, or `auto` to pick it from board occupancy
    #[arg(short, long, default_value = "auto")]
    depth: SearchDepth,
    /// Base RNG seed; game `i` uses `seed + i`. Random when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Number of games; more than one runs them in parallel
    #[arg(short = 'n', long, default_value_t = 1)]
    games: usize,
    /// Stop each game after this many moves
    #[arg(long)]
    max_moves: Option<u64>,
    /// Do not print the board after every move
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy)]
struct GameSummary {
    game: usize,
    moves: u64,
    highest_tile: u32,
    total_nodes: u64,
    peak_nodes: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    GameEngine::new();

    log::info!("playing {} game(s) at depth {}", args.games, args.depth);
    let start = Instant::now();
    let summaries: Vec<GameSummary> = if args.games > 1 {
        (0..args.games).into_par_iter().map(|game| play_game(game, &args)).collect()
    } else {
        (0..args.games).map(|game| play_game(game, &args)).collect()
    };

    for s in &summaries {
        println!(
            "Game {}: moves made: {}, highest tile: {}, states considered: {}, max states for a move: {}",
            s.game, s.moves, s.highest_tile, s.total_nodes, s.peak_nodes
        );
    }
    if summaries.len() > 1 {
        let best = summaries.iter().map(|s| s.highest_tile).max().unwrap_or(0);
        let reached_2048 = summaries.iter().filter(|s| s.highest_tile >= 2048).count();
        println!(
            "{} games in {:.1}s, best tile {}, reached 2048 in {}",
            summaries.len(),
            start.elapsed().as_secs_f64(),
            best,
            reached_2048
        );
    }
}

fn play_game(game: usize, args: &Args) -> GameSummary {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(game as u64)),
        None => StdRng::from_entropy(),
    };
    let cfg = ExpectimaxConfig { depth: args.depth, ..Default::default() };
    let mut policy = Expectimax::with_config(cfg);
    let show = !args.quiet && args.games == 1;

    let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    if show {
        println!("{board}");
    }
    let mut moves = 0u64;
    let mut total_nodes = 0u64;
    while !board.is_game_over() {
        if args.max_moves.is_some_and(|cap| moves >= cap) {
            break;
        }
        let Some(dir) = policy.best_move(board) else { break };
        board = board.make_move(dir, &mut rng);
        moves += 1;
        total_nodes = total_nodes.saturating_add(policy.last_stats().nodes);
        if show {
            println!("{dir}\n{board}");
        }
    }
    log::debug!("game {game} finished after {moves} moves");
    GameSummary {
        game,
        moves,
        highest_tile: board.highest_tile(),
        total_nodes,
        peak_nodes: policy.last_stats().peak_nodes,
    }
}
