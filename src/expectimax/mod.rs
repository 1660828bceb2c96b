//! Expectimax move selection for 2048.
//!
//! The search alternates chance nodes (a 2 or 4 spawning in any empty cell)
//! and max nodes (the player picking the best direction), and scores leaves
//! with a weighted static [`evaluate`]. The depth is either fixed or picked
//! per candidate move from the board occupancy ([`select_depth`]).
//!
//! Quick start
//! ```
//! use expectimax_2048::engine::Board;
//! use expectimax_2048::expectimax::{choose_move, Expectimax, SearchDepth};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::EMPTY
//!     .with_random_tile(&mut rng)
//!     .with_random_tile(&mut rng);
//!
//! // One-off decision
//! let m = choose_move(b0, SearchDepth::Auto);
//! assert!(b0.is_legal(m));
//!
//! // Reusable searcher with stats
//! let mut ex = Expectimax::new();
//! assert!(ex.best_move(b0).is_some());
//! assert!(ex.last_stats().nodes > 0);
//! ```

use crate::engine::{self, Board, Move};

mod depth;
mod heuristic;
mod search;

pub use depth::{select_depth, DepthParseError, SearchDepth};
pub use heuristic::{corner_concentration, evaluate, stacking, HeuristicWeights};
pub use search::{spawn_outcomes, Expectimax, NodeValue, DEFAULT_MOVE, SPAWN_FOUR_PROB, SPAWN_TWO_PROB};

/// Search configuration. Defaults are the tuned weights with automatic depth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpectimaxConfig {
    /// Leaf evaluation weights.
    pub weights: HeuristicWeights,
    /// Depth used by [`Expectimax::best_move`].
    pub depth: SearchDepth,
}

/// Score of one top-level direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BranchScore {
    /// Expected value and the depth it was searched to.
    Scored { ev: f64, depth: u32 },
    /// The direction does not change the board.
    Illegal,
}

/// Per-direction result at the root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub score: BranchScore,
}

/// Basic search stats for a single decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

/// Choose a move for `board` with default weights.
///
/// Returns [`DEFAULT_MOVE`] when no direction is legal.
pub fn choose_move(board: Board, depth: SearchDepth) -> Move {
    Expectimax::new().choose_move(board, depth)
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine_and_heuristics() {
    // Safe to call multiple times.
    engine::new();
    heuristic::warm();
}
