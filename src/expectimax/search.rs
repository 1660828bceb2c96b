use crate::engine::{Board, Move, MoveSimulator, TableMoves};

use super::heuristic::evaluate;
use super::{warm_engine_and_heuristics, BranchEval, BranchScore, ExpectimaxConfig, SearchDepth, SearchStats};

/// Probability mass of a spawned 2, shared equally between the empty cells.
pub const SPAWN_TWO_PROB: f64 = 0.9;
/// Probability mass of a spawned 4, shared equally between the empty cells.
pub const SPAWN_FOUR_PROB: f64 = 0.1;

/// Direction returned by [`Expectimax::choose_move`] when no direction is legal.
pub const DEFAULT_MOVE: Move = Move::Up;

/// Value of a max node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeValue {
    Scored(f64),
    /// No direction changes the board.
    Stuck,
}

impl NodeValue {
    /// Numeric value used when averaging at the parent chance node.
    ///
    /// A stuck board counts as 0, which can rank it above a live board with a
    /// small score. Left as is; see DESIGN.md.
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            NodeValue::Scored(v) => v,
            NodeValue::Stuck => 0.0,
        }
    }
}

/// Chance-node successors of `board` paired with their probability.
///
/// Every empty cell yields a 2 (mass `0.9 / k`) then a 4 (mass `0.1 / k`),
/// `k` being the number of empty cells. A full board yields nothing.
pub fn spawn_outcomes(board: Board) -> impl Iterator<Item = (Board, f64)> {
    let empty = board.count_empty();
    let (p2, p4) = if empty == 0 {
        (0.0, 0.0)
    } else {
        (SPAWN_TWO_PROB / f64::from(empty), SPAWN_FOUR_PROB / f64::from(empty))
    };
    board
        .empty_cells()
        .flat_map(move |idx| [(board.with_tile(idx, 1), p2), (board.with_tile(idx, 2), p4)])
}

/// Single-threaded expectimax over a [`MoveSimulator`].
///
/// Every call works on its own `Copy` boards; the only state kept between
/// calls is the configuration and the node counters.
pub struct Expectimax<S = TableMoves> {
    cfg: ExpectimaxConfig,
    moves: S,
    stats: SearchStats,
    nodes: u64,
}

impl Expectimax<TableMoves> {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self { Self::with_simulator(cfg, TableMoves) }
}

impl Default for Expectimax<TableMoves> {
    fn default() -> Self { Self::new() }
}

impl<S: MoveSimulator> Expectimax<S> {
    /// Search over a custom move primitive.
    pub fn with_simulator(cfg: ExpectimaxConfig, moves: S) -> Self {
        warm_engine_and_heuristics();
        Self { cfg, moves, stats: SearchStats::default(), nodes: 0 }
    }

    /// Pick the direction with the highest expected score.
    ///
    /// Ties go to the first direction in [`Move::ALL`]. When every direction
    /// is illegal, returns [`DEFAULT_MOVE`].
    ///
    /// ```
    /// use expectimax_2048::engine::{Board, Move};
    /// use expectimax_2048::expectimax::{Expectimax, SearchDepth};
    /// let b = Board::from_rows([[2048, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let mut ex = Expectimax::new();
    /// let m = ex.choose_move(b, SearchDepth::Fixed(1));
    /// assert!(m == Move::Down || m == Move::Right);
    /// ```
    pub fn choose_move(&mut self, board: Board, depth: SearchDepth) -> Move {
        let branches = self.branch_evals(board, depth);
        best_branch(&branches).unwrap_or(DEFAULT_MOVE)
    }

    /// Like [`Self::choose_move`] at the configured depth, but `None` when no direction is legal.
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let branches = self.branch_evals(board, self.cfg.depth);
        best_branch(&branches)
    }

    /// Score each direction from `board`, in [`Move::ALL`] order.
    ///
    /// With [`SearchDepth::Auto`] each legal direction gets its own depth from
    /// the board it produces, so candidates may be searched to different depths.
    pub fn branch_evals(&mut self, board: Board, depth: SearchDepth) -> [BranchEval; 4] {
        self.nodes = 0;
        let branches = Move::ALL.map(|dir| self.branch_eval(board, dir, depth));
        self.stats.nodes = self.nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.nodes);
        log::debug!("{:?} depth={} nodes={} branches={:?}", board, depth, self.nodes, branches);
        branches
    }

    fn branch_eval(&mut self, board: Board, dir: Move, depth: SearchDepth) -> BranchEval {
        let moved = self.moves.apply(board, dir);
        if moved == board {
            return BranchEval { dir, score: BranchScore::Illegal };
        }
        let max_depth = depth.resolve(moved);
        let ev = self.expectation(moved, 0, max_depth);
        BranchEval { dir, score: BranchScore::Scored { ev, depth: max_depth } }
    }

    /// Chance node: expected value over every tile spawn on `board`.
    pub fn expectation(&mut self, board: Board, current_depth: u32, max_depth: u32) -> f64 {
        self.nodes += 1;
        if current_depth >= max_depth || board.count_empty() == 0 {
            return self.evaluate(board);
        }
        spawn_outcomes(board)
            .map(|(spawned, prob)| prob * self.max_node(spawned, current_depth, max_depth).value())
            .sum()
    }

    /// Max node: best expected value over the legal directions from `board`.
    pub fn max_node(&mut self, board: Board, current_depth: u32, max_depth: u32) -> NodeValue {
        self.nodes += 1;
        if current_depth >= max_depth {
            return NodeValue::Scored(self.evaluate(board));
        }
        let mut best = NodeValue::Stuck;
        for dir in Move::ALL {
            let moved = self.moves.apply(board, dir);
            if moved == board {
                continue;
            }
            let score = self.expectation(moved, current_depth + 1, max_depth);
            if !matches!(best, NodeValue::Scored(b) if b >= score) {
                best = NodeValue::Scored(score);
            }
        }
        best
    }

    /// Leaf score under the configured weights.
    #[inline]
    pub fn evaluate(&self, board: Board) -> f64 { evaluate(board, &self.cfg.weights) }

    /// Statistics collected from the last call to [`Self::choose_move`],
    /// [`Self::best_move`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

/// First direction with the strictly highest score, skipping illegal ones.
fn best_branch(branches: &[BranchEval; 4]) -> Option<Move> {
    let mut best: Option<(Move, f64)> = None;
    for branch in branches {
        if let BranchScore::Scored { ev, .. } = branch.score {
            if best.map_or(true, |(_, best_ev)| ev > best_ev) {
                best = Some((branch.dir, ev));
            }
        }
    }
    best.map(|(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectimax::HeuristicWeights;
    use rand::{rngs::StdRng, SeedableRng};

    fn board(rows: [[u32; 4]; 4]) -> Board {
        Board::from_rows(rows).unwrap()
    }

    fn stuck_board() -> Board {
        board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]])
    }

    fn lone_corner_tile() -> Board {
        board([[2048, 0, 0, 0], [0; 4], [0; 4], [0; 4]])
    }

    /// Up is a no-op, Down and Left both produce the same board, Right is a no-op.
    struct MirrorMoves {
        target: Board,
    }

    impl MoveSimulator for MirrorMoves {
        fn apply(&self, board: Board, dir: Move) -> Board {
            match dir {
                Move::Down | Move::Left if board != self.target => self.target,
                _ => board,
            }
        }
    }

    #[test]
    fn depth_limit_returns_leaf_score() {
        let mut ex = Expectimax::new();
        let weights = HeuristicWeights::default();
        for b in [Board::EMPTY, lone_corner_tile(), stuck_board(), Board::from_raw(0x1234133220021002)] {
            for d in [0, 1, 3] {
                assert_eq!(ex.expectation(b, d, d), evaluate(b, &weights));
                assert_eq!(ex.max_node(b, d, d), NodeValue::Scored(evaluate(b, &weights)));
            }
        }
    }

    #[test]
    fn one_empty_cell_has_two_outcomes() {
        let b = board([[0, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let outcomes: Vec<_> = spawn_outcomes(b).collect();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0.tile_value(0), 2);
        assert_eq!(outcomes[1].0.tile_value(0), 4);
        let total: f64 = outcomes.iter().map(|&(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spawn_mass_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut b = Board::EMPTY;
        while b.count_empty() > 0 {
            let k = b.count_empty();
            let outcomes: Vec<_> = spawn_outcomes(b).collect();
            assert_eq!(outcomes.len(), 2 * k as usize);
            let total: f64 = outcomes.iter().map(|&(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9, "k={k} total={total}");
            b = b.with_random_tile(&mut rng);
        }
        assert_eq!(spawn_outcomes(b).count(), 0);
    }

    #[test]
    fn spawned_boards_lose_exactly_one_empty_cell() {
        let start = Board::from_raw(0x1234133220021002);
        for dir in Move::ALL {
            let moved = start.shift(dir);
            if moved == start {
                continue;
            }
            assert!(moved.count_empty() >= start.count_empty());
            for (spawned, _) in spawn_outcomes(moved) {
                assert_eq!(spawned.count_empty() + 1, moved.count_empty());
            }
        }
    }

    #[test]
    fn full_board_chance_node_is_a_leaf() {
        let mut ex = Expectimax::new();
        let b = stuck_board();
        assert_eq!(ex.expectation(b, 0, 4), ex.evaluate(b));
    }

    #[test]
    fn stuck_board_returns_default_move() {
        let mut ex = Expectimax::new();
        let b = stuck_board();
        assert_eq!(ex.max_node(b, 0, 2), NodeValue::Stuck);
        assert_eq!(NodeValue::Stuck.value(), 0.0);
        assert_eq!(ex.choose_move(b, SearchDepth::Fixed(2)), DEFAULT_MOVE);
        assert_eq!(ex.choose_move(b, SearchDepth::Auto), DEFAULT_MOVE);
        assert_eq!(ex.best_move(b), None);
        let branches = ex.branch_evals(b, SearchDepth::Auto);
        assert!(branches.iter().all(|branch| branch.score == BranchScore::Illegal));
    }

    #[test]
    fn lone_corner_tile_picks_a_legal_move() {
        let mut ex = Expectimax::new();
        let b = lone_corner_tile();
        let m = ex.choose_move(b, SearchDepth::Fixed(1));
        assert!(b.is_legal(m));
        let branches = ex.branch_evals(b, SearchDepth::Fixed(1));
        assert_eq!(branches.map(|branch| branch.dir), Move::ALL);
        assert_eq!(branches[0].score, BranchScore::Illegal);
        assert_eq!(branches[2].score, BranchScore::Illegal);
        assert!(matches!(branches[1].score, BranchScore::Scored { depth: 1, .. }));
        assert!(matches!(branches[3].score, BranchScore::Scored { depth: 1, .. }));
    }

    #[test]
    fn auto_depth_on_sparse_board_is_one() {
        let mut ex = Expectimax::new();
        let b = lone_corner_tile();
        let branches = ex.branch_evals(b, SearchDepth::Auto);
        // One tile on the board: 15 empty cells after any legal move.
        for branch in branches {
            match branch.dir {
                Move::Down | Move::Right => {
                    assert!(matches!(branch.score, BranchScore::Scored { depth: 1, .. }))
                }
                Move::Up | Move::Left => assert_eq!(branch.score, BranchScore::Illegal),
            }
        }
    }

    #[test]
    fn auto_depth_comes_from_each_candidate_board() {
        let mut ex = Expectimax::new();
        // 7 empty cells (depth 3). Left and Right merge two pairs and leave 9
        // (depth 2); Up and Down only slide tiles and keep 7 (depth 3).
        let b = board([[2, 2, 0, 0], [4, 4, 0, 0], [8, 0, 0, 0], [16, 32, 64, 128]]);
        assert_eq!(b.count_empty(), 7);
        let branches = ex.branch_evals(b, SearchDepth::Auto);
        let depths = branches.map(|branch| match branch.score {
            BranchScore::Scored { depth, .. } => Some(depth),
            BranchScore::Illegal => None,
        });
        // [Up, Down, Left, Right]
        assert_eq!(depths, [Some(3), Some(3), Some(2), Some(2)]);
    }

    #[test]
    fn fixed_depth_is_shared_by_all_candidates() {
        let mut ex = Expectimax::new();
        let b = board([[2, 4, 8, 16], [4, 8, 16, 32], [0, 0, 2, 4], [0, 0, 0, 2]]);
        for branch in ex.branch_evals(b, SearchDepth::Fixed(2)) {
            if let BranchScore::Scored { depth, .. } = branch.score {
                assert_eq!(depth, 2);
            }
        }
    }

    #[test]
    fn ties_go_to_first_direction() {
        let target = Board::from_raw(0x1000_0000_0000_0000);
        let start = Board::from_raw(0x0000_0000_0000_0001);
        let mut ex = Expectimax::with_simulator(ExpectimaxConfig::default(), MirrorMoves { target });
        let branches = ex.branch_evals(start, SearchDepth::Fixed(1));
        assert_eq!(branches[1].score, branches[2].score);
        assert_eq!(ex.choose_move(start, SearchDepth::Fixed(1)), Move::Down);
    }

    #[test]
    fn expectation_weights_spawns() {
        // One empty cell. A spawned 2 completes the stuck checkerboard (worth 0);
        // a spawned 4 merges and every legal move then leaves one empty cell.
        let cfg = ExpectimaxConfig {
            weights: HeuristicWeights { empty: 1.0, stacking: 0.0, corner: 0.0 },
            ..Default::default()
        };
        let mut ex = Expectimax::with_config(cfg);
        let b = board([[0, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let ev = ex.expectation(b, 0, 1);
        assert!((ev - 0.1).abs() < 1e-12, "ev={ev}");
    }

    #[test]
    fn records_search_stats() {
        let mut ex = Expectimax::new();
        ex.choose_move(lone_corner_tile(), SearchDepth::Fixed(1));
        let first = ex.last_stats();
        assert!(first.nodes > 0);
        assert_eq!(first.peak_nodes, first.nodes);
        ex.choose_move(stuck_board(), SearchDepth::Fixed(1));
        assert_eq!(ex.last_stats().nodes, 0);
        assert_eq!(ex.last_stats().peak_nodes, first.nodes);
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
    }

    #[test]
    fn plays_a_short_game() {
        let mut rng = StdRng::seed_from_u64(42);
        let cfg = ExpectimaxConfig { depth: SearchDepth::Fixed(1), ..Default::default() };
        let mut ex = Expectimax::with_config(cfg);
        let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        let mut moves = 0;
        while moves < 30 {
            let Some(dir) = ex.best_move(b) else { break };
            assert!(b.is_legal(dir));
            b = b.make_move(dir, &mut rng);
            moves += 1;
        }
        assert!(moves > 0);
    }
}
