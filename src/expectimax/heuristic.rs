use std::sync::OnceLock;

use crate::engine::{self as GameEngine, Board, Line};

/// Weights of the three evaluation terms.
///
/// The defaults are the tuned constants; only their ratios matter for play strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicWeights {
    /// Per empty cell.
    pub empty: f64,
    /// Per stacking point (see [`stacking`]).
    pub stacking: f64,
    /// Scales the corner concentration term, which lies in `[0, 1]`.
    pub corner: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self { empty: 3.0, stacking: 0.25, corner: 2.0 }
    }
}

static LINE_STACKING: OnceLock<Box<[u8]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = line_stacking();
}

fn line_stacking() -> &'static [u8] {
    LINE_STACKING
        .get_or_init(|| (0..=Line::MAX).map(|line| calc_stacking(&GameEngine::unpack_line(line))).collect())
        .as_ref()
}

/// Static score of a board: higher is better.
///
/// Deterministic and side-effect free; the search calls it at every leaf.
///
/// ```
/// use expectimax_2048::engine::Board;
/// use expectimax_2048::expectimax::{evaluate, HeuristicWeights};
/// let weights = HeuristicWeights::default();
/// // 16 empty cells, nothing to stack, no largest tile.
/// assert_eq!(evaluate(Board::EMPTY, &weights), 48.0);
/// ```
pub fn evaluate(board: Board, weights: &HeuristicWeights) -> f64 {
    weights.empty * f64::from(board.count_empty())
        + weights.stacking * f64::from(stacking(board))
        + weights.corner * corner_concentration(board)
}

/// How well tiles stack toward the top-left corner.
///
/// Every adjacent pair of non-empty cells is read away from the corner
/// (left to right in rows, top to bottom in columns). Equal pairs are
/// merge-ready and score 2; a pair whose nearer tile is larger scores 1.
pub fn stacking(board: Board) -> u32 {
    let table = line_stacking();
    let transposed = GameEngine::transpose(board.raw());
    (0..4)
        .map(|idx| {
            u32::from(table[GameEngine::extract_line(board.raw(), idx) as usize])
                + u32::from(table[GameEngine::extract_line(transposed, idx) as usize])
        })
        .sum()
}

/// `1 / (1 + d)` where `d` is the Manhattan distance from the top-left cell
/// to the nearest cell holding the largest tile. 0 on an empty board.
pub fn corner_concentration(board: Board) -> f64 {
    let top = (0..16).map(|idx| board.exponent(idx)).max().unwrap_or(0);
    if top == 0 {
        return 0.0;
    }
    let distance = (0..16)
        .filter(|&idx| board.exponent(idx) == top)
        .map(|idx| idx / 4 + idx % 4)
        .min()
        .unwrap_or(0);
    1.0 / (1.0 + distance as f64)
}

fn calc_stacking(line: &[u8; 4]) -> u8 {
    line.windows(2)
        .map(|pair| match (pair[0], pair[1]) {
            (0, _) | (_, 0) => 0,
            (near, far) if near == far => 2,
            (near, far) if near > far => 1,
            _ => 0,
        })
        .sum()
}
