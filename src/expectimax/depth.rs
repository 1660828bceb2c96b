use std::fmt;
use std::str::FromStr;

use crate::engine::Board;

/// How deep the search looks, counted in player moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDepth {
    /// Pick the depth per candidate move from the empty cells it leaves (see [`select_depth`]).
    #[default]
    Auto,
    /// Use the same depth for every candidate move.
    Fixed(u32),
}

impl SearchDepth {
    /// Depth to search below a top-level candidate whose resulting board is `after_move`.
    #[inline]
    pub fn resolve(self, after_move: Board) -> u32 {
        match self {
            SearchDepth::Auto => {
                let empty = after_move.count_empty();
                let depth = select_depth(empty);
                log::trace!("auto depth {depth} for {empty} empty cells");
                depth
            }
            SearchDepth::Fixed(depth) => depth,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid search depth {0:?}: expected \"auto\" or a positive integer")]
pub struct DepthParseError(String);

impl FromStr for SearchDepth {
    type Err = DepthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(SearchDepth::Auto);
        }
        match s.parse::<u32>() {
            Ok(depth) if depth > 0 => Ok(SearchDepth::Fixed(depth)),
            _ => Err(DepthParseError(s.to_string())),
        }
    }
}

impl fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchDepth::Auto => f.write_str("auto"),
            SearchDepth::Fixed(depth) => write!(f, "{depth}"),
        }
    }
}

/// Search depth for a board with `empty_tiles` empty cells.
///
/// Fewer empty cells mean fewer spawn branches per chance node, so the
/// search can afford to look further ahead.
///
/// | empty tiles | depth |
/// |---|---|
/// | > 12 | 1 |
/// | 8..=12 | 2 |
/// | 5..=7 | 3 |
/// | 1..=4 | 4 |
/// | 0 | 6 |
pub fn select_depth(empty_tiles: u32) -> u32 {
    match empty_tiles {
        13.. => 1,
        8..=12 => 2,
        5..=7 => 3,
        1..=4 => 4,
        0 => 6,
    }
}
