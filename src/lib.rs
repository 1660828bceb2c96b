//! expectimax-2048: move selection for 2048 by expectimax search
//!
//! This crate provides:
//! - A compact `Board` type with the slide/merge primitive (`engine` module)
//! - An expectimax policy with an occupancy-driven search depth (`expectimax` module)
//!
//! Quick start:
//! ```
//! use expectimax_2048::engine::{Board, Move};
//! use expectimax_2048::expectimax::{choose_move, SearchDepth};
//!
//! let b = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0, 0, 0, 4]]).unwrap();
//! let m = choose_move(b, SearchDepth::Fixed(2));
//! assert!(b.is_legal(m));
//! ```
//!
//! Full loop
//! ```
//! use expectimax_2048::engine::Board;
//! use expectimax_2048::expectimax::Expectimax;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut policy = Expectimax::new();
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut moves = 0u32;
//!
//! // Keep doctests fast
//! while !b.is_game_over() && moves < 4 {
//!     match policy.best_move(b) {
//!         Some(dir) => b = b.make_move(dir, &mut rng),
//!         None => break,
//!     }
//!     moves += 1;
//! }
//! assert!(moves > 0);
//! ```
//!
pub mod engine;
pub mod expectimax;
