//! Ren-Go: incremental Go board and weighted rollout engine.
//!
//! The board keeps groups (ren), liberty bitboards, neighborhood patterns
//! and per-point move weights up to date move by move, so Monte Carlo
//! rollouts never recompute anything from scratch.
//!
//! ## Modules
//!
//! - [`constants`] - Colors, special vertices and rollout weights
//! - [`geometry`] - Padded board layout and coordinates
//! - [`pattern`] - Bit-packed neighborhood descriptor
//! - [`ren`] - Stone groups and liberty bitboards
//! - [`zobrist`] - Shape hashing and the nakade table
//! - [`tables`] - Pattern and distance weight tables
//! - [`board`] - The board state machine and move selection
//! - [`playout`] - Rollouts, Last Good Reply and scoring
//! - [`sample`] - Scorer training samples
//! - [`archive`] - Binary game archive
//!
//! ## Example
//!
//! ```
//! use ren_go::board::{Board, BoardContext};
//! use ren_go::playout::{ScoreRules, playout_random};
//!
//! let ctx = BoardContext::new(9).unwrap();
//! let mut board = Board::with_seed(ctx, 42);
//! let d4 = board.geometry().parse_coord("D4").unwrap();
//! board.play_legal(d4);
//!
//! let result = playout_random(&mut board.clone(), &ScoreRules::default());
//! assert!((-1..=1).contains(&result));
//! ```

pub mod archive;
pub mod board;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod pattern;
pub mod playout;
pub mod ren;
pub mod sample;
pub mod tables;
pub mod zobrist;

pub use error::{Error, Result};
