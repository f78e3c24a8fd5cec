//! Constants for colors, special vertices and rollout weights.
//!
//! The board uses a 1D array with a one-point border ring, so colors are
//! stored as small integers that fit the 2-bit fields of a
//! [`Pattern`](crate::pattern::Pattern).

// =============================================================================
// Vertices
// =============================================================================

/// An index into the padded (extended) board array.
pub type Vertex = usize;

/// Pass move marker. Index 0 is a border corner, so it can never be played.
pub const PASS: Vertex = 0;

/// "No vertex" marker for ko, response moves and reply tables.
///
/// Shares the value of [`PASS`]: neither can be a playable point.
pub const NO_VERTEX: Vertex = 0;

// =============================================================================
// Colors and players
// =============================================================================

/// Empty point.
pub const EMPTY: u8 = 0;

/// Out of bounds (border ring).
pub const OUT: u8 = 1;

/// White stone.
pub const STONE_WHITE: u8 = 2;

/// Black stone.
pub const STONE_BLACK: u8 = 3;

/// Player index of White. Player indices address the per-color arrays.
pub const WHITE: usize = 0;

/// Player index of Black.
pub const BLACK: usize = 1;

/// Stone color of player `pl`.
#[inline]
pub const fn stone(pl: usize) -> u8 {
    pl as u8 + 2
}

/// The other player.
#[inline]
pub const fn opponent(pl: usize) -> usize {
    pl ^ 1
}

// =============================================================================
// Board limits
// =============================================================================

/// Largest supported board size.
pub const MAX_BOARD_SIZE: usize = 19;

/// Number of 64-bit words in a liberty bitboard (covers 19x19).
pub const LIB_WORDS: usize = 6;

/// Largest distance bucket used by the distance weight tables.
pub const MAX_DIST: usize = 16;

/// Rollouts stop once this many moves have been played.
pub const MAX_MOVES: usize = 720;

/// Default komi.
pub const KOMI: f64 = 7.5;

// =============================================================================
// Rollout weights
// =============================================================================

/// Multipliers (and their inverses) for the rollout responses:
/// 0 - points next to the previous move
/// 1 - save an atari group by capturing a neighbor
/// 2 - save an atari group by extending
/// 3 - capture the stone that was just put in atari
pub const RESPONSE_W: [[f64; 2]; 4] = [
    [140.648, 1.0 / 140.648],
    [1241.99, 1.0 / 1241.99],
    [21.7774, 1.0 / 21.7774],
    [7.09814, 1.0 / 7.09814],
];

/// Probability boost applied to a Last Good Reply before sampling.
pub const LGR_BOOST: f64 = 25.0;
