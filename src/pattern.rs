//! Bit-packed neighborhood descriptor of a point.
//!
//! Layout of the 32-bit field:
//!
//! ```text
//! bits  0..16   colors of the 8 neighbors (2 bits each, N E S W NW NE SE SW)
//! bits 16..24   colors of the 4 distance-2 points (N E S W), 12-point only
//! bits 24..28   "neighbor group is in atari" flag per orthogonal direction
//! bits 28..32   "neighbor group has two liberties" flag per direction
//! ```
//!
//! The board keeps one `Pattern` per point and updates it incrementally when
//! stones are placed, removed or change their liberty state. Every lookup
//! (legality, eye shape, probability weight) is then a few bit operations.

use crate::constants::{EMPTY, OUT, stone};

const ATARI_SHIFT: u32 = 24;
const PRE_ATARI_SHIFT: u32 = 28;

/// Neighborhood descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pattern {
    pub bf: u32,
}

impl Pattern {
    /// Marker used on the border ring and for "no previous pattern".
    pub const NULL: Pattern = Pattern { bf: u32::MAX };

    #[inline]
    pub const fn new(bf: u32) -> Self {
        Self { bf }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.bf = 0;
    }

    #[inline]
    pub fn set_null(&mut self) {
        self.bf = u32::MAX;
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.bf == u32::MAX
    }

    /// Set the color seen in direction `dir` (0..12).
    #[inline]
    pub fn set_color(&mut self, dir: usize, color: u8) {
        let shift = 2 * dir;
        self.bf = (self.bf & !(0b11 << shift)) | ((color as u32 & 0b11) << shift);
    }

    /// Color seen in direction `dir` (0..12).
    #[inline]
    pub fn color_at(&self, dir: usize) -> u8 {
        ((self.bf >> (2 * dir)) & 0b11) as u8
    }

    /// Flag the orthogonal directions whose group is in atari.
    ///
    /// A group in atari no longer has two liberties, so the pre-atari flag of
    /// the same direction is dropped.
    #[inline]
    pub fn set_atari(&mut self, dirs: [bool; 4]) {
        let mask = dir_mask(dirs);
        self.bf |= mask << ATARI_SHIFT;
        self.bf &= !(mask << PRE_ATARI_SHIFT);
    }

    #[inline]
    pub fn cancel_atari(&mut self, dirs: [bool; 4]) {
        self.bf &= !(dir_mask(dirs) << ATARI_SHIFT);
    }

    /// Flag the orthogonal directions whose group has two liberties.
    #[inline]
    pub fn set_pre_atari(&mut self, dirs: [bool; 4]) {
        let mask = dir_mask(dirs);
        self.bf |= mask << PRE_ATARI_SHIFT;
        self.bf &= !(mask << ATARI_SHIFT);
    }

    #[inline]
    pub fn cancel_pre_atari(&mut self, dirs: [bool; 4]) {
        self.bf &= !(dir_mask(dirs) << PRE_ATARI_SHIFT);
    }

    #[inline]
    pub fn clear_atari(&mut self) {
        self.bf &= !(0xF << ATARI_SHIFT);
    }

    #[inline]
    pub fn clear_pre_atari(&mut self) {
        self.bf &= !(0xF << PRE_ATARI_SHIFT);
    }

    #[inline]
    pub fn is_atari(&self, dir: usize) -> bool {
        self.bf & (1 << (ATARI_SHIFT + dir as u32)) != 0
    }

    #[inline]
    pub fn is_pre_atari(&self, dir: usize) -> bool {
        self.bf & (1 << (PRE_ATARI_SHIFT + dir as u32)) != 0
    }

    /// True if any orthogonal neighbor group has two liberties.
    #[inline]
    pub fn has_pre_atari(&self) -> bool {
        (self.bf >> PRE_ATARI_SHIFT) & 0xF != 0
    }

    /// Swap white and black in all 12 color fields.
    #[inline]
    pub fn flip_color(&mut self) {
        // Stones are 0b10 / 0b11; flip the low bit wherever the high bit is set.
        let hi = self.bf & 0x00AA_AAAA;
        self.bf ^= hi >> 1;
    }

    /// Number of empty orthogonal neighbors.
    #[inline]
    pub fn empty_cnt(&self) -> usize {
        (0..4).filter(|&d| self.color_at(d) == EMPTY).count()
    }

    /// Number of orthogonal neighbors holding a stone of player `pl`.
    #[inline]
    pub fn stone_cnt(&self, pl: usize) -> usize {
        let c = stone(pl);
        (0..4).filter(|&d| self.color_at(d) == c).count()
    }

    /// Fast legality of a move by `pl` on this point (ko not included).
    ///
    /// Legal if some neighbor is empty, an opponent group in atari gets
    /// captured, or a friendly group keeps a liberty.
    #[inline]
    pub fn is_legal(&self, pl: usize) -> bool {
        let mine = stone(pl);
        let hers = stone(pl ^ 1);
        (0..4).any(|d| match self.color_at(d) {
            EMPTY => true,
            c if c == hers => self.is_atari(d),
            c if c == mine => !self.is_atari(d),
            _ => false,
        })
    }

    /// All 4 orthogonal neighbors are stones of `pl` or the border.
    #[inline]
    pub fn is_enclosed(&self, pl: usize) -> bool {
        let mine = stone(pl);
        (0..4).all(|d| {
            let c = self.color_at(d);
            c == mine || c == OUT
        })
    }

    /// Key used for the 3x3 weight table: 8 neighbor colors plus liberty
    /// flags, without the distance-2 colors.
    #[inline]
    pub fn key3x3(&self) -> u32 {
        self.bf & 0xFF00_FFFF
    }
}

#[inline]
fn dir_mask(dirs: [bool; 4]) -> u32 {
    dirs.iter()
        .enumerate()
        .fold(0, |m, (i, &on)| if on { m | (1 << i) } else { m })
}
