//! Stone groups (ren) and their liberty bitboards.
//!
//! A group keeps one bit per real board point (6 x 64 bits covers 19x19).
//! Liberties change one at a time as stones are placed and removed next to
//! the group, so the count is maintained incrementally and only recomputed
//! by popcount on merge.

use crate::constants::{LIB_WORDS, NO_VERTEX, Vertex};
use crate::geometry::Geometry;

/// Liberty bitboard indexed by real point.
pub type LibBits = [u64; LIB_WORDS];

/// Iterate over the set bits of a bitboard, lowest first.
pub fn bit_indices(bits: LibBits) -> impl Iterator<Item = usize> {
    bits.into_iter().enumerate().flat_map(|(i, word)| {
        let mut w = word;
        std::iter::from_fn(move || {
            if w == 0 {
                return None;
            }
            let tz = w.trailing_zeros() as usize;
            w &= w - 1;
            Some(i * 64 + tz)
        })
    })
}

#[inline]
pub fn set_bit(bits: &mut LibBits, r: usize) {
    bits[r / 64] |= 1 << (r % 64);
}

#[inline]
pub fn clear_bit(bits: &mut LibBits, r: usize) {
    bits[r / 64] &= !(1 << (r % 64));
}

#[inline]
pub fn popcount(bits: &LibBits) -> usize {
    bits.iter().map(|w| w.count_ones() as usize).sum()
}

/// A group of connected stones.
///
/// The null group (size 0) sits on empty points and the border; liberty
/// updates on it are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ren {
    pub lib_bits: LibBits,
    /// The last liberty; valid while `lib_cnt == 1`.
    pub lib_atr: Vertex,
    pub lib_cnt: usize,
    pub size: usize,
}

impl Default for Ren {
    fn default() -> Self {
        Self::NULL
    }
}

impl Ren {
    pub const NULL: Ren = Ren {
        lib_bits: [0; LIB_WORDS],
        lib_atr: NO_VERTEX,
        lib_cnt: 0,
        size: 0,
    };

    /// A fresh single stone with no liberties yet.
    pub const fn stone() -> Self {
        Ren {
            lib_bits: [0; LIB_WORDS],
            lib_atr: NO_VERTEX,
            lib_cnt: 0,
            size: 1,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.size == 0
    }

    /// Add the liberty at `v`. Adding an existing liberty is a no-op.
    #[inline]
    pub fn add_lib(&mut self, geom: &Geometry, v: Vertex) {
        if self.is_null() {
            return;
        }
        let r = geom.etor[v];
        let bit = 1u64 << (r % 64);
        let word = &mut self.lib_bits[r / 64];
        if *word & bit != 0 {
            return;
        }
        *word |= bit;
        self.lib_cnt += 1;
        self.lib_atr = v;
    }

    /// Remove the liberty at `v` if present.
    #[inline]
    pub fn sub_lib(&mut self, geom: &Geometry, v: Vertex) {
        if self.is_null() {
            return;
        }
        let r = geom.etor[v];
        let bit = 1u64 << (r % 64);
        let word = &mut self.lib_bits[r / 64];
        if *word & bit == 0 {
            return;
        }
        *word ^= bit;
        self.lib_cnt -= 1;
        if self.lib_cnt == 1 {
            self.refresh_atari(geom);
        }
    }

    /// Absorb `other`: union of liberties, sum of sizes.
    ///
    /// Relinking the stones and their group index is up to the board.
    pub fn merge(&mut self, geom: &Geometry, other: &Ren) {
        for (a, b) in self.lib_bits.iter_mut().zip(other.lib_bits.iter()) {
            *a |= *b;
        }
        self.lib_cnt = popcount(&self.lib_bits);
        if self.lib_cnt == 1 {
            self.refresh_atari(geom);
        }
        self.size += other.size;
    }

    fn refresh_atari(&mut self, geom: &Geometry) {
        if let Some(r) = bit_indices(self.lib_bits).next() {
            self.lib_atr = geom.rtoe[r];
        }
    }

    #[inline]
    pub fn is_captured(&self) -> bool {
        self.lib_cnt == 0
    }

    #[inline]
    pub fn is_atari(&self) -> bool {
        self.lib_cnt == 1
    }

    #[inline]
    pub fn is_pre_atari(&self) -> bool {
        self.lib_cnt == 2
    }

    /// Liberty points as board vertices.
    pub fn libs<'a>(&self, geom: &'a Geometry) -> impl Iterator<Item = Vertex> + use<'a> {
        bit_indices(self.lib_bits).map(move |r| geom.rtoe[r])
    }
}
