//! Shape hashing for captured eye spaces.
//!
//! A shape is hashed by XOR-ing one random key per member, where each key is
//! picked by the member's offset from a reference point. The hash therefore
//! only depends on the shape and the reference, not on where it sits on the
//! board.

use std::collections::HashMap;

use crate::geometry::Geometry;

/// Fixed seed so shape hashes are the same in every process.
const ZOBRIST_SEED: u64 = 0x5A0B_7157_2D4E_0C31;

/// One random key per relative offset in `[-ebvcnt, ebvcnt]`.
#[derive(Debug, Clone)]
pub struct Zobrist {
    keys: Vec<u64>,
    span: isize,
}

impl Zobrist {
    pub fn new(geom: &Geometry) -> Self {
        let mut rng = fastrand::Rng::with_seed(ZOBRIST_SEED);
        let span = geom.ebvcnt as isize;
        let keys = (0..2 * geom.ebvcnt + 1).map(|_| rng.u64(..)).collect();
        Self { keys, span }
    }

    /// Key of the point at `offset` from the reference.
    #[inline]
    pub fn key(&self, offset: isize) -> u64 {
        let idx = offset + self.span;
        if idx < 0 {
            return 0;
        }
        self.keys.get(idx as usize).copied().unwrap_or(0)
    }

    /// Hash of a set of offsets.
    pub fn shape_hash(&self, offsets: impl IntoIterator<Item = isize>) -> u64 {
        offsets.into_iter().fold(0, |h, off| h ^ self.key(off))
    }
}

// =============================================================================
// Nakade shapes
// =============================================================================

/// Killable eye spaces, as (x, y) cells.
const NAKADE_SHAPES: &[&[(isize, isize)]] = &[
    // straight three
    &[(0, 0), (1, 0), (2, 0)],
    // bent three
    &[(0, 0), (1, 0), (1, 1)],
    // pyramid four
    &[(0, 0), (1, 0), (2, 0), (1, 1)],
    // bulky five
    &[(0, 0), (1, 0), (0, 1), (1, 1), (2, 1)],
    // crossed five
    &[(1, 0), (0, 1), (1, 1), (2, 1), (1, 2)],
    // rabbity six
    &[(1, 0), (0, 1), (1, 1), (2, 1), (1, 2), (2, 2)],
];

/// The 8 board symmetries applied to a cell.
fn transform(sym: usize, (x, y): (isize, isize)) -> (isize, isize) {
    let (x, y) = if sym & 4 != 0 { (y, x) } else { (x, y) };
    let x = if sym & 1 != 0 { -x } else { x };
    let y = if sym & 2 != 0 { -y } else { y };
    (x, y)
}

/// Cell of a shape with the most neighbors inside the shape.
fn vital_cell(cells: &[(isize, isize)]) -> (isize, isize) {
    let degree = |&(x, y): &(isize, isize)| {
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .iter()
            .filter(|(dx, dy)| cells.contains(&(x + dx, y + dy)))
            .count()
    };
    let mut best = cells[0];
    for c in cells {
        if degree(c) > degree(&best) {
            best = *c;
        }
    }
    best
}

/// Vital point of each killable eye space, keyed by shape hash.
///
/// Every member of a shape serves as a reference point, so a lookup can be
/// made relative to any stone of a captured group.
#[derive(Debug, Clone, Default)]
pub struct NakadeTable {
    vital: HashMap<u64, isize>,
}

impl NakadeTable {
    pub fn new(geom: &Geometry, zobrist: &Zobrist) -> Self {
        let w = geom.ebsize as isize;
        let mut vital = HashMap::new();

        for shape in NAKADE_SHAPES {
            for sym in 0..8 {
                let cells: Vec<(isize, isize)> = shape.iter().map(|&c| transform(sym, c)).collect();
                let (vx, vy) = vital_cell(&cells);
                for &(rx, ry) in &cells {
                    let hash = zobrist.shape_hash(cells.iter().map(|&(x, y)| (y - ry) * w + (x - rx)));
                    vital.insert(hash, (vy - ry) * w + (vx - rx));
                }
            }
        }

        Self { vital }
    }

    /// Offset of the vital point from the reference, if `hash` is a
    /// killable shape.
    #[inline]
    pub fn vital(&self, hash: u64) -> Option<isize> {
        self.vital.get(&hash).copied()
    }

    #[inline]
    pub fn contains(&self, hash: u64) -> bool {
        self.vital.contains_key(&hash)
    }

    pub fn len(&self) -> usize {
        self.vital.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vital.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Geometry, Zobrist, NakadeTable) {
        let g = Geometry::new(9).unwrap();
        let z = Zobrist::new(&g);
        let n = NakadeTable::new(&g, &z);
        (g, z, n)
    }

    #[test]
    fn test_keys_are_reproducible() {
        let g = Geometry::new(9).unwrap();
        let a = Zobrist::new(&g);
        let b = Zobrist::new(&g);
        assert_eq!(a.key(-7), b.key(-7));
        assert_ne!(a.key(0), a.key(1));
        assert_eq!(a.key(10_000), 0);
    }

    #[test]
    fn test_straight_three_vital_is_middle() {
        let (g, z, n) = setup();
        let w = g.ebsize as isize;
        // Reference at the left end of a horizontal line.
        let h = z.shape_hash([0, 1, 2]);
        assert_eq!(n.vital(h), Some(1));
        // Vertical line, reference at the top.
        let h = z.shape_hash([0, -w, -2 * w]);
        assert_eq!(n.vital(h), Some(-w));
    }

    #[test]
    fn test_crossed_five_from_arm() {
        let (g, z, n) = setup();
        let w = g.ebsize as isize;
        // Reference at the west arm; center is one step east.
        let h = z.shape_hash([0, 1, 2, 1 + w, 1 - w]);
        assert_eq!(n.vital(h), Some(1));
    }

    #[test]
    fn test_live_shapes_are_absent() {
        let (g, z, n) = setup();
        let w = g.ebsize as isize;
        // Straight four and square four are not killable by a single move.
        assert!(!n.contains(z.shape_hash([0, 1, 2, 3])));
        assert!(!n.contains(z.shape_hash([0, 1, w, w + 1])));
        // Two points.
        assert!(!n.contains(z.shape_hash([0, 1])));
    }

    #[test]
    fn test_table_size() {
        let (_, _, n) = setup();
        assert!(!n.is_empty());
        // At most 8 symmetries times the members of each shape.
        assert!(n.len() <= 8 * (3 + 3 + 4 + 5 + 5 + 6));
    }
}
