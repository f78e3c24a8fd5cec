//! Board geometry: the padded 1D layout and coordinate conversions.
//!
//! The playable `N x N` area is surrounded by a one-point border ring, so
//! neighbor lookups never need bounds checks:
//!
//! ```text
//! extended (N + 2) x (N + 2), vertex = y * (N + 2) + x
//! real points have x, y in 1..=N, row y = 1 is the bottom row ("A1")
//! ```
//!
//! A `Geometry` is built once per board size and shared by every board of
//! that size through [`BoardContext`](crate::board::BoardContext).

use crate::constants::{MAX_BOARD_SIZE, MAX_DIST, PASS, Vertex};
use crate::error::{Error, Result};

/// Lookup tables for one board size.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Board size N.
    pub size: usize,
    /// Width of the padded board (N + 2).
    pub ebsize: usize,
    /// Number of padded vertices.
    pub ebvcnt: usize,
    /// Number of real points (N * N).
    pub bvcnt: usize,
    /// Real index -> extended vertex.
    pub rtoe: Vec<Vertex>,
    /// Extended vertex -> real index (`usize::MAX` on the border).
    pub etor: Vec<usize>,
    /// Extended vertex -> x.
    pub etox: Vec<usize>,
    /// Extended vertex -> y.
    pub etoy: Vec<usize>,
    /// Neighbor offsets, see [`Geometry::nbr8`] for the order.
    offsets: [isize; 8],
    dist_edge: Vec<usize>,
}

impl Geometry {
    /// Build the tables for an `size x size` board.
    pub fn new(size: usize) -> Result<Self> {
        if !(2..=MAX_BOARD_SIZE).contains(&size) {
            return Err(Error::UnsupportedBoardSize(size));
        }
        let ebsize = size + 2;
        let ebvcnt = ebsize * ebsize;
        let bvcnt = size * size;

        let mut rtoe = Vec::with_capacity(bvcnt);
        let mut etor = vec![usize::MAX; ebvcnt];
        let mut etox = vec![0; ebvcnt];
        let mut etoy = vec![0; ebvcnt];
        let mut dist_edge = vec![0; ebvcnt];

        for v in 0..ebvcnt {
            let x = v % ebsize;
            let y = v / ebsize;
            etox[v] = x;
            etoy[v] = y;
            if (1..=size).contains(&x) && (1..=size).contains(&y) {
                etor[v] = rtoe.len();
                rtoe.push(v);
                dist_edge[v] = x.min(y).min(size + 1 - x).min(size + 1 - y);
            }
        }

        let w = ebsize as isize;
        Ok(Self {
            size,
            ebsize,
            ebvcnt,
            bvcnt,
            rtoe,
            etor,
            etox,
            etoy,
            offsets: [w, 1, -w, -1, w - 1, w + 1, -w + 1, -w - 1],
            dist_edge,
        })
    }

    /// Vertex at real coordinates (1-based).
    #[inline]
    pub fn xy(&self, x: usize, y: usize) -> Vertex {
        y * self.ebsize + x
    }

    /// True for points inside the playable area.
    #[inline]
    pub fn is_real(&self, v: Vertex) -> bool {
        v < self.ebvcnt && self.etor[v] != usize::MAX
    }

    /// Board row (0-based) used by the per-row probability sums.
    #[inline]
    pub fn row(&self, v: Vertex) -> usize {
        self.etoy[v] - 1
    }

    /// The 4 orthogonal neighbors: N, E, S, W.
    #[inline]
    pub fn nbr4(&self, v: Vertex) -> [Vertex; 4] {
        std::array::from_fn(|i| v.wrapping_add_signed(self.offsets[i]))
    }

    /// The 4 diagonal neighbors: NW, NE, SE, SW.
    #[inline]
    pub fn diag4(&self, v: Vertex) -> [Vertex; 4] {
        std::array::from_fn(|i| v.wrapping_add_signed(self.offsets[i + 4]))
    }

    /// All 8 neighbors. Direction `d` and `(d + 2) % 4` (orthogonal) or
    /// `4 + (d + 2) % 4` (diagonal) are opposite, see [`opposite`].
    #[inline]
    pub fn nbr8(&self, v: Vertex) -> [Vertex; 8] {
        std::array::from_fn(|i| v.wrapping_add_signed(self.offsets[i]))
    }

    /// The 8 neighbors plus the four points at distance 2 (N, E, S, W),
    /// clamped into the array.
    pub fn nbr12(&self, v: Vertex) -> [Vertex; 12] {
        let n8 = self.nbr8(v);
        let w = self.ebsize;
        let mut out = [0; 12];
        out[..8].copy_from_slice(&n8);
        out[8] = (v + 2 * w).min(self.ebvcnt - 1);
        out[9] = v + 2;
        out[10] = v.saturating_sub(2 * w);
        out[11] = v - 2;
        out
    }

    /// Distance to the edge; 1 on the first line, 0 off the board.
    #[inline]
    pub fn dist_edge(&self, v: Vertex) -> usize {
        self.dist_edge[v]
    }

    /// Manhattan distance capped at [`MAX_DIST`]; 0 if either is a pass.
    pub fn distance(&self, a: Vertex, b: Vertex) -> usize {
        if a == PASS || b == PASS || !self.is_real(a) || !self.is_real(b) {
            return 0;
        }
        let dx = self.etox[a].abs_diff(self.etox[b]);
        let dy = self.etoy[a].abs_diff(self.etoy[b]);
        (dx + dy).min(MAX_DIST)
    }

    /// The four corner points.
    pub fn corners(&self) -> [Vertex; 4] {
        let n = self.size;
        [self.xy(1, 1), self.xy(n, 1), self.xy(1, n), self.xy(n, n)]
    }

    /// Extended vertex -> real index, with `N * N` for a pass.
    pub fn to_real(&self, v: Vertex) -> usize {
        if v == PASS { self.bvcnt } else { self.etor[v] }
    }

    /// Real index (`N * N` = pass) -> extended vertex.
    pub fn from_real(&self, r: usize) -> Option<Vertex> {
        match r {
            r if r == self.bvcnt => Some(PASS),
            r if r < self.bvcnt => Some(self.rtoe[r]),
            _ => None,
        }
    }

    /// Parse a coordinate string (e.g. "D4", "pass").
    ///
    /// Columns use letters A-T skipping I. Returns `None` for anything that
    /// is not on this board.
    pub fn parse_coord(&self, s: &str) -> Option<Vertex> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pass") {
            return Some(PASS);
        }
        let mut chars = s.chars();
        let col_char = chars.next()?.to_ascii_uppercase();
        if !col_char.is_ascii_uppercase() || col_char == 'I' {
            return None;
        }
        let mut x = (col_char as u8 - b'A' + 1) as usize;
        if col_char > 'I' {
            x -= 1;
        }
        let y: usize = chars.as_str().parse().ok()?;
        if !(1..=self.size).contains(&x) || !(1..=self.size).contains(&y) {
            return None;
        }
        Some(self.xy(x, y))
    }

    /// Convert a vertex to a coordinate string; "pass" for [`PASS`].
    pub fn coord_name(&self, v: Vertex) -> String {
        if v == PASS {
            return "pass".into();
        }
        let x = self.etox[v];
        let mut c = b'A' + x as u8 - 1;
        if c >= b'I' {
            c += 1;
        }
        format!("{}{}", c as char, self.etoy[v])
    }
}

/// Direction opposite to `d` in the 8-neighbor order.
#[inline]
pub const fn opposite(d: usize) -> usize {
    if d < 4 { (d + 2) % 4 } else { 4 + (d - 4 + 2) % 4 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(Geometry::new(1).is_err());
        assert!(Geometry::new(20).is_err());
        assert!(Geometry::new(19).is_ok());
    }

    #[test]
    fn test_real_mapping_roundtrip() {
        let g = Geometry::new(9).unwrap();
        assert_eq!(g.rtoe.len(), 81);
        for (r, &v) in g.rtoe.iter().enumerate() {
            assert_eq!(g.etor[v], r);
            assert_eq!(g.from_real(g.to_real(v)), Some(v));
        }
        assert_eq!(g.to_real(PASS), 81);
        assert_eq!(g.from_real(82), None);
    }

    #[test]
    fn test_border_is_not_real() {
        let g = Geometry::new(9).unwrap();
        assert!(!g.is_real(0));
        assert!(!g.is_real(g.xy(0, 5)));
        assert!(!g.is_real(g.xy(10, 5)));
        assert!(g.is_real(g.xy(1, 1)));
    }

    #[test]
    fn test_neighbors_and_opposites() {
        let g = Geometry::new(9).unwrap();
        let v = g.xy(5, 5);
        assert_eq!(g.nbr4(v), [g.xy(5, 6), g.xy(6, 5), g.xy(5, 4), g.xy(4, 5)]);
        assert_eq!(g.diag4(v), [g.xy(4, 6), g.xy(6, 6), g.xy(6, 4), g.xy(4, 4)]);
        let n8 = g.nbr8(v);
        for d in 0..8 {
            assert_eq!(g.nbr8(n8[d])[opposite(d)], v, "direction {d}");
        }
        let n12 = g.nbr12(v);
        assert_eq!(&n12[8..], &[g.xy(5, 7), g.xy(7, 5), g.xy(5, 3), g.xy(3, 5)]);
    }

    #[test]
    fn test_nbr12_stays_in_array() {
        let g = Geometry::new(9).unwrap();
        for &v in &g.rtoe {
            assert!(g.nbr12(v).iter().all(|&n| n < g.ebvcnt));
        }
    }

    #[test]
    fn test_distances() {
        let g = Geometry::new(19).unwrap();
        assert_eq!(g.dist_edge(g.xy(1, 10)), 1);
        assert_eq!(g.dist_edge(g.xy(4, 4)), 4);
        assert_eq!(g.dist_edge(g.xy(10, 10)), 10);
        assert_eq!(g.distance(g.xy(1, 1), g.xy(3, 4)), 5);
        assert_eq!(g.distance(g.xy(1, 1), g.xy(19, 19)), MAX_DIST);
        assert_eq!(g.distance(PASS, g.xy(3, 4)), 0);
    }

    #[test]
    fn test_parse_coord_skips_i() {
        let g = Geometry::new(19).unwrap();
        let h5 = g.parse_coord("H5").unwrap();
        let j5 = g.parse_coord("J5").unwrap();
        assert_eq!(j5 - h5, 1);
        assert_eq!(g.parse_coord("I5"), None);
        assert_eq!(g.parse_coord("pass"), Some(PASS));
        assert_eq!(g.parse_coord("A20"), None);
    }

    #[test]
    fn test_coord_name_roundtrip() {
        let g = Geometry::new(13).unwrap();
        for &v in &g.rtoe {
            let s = g.coord_name(v);
            assert_eq!(g.parse_coord(&s), Some(v), "roundtrip failed for {s}");
        }
        assert_eq!(g.coord_name(g.xy(1, 1)), "A1");
        assert_eq!(g.coord_name(g.xy(13, 13)), "N13");
    }
}
