//! Probability weight tables for the rollout policy.
//!
//! The tables are trained elsewhere. Without a table file every weight is
//! neutral (1.0), which turns the weighted policy into a uniform one on top
//! of the response-move boosts.
//!
//! Table files are line oriented, `#` starts a comment:
//!
//! ```text
//! base     <coord> <w>                   weight of a point on an empty board
//! ptn3x3   <hexkey> <w_white> <w_black>  3x3 pattern multiplier
//! ptn12    <hexkey> <w_white> <w_black>  12-point pattern multiplier
//! response <hexkey> <w>                  multiplier around the last move
//! dist     <0|1> <d> <w>                 distance to the last (0) or own last (1) move
//! ladder   <0|1> <hexkey>                atari escape that fails for player 0/1
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use log::info;

use crate::constants::{MAX_DIST, Vertex};
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::pattern::Pattern;

/// All weights consumed by the board.
#[derive(Debug, Clone)]
pub struct ProbTables {
    base: Vec<f64>,
    ptn3x3: HashMap<u32, [f64; 2]>,
    ptn12: HashMap<u32, [f64; 2]>,
    response: HashMap<u32, f64>,
    dist: [[f64; MAX_DIST + 1]; 2],
    ladder: [HashSet<u32>; 2],
}

impl ProbTables {
    /// Neutral tables: base 1.0 on every point, all multipliers 1.0.
    pub fn neutral(geom: &Geometry) -> Self {
        let mut base = vec![0.0; geom.ebvcnt];
        for &v in &geom.rtoe {
            base[v] = 1.0;
        }
        Self {
            base,
            ptn3x3: HashMap::new(),
            ptn12: HashMap::new(),
            response: HashMap::new(),
            dist: [[1.0; MAX_DIST + 1]; 2],
            ladder: [HashSet::new(), HashSet::new()],
        }
    }

    /// Read a table file.
    pub fn load(geom: &Geometry, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let tables = Self::parse(geom, &text)?;
        info!(
            "loaded {}: {} 3x3, {} 12-point, {} response patterns",
            path.display(),
            tables.ptn3x3.len(),
            tables.ptn12.len(),
            tables.response.len()
        );
        Ok(tables)
    }

    /// Parse table text on top of the neutral defaults.
    pub fn parse(geom: &Geometry, text: &str) -> Result<Self> {
        let mut tables = Self::neutral(geom);

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let fields: Vec<&str> = content.split_whitespace().collect();
            let err = |reason: &str| Error::Table {
                line,
                reason: reason.to_string(),
            };

            match fields.as_slice() {
                ["base", coord, w] => {
                    let v = geom
                        .parse_coord(coord)
                        .filter(|&v| geom.is_real(v))
                        .ok_or_else(|| err(&format!("bad coordinate {coord}")))?;
                    let w = parse_weight(w, true).ok_or_else(|| err("bad weight"))?;
                    tables.base[v] = w;
                }
                ["ptn3x3", key, ww, wb] => {
                    let key = parse_key(key).ok_or_else(|| err("bad pattern key"))?;
                    let ww = parse_weight(ww, false).ok_or_else(|| err("bad weight"))?;
                    let wb = parse_weight(wb, false).ok_or_else(|| err("bad weight"))?;
                    tables.ptn3x3.insert(Pattern::new(key).key3x3(), [ww, wb]);
                }
                ["ptn12", key, ww, wb] => {
                    let key = parse_key(key).ok_or_else(|| err("bad pattern key"))?;
                    let ww = parse_weight(ww, false).ok_or_else(|| err("bad weight"))?;
                    let wb = parse_weight(wb, false).ok_or_else(|| err("bad weight"))?;
                    tables.ptn12.insert(key, [ww, wb]);
                }
                ["response", key, w] => {
                    let key = parse_key(key).ok_or_else(|| err("bad pattern key"))?;
                    let w = parse_weight(w, false).ok_or_else(|| err("bad weight"))?;
                    tables.response.insert(key, w);
                }
                ["dist", kind, d, w] => {
                    let kind = parse_player(kind).ok_or_else(|| err("bad distance kind"))?;
                    let d: usize = d
                        .parse()
                        .ok()
                        .filter(|&d| d <= MAX_DIST)
                        .ok_or_else(|| err("bad distance"))?;
                    let w = parse_weight(w, false).ok_or_else(|| err("bad weight"))?;
                    tables.dist[kind][d] = w;
                }
                ["ladder", pl, key] => {
                    let pl = parse_player(pl).ok_or_else(|| err("bad player"))?;
                    let key = parse_key(key).ok_or_else(|| err("bad pattern key"))?;
                    tables.ladder[pl].insert(key);
                }
                [kind, ..] => {
                    return Err(err(&format!("unknown or malformed record '{kind}'")));
                }
                [] => {}
            }
        }

        Ok(tables)
    }

    /// Weight of `v` on an empty board.
    #[inline]
    pub fn base(&self, v: Vertex) -> f64 {
        self.base[v]
    }

    /// 3x3 multiplier for player `pl`; `inverse` gives the reciprocal.
    #[inline]
    pub fn prob3x3(&self, ptn: Pattern, pl: usize, inverse: bool) -> f64 {
        match self.ptn3x3.get(&ptn.key3x3()) {
            Some(w) if inverse => 1.0 / w[pl],
            Some(w) => w[pl],
            None => 1.0,
        }
    }

    /// 12-point multiplier for player `pl`, if the pattern is known.
    #[inline]
    pub fn prob12(&self, ptn: Pattern, pl: usize) -> Option<f64> {
        self.ptn12.get(&ptn.bf).map(|w| w[pl])
    }

    /// Multiplier around the last move for its 12-point pattern.
    #[inline]
    pub fn response(&self, ptn: Pattern) -> Option<f64> {
        self.response.get(&ptn.bf).copied()
    }

    /// Distance multiplier; `kind` 0 is the opponent's last move, 1 the
    /// player's own last move.
    #[inline]
    pub fn dist(&self, kind: usize, d: usize) -> f64 {
        self.dist[kind][d.min(MAX_DIST)]
    }

    /// True if extending from atari at a point with this pattern fails for
    /// player `pl`.
    #[inline]
    pub fn is_ladder(&self, pl: usize, ptn: Pattern) -> bool {
        self.ladder[pl].contains(&ptn.bf)
    }
}

fn parse_key(s: &str) -> Option<u32> {
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(hex, 16).ok()
}

fn parse_weight(s: &str, allow_zero: bool) -> Option<f64> {
    let w: f64 = s.parse().ok()?;
    let ok = w.is_finite() && (w > 0.0 || (allow_zero && w == 0.0));
    ok.then_some(w)
}

fn parse_player(s: &str) -> Option<usize> {
    match s {
        "0" => Some(0),
        "1" => Some(1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BLACK, STONE_BLACK, WHITE};

    fn geom() -> Geometry {
        Geometry::new(9).unwrap()
    }

    #[test]
    fn test_neutral_defaults() {
        let g = geom();
        let t = ProbTables::neutral(&g);
        assert_eq!(t.base(g.xy(5, 5)), 1.0);
        assert_eq!(t.base(0), 0.0);
        assert_eq!(t.prob3x3(Pattern::default(), BLACK, true), 1.0);
        assert_eq!(t.prob12(Pattern::default(), WHITE), None);
        assert_eq!(t.response(Pattern::default()), None);
        assert_eq!(t.dist(1, 40), 1.0);
    }

    #[test]
    fn test_parse_records() {
        let g = geom();
        let text = "\
# trained weights
base D4 2.5
ptn3x3 0x3 4.0 0.5   # one black stone north
ptn12 ff 3 6
response 0xC 7
dist 0 2 1.5
ladder 1 0x10
";
        let t = ProbTables::parse(&g, text).unwrap();
        assert_eq!(t.base(g.parse_coord("D4").unwrap()), 2.5);

        let mut p = Pattern::default();
        p.set_color(0, STONE_BLACK);
        assert_eq!(t.prob3x3(p, WHITE, false), 4.0);
        assert_eq!(t.prob3x3(p, BLACK, true), 2.0);
        // Distance-2 colors do not change the 3x3 key.
        p.set_color(10, STONE_BLACK);
        assert_eq!(t.prob3x3(p, WHITE, false), 4.0);

        assert_eq!(t.prob12(Pattern::new(0xff), BLACK), Some(6.0));
        assert_eq!(t.response(Pattern::new(0xc)), Some(7.0));
        assert_eq!(t.dist(0, 2), 1.5);
        assert!(t.is_ladder(BLACK, Pattern::new(0x10)));
        assert!(!t.is_ladder(WHITE, Pattern::new(0x10)));
    }

    #[test]
    fn test_parse_errors_report_line() {
        let g = geom();
        let cases = [
            ("base Z99 1.0", 1),
            ("\nptn3x3 zz 1 1", 2),
            ("dist 2 1 1.0", 1),
            ("dist 0 99 1.0", 1),
            ("response 0x1 -3", 1),
            ("ptn12 0x1 1", 1),
            ("# ok\n\nbogus 1 2", 3),
        ];
        for (text, expected) in cases {
            match ProbTables::parse(&g, text) {
                Err(Error::Table { line, .. }) => assert_eq!(line, expected, "{text:?}"),
                other => panic!("expected table error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_zero_base_allowed() {
        let g = geom();
        let t = ProbTables::parse(&g, "base A1 0").unwrap();
        assert_eq!(t.base(g.xy(1, 1)), 0.0);
        assert!(ProbTables::parse(&g, "ptn3x3 0 0 1").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let g = geom();
        let err = ProbTables::load(&g, "/nonexistent/ren-go/tables.txt").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
