//! Training samples for a position scorer.
//!
//! A sample is a random weighted game cut at a random length, the last 8
//! positions packed as bit planes, and the winner estimated by a majority
//! vote over rollouts from the cut position.
//!
//! Layout, with `P = ceil(N*N / 8)` bytes per plane:
//!
//! ```text
//! 'v'
//! 16 x P   planes: h = 0..8 stones of the side to move h plies ago,
//!          then h = 0..8 stones of the other side
//! u8       1 if white is to move
//! i8       +1 if the side to move wins, -1 otherwise
//! ```

use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::board::{Board, BoardContext};
use crate::constants::*;
use crate::geometry::Geometry;
use crate::playout::{Lgr, ScoreRules, playout_lgr};

/// First byte of every sample.
pub const SAMPLE_MAGIC: u8 = b'v';

/// Positions of history kept per sample.
pub const HISTORY: usize = 8;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Sample generation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    /// Game length is drawn from `0..max_steps`.
    pub max_steps: usize,
    /// Rollouts per majority vote.
    pub rollouts: usize,
    pub rules: ScoreRules,
    /// Run the rollouts on the rayon pool.
    pub parallel: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            max_steps: 300,
            rollouts: 1000,
            rules: ScoreRules::default(),
            parallel: false,
        }
    }
}

/// Bytes per bit plane.
#[inline]
pub fn plane_len(geom: &Geometry) -> usize {
    geom.bvcnt.div_ceil(8)
}

/// Total sample length.
#[inline]
pub fn sample_len(geom: &Geometry) -> usize {
    1 + 2 * HISTORY * plane_len(geom) + 2
}

/// Play one random game and turn it into a sample.
///
/// Returns `None` when both sides passed before the cut.
pub fn generate_sample(ctx: &Arc<BoardContext>, cfg: &SampleConfig, rng: &mut fastrand::Rng) -> Option<Vec<u8>> {
    let geom = &ctx.geom;
    let plane = plane_len(geom);
    let mut ft = vec![0u8; sample_len(geom)];
    ft[0] = SAMPLE_MAGIC;

    let steps = rng.usize(..cfg.max_steps.max(1));
    let to_move_is_black = steps % 2 == 0;
    let mut b = Board::with_seed(Arc::clone(ctx), rng.u64(..));
    let mut prev = None;

    while b.move_count() < steps {
        let next = b.select_move();

        let h = steps - b.move_count();
        if h < HISTORY {
            let (black_plane, white_plane) = if to_move_is_black { (h, h + HISTORY) } else { (h + HISTORY, h) };
            for (r, &v) in geom.rtoe.iter().enumerate() {
                let plane_idx = match b.color_at(v) {
                    STONE_BLACK => black_plane,
                    STONE_WHITE => white_plane,
                    _ => continue,
                };
                ft[1 + plane * plane_idx + r / 8] |= 0x80 >> (r % 8);
            }
        }

        if next == PASS && prev == Some(PASS) {
            return None;
        }
        prev = Some(next);
    }

    let side = 1 + 2 * HISTORY * plane;
    if !to_move_is_black {
        ft[side] = 1;
    }

    let black_frac = score_position(&b, cfg, rng);
    let is_black_win = black_frac >= 0.5;
    let result: i8 = if to_move_is_black == is_black_win { 1 } else { -1 };
    ft[side + 1] = result as u8;

    Some(ft)
}

/// Fraction of `cfg.rollouts` LGR rollouts from `b` that black wins.
pub fn score_position(b: &Board, cfg: &SampleConfig, rng: &mut fastrand::Rng) -> f64 {
    if cfg.rollouts == 0 {
        return 0.0;
    }
    let ebvcnt = b.geometry().ebvcnt;
    let base = rng.u64(..);
    let rules = cfg.rules;

    let rollout = |lgr: &mut Lgr, i: usize| {
        let mut copy = b.clone();
        copy.reseed(base.wrapping_add(i as u64).wrapping_mul(SEED_MIX));
        usize::from(playout_lgr(&mut copy, lgr, &rules) != 0)
    };

    let wins: usize = if cfg.parallel {
        (0..cfg.rollouts)
            .into_par_iter()
            .map_init(|| Lgr::new(ebvcnt), |lgr, i| rollout(lgr, i))
            .sum()
    } else {
        let mut lgr = Lgr::new(ebvcnt);
        (0..cfg.rollouts).map(|i| rollout(&mut lgr, i)).sum()
    };

    let frac = wins as f64 / cfg.rollouts as f64;
    debug!("black won {wins}/{} rollouts at move {}", cfg.rollouts, b.move_count());
    frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> SampleConfig {
        SampleConfig {
            max_steps: 40,
            rollouts: 8,
            ..SampleConfig::default()
        }
    }

    #[test]
    fn test_sample_len() {
        let g9 = Geometry::new(9).unwrap();
        assert_eq!(plane_len(&g9), 11);
        assert_eq!(sample_len(&g9), 1 + 16 * 11 + 2);
        let g19 = Geometry::new(19).unwrap();
        assert_eq!(plane_len(&g19), 46);
    }

    #[test]
    fn test_generate_sample_layout() {
        let ctx = BoardContext::new(9).unwrap();
        let cfg = small_cfg();
        let mut rng = fastrand::Rng::with_seed(3);
        let mut produced = 0;
        for _ in 0..5 {
            let Some(ft) = generate_sample(&ctx, &cfg, &mut rng) else {
                continue;
            };
            produced += 1;
            assert_eq!(ft.len(), sample_len(&ctx.geom));
            assert_eq!(ft[0], SAMPLE_MAGIC);
            let side = ft.len() - 2;
            assert!(ft[side] <= 1);
            assert!(ft[side + 1] == 1 || ft[side + 1] as i8 == -1);
        }
        assert!(produced > 0);
    }

    #[test]
    fn test_sequential_scoring_is_reproducible() {
        let ctx = BoardContext::new(7).unwrap();
        let b = Board::with_seed(ctx, 9);
        let cfg = small_cfg();
        let a = score_position(&b, &cfg, &mut fastrand::Rng::with_seed(1));
        let c = score_position(&b, &cfg, &mut fastrand::Rng::with_seed(1));
        assert_eq!(a, c);
        assert!((0.0..=1.0).contains(&a));
    }

    #[test]
    fn test_parallel_scoring_in_range() {
        let ctx = BoardContext::new(7).unwrap();
        let b = Board::with_seed(ctx, 9);
        let cfg = SampleConfig {
            parallel: true,
            ..small_cfg()
        };
        let frac = score_position(&b, &cfg, &mut fastrand::Rng::with_seed(2));
        assert!((0.0..=1.0).contains(&frac));
    }
}
