//! Rollout and scoring scenarios.

use ren_go::board::{Board, BoardContext, GameState};
use ren_go::constants::*;
use ren_go::playout::{Lgr, ScoreRules, playout_lgr, playout_random, score, win};

// =============================================================================
// Helper functions
// =============================================================================

fn setpos(size: usize, black: &[&str], white: &[&str]) -> Board {
    let mut b = Board::with_seed(BoardContext::new(size).unwrap(), 3);
    for i in 0..black.len().max(white.len()) {
        for mv in [black.get(i), white.get(i)] {
            let v = match mv {
                Some(s) => b.geometry().parse_coord(s).unwrap(),
                None => PASS,
            };
            assert!(b.is_legal(b.turn(), v), "{mv:?} is illegal\n{b}");
            b.play_legal(v);
        }
    }
    b
}

// =============================================================================
// Scoring
// =============================================================================

#[test]
fn test_corner_bent_four_scored_for_inside_player() {
    // Black A1-B1-C1 and the white wall share A2 and D1; the outer black
    // wall surrounds both.
    let b = setpos(
        9,
        &["A3", "B3", "C3", "D3", "E3", "F3", "F2", "F1", "A1", "B1", "C1"],
        &["B2", "C2", "D2", "E2", "E1"],
    );
    let d1 = b.geometry().parse_coord("D1").unwrap();
    let a2 = b.geometry().parse_coord("A2").unwrap();
    assert!(b.is_seki(d1));
    assert!(!b.is_seki(a2));

    // Both inner groups and their shared points go to black: 3 + 5 + 2,
    // plus the outer wall (8) and its open neighbors (9).
    assert_eq!(score(&b), [0.0, 27.0]);
    assert_eq!(win(&b, BLACK, &ScoreRules::default()), 1);
    assert_eq!(win(&b, WHITE, &ScoreRules::default()), -1);
}

#[test]
fn test_result_is_relative_to_perspective() {
    let mut b = setpos(5, &["C3"], &[]);
    b.play_legal(PASS);
    let rules = ScoreRules {
        komi: 0.5,
        japanese: false,
    };
    assert_eq!(win(&b, BLACK, &rules), 1);
    assert_eq!(win(&b, WHITE, &rules), -1);

    let big_komi = ScoreRules {
        komi: 30.5,
        ..rules
    };
    assert_eq!(win(&b, BLACK, &big_komi), 0);
    assert_eq!(win(&b, WHITE, &big_komi), 0);
}

// =============================================================================
// Rollouts
// =============================================================================

#[test]
fn test_random_playouts_end_by_passes_or_cap() {
    let ctx = BoardContext::new(5).unwrap();
    for seed in 0..10 {
        let mut b = Board::with_seed(ctx.clone(), seed);
        let r = playout_random(&mut b, &ScoreRules::default());
        assert!((-1..=1).contains(&r));
        assert!(b.state() == GameState::Ended || b.move_count() > MAX_MOVES);
    }
}

#[test]
fn test_lgr_playouts_share_table() {
    let ctx = BoardContext::new(9).unwrap();
    let root = Board::with_seed(ctx.clone(), 21);
    let mut lgr = Lgr::new(ctx.geom.ebvcnt);
    let rules = ScoreRules::default();

    let mut results = Vec::new();
    for seed in 0..8 {
        let mut b = root.clone();
        b.reseed(seed);
        results.push(playout_lgr(&mut b, &mut lgr, &rules));
        assert!(b.state() == GameState::Ended || b.move_count() > MAX_MOVES);
    }
    assert!(results.iter().all(|r| (-1..=1).contains(r)));
    assert!(!lgr.is_empty());

    // Merging into an empty table copies every reply.
    let mut merged = Lgr::new(ctx.geom.ebvcnt);
    merged += &lgr;
    assert_eq!(merged, lgr);
}

#[test]
fn test_rollout_copies_leave_root_untouched() {
    let ctx = BoardContext::new(9).unwrap();
    let root = setpos(9, &["E5", "C3"], &["D4"]);
    let before = root.history().to_vec();
    let mut lgr = Lgr::new(ctx.geom.ebvcnt);
    let mut copy = root.clone();
    playout_lgr(&mut copy, &mut lgr, &ScoreRules::default());
    assert_eq!(root.history(), &before[..]);
    assert!(copy.move_count() > root.move_count());
}

#[test]
fn test_rollout_answers_capture_with_vital_point() {
    let mut b = setpos(9, &["A2", "B2", "C2"], &["A1", "B1", "C1"]);
    let d1 = b.geometry().parse_coord("D1").unwrap();
    let b1 = b.geometry().parse_coord("B1").unwrap();
    b.play_legal(d1);
    assert_eq!(b.response_moves()[0], b1);

    let n = b.move_count();
    let mut lgr = Lgr::new(b.geometry().ebvcnt);
    playout_lgr(&mut b, &mut lgr, &ScoreRules::default());
    assert_eq!(b.history()[n], b1);
}
