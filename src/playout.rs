//! Rollouts to the end of the game and final scoring.
//!
//! A rollout plays weighted moves (optionally steered by a Last Good Reply
//! table) until both sides pass, then fills in with uniformly random moves
//! until both sides pass again, and scores the final position by area.

use std::ops::AddAssign;

use crate::board::Board;
use crate::constants::*;

/// Scoring rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRules {
    pub komi: f64,
    /// Charge each pass as a point (territory-style pass correction).
    pub japanese: bool,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            komi: KOMI,
            japanese: false,
        }
    }
}

// =============================================================================
// Last Good Reply table
// =============================================================================

/// Reply that won last time, keyed by player and the two previous moves
/// (the opponent's last move, then the player's own last move).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lgr {
    ebvcnt: usize,
    replies: Vec<u16>,
}

impl Lgr {
    pub fn new(ebvcnt: usize) -> Self {
        Self {
            ebvcnt,
            replies: vec![NO_VERTEX as u16; 2 * ebvcnt * ebvcnt],
        }
    }

    #[inline]
    fn idx(&self, pl: usize, last: Vertex, own_last: Vertex) -> usize {
        (pl * self.ebvcnt + last) * self.ebvcnt + own_last
    }

    /// Stored reply of `pl`, or `None`.
    #[inline]
    pub fn get(&self, pl: usize, last: Vertex, own_last: Vertex) -> Option<Vertex> {
        let v = self.replies[self.idx(pl, last, own_last)] as Vertex;
        (v != NO_VERTEX).then_some(v)
    }

    #[inline]
    pub fn set(&mut self, pl: usize, last: Vertex, own_last: Vertex, reply: Vertex) {
        let i = self.idx(pl, last, own_last);
        self.replies[i] = reply as u16;
    }

    /// Forget the reply of `pl` if it is `reply`.
    #[inline]
    pub fn forget(&mut self, pl: usize, last: Vertex, own_last: Vertex, reply: Vertex) {
        let i = self.idx(pl, last, own_last);
        if self.replies[i] as Vertex == reply {
            self.replies[i] = NO_VERTEX as u16;
        }
    }

    pub fn clear(&mut self) {
        self.replies.fill(NO_VERTEX as u16);
    }

    /// Number of stored replies.
    pub fn len(&self) -> usize {
        self.replies.iter().filter(|&&r| r as Vertex != NO_VERTEX).count()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.iter().all(|&r| r as Vertex == NO_VERTEX)
    }
}

impl AddAssign<&Lgr> for Lgr {
    /// Take every reply stored in `rhs`.
    fn add_assign(&mut self, rhs: &Lgr) {
        debug_assert_eq!(self.ebvcnt, rhs.ebvcnt);
        for (a, &b) in self.replies.iter_mut().zip(rhs.replies.iter()) {
            if b as Vertex != NO_VERTEX {
                *a = b;
            }
        }
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// Area score of white and black, without komi.
///
/// Every stone counts one point, and so does every empty point next to a
/// stone (claimed by the first stone scanned). Shared liberties of a seki
/// are left out. A corner bent four in seki is scored as dead for the side
/// inside the corner.
pub fn score(b: &Board) -> [f64; 2] {
    let g = b.geometry();
    let mut score = [0.0f64; 2];
    let mut visited = vec![false; g.ebvcnt];
    let corners = g.corners();

    for &v in b.empty_vertices() {
        if visited[v] || !b.is_seki(v) {
            continue;
        }

        // Touching group of each color.
        let mut ids = [NO_VERTEX; 2];
        for n in g.nbr4(v) {
            let c = b.color_at(n);
            if c >= STONE_WHITE {
                ids[(c - STONE_WHITE) as usize] = b.ren_id(n);
            }
        }

        let mut bent_four = None;
        for (j, &id) in ids.iter().enumerate() {
            if id == NO_VERTEX || b.ren_at(id).size != 3 {
                continue;
            }
            let hers = stone(opponent(j));
            let mut is_edge = true;
            let mut is_corner = false;
            let mut t = id;
            loop {
                is_edge &= g.dist_edge(t) == 1;
                if !is_edge {
                    break;
                }
                if corners.contains(&t) {
                    is_corner = !g.nbr4(t).into_iter().any(|n| b.color_at(n) == hers);
                }
                t = b.next_in_ren(t);
                if t == id {
                    break;
                }
            }
            if is_edge && is_corner {
                let total = b.ren_at(ids[0]).size + b.ren_at(ids[1]).size + 2;
                score[j] += total as f64;
                bent_four = Some(j);
            }
        }

        for lib in b.ren_at(ids[0]).libs(g) {
            visited[lib] = true;
        }
        if bent_four.is_some() {
            for id in ids {
                if id != NO_VERTEX {
                    for s in b.ren_stones(id) {
                        visited[s] = true;
                    }
                }
            }
        }
    }

    for &v in &g.rtoe {
        let c = b.color_at(v);
        if visited[v] || c < STONE_WHITE {
            continue;
        }
        let pl = (c - STONE_WHITE) as usize;
        visited[v] = true;
        score[pl] += 1.0;
        for n in g.nbr4(v) {
            if !visited[n] && b.color_at(n) == EMPTY {
                visited[n] = true;
                score[pl] += 1.0;
            }
        }
    }

    score
}

/// Result of a finished game as seen by `pl`: 0 if white wins, 1 if black
/// wins and `pl` is black, -1 if black wins and `pl` is white.
pub fn win(b: &Board, pl: usize, rules: &ScoreRules) -> i32 {
    let [white, black] = score(b);
    let pass_corr = b.pass_count(WHITE) as f64 - b.pass_count(BLACK) as f64
        + f64::from(u8::from(b.move_count() % 2 != 0));
    let japanese = if rules.japanese { 1.0 } else { 0.0 };
    let abs_score = black - white - rules.komi - pass_corr * japanese;

    let sign = i32::from(pl == BLACK) - i32::from(pl == WHITE);
    i32::from(abs_score > 0.0) * sign
}

// =============================================================================
// Rollouts
// =============================================================================

/// Play out with the weighted policy and Last Good Reply, then score.
///
/// The table learns from the result: replies of the winner are stored,
/// replies of the loser are forgotten.
pub fn playout_lgr(b: &mut Board, lgr: &mut Lgr, rules: &ScoreRules) -> i32 {
    let pl = b.turn();
    let mut prev = None;
    let mut played: [Vec<(Vertex, Vertex, Vertex)>; 2] = [Vec::new(), Vec::new()];

    while b.move_count() <= MAX_MOVES {
        let (my, her) = (b.turn(), b.opponent());
        let last = b.prev_move(her);
        let own_last = b.prev_move(my);
        let seeded = last != PASS && own_last != PASS;

        let forced = b.response_moves()[0];
        let next = if forced != NO_VERTEX && b.is_legal(my, forced) {
            b.play_legal(forced);
            forced
        } else {
            let mut boosted = None;
            if seeded {
                if let Some(v) = lgr.get(my, last, own_last) {
                    let p = b.prob(my, v);
                    if p != 0.0 {
                        b.replace_prob(my, v, p * LGR_BOOST);
                        boosted = Some(v);
                    }
                }
            }

            let next = b.select_move();

            // The mover is now the opponent.
            if let Some(v) = boosted {
                let p = b.prob(my, v);
                if p != 0.0 {
                    b.replace_prob(my, v, p / LGR_BOOST);
                }
            }
            next
        };

        if seeded && next != PASS {
            played[my].push((last, own_last, next));
        }

        if next == PASS && prev == Some(PASS) {
            break;
        }
        prev = Some(next);
    }

    finish_random(b);

    let result = win(b, pl, rules);
    let winner = usize::from(result != 0);
    let loser = opponent(winner);
    for &(last, own_last, reply) in &played[winner] {
        lgr.set(winner, last, own_last, reply);
    }
    for &(last, own_last, reply) in &played[loser] {
        lgr.forget(loser, last, own_last, reply);
    }

    result
}

/// Play out with uniformly random moves, then score.
pub fn playout_random(b: &mut Board, rules: &ScoreRules) -> i32 {
    let pl = b.turn();
    finish_random(b);
    win(b, pl, rules)
}

/// Random moves until two consecutive passes or the move cap.
fn finish_random(b: &mut Board) {
    let mut prev = None;
    while b.move_count() <= MAX_MOVES {
        let next = b.select_random_move();
        if next == PASS && prev == Some(PASS) {
            break;
        }
        prev = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardContext, GameState};

    fn board(size: usize, seed: u64) -> Board {
        Board::with_seed(BoardContext::new(size).unwrap(), seed)
    }

    #[test]
    fn test_lgr_set_get_forget() {
        let mut lgr = Lgr::new(121);
        assert!(lgr.is_empty());
        lgr.set(BLACK, 20, 30, 40);
        assert_eq!(lgr.get(BLACK, 20, 30), Some(40));
        assert_eq!(lgr.get(WHITE, 20, 30), None);
        lgr.forget(BLACK, 20, 30, 41);
        assert_eq!(lgr.len(), 1);
        lgr.forget(BLACK, 20, 30, 40);
        assert!(lgr.is_empty());
    }

    #[test]
    fn test_lgr_is_empty_sees_last_slot() {
        let mut lgr = Lgr::new(121);
        lgr.set(WHITE, 120, 120, 119);
        assert!(!lgr.is_empty());
        assert_eq!(lgr.len(), 1);
        lgr.clear();
        assert!(lgr.is_empty());
    }

    #[test]
    fn test_lgr_add_assign_overwrites_with_stored() {
        let mut a = Lgr::new(121);
        let mut b = Lgr::new(121);
        a.set(WHITE, 13, 14, 15);
        a.set(WHITE, 13, 16, 17);
        b.set(WHITE, 13, 14, 50);
        a += &b;
        assert_eq!(a.get(WHITE, 13, 14), Some(50));
        assert_eq!(a.get(WHITE, 13, 16), Some(17));
    }

    #[test]
    fn test_empty_board_white_wins_by_komi() {
        let mut b = board(9, 1);
        b.play_legal(PASS);
        b.play_legal(PASS);
        assert_eq!(b.state(), GameState::Ended);
        assert_eq!(score(&b), [0.0, 0.0]);
        assert_eq!(win(&b, BLACK, &ScoreRules::default()), 0);
        let no_komi = ScoreRules {
            komi: -0.5,
            japanese: false,
        };
        assert_eq!(win(&b, BLACK, &no_komi), 1);
        assert_eq!(win(&b, WHITE, &no_komi), -1);
    }

    #[test]
    fn test_single_stone_scores_itself_and_neighbors() {
        let mut b = board(9, 1);
        let v = b.geometry().parse_coord("E5").unwrap();
        b.play_legal(v);
        assert_eq!(score(&b), [0.0, 5.0]);
    }

    #[test]
    fn test_japanese_pass_correction() {
        let mut b = board(5, 1);
        let v = b.geometry().parse_coord("C3").unwrap();
        b.play_legal(v);
        b.play_legal(PASS);
        // Black 5, white 0, white passed once and black moved last.
        let rules = ScoreRules {
            komi: 4.5,
            japanese: true,
        };
        // pass_corr = 1 - 0 + 0 = 1, 5 - 4.5 - 1 < 0
        assert_eq!(win(&b, BLACK, &rules), 0);
        let area = ScoreRules {
            japanese: false,
            ..rules
        };
        assert_eq!(win(&b, BLACK, &area), 1);
    }

    #[test]
    fn test_random_playout_terminates() {
        let mut b = board(9, 11);
        let r = playout_random(&mut b, &ScoreRules::default());
        assert!((-1..=1).contains(&r));
        assert!(b.move_count() <= MAX_MOVES + 1);
    }

    #[test]
    fn test_lgr_playout_learns() {
        let mut b = board(9, 5);
        let mut lgr = Lgr::new(b.geometry().ebvcnt);
        for _ in 0..4 {
            let mut copy = b.clone();
            let r = playout_lgr(&mut copy, &mut lgr, &ScoreRules::default());
            assert!((-1..=1).contains(&r));
            b.reseed(fastrand::u64(..));
        }
        assert!(!lgr.is_empty());
    }
}
