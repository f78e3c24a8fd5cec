//! Go board with incremental groups, liberties and move probabilities.
//!
//! The board is a 1D array over the padded layout of
//! [`Geometry`](crate::geometry::Geometry). Per point it keeps:
//!
//! - `color`: empty, border, white or black
//! - `ptn`: the [`Pattern`] of the 8 (12) surrounding points
//! - `ren_idx`: id of the group owning the stone; the group is `ren[ren_idx[v]]`
//! - `next_ren_v`: next stone of the same group, a circular list
//!   (`v0 -> v1 -> ... -> v0`, a lone stone points to itself)
//! - `prob`: the rollout weight of the point for each player
//!
//! Every field is updated by [`Board::play_legal`] in one step, so any
//! state observable between calls is consistent. Nothing is recomputed
//! from scratch on the move path; probabilities are adjusted by the ratio
//! of the new and old pattern weights.

use std::fmt;
use std::sync::Arc;

use crate::constants::*;
use crate::error::Result;
use crate::geometry::{Geometry, opposite};
use crate::pattern::Pattern;
use crate::ren::{LibBits, Ren, bit_indices, clear_bit, popcount, set_bit};
use crate::tables::ProbTables;
use crate::zobrist::{NakadeTable, Zobrist};

// =============================================================================
// Shared context
// =============================================================================

/// Immutable data shared by all boards of one size.
#[derive(Debug)]
pub struct BoardContext {
    pub geom: Geometry,
    pub tables: ProbTables,
    pub zobrist: Zobrist,
    pub nakade: NakadeTable,
}

impl BoardContext {
    /// Context with neutral probability tables.
    pub fn new(size: usize) -> Result<Arc<Self>> {
        let geom = Geometry::new(size)?;
        let tables = ProbTables::neutral(&geom);
        Ok(Self::with_tables(geom, tables))
    }

    /// Context with the given tables, which must be built for `geom`.
    pub fn with_tables(geom: Geometry, tables: ProbTables) -> Arc<Self> {
        let zobrist = Zobrist::new(&geom);
        let nakade = NakadeTable::new(&geom, &zobrist);
        Arc::new(Self {
            geom,
            tables,
            zobrist,
            nakade,
        })
    }
}

/// Coarse game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// No move played since the last reset.
    Empty,
    /// Moves played, game not over.
    MidGame,
    /// The last two moves were passes.
    Ended,
}

// =============================================================================
// Board
// =============================================================================

/// A Go position plus the rollout bookkeeping.
///
/// Cloning is a deep copy; rollouts run on clones of an authoritative board.
#[derive(Clone)]
pub struct Board {
    ctx: Arc<BoardContext>,
    rng: fastrand::Rng,

    /// Player to move and the opponent.
    my: usize,
    her: usize,

    color: Vec<u8>,
    /// Empty points in `empty[..empty_cnt]`, in no particular order.
    empty: Vec<Vertex>,
    /// Position of each empty point inside `empty`.
    empty_idx: Vec<usize>,
    empty_cnt: usize,
    stone_cnt: [usize; 2],

    ko: Vertex,
    prev_ko: Vertex,

    ren_idx: Vec<Vertex>,
    ren: Vec<Ren>,
    next_ren_v: Vec<Vertex>,

    move_cnt: usize,
    history: Vec<Vertex>,
    /// Last move of each player.
    prev_move: [Vertex; 2],
    /// Stones captured by the last move.
    removed_stones: Vec<Vertex>,

    prob: [Vec<f64>; 2],
    /// Sum of `prob` per board row.
    sum_prob_rank: [Vec<f64>; 2],

    ptn: Vec<Pattern>,
    /// 12-point patterns around the last two moves.
    prev_ptn: [Pattern; 2],
    /// Inverse of the response weight currently applied around the last move.
    prev_ptn_prob: f64,

    /// Reply slots:
    /// 0 - vital point of a captured shape (forced in rollouts)
    /// 1 - capture a neighbor of a group in atari
    /// 2 - extend a group out of atari
    /// 3 - capture the stone just put in atari
    response_move: [Vertex; 4],

    pass_cnt: [usize; 2],

    is_ptn_updated: Vec<bool>,
    /// (point, pattern before the change) for every pattern touched this move.
    updated_ptns: Vec<(Vertex, Pattern)>,
}

impl Board {
    pub fn new(ctx: Arc<BoardContext>) -> Self {
        Self::with_rng(ctx, fastrand::Rng::new())
    }

    /// Board with a deterministic random stream.
    pub fn with_seed(ctx: Arc<BoardContext>, seed: u64) -> Self {
        Self::with_rng(ctx, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(ctx: Arc<BoardContext>, rng: fastrand::Rng) -> Self {
        let g = &ctx.geom;
        let (ebvcnt, bvcnt, size) = (g.ebvcnt, g.bvcnt, g.size);
        let mut board = Board {
            rng,
            my: BLACK,
            her: WHITE,
            color: vec![OUT; ebvcnt],
            empty: vec![0; bvcnt],
            empty_idx: vec![usize::MAX; ebvcnt],
            empty_cnt: 0,
            stone_cnt: [0; 2],
            ko: NO_VERTEX,
            prev_ko: NO_VERTEX,
            ren_idx: (0..ebvcnt).collect(),
            ren: vec![Ren::NULL; ebvcnt],
            next_ren_v: (0..ebvcnt).collect(),
            move_cnt: 0,
            history: Vec::with_capacity(MAX_MOVES + 8),
            prev_move: [NO_VERTEX; 2],
            removed_stones: Vec::new(),
            prob: [vec![0.0; ebvcnt], vec![0.0; ebvcnt]],
            sum_prob_rank: [vec![0.0; size], vec![0.0; size]],
            ptn: vec![Pattern::NULL; ebvcnt],
            prev_ptn: [Pattern::NULL; 2],
            prev_ptn_prob: 0.0,
            response_move: [NO_VERTEX; 4],
            pass_cnt: [0; 2],
            is_ptn_updated: vec![false; ebvcnt],
            updated_ptns: Vec::with_capacity(64),
            ctx,
        };
        board.clear();
        board
    }

    /// Reset to the empty board, black to move.
    pub fn clear(&mut self) {
        let ctx = Arc::clone(&self.ctx);
        let g = &ctx.geom;

        self.my = BLACK;
        self.her = WHITE;
        self.empty_cnt = 0;
        self.stone_cnt = [0; 2];
        self.is_ptn_updated.fill(false);
        for sums in &mut self.sum_prob_rank {
            sums.fill(0.0);
        }

        for v in 0..g.ebvcnt {
            self.next_ren_v[v] = v;
            self.ren_idx[v] = v;
            self.ren[v] = Ren::NULL;
            if g.is_real(v) {
                self.color[v] = EMPTY;
                self.empty_idx[v] = self.empty_cnt;
                self.empty[self.empty_cnt] = v;
                self.empty_cnt += 1;
            } else {
                self.color[v] = OUT;
                self.empty_idx[v] = usize::MAX;
                self.ptn[v] = Pattern::NULL;
                self.prob[0][v] = 0.0;
                self.prob[1][v] = 0.0;
            }
        }

        for &v in &g.rtoe {
            let mut p = Pattern::default();
            for (d, n) in g.nbr8(v).into_iter().enumerate() {
                p.set_color(d, self.color[n]);
            }
            self.ptn[v] = p;
            let row = g.row(v);
            for pl in [WHITE, BLACK] {
                let w = ctx.tables.base(v) * ctx.tables.prob3x3(p, pl, false);
                self.prob[pl][v] = w;
                self.sum_prob_rank[pl][row] += w;
            }
        }

        self.ko = NO_VERTEX;
        self.prev_ko = NO_VERTEX;
        self.move_cnt = 0;
        self.history.clear();
        self.removed_stones.clear();
        self.prev_move = [NO_VERTEX; 2];
        self.updated_ptns.clear();
        self.prev_ptn = [Pattern::NULL; 2];
        self.prev_ptn_prob = 0.0;
        self.response_move = [NO_VERTEX; 4];
        self.pass_cnt = [0; 2];
    }

    /// Replace the random stream, so copies of one board diverge.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = fastrand::Rng::with_seed(seed);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn context(&self) -> &Arc<BoardContext> {
        &self.ctx
    }

    pub fn geometry(&self) -> &Geometry {
        &self.ctx.geom
    }

    pub fn state(&self) -> GameState {
        let n = self.history.len();
        if n == 0 {
            GameState::Empty
        } else if n >= 2 && self.history[n - 1] == PASS && self.history[n - 2] == PASS {
            GameState::Ended
        } else {
            GameState::MidGame
        }
    }

    /// Player to move.
    #[inline]
    pub fn turn(&self) -> usize {
        self.my
    }

    /// Player who moved last.
    #[inline]
    pub fn opponent(&self) -> usize {
        self.her
    }

    #[inline]
    pub fn color_at(&self, v: Vertex) -> u8 {
        self.color[v]
    }

    /// Group owning the stone at `v` (the null group for other points).
    #[inline]
    pub fn ren_at(&self, v: Vertex) -> &Ren {
        &self.ren[self.ren_idx[v]]
    }

    /// Id of the group owning `v`.
    #[inline]
    pub fn ren_id(&self, v: Vertex) -> Vertex {
        self.ren_idx[v]
    }

    /// Next stone in the group of `v`.
    #[inline]
    pub fn next_in_ren(&self, v: Vertex) -> Vertex {
        self.next_ren_v[v]
    }

    /// All stones of the group containing `v`.
    pub fn ren_stones(&self, v: Vertex) -> Vec<Vertex> {
        let mut stones = vec![v];
        let mut t = self.next_ren_v[v];
        while t != v {
            stones.push(t);
            t = self.next_ren_v[t];
        }
        stones
    }

    #[inline]
    pub fn pattern_at(&self, v: Vertex) -> Pattern {
        self.ptn[v]
    }

    #[inline]
    pub fn empty_vertices(&self) -> &[Vertex] {
        &self.empty[..self.empty_cnt]
    }

    #[inline]
    pub fn empty_count(&self) -> usize {
        self.empty_cnt
    }

    #[inline]
    pub fn stone_count(&self, pl: usize) -> usize {
        self.stone_cnt[pl]
    }

    #[inline]
    pub fn prob(&self, pl: usize, v: Vertex) -> f64 {
        self.prob[pl][v]
    }

    /// Cached probability sum of board row `row` (0 = bottom).
    #[inline]
    pub fn row_prob_sum(&self, pl: usize, row: usize) -> f64 {
        self.sum_prob_rank[pl][row]
    }

    /// Point forbidden by ko for the player to move, or [`NO_VERTEX`].
    #[inline]
    pub fn ko(&self) -> Vertex {
        self.ko
    }

    #[inline]
    pub fn move_count(&self) -> usize {
        self.move_cnt
    }

    #[inline]
    pub fn history(&self) -> &[Vertex] {
        &self.history
    }

    #[inline]
    pub fn prev_move(&self, pl: usize) -> Vertex {
        self.prev_move[pl]
    }

    #[inline]
    pub fn removed_stones(&self) -> &[Vertex] {
        &self.removed_stones
    }

    #[inline]
    pub fn pass_count(&self, pl: usize) -> usize {
        self.pass_cnt[pl]
    }

    #[inline]
    pub fn response_moves(&self) -> [Vertex; 4] {
        self.response_move
    }

    // -------------------------------------------------------------------------
    // Move filters
    // -------------------------------------------------------------------------

    /// Whether `pl` may play on `v`.
    pub fn is_legal(&self, pl: usize, v: Vertex) -> bool {
        if v == PASS {
            return true;
        }
        if self.color[v] != EMPTY || v == self.ko {
            return false;
        }
        self.ptn[v].is_legal(pl)
    }

    /// Whether `v` looks like an eye of `pl`.
    ///
    /// Enclosed by `pl` and at most one diagonal is an opponent stone or the
    /// border. With exactly two, it still counts when one of those opponent
    /// stones can be captured at once.
    pub fn is_eye_shape(&self, pl: usize, v: Vertex) -> bool {
        debug_assert_eq!(self.color[v], EMPTY);
        let p = self.ptn[v];
        if !p.is_enclosed(pl) {
            return false;
        }

        let hers = stone(opponent(pl));
        let wedge_cnt = self.wedge_count(p, hers);
        if wedge_cnt == 2 {
            let diag = self.ctx.geom.diag4(v);
            return diag.into_iter().any(|d| {
                self.color[d] == hers && {
                    let r = self.ren_at(d);
                    r.is_atari() && r.lib_atr != self.ko
                }
            });
        }
        wedge_cnt < 2
    }

    /// Whether `v` is a false eye: enclosed by one color but cut on two or
    /// more diagonals, with none of the cutting stones in atari.
    pub fn is_false_eye(&self, v: Vertex) -> bool {
        debug_assert_eq!(self.color[v], EMPTY);
        let p = self.ptn[v];
        if p.empty_cnt() > 0 {
            return false;
        }
        let pl = if p.is_enclosed(WHITE) {
            WHITE
        } else if p.is_enclosed(BLACK) {
            BLACK
        } else {
            return false;
        };

        let hers = stone(opponent(pl));
        let wedge_cnt = self.wedge_count(p, hers);
        if wedge_cnt == 2 {
            let diag = self.ctx.geom.diag4(v);
            if diag
                .into_iter()
                .any(|d| self.color[d] == hers && self.ren_at(d).is_atari())
            {
                return false;
            }
        }
        wedge_cnt >= 2
    }

    /// Opponent diagonal stones, plus one if any diagonal is off the board.
    fn wedge_count(&self, p: Pattern, hers: u8) -> usize {
        let mut cnt = [0usize; 4];
        for d in 4..8 {
            cnt[p.color_at(d) as usize] += 1;
        }
        cnt[hers as usize] + usize::from(cnt[OUT as usize] > 0)
    }

    /// Whether `v` is a shared liberty of a seki.
    ///
    /// Both colors touch `v`, every touching group has two liberties and the
    /// groups share two (or three, with an eye or false eye among them)
    /// liberties in total.
    pub fn is_seki(&self, v: Vertex) -> bool {
        debug_assert_eq!(self.color[v], EMPTY);
        let g = &self.ctx.geom;
        let p = self.ptn[v];
        if !p.has_pre_atari() || p.empty_cnt() > 1 || p.stone_cnt(WHITE) == 0 || p.stone_cnt(BLACK) == 0 {
            return false;
        }

        let mut libs: LibBits = [0; LIB_WORDS];
        let mut nbr_ids = [NO_VERTEX; 4];
        let mut n_ids = 0;

        for (i, n) in g.nbr4(v).into_iter().enumerate() {
            let c = self.color[n];
            if c >= STONE_WHITE {
                if !p.is_pre_atari(i) {
                    return false;
                }
                let owner = (c - STONE_WHITE) as usize;
                if self.ren_at(n).size == 1 && p.stone_cnt(owner) == 1 {
                    // A lone stone that could connect out through another
                    // point is not locked in.
                    for n2 in g.nbr4(n) {
                        if n2 != v && self.color[n2] == EMPTY && self.ptn[n2].stone_cnt(owner) == 1 {
                            return false;
                        }
                    }
                }
                nbr_ids[n_ids] = self.ren_idx[n];
                n_ids += 1;
            } else if c == EMPTY {
                set_bit(&mut libs, g.etor[n]);
            }
        }

        for &id in &nbr_ids[..n_ids] {
            for (l, r) in libs.iter_mut().zip(self.ren[id].lib_bits.iter()) {
                *l |= *r;
            }
        }

        match popcount(&libs) {
            2 => !bit_indices(libs).any(|r| self.is_self_atari_nakade(g.rtoe[r])),
            3 => {
                let mut eye_cnt = 0;
                for r in bit_indices(libs) {
                    let vs = g.rtoe[r];
                    if self.is_eye_shape(WHITE, vs) || self.is_eye_shape(BLACK, vs) {
                        eye_cnt += 1;
                    }
                    if eye_cnt >= 2 || self.is_false_eye(vs) {
                        return true;
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Whether playing `v` throws in a stone that leaves a killable shape
    /// with two outside liberties.
    fn is_self_atari_nakade(&self, v: Vertex) -> bool {
        let ctx = &self.ctx;
        let g = &ctx.geom;
        let origin = ctx.zobrist.key(0);
        let mut checked: [Vec<Vertex>; 2] = [Vec::new(), Vec::new()];
        let mut space_hash = [origin, origin];
        let mut small = [true, true];
        let mut lib_bits: [LibBits; 2] = [[0; LIB_WORDS]; 2];

        for n in g.nbr4(v) {
            let c = self.color[n];
            if c < STONE_WHITE {
                continue;
            }
            let pl = (c - STONE_WHITE) as usize;
            let id = self.ren_idx[n];
            if self.ren[id].size >= 5 {
                small[pl] = false;
                continue;
            }
            if checked[pl].contains(&id) {
                continue;
            }
            checked[pl].push(id);
            for (l, r) in lib_bits[pl].iter_mut().zip(self.ren[id].lib_bits.iter()) {
                *l |= *r;
            }

            let hers = stone(opponent(pl));
            let mut t = n;
            'stones: loop {
                space_hash[pl] ^= ctx.zobrist.key(t as isize - v as isize);
                for n2 in g.nbr4(t) {
                    if self.color[n2] == hers {
                        let outer = self.ren_at(n2);
                        if outer.lib_cnt != 2 {
                            small[pl] = false;
                            break 'stones;
                        }
                        for (l, r) in lib_bits[pl].iter_mut().zip(outer.lib_bits.iter()) {
                            *l |= *r;
                        }
                    }
                }
                t = self.next_ren_v[t];
                if t == n {
                    break;
                }
            }
        }

        if small[WHITE] && ctx.nakade.contains(space_hash[WHITE]) {
            popcount(&lib_bits[WHITE]) == 2
        } else if small[BLACK] && ctx.nakade.contains(space_hash[BLACK]) {
            popcount(&lib_bits[BLACK]) == 2
        } else {
            false
        }
    }

    /// Whether a move by `pl` on `v` would leave its group with at most one
    /// liberty.
    pub fn is_self_atari(&self, pl: usize, v: Vertex) -> bool {
        let g = &self.ctx.geom;
        if self.ptn[v].empty_cnt() >= 2 {
            return false;
        }
        let mine = stone(pl);
        let hers = stone(opponent(pl));
        let mut libs: LibBits = [0; LIB_WORDS];

        for n in g.nbr4(v) {
            let c = self.color[n];
            if c == EMPTY {
                set_bit(&mut libs, g.etor[n]);
            } else if c == hers {
                let r = self.ren_at(n);
                if r.is_atari() {
                    if r.size > 1 {
                        return false;
                    }
                    // Capturing the lone stone frees its point.
                    set_bit(&mut libs, g.etor[n]);
                }
            } else if c == mine {
                let r = self.ren_at(n);
                if r.lib_cnt > 2 {
                    return false;
                }
                for (l, b) in libs.iter_mut().zip(r.lib_bits.iter()) {
                    *l |= *b;
                }
            }
        }

        clear_bit(&mut libs, g.etor[v]);
        popcount(&libs) <= 1
    }

    // -------------------------------------------------------------------------
    // Pattern and liberty bookkeeping
    // -------------------------------------------------------------------------

    #[inline]
    fn add_updated_ptn(&mut self, v: Vertex) {
        if !self.is_ptn_updated[v] {
            self.is_ptn_updated[v] = true;
            self.updated_ptns.push((v, self.ptn[v]));
        }
    }

    /// Directions around `v` that belong to group `id`.
    #[inline]
    fn dirs_of(&self, v: Vertex, id: Vertex) -> [bool; 4] {
        self.ctx.geom.nbr4(v).map(|n| self.ren_idx[n] == id)
    }

    fn set_atari(&mut self, v: Vertex) {
        debug_assert!(self.color[v] >= STONE_WHITE);
        let id = self.ren_idx[v];
        let va = self.ren[id].lib_atr;
        self.add_updated_ptn(va);
        let dirs = self.dirs_of(va, id);
        self.ptn[va].set_atari(dirs);
    }

    fn cancel_atari(&mut self, v: Vertex) {
        debug_assert!(self.color[v] >= STONE_WHITE);
        let id = self.ren_idx[v];
        let va = self.ren[id].lib_atr;
        self.add_updated_ptn(va);
        let dirs = self.dirs_of(va, id);
        self.ptn[va].cancel_atari(dirs);
    }

    fn set_pre_atari(&mut self, v: Vertex) {
        debug_assert!(self.color[v] >= STONE_WHITE);
        let id = self.ren_idx[v];
        for r in bit_indices(self.ren[id].lib_bits) {
            let vp = self.ctx.geom.rtoe[r];
            self.add_updated_ptn(vp);
            let dirs = self.dirs_of(vp, id);
            self.ptn[vp].set_pre_atari(dirs);
        }
    }

    fn cancel_pre_atari(&mut self, v: Vertex) {
        debug_assert!(self.color[v] >= STONE_WHITE);
        let id = self.ren_idx[v];
        for r in bit_indices(self.ren[id].lib_bits) {
            let vp = self.ctx.geom.rtoe[r];
            self.add_updated_ptn(vp);
            let dirs = self.dirs_of(vp, id);
            self.ptn[vp].cancel_pre_atari(dirs);
        }
    }

    fn place_stone(&mut self, v: Vertex) {
        debug_assert_eq!(self.color[v], EMPTY);
        let c = stone(self.my);

        // 1. Patterns around v.
        self.color[v] = c;
        for (d, n) in self.ctx.geom.nbr8(v).into_iter().enumerate() {
            if self.color[n] == EMPTY {
                self.add_updated_ptn(n);
            }
            self.ptn[n].set_color(opposite(d), c);
        }

        // 2. Counters, empty list and probability.
        self.stone_cnt[self.my] += 1;
        self.empty_cnt -= 1;
        let last = self.empty[self.empty_cnt];
        let idx = self.empty_idx[v];
        self.empty_idx[last] = idx;
        self.empty[idx] = last;
        self.empty_idx[v] = usize::MAX;
        self.replace_prob(self.my, v, 0.0);
        self.replace_prob(self.her, v, 0.0);

        // 3. A new group of one stone.
        self.ren_idx[v] = v;
        self.ren[v] = Ren::stone();

        // 4. Liberties around v.
        for n in self.ctx.geom.nbr4(v) {
            if self.color[n] == EMPTY {
                self.ren[v].add_lib(&self.ctx.geom, n);
            } else {
                let id = self.ren_idx[n];
                self.ren[id].sub_lib(&self.ctx.geom, v);
            }
        }
    }

    fn remove_stone(&mut self, v: Vertex) {
        debug_assert!(self.color[v] >= STONE_WHITE);

        self.color[v] = EMPTY;
        self.is_ptn_updated[v] = true;
        self.ptn[v].clear_atari();
        self.ptn[v].clear_pre_atari();
        for (d, n) in self.ctx.geom.nbr8(v).into_iter().enumerate() {
            if self.color[n] == EMPTY {
                self.add_updated_ptn(n);
            }
            self.ptn[n].set_color(opposite(d), EMPTY);
        }

        self.stone_cnt[self.her] -= 1;
        self.empty_idx[v] = self.empty_cnt;
        self.empty[self.empty_cnt] = v;
        self.empty_cnt += 1;
        let base = self.ctx.tables.base(v);
        self.replace_prob(self.my, v, base);
        self.replace_prob(self.her, v, base);
        self.ren_idx[v] = v;
        self.ren[v] = Ren::NULL;
        self.removed_stones.push(v);
    }

    /// Merge the group of `v_add` into the group of `v_base`.
    fn merge_ren(&mut self, v_base: Vertex, v_add: Vertex) {
        let base_id = self.ren_idx[v_base];
        let add_id = self.ren_idx[v_add];
        let other = self.ren[add_id];
        self.ren[base_id].merge(&self.ctx.geom, &other);
        self.ren[add_id] = Ren::NULL;

        let mut t = v_add;
        loop {
            self.ren_idx[t] = base_id;
            t = self.next_ren_v[t];
            if t == v_add {
                break;
            }
        }

        // Splice the circular lists:
        //   base 0->1->2->0, add 3->4->3  =>  0->4->3->1->2->0
        self.next_ren_v.swap(v_base, v_add);
    }

    /// Remove the captured group containing `v`.
    fn remove_ren(&mut self, v: Vertex) {
        // 1. Take the stones off.
        let mut spaces = Vec::with_capacity(8);
        let mut t = v;
        loop {
            self.remove_stone(t);
            spaces.push(t);
            t = self.next_ren_v[t];
            if t == v {
                break;
            }
        }

        // 2. A killable eye space gets its vital point as the forced reply.
        if (3..=6).contains(&spaces.len()) {
            let ctx = &self.ctx;
            let hash = ctx
                .zobrist
                .shape_hash(spaces.iter().map(|&s| s as isize - v as isize));
            if let Some(off) = ctx.nakade.vital(hash) {
                let vital = v as isize + off;
                if (0..ctx.geom.ebvcnt as isize).contains(&vital) {
                    self.response_move[0] = vital as Vertex;
                }
            }
        }

        // 3. Give the freed points to the neighbors.
        let mut may_pre_atari = Vec::new();
        loop {
            for n in self.ctx.geom.nbr4(t) {
                if self.color[n] >= STONE_WHITE {
                    // Final atari state is set by the caller.
                    let id = self.ren_idx[n];
                    if self.ren[id].is_atari() {
                        self.cancel_atari(n);
                        may_pre_atari.push(id);
                    } else if self.ren[id].is_pre_atari() {
                        self.cancel_pre_atari(n);
                    }
                    self.ren[id].add_lib(&self.ctx.geom, t);
                }
            }
            let next = self.next_ren_v[t];
            self.next_ren_v[t] = t;
            t = next;
            if t == v {
                break;
            }
        }

        may_pre_atari.sort_unstable();
        may_pre_atari.dedup();
        for id in may_pre_atari {
            if self.ren[id].is_pre_atari() {
                self.set_pre_atari(id);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Probabilities
    // -------------------------------------------------------------------------

    /// Set the weight of `v` for `pl`, keeping the row sum in step.
    pub fn replace_prob(&mut self, pl: usize, v: Vertex, new_prob: f64) {
        let row = self.ctx.geom.row(v);
        self.sum_prob_rank[pl][row] += new_prob - self.prob[pl][v];
        self.prob[pl][v] = new_prob;
    }

    /// Multiply the weight of `v` for `pl`. Zero weights and passes are left
    /// alone.
    #[inline]
    fn add_prob(&mut self, pl: usize, v: Vertex, factor: f64) {
        if v == PASS || self.prob[pl][v] == 0.0 {
            return;
        }
        let row = self.ctx.geom.row(v);
        self.sum_prob_rank[pl][row] += (factor - 1.0) * self.prob[pl][v];
        self.prob[pl][v] *= factor;
    }

    /// Recompute the base and 3x3 weight of every empty point.
    pub fn recalc_prob_all(&mut self) {
        for i in 0..self.empty_cnt {
            let v = self.empty[i];
            for pl in [WHITE, BLACK] {
                let w = self.ctx.tables.base(v) * self.ctx.tables.prob3x3(self.ptn[v], pl, false);
                self.replace_prob(pl, v, w);
            }
        }
    }

    /// Apply the long-distance and 12-point pattern weights to every empty
    /// point once.
    pub fn add_prob_ptn12(&mut self) {
        let (my, her) = (self.my, self.her);
        let before_last = if self.move_cnt >= 3 {
            self.history[self.move_cnt - 3]
        } else {
            PASS
        };

        for i in 0..self.empty_cnt {
            let v = self.empty[i];
            let (w_my, w_her, p12) = {
                let ctx = &self.ctx;
                let g = &ctx.geom;
                let t = &ctx.tables;
                let w_my = t.dist(0, g.distance(v, self.prev_move[her]))
                    * t.dist(1, g.distance(v, self.prev_move[my]));
                let w_her = t.dist(0, g.distance(v, self.prev_move[my]))
                    * t.dist(1, g.distance(v, before_last));
                (w_my, w_her, self.ptn12_at(v))
            };
            self.add_prob(my, v, w_my);
            self.add_prob(her, v, w_her);

            let (m, h) = (
                self.ctx.tables.prob12(p12, my),
                self.ctx.tables.prob12(p12, her),
            );
            if let (Some(m), Some(h)) = (m, h) {
                self.add_prob(my, v, m);
                self.add_prob(her, v, h);
            }
        }
    }

    /// Pattern of `v` extended with the four distance-2 points.
    fn ptn12_at(&self, v: Vertex) -> Pattern {
        let mut p = self.ptn[v];
        let n12 = self.ctx.geom.nbr12(v);
        for d in 8..12 {
            p.set_color(d, self.color[n12[d]]);
        }
        p
    }

    fn update_prev_ptn(&mut self, v: Vertex) {
        self.prev_ptn[1] = self.prev_ptn[0];
        let mut p = self.ptn12_at(v);
        if self.my == BLACK {
            p.flip_color();
        }
        self.prev_ptn[0] = p;
    }

    /// Undo the response weight applied around the opponent's last move.
    fn sub_prev_ptn(&mut self) {
        let last = self.prev_move[self.her];
        if self.prev_ptn_prob == 0.0 || last == PASS {
            return;
        }
        let w = self.prev_ptn_prob;
        for n in self.ctx.geom.nbr12(last) {
            self.add_prob(self.my, n, w);
        }
    }

    fn sub_prob_dist(&mut self) {
        let last = self.prev_move[self.her];
        if last != PASS {
            for n in self.ctx.geom.nbr8(last) {
                self.add_prob(self.my, n, RESPONSE_W[0][1]);
            }
        }
    }

    fn add_prob_dist(&mut self, v: Vertex) {
        for n in self.ctx.geom.nbr8(v) {
            self.add_prob(self.her, n, RESPONSE_W[0][0]);
        }
    }

    /// Rescale every point whose pattern changed this move.
    fn update_prob_all(&mut self) {
        for i in 0..self.updated_ptns.len() {
            let (v, old) = self.updated_ptns[i];
            for pl in [WHITE, BLACK] {
                let t = &self.ctx.tables;
                let new_w = t.prob3x3(self.ptn[v], pl, false);
                let diff = t.prob3x3(old, pl, true) * new_w;
                let base = t.base(v);
                if self.prob[pl][v] == 0.0 {
                    self.replace_prob(pl, v, base * new_w);
                } else {
                    self.add_prob(pl, v, diff);
                }
            }
        }

        // Captured points already got their base weight back.
        for i in 0..self.removed_stones.len() {
            let v = self.removed_stones[i];
            let p = self.ptn[v];
            let w_my = self.ctx.tables.prob3x3(p, self.my, false);
            let w_her = self.ctx.tables.prob3x3(p, self.her, false);
            self.add_prob(self.my, v, w_my);
            self.add_prob(self.her, v, w_her);
        }
    }

    // -------------------------------------------------------------------------
    // Playing moves
    // -------------------------------------------------------------------------

    /// Play `v` for the side to move. The move must be legal.
    pub fn play_legal(&mut self, v: Vertex) {
        debug_assert!(v == PASS || self.color[v] == EMPTY, "point is occupied");
        debug_assert!(v == PASS || v != self.ko, "ko point");

        // 1. History.
        let prev_empty_cnt = self.empty_cnt;
        let is_in_eye = v != PASS && self.ptn[v].is_enclosed(self.her);
        self.prev_ko = self.ko;
        self.ko = NO_VERTEX;
        self.history.push(v);
        self.move_cnt += 1;
        self.removed_stones.clear();

        // 2. Undo the weights tied to the opponent's last move.
        self.sub_prob_dist();
        self.sub_prev_ptn();

        // 3. Undo the reply boosts.
        self.response_move[0] = NO_VERTEX;
        for slot in 1..4 {
            let rm = self.response_move[slot];
            if rm != NO_VERTEX {
                self.add_prob(self.my, rm, RESPONSE_W[slot][1]);
                self.response_move[slot] = NO_VERTEX;
            }
        }

        if v == PASS {
            self.pass_cnt[self.my] += 1;
            self.prev_move[self.my] = PASS;
            self.prev_ptn[1] = self.prev_ptn[0];
            self.prev_ptn[0] = Pattern::NULL;
            std::mem::swap(&mut self.my, &mut self.her);
            return;
        }

        // 4. Reset the changed-pattern list.
        self.is_ptn_updated.fill(false);
        self.updated_ptns.clear();

        // 5. Response pattern, then the stone.
        self.update_prev_ptn(v);
        self.place_stone(v);

        // 6. Connect with friendly groups, smaller into larger.
        let my_color = stone(self.my);
        let nbrs = self.ctx.geom.nbr4(v);
        for n in nbrs {
            if self.color[n] == my_color && self.ren_idx[n] != self.ren_idx[v] {
                if self.ren_at(n).lib_cnt == 1 {
                    self.cancel_pre_atari(n);
                }
                if self.ren_at(v).size > self.ren_at(n).size {
                    self.merge_ren(v, n);
                } else {
                    self.merge_ren(n, v);
                }
            }
        }

        // 7. Opponent groups lose the liberty.
        let her_color = stone(self.her);
        let mut atari_rens: Vec<Vertex> = Vec::new();
        for n in nbrs {
            if self.color[n] == her_color {
                match self.ren_at(n).lib_cnt {
                    0 => self.remove_ren(n),
                    1 => {
                        self.set_atari(n);
                        atari_rens.push(self.ren_idx[n]);
                    }
                    2 => self.set_pre_atari(n),
                    _ => {}
                }
            }
        }

        // 8. Ko: a single stone captured from inside an opponent's eye.
        if is_in_eye && prev_empty_cnt == self.empty_cnt {
            self.ko = self.empty[self.empty_cnt - 1];
        }

        // 9. Own group.
        match self.ren_at(v).lib_cnt {
            1 => {
                self.set_atari(v);
                let lib = self.ren_at(v).lib_atr;
                if lib != self.ko {
                    self.response_move[3] = lib;
                }
            }
            2 => self.set_pre_atari(v),
            _ => {}
        }

        // 10. Replies that save the groups just put in atari.
        atari_rens.sort_unstable();
        atari_rens.dedup();
        for atr_id in atari_rens {
            self.add_rescue_moves(atr_id);
        }

        // 11. Patterns changed by this move.
        self.update_prob_all();

        // 12. Response pattern weight around v.
        self.prev_ptn_prob = 0.0;
        if let Some(w) = self.ctx.tables.response(self.prev_ptn[0]) {
            self.prev_ptn_prob = 1.0 / w;
            for n in self.ctx.geom.nbr12(v) {
                self.add_prob(self.her, n, w);
            }
        }

        // 13. Short distance and reply boosts for the opponent.
        self.add_prob_dist(v);
        for slot in 1..4 {
            let rm = self.response_move[slot];
            if rm != NO_VERTEX {
                self.add_prob(self.her, rm, RESPONSE_W[slot][0]);
            }
        }

        // 14. Turn.
        self.prev_move[self.my] = v;
        std::mem::swap(&mut self.my, &mut self.her);
    }

    /// Fill reply slots 1 and 2 for the opponent group `atr_id`, which the
    /// current move put in atari.
    fn add_rescue_moves(&mut self, atr_id: Vertex) {
        let g = &self.ctx.geom;
        let my_color = stone(self.my);
        let v_atari = self.ren[atr_id].lib_atr;
        let mut max_stone_cnt = 0;

        // Capture one of our own groups in atari around it.
        let mut t = atr_id;
        loop {
            for n in g.nbr4(t) {
                if self.color[n] != my_color {
                    continue;
                }
                let nr = *self.ren_at(n);
                if !nr.is_atari() || nr.lib_atr == self.ko {
                    continue;
                }
                let mut inner_cap = false;
                if nr.size == 1 {
                    let vs = nr.lib_atr;
                    let ps = self.ptn[vs];
                    let cap_cnt = (0..4)
                        .filter(|&d| ps.is_atari(d) && ps.color_at(d) == my_color)
                        .count();
                    inner_cap = cap_cnt <= 1 && vs == v_atari;
                }
                if !inner_cap && nr.size > max_stone_cnt {
                    self.response_move[1] = nr.lib_atr;
                    max_stone_cnt = nr.size;
                }
            }
            t = self.next_ren_v[t];
            if t == atr_id {
                break;
            }
        }

        // Extend, unless the extension is caught in a ladder or self-atari.
        let pa = self.ptn[v_atari];
        let escape = match pa.empty_cnt() {
            2 => !self.ctx.tables.is_ladder(self.her, pa),
            n if n > 2 => true,
            _ => !self.is_self_atari(self.her, v_atari),
        };
        if escape {
            self.response_move[2] = v_atari;
        }
    }

    // -------------------------------------------------------------------------
    // Move selection
    // -------------------------------------------------------------------------

    #[inline]
    fn is_playable(&self, v: Vertex) -> bool {
        self.is_legal(self.my, v) && !self.is_eye_shape(self.my, v) && !self.is_seki(v)
    }

    /// Play a uniformly chosen legal move that fills neither an own eye nor
    /// a seki; pass if there is none. Returns the move.
    pub fn select_random_move(&mut self) -> Vertex {
        let mut next = PASS;
        if self.empty_cnt > 0 {
            let i0 = ((self.rng.f64() * self.empty_cnt as f64) as usize).min(self.empty_cnt - 1);
            let mut i = i0;
            loop {
                let v = self.empty[i];
                if self.is_playable(v) {
                    next = v;
                    break;
                }
                i += 1;
                if i == self.empty_cnt {
                    i = 0;
                }
                if i == i0 {
                    break;
                }
            }
        }
        self.play_legal(next);
        next
    }

    /// Play a move sampled from the weights of the side to move, skipping
    /// illegal, eye-filling and seki moves; pass if none is found. Returns
    /// the move.
    pub fn select_move(&mut self) -> Vertex {
        let next = self.sample_move();
        self.play_legal(next);
        next
    }

    fn sample_move(&mut self) -> Vertex {
        let my = self.my;
        let size = self.ctx.geom.size;
        let rand = self.rng.f64();
        let mut rank: Vec<f64> = self.sum_prob_rank[my].clone();
        let mut total: f64 = rank.iter().sum();
        let mut rejected: Vec<Vertex> = Vec::new();

        for _ in 0..self.empty_cnt {
            if total <= 0.0 {
                break;
            }
            let target = rand * total;

            // Row by inverse CDF over the row sums.
            let mut acc = 0.0;
            let mut y = size;
            for (row, &s) in rank.iter().enumerate() {
                acc += s;
                if acc > target {
                    y = row;
                    break;
                }
            }
            if y == size {
                // Rounding left the target past the last row.
                match rank.iter().rposition(|&s| s > 0.0) {
                    Some(row) => {
                        y = row;
                        acc = rank[..=row].iter().sum();
                    }
                    None => break,
                }
            }
            acc -= rank[y];

            // Column by inverse CDF within the row.
            let weight = |b: &Board, v: Vertex| {
                if rejected.contains(&v) { 0.0 } else { b.prob[my][v] }
            };
            let row_start = self.ctx.geom.xy(1, y + 1);
            let mut chosen = None;
            let mut last_positive = None;
            for v in row_start..row_start + size {
                let w = weight(self, v);
                if w > 0.0 {
                    last_positive = Some(v);
                }
                acc += w;
                if acc > target && w > 0.0 {
                    chosen = Some(v);
                    break;
                }
            }
            let Some(v) = chosen.or(last_positive) else {
                // Row sum is only rounding noise.
                total -= rank[y];
                rank[y] = 0.0;
                continue;
            };

            if self.is_playable(v) {
                return v;
            }

            let w = self.prob[my][v];
            rank[y] -= w;
            total -= w;
            rejected.push(v);
        }

        PASS
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.ctx.geom;
        write!(f, "   ")?;
        for x in 1..=g.size {
            let name = g.coord_name(g.xy(x, 1));
            write!(f, " {}", &name[..1])?;
        }
        writeln!(f)?;
        for y in (1..=g.size).rev() {
            write!(f, "{y:2} ")?;
            for x in 1..=g.size {
                let v = g.xy(x, y);
                let c = match self.color[v] {
                    STONE_BLACK => 'X',
                    STONE_WHITE => 'O',
                    _ if v == self.ko => '*',
                    _ => '.',
                };
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("size", &self.ctx.geom.size)
            .field("move_cnt", &self.move_cnt)
            .field("turn", &self.my)
            .field("ko", &self.ko)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(size: usize) -> Board {
        Board::with_seed(BoardContext::new(size).unwrap(), 7)
    }

    fn at(b: &Board, s: &str) -> Vertex {
        b.geometry().parse_coord(s).unwrap()
    }

    fn play(b: &mut Board, s: &str) {
        let v = at(b, s);
        assert!(b.is_legal(b.turn(), v), "{s} should be legal");
        b.play_legal(v);
    }

    #[test]
    fn test_new_board_is_empty() {
        let b = board(9);
        assert_eq!(b.state(), GameState::Empty);
        assert_eq!(b.empty_count(), 81);
        assert_eq!(b.turn(), BLACK);
        for row in 0..9 {
            assert!((b.row_prob_sum(BLACK, row) - 9.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_merge_keeps_single_group() {
        let mut b = board(9);
        for m in ["D4", "J9", "E4", "J8", "F4"] {
            play(&mut b, m);
        }
        let d4 = at(&b, "D4");
        let f4 = at(&b, "F4");
        assert_eq!(b.ren_id(d4), b.ren_id(f4));
        assert_eq!(b.ren_at(d4).size, 3);
        assert_eq!(b.ren_at(d4).lib_cnt, 8);
        assert_eq!(b.ren_stones(d4).len(), 3);
    }

    #[test]
    fn test_atari_flag_and_rescue_reply() {
        let mut b = board(9);
        // White E5 surrounded on three sides.
        for m in ["D5", "E5", "F5", "A1", "E6"] {
            play(&mut b, m);
        }
        let e4 = at(&b, "E4");
        assert!(b.ren_at(at(&b, "E5")).is_atari());
        assert_eq!(b.ren_at(at(&b, "E5")).lib_atr, e4);
        // The escape point is flagged for the group north of it.
        assert!(b.pattern_at(e4).is_atari(0));
        // White to move gets the escape as a reply.
        assert_eq!(b.response_moves()[2], e4);
    }

    #[test]
    fn test_suicide_is_illegal() {
        let mut b = board(9);
        for m in ["A2", "J9", "B1"] {
            play(&mut b, m);
        }
        assert!(!b.is_legal(WHITE, at(&b, "A1")));
        assert!(b.is_legal(BLACK, at(&b, "A1")));
    }

    #[test]
    fn test_self_atari_detection() {
        let mut b = board(9);
        for m in ["A2", "J9", "B1"] {
            play(&mut b, m);
        }
        // Black A1 fills its own eye but keeps liberties through A2 and B1.
        assert!(!b.is_self_atari(BLACK, at(&b, "A1")));
        let mut b = board(9);
        for m in ["B2", "A2", "C1", "J9"] {
            play(&mut b, m);
        }
        // White B1 would have only A1.
        assert!(b.is_self_atari(WHITE, at(&b, "B1")));
    }

    #[test]
    fn test_recalc_matches_incremental_with_neutral_tables() {
        let mut b = board(9);
        for m in ["C3", "G7", "C4", "G6"] {
            play(&mut b, m);
        }
        let mut fresh = b.clone();
        fresh.recalc_prob_all();
        for &v in fresh.empty_vertices() {
            assert_eq!(fresh.prob(BLACK, v), 1.0);
        }
    }

    #[test]
    fn test_display_marks_stones() {
        let mut b = board(5);
        play(&mut b, "C3");
        let s = b.to_string();
        assert!(s.contains('X'));
        assert!(!s.contains('O'));
    }
}
