// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The actual tree walk: select a child by UCB down to an unexpanded leaf,
//! evaluate it, and back-propagate the result. One call to `playout` is
//! one rollout; a worker thread calls it in a loop until
//! `time_control::is_done` says to stop.

use rand::Rng;

use go_board::{Board, Color, Move};

use crate::global_cache;
use crate::komi::DynamicKomi;
use crate::ladder::{self, LadderResult};
use crate::options::PolicyChecker;
use crate::predict::{PredictResponse, Predictor};
use crate::simulator::Simulator;
use crate::tree::{ExpandGuard, Node, NodePool};

/// First-play urgency: the score a zero-visit child is given, chosen above
/// any win-rate-plus-bonus combination a real visit can reach, so unexplored
/// moves are tried before weak explored ones.
const FPU: f32 = 1.1;

/// Weight of the prior-equivalence bonus in the UCB1-tuned score.
const EQUIVALENCE_WEIGHT: f32 = 3.0;

/// How many (virtual) prior-weighted visits the equivalence bonus behaves
/// as if the prior carries.
const EQUIVALENCE_CONSTANT: f32 = 1_000.0;

/// Base step of the progressive-widening schedule.
const PW_BASE: f64 = 40.0;

/// Growth rate of the progressive-widening schedule.
const PW_COEFFICIENT: f64 = 1.4;

/// Number of entries precomputed into the widening schedule -- comfortably
/// more than any board's candidate count (19x19 + pass = 362).
const PW_SCHEDULE_LEN: usize = 512;

/// Every time a node's visit count passes a multiple of this (checked via
/// `sum & RERATE_MASK == 0`), its children are re-sorted by dynamic
/// ownership/criticality and the top `width` admitted into the widening set.
const RERATE_MASK: u32 = 0x7f;

lazy_static! {
    /// `pw[i] = pw[i-1] + floor(PW_BASE * PW_COEFFICIENT^(i-1))`, saturating
    /// at `i32::MAX`. Precomputed once so the selection hot path never calls
    /// `powi`/`powf`.
    static ref PROGRESSIVE_WIDENING_SCHEDULE: [i64; PW_SCHEDULE_LEN] = {
        let mut pw = [0i64; PW_SCHEDULE_LEN];

        for i in 1..PW_SCHEDULE_LEN {
            let step = (PW_BASE * PW_COEFFICIENT.powi(i as i32 - 1)).floor() as i64;

            pw[i] = pw[i - 1].saturating_add(step).min(i32::MAX as i64);
        }

        pw
    };
}

fn widening_threshold(width: u16) -> i64 {
    let idx = (width as usize).min(PW_SCHEDULE_LEN - 1);

    PROGRESSIVE_WIDENING_SCHEDULE[idx]
}

/// The visit count a child must reach before it is worth promoting to a
/// full tree node; below it, `playout` resolves the child with a cheap
/// `Simulator` rollout instead. Scales with board size since a 19x19 board
/// has far more to lose from premature expansion than a 9x9 one.
fn expansion_threshold(board_size: usize) -> u32 {
    if board_size <= 9 {
        20
    } else if board_size <= 13 {
        25
    } else {
        40
    }
}

fn score_to_value(score: f32, to_move: Color) -> f32 {
    let perspective = match to_move {
        Color::Black => score,
        Color::White => -score
    };

    1.0 / (1.0 + (-perspective / 4.0).exp())
}

pub struct SearchEngine<P: Predictor> {
    predictor: P,
    simulator: Simulator
}

impl<P: Predictor> SearchEngine<P> {
    pub fn new(predictor: P, simulator: Simulator) -> Self {
        Self { predictor, simulator }
    }

    /// Builds the candidate list and prior value for a not-yet-created
    /// node at `board` (the position about to be evaluated, with `color`
    /// to move), by asking the predictor for a value and policy and
    /// filtering/flagging candidates according to `checker`.
    fn expand_node(&self, board: &Board, color: Color, checker: &dyn PolicyChecker) -> (Vec<(Move, f32, bool)>, f32) {
        let response = global_cache::get_or_insert(board.hash(), color, || {
            Some(self.predictor.predict(&[(board.clone(), color)]).remove(0))
        }).unwrap_or_else(|| PredictResponse::new(0.5, Vec::new()));
        let num_points = board.size() * board.size();
        let policy = response.policy();

        let legal: Vec<Move> = board.legal_moves(color).into_iter()
            .filter(|mv| match mv.point() {
                Some(point) => checker.should_include(board, color, point),
                None => true
            })
            .collect();

        let raw_priors: Vec<f32> = legal.iter()
            .map(|mv| {
                let index = mv.point().map(|p| p.to_index()).unwrap_or(num_points);

                policy.get(index).copied().filter(|v| v.is_finite()).unwrap_or(0.0)
            })
            .collect();

        let total: f32 = raw_priors.iter().sum();
        let normalized: Vec<f32> = if total > 1e-6 {
            raw_priors.iter().map(|v| v / total).collect()
        } else {
            vec![1.0 / legal.len().max(1) as f32; legal.len()]
        };

        let candidates = legal.into_iter().zip(normalized.into_iter())
            .map(|(mv, prior)| {
                let is_laddered = match mv.point() {
                    Some(point) => {
                        let mut trial = board.clone();
                        trial.place(color, mv);

                        trial.at(point).is_some()
                            && trial.liberty_count(point) <= 2
                            && ladder::classify(&trial, point, color) == LadderResult::Captured
                    },
                    None => false
                };

                (mv, prior, is_laddered)
            })
            .collect();

        (candidates, response.value())
    }

    /// Finds or creates the root node for `board`/`color`, reusing
    /// `prev_root`'s subtree (if given) and freeing everything else in the
    /// pool. Must be called with no worker threads running concurrently.
    pub fn expand_root(
        &self,
        pool: &NodePool,
        prev_root: Option<usize>,
        board: &Board,
        color: Color,
        checker: &dyn PolicyChecker
    ) -> usize {
        let guard = pool.lock_expand();

        let existing = pool.find(board.hash(), color, board.move_number());

        let root = if let Some(slot) = existing {
            slot
        } else {
            let (candidates, _value) = self.expand_node(board, color, checker);
            let num_points = board.size() * board.size();

            pool.allocate_empty(&guard, board.hash(), color, board.move_number(), candidates, num_points)
                .expect("node pool exhausted while expanding the root -- increase UCT_HASH_SIZE")
        };

        pool.clear_non_reachable(&guard, Some(root));
        let _ = prev_root;

        root
    }

    /// Re-sorts `node`'s children by `prior_score + criticality` of the
    /// point they play on (criticality `0` for pass), and admits the
    /// current top `width` of that ordering into the widening set. Run
    /// periodically (every `RERATE_MASK + 1` visits) so widening tracks
    /// how the position has actually developed, not just the initial prior.
    fn rerate_children(&self, node: &Node) {
        let mut ranked: Vec<(usize, f32)> = node.children.iter().enumerate()
            .map(|(i, child)| {
                let dynamic = child.mv.point()
                    .and_then(|p| node.points.get(p.to_index()))
                    .map(|stat| stat.criticality())
                    .unwrap_or(0.0);

                (i, child.prior_score + dynamic)
            })
            .collect();

        ranked.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let width = (node.width() as usize).max(1);

        for &(i, _) in ranked.iter().take(width) {
            node.children[i].admit_to_widening_set();
        }
    }

    fn select_child(&self, node: &Node) -> usize {
        let visits = node.move_count();

        if visits > 0 && visits & RERATE_MASK == 0 {
            self.rerate_children(node);
        }

        if (visits as i64) > widening_threshold(node.width()) {
            let next = node.children.iter()
                .filter(|c| !c.is_in_widening_set())
                .max_by(|a, b| a.prior_score.partial_cmp(&b.prior_score).unwrap());

            if let Some(child) = next {
                child.admit_to_widening_set();
                node.set_width(node.width() + 1);
            }
        }

        let sum = visits.max(1) as f32;
        let ln_sum = sum.ln();
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, child) in node.children.iter().enumerate() {
            if !child.is_in_widening_set() && !child.is_forced_open() {
                continue;
            }

            let n = child.move_count() as f32;

            let score = if n <= 0.0 {
                FPU
            } else {
                let p = child.win_rate();
                let variance_term = (p - p * p + (2.0 * ln_sum / n).sqrt()).min(0.25);
                let exploration = (ln_sum / n * variance_term).sqrt();
                let equivalence_bonus = EQUIVALENCE_WEIGHT
                    * (EQUIVALENCE_CONSTANT / (sum + EQUIVALENCE_CONSTANT)).sqrt()
                    * child.prior_score;

                p + exploration + equivalence_bonus
            };

            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }

        best_idx
    }

    /// Same as `expand_node`-backed allocation, but also marks the
    /// highest-prior sibling of `played` (the move that led here) as
    /// `is_forced_open`, guaranteeing at least two explored continuations
    /// out of `parent` even before progressive widening would otherwise
    /// admit a second child.
    fn expand_leaf(
        &self,
        pool: &NodePool,
        guard: &ExpandGuard<'_>,
        parent: &Node,
        played: usize,
        board: &Board,
        color: Color,
        checker: &dyn PolicyChecker
    ) -> (usize, f32) {
        let (candidates, value) = self.expand_node(board, color, checker);
        let num_points = board.size() * board.size();
        let slot = pool.allocate_empty(guard, board.hash(), color, board.move_number(), candidates, num_points)
            .expect("node pool exhausted during search -- increase UCT_HASH_SIZE");

        let sibling = parent.children.iter().enumerate()
            .filter(|(i, _)| *i != played)
            .max_by(|(_, a), (_, b)| a.prior_score.partial_cmp(&b.prior_score).unwrap());

        if let Some((_, sibling)) = sibling {
            sibling.force_open();
        }

        (slot, value)
    }

    fn terminal_value(&self, board: &Board, to_move: Color, komi: &DynamicKomi) -> f32 {
        let (black, white) = board.get_score();
        let adjusted = komi.adjusted_komi(board.move_number(), 0.5);
        let score = black as f32 - (white as f32 + adjusted);

        score_to_value(score, to_move)
    }

    /// Converts a `Simulator` rollout's final score (which already bakes in
    /// `board`'s static komi) into a win rate against the dynamic komi
    /// actually in effect for this search.
    fn rollout_value(&self, board: &Board, to_move: Color, komi: &DynamicKomi, raw_score: f32) -> f32 {
        let area_diff = raw_score + board.komi();
        let adjusted = komi.adjusted_komi(board.move_number(), 0.5);

        score_to_value(area_diff - adjusted, to_move)
    }

    fn record_ownership(&self, pool: &NodePool, path: &[(usize, usize)], territory: &[u8]) {
        for &(slot, _) in path {
            let node = pool.node(slot);

            for (point_stat, &owner) in node.points.iter().zip(territory.iter()) {
                point_stat.record(owner as usize);

                if owner == 2 {
                    point_stat.mark_seki();
                }
            }
        }
    }

    /// Runs one rollout from `root`, mutating `board`'s clone as it
    /// descends, and backpropagates the result through every node on the
    /// path. Safe to call concurrently from many worker threads.
    pub fn playout(
        &self,
        pool: &NodePool,
        root: usize,
        starting_board: &Board,
        starting_color: Color,
        checker: &dyn PolicyChecker,
        komi: &DynamicKomi,
        rng: &mut impl Rng
    ) {
        let mut board = starting_board.clone();
        let mut color = starting_color;
        let mut slot = root;
        let mut path: Vec<(usize, usize)> = Vec::new();
        let threshold = expansion_threshold(starting_board.size()) as u32;

        let leaf_value = loop {
            let node = pool.node(slot);
            node.add_virtual_loss();

            let chosen = node.with_select_lock(|| {
                let idx = self.select_child(node);
                node.children[idx].add_virtual_loss();
                idx
            });

            let child_visits = node.children[chosen].move_count();
            let mv = node.children[chosen].mv;
            board.place(color, mv);
            let next_color = color.opposite();
            path.push((slot, chosen));

            if board.is_scoreable() {
                break self.terminal_value(&board, next_color, komi);
            }

            if node.children[chosen].expanded_slot().is_none() && child_visits <= threshold {
                let (raw_score, territory) = self.simulator.rollout_with_ownership(&board, next_color, checker, rng);
                self.record_ownership(pool, &path, &territory);

                break self.rollout_value(&board, next_color, komi, raw_score);
            }

            if let Some(next_slot) = node.children[chosen].expanded_slot() {
                slot = next_slot;
                color = next_color;
                continue;
            }

            let guard = pool.lock_expand();

            if let Some(existing) = node.children[chosen].expanded_slot() {
                drop(guard);
                slot = existing;
                color = next_color;
                continue;
            }

            let (new_slot, value) = self.expand_leaf(pool, &guard, node, chosen, &board, next_color, checker);
            node.children[chosen].set_expanded_slot(new_slot);
            drop(guard);

            break value;
        };

        let mut value = leaf_value;

        for &(slot, idx) in path.iter().rev() {
            value = 1.0 - value;
            let node = pool.node(slot);
            node.update(value);
            node.children[idx].update(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::komi::KomiMode;
    use crate::options::StandardPolicyChecker;
    use crate::predict::UniformPredictor;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn a_single_playout_creates_exactly_one_new_node() {
        let pool = NodePool::new(64);
        let engine = SearchEngine::new(UniformPredictor, Simulator::new(30));
        let board = Board::new(5, 7.5);
        let checker = StandardPolicyChecker;
        let root = engine.expand_root(&pool, None, &board, Color::Black, &checker);
        let komi = DynamicKomi::new(KomiMode::Off, 7.5, 0);
        let mut rng = SmallRng::seed_from_u64(7);

        engine.playout(&pool, root, &board, Color::Black, &checker, &komi, &mut rng);

        assert_eq!(pool.node(root).move_count(), 1);
    }

    #[test]
    fn many_playouts_concentrate_visits_on_the_best_child() {
        let pool = NodePool::new(4096);
        let engine = SearchEngine::new(UniformPredictor, Simulator::new(30));
        let board = Board::new(5, 7.5);
        let checker = StandardPolicyChecker;
        let root = engine.expand_root(&pool, None, &board, Color::Black, &checker);
        let komi = DynamicKomi::new(KomiMode::Off, 7.5, 0);
        let mut rng = SmallRng::seed_from_u64(11);

        for _ in 0..200 {
            engine.playout(&pool, root, &board, Color::Black, &checker, &komi, &mut rng);
        }

        assert_eq!(pool.node(root).move_count(), 200);
        assert!(pool.node(root).children.iter().any(|c| c.move_count() > 0));
    }

    #[test]
    fn widening_schedule_is_nondecreasing_and_saturates() {
        let mut prev = widening_threshold(0);

        for width in 1..600u16 {
            let next = widening_threshold(width);

            assert!(next >= prev);
            prev = next;
        }

        assert_eq!(widening_threshold(600), widening_threshold(u16::MAX));
    }

    #[test]
    fn zero_visit_children_use_fpu_not_win_rate() {
        let pool = NodePool::new(64);
        let engine = SearchEngine::new(UniformPredictor, Simulator::new(30));
        let board = Board::new(5, 7.5);
        let checker = StandardPolicyChecker;
        let root = engine.expand_root(&pool, None, &board, Color::Black, &checker);

        let node = pool.node(root);
        node.children[0].admit_to_widening_set();
        node.children[0].add_virtual_loss();
        node.children[0].update(0.0); // visited once, lost every time

        node.children[1].force_open(); // zero visits, but forced open

        let chosen = engine.select_child(node);

        assert_eq!(chosen, 1);
        assert_eq!(node.children[1].move_count(), 0);
    }
}
