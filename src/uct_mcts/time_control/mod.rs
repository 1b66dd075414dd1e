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

mod byo_yomi;
mod rollout_limit;

pub use self::byo_yomi::ByoYomi;
pub use self::rollout_limit::RolloutLimit;

use crate::tree;

pub enum TimeStrategyResult {
    /// There is still time (or rollouts) left, with `remaining` of them.
    NotExpired(usize),
    /// The budget ran out and a request to extend it was declined.
    NotExtended,
    /// The budget ran out and there was no extension to ask for.
    Expired,
    /// The budget ran out but was extended, so the search should continue.
    Extended
}

pub trait TimeStrategy: Send + Sync {
    /// Checks whether this time (or rollout) budget has expired, and if so
    /// whether it is worth extending given the current state of the tree.
    fn try_extend(&self, root: &tree::Node) -> TimeStrategyResult;
}

/// The minimum number of additional playouts the second most-visited child
/// would need in order to overtake the most-visited child, i.e. the
/// smallest extension that could still change the final answer.
fn min_promote_rollouts(root: &tree::Node) -> usize {
    if root.children.is_empty() {
        return 0;
    }

    let mut top_1 = 0;
    let mut top_2 = None;

    for i in 1..root.children.len() {
        let count_i = root.children[i].move_count();
        let count_top1 = root.children[top_1].move_count();

        if count_i > count_top1 {
            top_2 = Some(top_1);
            top_1 = i;
        } else if top_2.map_or(true, |t| count_i > root.children[t].move_count()) {
            top_2 = Some(i);
        }
    }

    let count_1 = root.children[top_1].move_count();
    let count_2 = top_2.map(|t| root.children[t].move_count()).unwrap_or(0);

    count_1.saturating_sub(count_2) as usize
}

/// Implements a time control scheme based on the `UNST-N` and `EARLY-C`
/// strategy suggested by Hendrik Baier and Mark H.M. Winands ("Time
/// Management for Monte-Carlo Tree Search in Go"):
///
/// * `UNST-N` extends the search while the leading move is still unstable.
/// * `EARLY-C` stops the search early once the runner-up mathematically
///   cannot catch up within the remaining budget.
pub fn is_done(root: &tree::Node, ticket: &dyn TimeStrategy) -> bool {
    if root.move_count() == 0 {
        return false;
    }

    match ticket.try_extend(root) {
        TimeStrategyResult::NotExpired(remaining) => min_promote_rollouts(root) > remaining,
        TimeStrategyResult::Extended => false,
        _ => true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodePool;
    use go_board::{Color, Move, Point};

    fn root_with_counts(counts: &[u32]) -> (NodePool, usize) {
        let pool = NodePool::new(8);
        let guard = pool.lock_expand();
        let candidates = counts.iter()
            .enumerate()
            .map(|(i, _)| (Move::Place(Point::from_xy(i, 0, 9)), 0.5, false))
            .collect();
        let slot = pool.allocate_empty(&guard, 1, Color::Black, 0, candidates, 81).unwrap();

        for (child, &count) in pool.node(slot).children.iter().zip(counts) {
            for _ in 0..count {
                child.add_virtual_loss();
            }
        }

        (pool, slot)
    }

    #[test]
    fn min_promote_is_zero_when_leader_is_untouchable() {
        let (pool, slot) = root_with_counts(&[100, 1]);

        assert_eq!(min_promote_rollouts(pool.node(slot)), 99);
    }

    #[test]
    fn is_done_false_before_any_visits() {
        let (pool, slot) = root_with_counts(&[0, 0]);

        struct AlwaysExpired;

        impl TimeStrategy for AlwaysExpired {
            fn try_extend(&self, _root: &tree::Node) -> TimeStrategyResult {
                TimeStrategyResult::Expired
            }
        }

        assert!(!is_done(pool.node(slot), &AlwaysExpired));
    }
}
