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

use super::{TimeStrategy, TimeStrategyResult};
use crate::tree;

/// A fixed playout budget with no extension -- used for pondering-free,
/// reproducible searches (benchmarks, tests, and `NUM_ROLLOUT` from config).
pub struct RolloutLimit {
    limit: usize
}

impl RolloutLimit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TimeStrategy for RolloutLimit {
    fn try_extend(&self, root: &tree::Node) -> TimeStrategyResult {
        let count = root.move_count() as usize;

        if count < self.limit {
            TimeStrategyResult::NotExpired(self.limit - count)
        } else {
            TimeStrategyResult::Expired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodePool;
    use go_board::{Color, Move};

    #[test]
    fn expires_once_limit_is_reached() {
        let pool = NodePool::new(4);
        let guard = pool.lock_expand();
        let slot = pool.allocate_empty(&guard, 1, Color::Black, 0, vec![(Move::Pass, 0.5, false)], 81).unwrap();
        let limit = RolloutLimit::new(2);

        pool.node(slot).add_virtual_loss();
        assert!(matches!(limit.try_extend(pool.node(slot)), TimeStrategyResult::NotExpired(1)));

        pool.node(slot).add_virtual_loss();
        assert!(matches!(limit.try_extend(pool.node(slot)), TimeStrategyResult::Expired));
    }
}
