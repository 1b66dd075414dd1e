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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{TimeStrategy, TimeStrategyResult};
use crate::tree;

/// A Japanese byo-yomi clock: a main time budget, followed by some number
/// of fixed-length overtime periods that are consumed one at a time as the
/// search runs past them.
pub struct ByoYomi {
    start: Instant,
    main_time: Duration,
    period_time: Duration,
    periods_left: AtomicUsize
}

impl ByoYomi {
    pub fn new(main_time: Duration, period_time: Duration, num_periods: usize) -> Self {
        Self {
            start: Instant::now(),
            main_time,
            period_time,
            periods_left: AtomicUsize::new(num_periods)
        }
    }

    /// Estimated playouts-per-second so far, used to translate a remaining
    /// time budget into a remaining rollout count for `min_promote_rollouts`.
    fn rollout_rate(&self, root: &tree::Node) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();

        if elapsed <= 0.0 {
            0.0
        } else {
            root.move_count() as f64 / elapsed
        }
    }
}

impl TimeStrategy for ByoYomi {
    fn try_extend(&self, root: &tree::Node) -> TimeStrategyResult {
        let elapsed = self.start.elapsed();

        if elapsed < self.main_time {
            let remaining_secs = (self.main_time - elapsed).as_secs_f64();
            let remaining = (self.rollout_rate(root) * remaining_secs).round() as usize;

            return TimeStrategyResult::NotExpired(remaining);
        }

        // main time is gone; consume one overtime period if any are left.
        loop {
            let left = self.periods_left.load(Ordering::Acquire);

            if left == 0 {
                return TimeStrategyResult::NotExtended;
            }

            if self.periods_left.compare_exchange(left, left - 1, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                let _ = self.period_time; // the period itself elapses in real wall-clock time, this just tracks the count.

                return TimeStrategyResult::Extended;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_time_not_yet_elapsed_is_not_expired() {
        let byo_yomi = ByoYomi::new(Duration::from_secs(60), Duration::from_secs(30), 1);
        let pool = crate::tree::NodePool::new(4);
        let guard = pool.lock_expand();
        let slot = pool.allocate_empty(&guard, 1, go_board::Color::Black, 0, vec![(go_board::Move::Pass, 0.5, false)], 81).unwrap();

        match byo_yomi.try_extend(pool.node(slot)) {
            TimeStrategyResult::NotExpired(_) => { },
            _ => panic!("expected NotExpired")
        }
    }

    #[test]
    fn exhausting_periods_eventually_declines_extension() {
        let byo_yomi = ByoYomi::new(Duration::from_millis(0), Duration::from_millis(0), 1);
        let pool = crate::tree::NodePool::new(4);
        let guard = pool.lock_expand();
        let slot = pool.allocate_empty(&guard, 1, go_board::Color::Black, 0, vec![(go_board::Move::Pass, 0.5, false)], 81).unwrap();

        assert!(matches!(byo_yomi.try_extend(pool.node(slot)), TimeStrategyResult::Extended));
        assert!(matches!(byo_yomi.try_extend(pool.node(slot)), TimeStrategyResult::NotExtended));
    }
}
