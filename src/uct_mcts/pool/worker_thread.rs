// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier, RwLock};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::predict::Predictor;
use crate::time_control;

use super::shared_context::{SearchContext, SharedContext};

/// One persistent OS thread. A worker has no state of its own beyond its
/// RNG -- everything it needs to do its job comes from the `SharedContext`
/// and whatever `SearchContext` it currently finds at the front of the
/// queue.
pub struct Worker;

impl Worker {
    pub fn run<P: Predictor>(
        shared: Arc<SharedContext<P>>,
        searches: Arc<RwLock<Vec<Arc<SearchContext>>>>,
        has_started: Arc<Barrier>
    ) {
        shared.num_running.fetch_add(1, Ordering::AcqRel);
        has_started.wait();

        let mut rng = SmallRng::from_entropy();

        while shared.is_running.load(Ordering::Acquire) {
            let current = searches.read().expect("could not acquire read lock")
                .iter()
                .find(|search| !search.is_finished())
                .cloned();

            match current {
                Some(search) => {
                    let root = shared.node_pool.node(search.root);

                    if time_control::is_done(root, search.time_strategy.as_ref()) {
                        search.finish();
                    } else {
                        shared.engine.playout(
                            &shared.node_pool,
                            search.root,
                            &search.board,
                            search.color,
                            search.options.policy_checker(),
                            &search.komi,
                            &mut rng
                        );
                    }
                },
                None => std::thread::yield_now()
            }
        }

        shared.num_running.fetch_sub(1, Ordering::AcqRel);
    }
}
