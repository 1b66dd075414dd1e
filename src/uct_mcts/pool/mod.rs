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

//! A fixed pool of persistent worker threads that drain an enqueued
//! [`SearchContext`] by repeatedly calling [`crate::engine::SearchEngine::playout`]
//! until its time strategy says to stop. Threads are never torn down
//! between searches -- `enqueue` just hands the pool something new to
//! chew on, mirroring how the same OS threads are reused across every
//! `generate_move`/pondering call in a single process lifetime.

mod shared_context;
mod worker_thread;

pub use self::shared_context::SearchContext;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel;
use crossbeam_utils::Backoff;

use go_board::{Board, Color};

use crate::engine::SearchEngine;
use crate::komi::DynamicKomi;
use crate::options::SearchOptions;
use crate::predict::Predictor;
use crate::time_control::TimeStrategy;
use crate::tree::NodePool;

use self::shared_context::SharedContext;
use self::worker_thread::Worker;

pub struct Pool<P: Predictor + 'static> {
    shared: Arc<SharedContext<P>>,
    searches_count: AtomicUsize,
    searches: Arc<RwLock<Vec<Arc<SearchContext>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize
}

impl<P: Predictor + 'static> Pool<P> {
    pub fn new(engine: Arc<SearchEngine<P>>, node_pool: Arc<NodePool>, capacity: usize) -> Self {
        let out = Self {
            shared: Arc::new(SharedContext::new(engine, node_pool)),
            searches_count: AtomicUsize::new(0),
            searches: Arc::new(RwLock::new(Vec::with_capacity(8))),
            handles: Mutex::new(Vec::with_capacity(capacity)),
            capacity
        };

        out.ensure_threads();
        out
    }

    fn ensure_threads(&self) {
        let mut handles = self.handles.lock().expect("could not acquire lock");

        while self.shared.is_running.load(Ordering::Acquire) && self.shared.num_running.load(Ordering::Acquire) < self.capacity {
            let has_started_leader = Arc::new(Barrier::new(2));
            let has_started = has_started_leader.clone();
            let shared = self.shared.clone();
            let searches = self.searches.clone();

            handles.push(thread::spawn(move || Worker::run(shared, searches, has_started)));
            has_started_leader.wait();
        }
    }

    /// Enqueues `root` (already expanded by `SearchEngine::expand_root`) to
    /// be probed by the worker pool until `time_strategy` says to stop.
    /// Blocks the calling thread until that happens; `root` is guaranteed
    /// to not be touched by any worker once this returns.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue(
        &self,
        root: usize,
        board: Board,
        color: Color,
        options: Box<dyn SearchOptions + Send + Sync>,
        time_strategy: Box<dyn TimeStrategy + Send + Sync>,
        komi: DynamicKomi
    ) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let id = self.searches_count.fetch_add(1, Ordering::AcqRel);
        let search = Arc::new(SearchContext::new(id, root, board, color, options, time_strategy, komi, tx));

        self.searches.write().expect("could not acquire write lock").push(search.clone());
        self.ensure_threads();

        let _ = rx.recv();

        // wait until every worker has dropped its reference to this search
        // before reusing its slot.
        let backoff = Backoff::new();

        while Arc::strong_count(&search) > 1 {
            backoff.snooze();
        }

        self.searches.write().expect("could not acquire write lock").retain(|s| !Arc::ptr_eq(s, &search));
    }
}

impl<P: Predictor + 'static> Drop for Pool<P> {
    fn drop(&mut self) {
        self.shared.is_running.store(false, Ordering::Release);

        for handle in self.handles.lock().expect("could not acquire lock").drain(..) {
            handle.join().expect("could not terminate worker thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StandardDeterministicSearch;
    use crate::predict::UniformPredictor;
    use crate::simulator::Simulator;
    use crate::time_control::RolloutLimit;
    use go_board::Board;

    #[test]
    fn enqueue_runs_at_least_the_requested_number_of_playouts() {
        let node_pool = Arc::new(NodePool::new(4096));
        let engine = Arc::new(SearchEngine::new(UniformPredictor, Simulator::new(30)));
        let board = Board::new(5, 7.5);
        let checker = crate::options::StandardPolicyChecker;
        let root = engine.expand_root(&node_pool, None, &board, Color::Black, &checker);

        let pool = Pool::new(engine, node_pool.clone(), 2);

        pool.enqueue(
            root,
            board,
            Color::Black,
            Box::new(StandardDeterministicSearch::new()),
            Box::new(RolloutLimit::new(100)),
            DynamicKomi::new(crate::komi::KomiMode::Off, 7.5, 0)
        );

        assert!(node_pool.node(root).move_count() >= 100);
    }
}
