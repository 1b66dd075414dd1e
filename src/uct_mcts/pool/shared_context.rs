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

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use go_board::{Board, Color};

use crate::engine::SearchEngine;
use crate::komi::DynamicKomi;
use crate::options::SearchOptions;
use crate::predict::Predictor;
use crate::time_control::TimeStrategy;
use crate::tree::NodePool;

/// State shared by every worker thread in a [`super::Pool`], independent of
/// which search (if any) is currently running.
pub struct SharedContext<P: Predictor> {
    pub is_running: AtomicBool,
    pub num_running: AtomicUsize,
    pub engine: Arc<SearchEngine<P>>,
    pub node_pool: Arc<NodePool>
}

impl<P: Predictor> SharedContext<P> {
    pub fn new(engine: Arc<SearchEngine<P>>, node_pool: Arc<NodePool>) -> Self {
        Self {
            is_running: AtomicBool::new(true),
            num_running: AtomicUsize::new(0),
            engine,
            node_pool
        }
    }
}

/// One enqueued `generate_move` / pondering request. Workers race to pick
/// this up, run `playout` against it in a loop, and the first one to notice
/// `time_control::is_done` finishes it and replies.
pub struct SearchContext {
    pub id: usize,
    pub root: usize,
    pub board: Board,
    pub color: Color,
    pub options: Box<dyn SearchOptions + Send + Sync>,
    pub time_strategy: Box<dyn TimeStrategy + Send + Sync>,
    pub komi: DynamicKomi,
    reply: Sender<()>,
    finished: AtomicBool
}

impl SearchContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        root: usize,
        board: Board,
        color: Color,
        options: Box<dyn SearchOptions + Send + Sync>,
        time_strategy: Box<dyn TimeStrategy + Send + Sync>,
        komi: DynamicKomi,
        reply: Sender<()>
    ) -> Self {
        Self { id, root, board, color, options, time_strategy, komi, reply, finished: AtomicBool::new(false) }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Marks this search as finished and wakes up whoever is waiting on it.
    /// Safe to call from more than one worker: only the first call sends.
    pub fn finish(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            let _ = self.reply.send(());
        }
    }
}
