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

//! A from-scratch Monte Carlo tree search engine for Go: a lock-light
//! shared search tree, a pluggable position evaluator (local accelerator,
//! remote inference cluster, or a random-rollout simulator), and the
//! worker pool and controller that turn a board position into a move.

extern crate crossbeam_channel;
extern crate crossbeam_utils;
extern crate dashmap;
extern crate go_board;
#[macro_use] extern crate lazy_static;
extern crate rand;
extern crate uct_utils;

/* -------- Modules -------- */

pub mod controller;
pub mod engine;
mod global_cache;
pub mod komi;
pub mod ladder;
pub mod options;
pub mod pool;
pub mod predict;
pub mod predict_service;
pub mod simulator;
pub mod time_control;
pub mod tree;

/* -------- Exports -------- */

pub use self::controller::{GeneratedMove, SearchController, SearchMode};
pub use self::komi::{DynamicKomi, KomiMode};
pub use self::ladder::{classify as classify_ladder, LadderResult};
pub use self::options::{PolicyChecker, ScoringSearch, SearchOptions, StandardDeterministicSearch, StandardSearch};
pub use self::predict::{PredictResponse, Predictor};
pub use self::predict_service::{Accelerator, BatchScheduler};
pub use self::simulator::Simulator;
pub use self::time_control::{ByoYomi, RolloutLimit, TimeStrategy, TimeStrategyResult};
