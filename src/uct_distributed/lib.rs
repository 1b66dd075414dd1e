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

//! The remote-evaluator pair: a `DistributedClient` that lets a
//! `SearchEngine` dispatch position evaluations over TCP to a pool of
//! `InferenceServer`s, with the same binary wire protocol spoken by both
//! ends.

extern crate go_board;
extern crate uct_mcts;
extern crate uct_utils;

mod client;
mod server;
mod wire;

pub use self::client::DistributedClient;
pub use self::server::{InferenceServer, PlaneEvaluator, UniformPlaneEvaluator};
