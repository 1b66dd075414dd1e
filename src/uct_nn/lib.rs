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

//! A local CPU evaluator that fills `uct_mcts::predict_service::Accelerator`
//! -- the seam a real trained network plugs into. Forward math for an
//! actual policy/value network (convolutions, residual towers, weight
//! file parsing) is somebody else's problem; this crate only ships a
//! linear reference model so that the search core is runnable and
//! testable end to end without one.

extern crate go_board;
extern crate rand;
extern crate uct_mcts;

mod linear;

pub use self::linear::LinearEvaluator;
