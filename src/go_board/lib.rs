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

//! A minimal, rules-correct Go board. This crate is intentionally small: the
//! search core only needs legality, capture, scoring, symmetry, and a flat
//! feature-plane encoding -- the rest (pattern databases, SGF, GTP) is an
//! external collaborator's problem.

#[macro_use] extern crate lazy_static;
extern crate rand;

mod board;
mod color;
mod point;
pub mod symmetry;
pub mod features;

pub use self::board::Board;
pub use self::color::Color;
pub use self::point::{Move, Point};
pub use self::features::{Features, FEATURE_SIZE, NUM_FEATURE_PLANES};
