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

use std::fmt;

/// A single intersection on the board, addressed by its flat index within
/// the board's `size * size` grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    index: u16
}

impl Point {
    pub fn from_xy(x: usize, y: usize, size: usize) -> Self {
        debug_assert!(x < size && y < size);

        Self { index: (y * size + x) as u16 }
    }

    pub fn from_index(index: usize) -> Self {
        Self { index: index as u16 }
    }

    pub fn to_index(self) -> usize {
        self.index as usize
    }

    pub fn to_xy(self, size: usize) -> (usize, usize) {
        let index = self.index as usize;

        (index % size, index / size)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(fmt, "[{}]", self.index)
    }
}

/// A move as understood by the search core: a placement at some point, a
/// pass, or a resignation. `Move` deliberately does not carry a color --
/// the color to play is always implied by whoever is making the move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    Pass,
    Place(Point),
    Resign
}

impl Move {
    pub fn point(self) -> Option<Point> {
        match self {
            Move::Pass | Move::Resign => None,
            Move::Place(point) => Some(point)
        }
    }
}
