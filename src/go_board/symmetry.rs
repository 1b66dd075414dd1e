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

use crate::board::Board;
use crate::color::Color;
use crate::point::Point;

/// The eight symmetries of the square board (the dihedral group D4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    Identity,
    FlipLr,
    FlipUd,
    Transpose,
    TransposeAnti,
    Rot90,
    Rot180,
    Rot270
}

pub const ALL: [Transform; 8] = [
    Transform::Identity,
    Transform::FlipLr,
    Transform::FlipUd,
    Transform::Transpose,
    Transform::TransposeAnti,
    Transform::Rot90,
    Transform::Rot180,
    Transform::Rot270
];

impl Transform {
    pub fn apply(self, point: Point, size: usize) -> Point {
        let (x, y) = point.to_xy(size);
        let last = size - 1;

        let (nx, ny) = match self {
            Transform::Identity => (x, y),
            Transform::FlipLr => (last - x, y),
            Transform::FlipUd => (x, last - y),
            Transform::Transpose => (y, x),
            Transform::TransposeAnti => (last - y, last - x),
            Transform::Rot90 => (last - y, x),
            Transform::Rot180 => (last - x, last - y),
            Transform::Rot270 => (y, last - x)
        };

        Point::from_xy(nx, ny, size)
    }

    pub fn inverse(self) -> Transform {
        match self {
            Transform::Rot90 => Transform::Rot270,
            Transform::Rot270 => Transform::Rot90,
            other => other
        }
    }
}

/// Returns true if applying `t` to `board` yields the identical position,
/// which lets the caller fold equivalent moves together.
pub fn is_symmetric(board: &Board, t: Transform) -> bool {
    if t == Transform::Identity {
        return true;
    }

    let size = board.size();

    for point in board.all_points() {
        let mapped = t.apply(point, size);

        if board.at(point) != board.at(mapped) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Move;

    #[test]
    fn applying_then_inverting_is_identity() {
        let size = 9;

        for &t in ALL.iter() {
            for point in (0..size * size).map(Point::from_index) {
                let back = t.inverse().apply(t.apply(point, size), size);

                assert_eq!(back, point, "transform {:?} did not round-trip", t);
            }
        }
    }

    #[test]
    fn empty_board_is_symmetric_under_everything() {
        let board = Board::new(9, 7.5);

        for &t in ALL.iter() {
            assert!(is_symmetric(&board, t));
        }
    }

    #[test]
    fn asymmetric_stone_breaks_symmetry() {
        let mut board = Board::new(9, 7.5);

        board.place(Color::Black, Move::Place(Point::from_xy(0, 0, 9)));

        assert!(is_symmetric(&board, Transform::Identity));
        assert!(!is_symmetric(&board, Transform::Rot90));
    }
}
