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

use crate::board::{Board, MAX_BOARD_SIZE};
use crate::color::Color;
use crate::symmetry::Transform;

/// The number of feature planes produced per point. The search core treats
/// this as an opaque `C` -- the exact plane semantics belong to whoever
/// trains the network that reads them.
pub const NUM_FEATURE_PLANES: usize = 4;

/// Upper bound on the flattened feature tensor size, for callers that want
/// to pre-allocate a fixed-size buffer (e.g. the wire protocol in
/// `uct_distributed`, which is sized once at startup).
pub const FEATURE_SIZE: usize = NUM_FEATURE_PLANES * MAX_BOARD_SIZE * MAX_BOARD_SIZE;

/// Produces the flattened `C * N` feature tensor for a position.
pub trait Features {
    /// Returns the feature planes for `to_move`, with the board
    /// re-expressed under the given symmetry. The returned vector always
    /// has length `NUM_FEATURE_PLANES * size * size` for this board's size.
    fn get_features(&self, to_move: Color, t: Transform) -> Vec<f32>;
}

impl Features for Board {
    fn get_features(&self, to_move: Color, t: Transform) -> Vec<f32> {
        let size = self.size();
        let num_points = size * size;
        let mut out = vec! [0.0f32; NUM_FEATURE_PLANES * num_points];
        let opponent = to_move.opposite();
        let t_inv = t.inverse();

        for i in 0..num_points {
            let src = t_inv.apply(crate::point::Point::from_index(i), size);

            match self.at(src) {
                Some(c) if c == to_move => out[i] = 1.0,
                Some(c) if c == opponent => out[num_points + i] = 1.0,
                None => out[2 * num_points + i] = 1.0,
                _ => unreachable!()
            }

            out[3 * num_points + i] = 1.0;  // bias plane
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{Move, Point};

    #[test]
    fn feature_length_matches_board_size() {
        let board = Board::new(9, 7.5);
        let features = board.get_features(Color::Black, Transform::Identity);

        assert_eq!(features.len(), NUM_FEATURE_PLANES * 9 * 9);
    }

    #[test]
    fn own_and_opponent_planes_are_disjoint() {
        let mut board = Board::new(9, 7.5);

        board.place(Color::Black, Move::Place(Point::from_xy(0, 0, 9)));
        board.place(Color::White, Move::Place(Point::from_xy(1, 0, 9)));

        let features = board.get_features(Color::Black, Transform::Identity);
        let num_points = 81;

        assert_eq!(features[0], 1.0);
        assert_eq!(features[num_points], 0.0);
        assert_eq!(features[1], 0.0);
        assert_eq!(features[num_points + 1], 1.0);
    }

    #[test]
    fn bias_plane_is_always_one() {
        let board = Board::new(9, 7.5);
        let features = board.get_features(Color::White, Transform::Rot90);
        let num_points = 81;

        for i in 0..num_points {
            assert_eq!(features[3 * num_points + i], 1.0);
        }
    }
}
