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

//! Ladder capture analysis: is a group with few liberties going to get run
//! down the board and captured, or does it escape? Used to mark candidate
//! moves that only look good because the search hasn't read out the chase
//! far enough on its own (`Child::is_laddered`).

use go_board::{Board, Color, Move, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LadderResult {
    /// The group is run down and captured regardless of whose turn it is.
    Captured,
    /// The group gets away -- either it reaches enough liberties to be
    /// safe, or the chaser has no move that keeps the chase going.
    Escapes,
    /// `point` was not a `color` stone, so there is no group to classify.
    NotApplicable
}

/// How many chase steps to read out before giving up and assuming escape.
/// A real ladder that is still running after this many moves has almost
/// certainly left the board or run into a friendly stone (which this
/// simplified reference reader does not special-case) anyway.
const MAX_DEPTH: usize = 64;

/// Classifies whether the group at `point` (which must be a `color`
/// stone), assumed to already be at a low liberty count, can be captured
/// by a ladder: `color`'s opponent repeatedly plays the liberty that
/// leaves the group with the fewest remaining liberties, until it is
/// either captured or escapes to three or more liberties.
///
/// This is a one-ply-greedy reference reader, not a full combinatorial
/// ladder search -- it will occasionally misjudge a ladder that requires
/// looking more than one candidate liberty ahead (e.g. a ladder breaker
/// placed mid-chase). That tradeoff is deliberate: see the design notes.
pub fn classify(board: &Board, point: Point, color: Color) -> LadderResult {
    if board.at(point) != Some(color) {
        return LadderResult::NotApplicable;
    }

    let mut board = board.clone();
    let chaser = color.opposite();

    for _ in 0..MAX_DEPTH {
        let liberties = board.liberty_count(point);

        if liberties == 0 {
            return LadderResult::Captured;
        } else if liberties >= 3 {
            return LadderResult::Escapes;
        } else if liberties == 1 {
            return LadderResult::Captured;
        }

        let candidates = board.liberties_of(point);
        let mut best: Option<(Point, usize)> = None;

        for lib in candidates {
            if !board.is_valid(chaser, lib) {
                continue;
            }

            let mut trial = board.clone();
            trial.place(chaser, Move::Place(lib));

            let resulting = if trial.at(point).is_some() {
                trial.liberty_count(point)
            } else {
                0 // the chasing move itself completed the capture.
            };

            if best.map_or(true, |(_, best_libs)| resulting < best_libs) {
                best = Some((lib, resulting));
            }
        }

        match best {
            None => return LadderResult::Escapes,
            Some((lib, _)) => { board.place(chaser, Move::Place(lib)); }
        }

        if board.at(point).is_none() {
            return LadderResult::Captured;
        }
    }

    LadderResult::Escapes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_applicable_on_an_empty_point() {
        let board = Board::new(9, 7.5);

        assert_eq!(classify(&board, Point::from_xy(4, 4, 9), Color::Black), LadderResult::NotApplicable);
    }

    #[test]
    fn a_corner_stone_in_a_ladder_gets_captured() {
        let mut board = Board::new(9, 7.5);

        // white stone at (0,0) with black stones already reducing it to
        // two liberties, chased into the corner.
        board.place(Color::White, Move::Place(Point::from_xy(0, 0, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(1, 1, 9)));
        board.place(Color::White, Move::Pass);
        board.place(Color::Black, Move::Place(Point::from_xy(0, 1, 9)));

        assert_eq!(classify(&board, Point::from_xy(0, 0, 9), Color::White), LadderResult::Captured);
    }

    #[test]
    fn a_stone_with_three_liberties_escapes_immediately() {
        let mut board = Board::new(9, 7.5);

        board.place(Color::White, Move::Place(Point::from_xy(4, 4, 9)));

        assert_eq!(classify(&board, Point::from_xy(4, 4, 9), Color::White), LadderResult::Escapes);
    }
}
