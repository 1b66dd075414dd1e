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

//! Knobs that change how a search behaves without changing the search
//! algorithm itself: which candidate moves are worth expanding at all, and
//! how the final move is picked once the rollout budget is spent.

use go_board::{Board, Color, Point};

/// Filters candidate moves before they are added as children of a node.
/// Exists separately from `SearchOptions` because the same filter is
/// reused both during normal play and while scoring a finished game.
pub trait PolicyChecker: Send + Sync {
    fn should_include(&self, board: &Board, color: Color, point: Point) -> bool;
}

/// True if every orthogonal neighbor of `point` is `color` (or off-board),
/// and at least three of the (up to four) diagonal neighbors are also
/// `color` -- the classic heuristic for "this is almost certainly a real
/// eye, do not bother searching it as a policy candidate".
pub fn is_eye(board: &Board, color: Color, point: Point) -> bool {
    let size = board.size();
    let (x, y) = point.to_xy(size);

    if board.at(point).is_some() {
        return false;
    }

    let orthogonal = [
        (x.checked_sub(1), Some(y)),
        (Some(x + 1).filter(|&v| v < size), Some(y)),
        (Some(x), y.checked_sub(1)),
        (Some(x), Some(y + 1).filter(|&v| v < size))
    ];

    for (ox, oy) in orthogonal.iter() {
        if let (Some(ox), Some(oy)) = (ox, oy) {
            let neighbor = Point::from_xy(*ox, *oy, size);

            if board.at(neighbor) != Some(color) {
                return false;
            }
        } // off-board orthogonal neighbors count as friendly.
    }

    let diagonals = [
        (x.checked_sub(1), y.checked_sub(1)),
        (Some(x + 1).filter(|&v| v < size), y.checked_sub(1)),
        (x.checked_sub(1), Some(y + 1).filter(|&v| v < size)),
        (Some(x + 1).filter(|&v| v < size), Some(y + 1).filter(|&v| v < size))
    ];

    let mut on_board = 0;
    let mut friendly = 0;

    for (dx, dy) in diagonals.iter() {
        if let (Some(dx), Some(dy)) = (dx, dy) {
            on_board += 1;

            if board.at(Point::from_xy(*dx, *dy, size)) == Some(color) {
                friendly += 1;
            }
        }
    }

    // a corner or side point only has 1 or 2 diagonals at all, and all of
    // them must be friendly there; in the middle of the board, one
    // intruder is tolerated.
    if on_board < 4 {
        friendly == on_board
    } else {
        friendly >= 3
    }
}

/// Excludes moves that fill the engine's own true eyes -- they are always
/// a waste of a playout during normal search.
pub struct StandardPolicyChecker;

impl PolicyChecker for StandardPolicyChecker {
    fn should_include(&self, board: &Board, color: Color, point: Point) -> bool {
        !is_eye(board, color, point)
    }
}

/// Includes every legal move, used while re-scoring a finished position
/// (e.g. dead stone removal) where eye-filling moves are exactly what is
/// being searched for.
pub struct ScoringPolicyChecker;

impl PolicyChecker for ScoringPolicyChecker {
    fn should_include(&self, _board: &Board, _color: Color, _point: Point) -> bool {
        true
    }
}

/// The knobs a [`crate::controller::SearchController`] consults while
/// running and concluding a search.
pub trait SearchOptions: Send + Sync {
    /// Softmax temperature applied to child visit counts when sampling the
    /// final move. Ignored by deterministic variants.
    fn temperature(&self) -> f32;

    /// If true, the final move is always the most-visited child instead of
    /// being sampled proportionally to visit counts.
    fn is_deterministic(&self) -> bool;

    fn policy_checker(&self) -> &dyn PolicyChecker;
}

/// Ordinary play: eye-filling moves are excluded, and the final move is
/// sampled from the visit-count distribution at `temperature()`.
pub struct StandardSearch {
    pub temperature: f32,
    checker: StandardPolicyChecker
}

impl StandardSearch {
    pub fn new(temperature: f32) -> Self {
        Self { temperature, checker: StandardPolicyChecker }
    }
}

impl SearchOptions for StandardSearch {
    fn temperature(&self) -> f32 { self.temperature }
    fn is_deterministic(&self) -> bool { false }
    fn policy_checker(&self) -> &dyn PolicyChecker { &self.checker }
}

/// Same candidate filtering as [`StandardSearch`], but always returns the
/// single most-visited child -- used for engine-vs-engine matches and
/// tests where a stable, reproducible move is required.
pub struct StandardDeterministicSearch {
    checker: StandardPolicyChecker
}

impl StandardDeterministicSearch {
    pub fn new() -> Self {
        Self { checker: StandardPolicyChecker }
    }
}

impl Default for StandardDeterministicSearch {
    fn default() -> Self { Self::new() }
}

impl SearchOptions for StandardDeterministicSearch {
    fn temperature(&self) -> f32 { 1.0 }
    fn is_deterministic(&self) -> bool { true }
    fn policy_checker(&self) -> &dyn PolicyChecker { &self.checker }
}

/// Used while re-scoring a finished position: every move is a candidate,
/// and the result is always deterministic.
pub struct ScoringSearch {
    checker: ScoringPolicyChecker
}

impl ScoringSearch {
    pub fn new() -> Self {
        Self { checker: ScoringPolicyChecker }
    }
}

impl Default for ScoringSearch {
    fn default() -> Self { Self::new() }
}

impl SearchOptions for ScoringSearch {
    fn temperature(&self) -> f32 { 1.0 }
    fn is_deterministic(&self) -> bool { true }
    fn policy_checker(&self) -> &dyn PolicyChecker { &self.checker }
}

#[cfg(test)]
mod tests {
    use super::*;
    use go_board::Move;

    fn filled_eye(size: usize) -> (Board, Point) {
        let mut board = Board::new(size, 7.5);
        let center = Point::from_xy(4, 4, size);

        for (dx, dy) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1), (-1, -1), (1, -1), (-1, 1), (1, 1)] {
            let x = (4 + dx) as usize;
            let y = (4 + dy) as usize;

            board.place(Color::Black, Move::Place(Point::from_xy(x, y, size)));
        }

        (board, center)
    }

    #[test]
    fn middle_of_board_eye_is_detected() {
        let (board, center) = filled_eye(9);

        assert!(is_eye(&board, Color::Black, center));
        assert!(!is_eye(&board, Color::White, center));
    }

    #[test]
    fn corner_eye_only_needs_its_single_diagonal() {
        let mut board = Board::new(9, 7.5);

        board.place(Color::Black, Move::Place(Point::from_xy(1, 0, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(0, 1, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(1, 1, 9)));

        assert!(is_eye(&board, Color::Black, Point::from_xy(0, 0, 9)));
    }

    #[test]
    fn standard_checker_excludes_eyes_scoring_checker_does_not() {
        let (board, center) = filled_eye(9);

        assert!(!StandardPolicyChecker.should_include(&board, Color::Black, center));
        assert!(ScoringPolicyChecker.should_include(&board, Color::Black, center));
    }
}