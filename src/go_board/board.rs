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

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::color::Color;
use crate::point::{Move, Point};

pub const MAX_BOARD_SIZE: usize = 19;
const MAX_POINTS: usize = MAX_BOARD_SIZE * MAX_BOARD_SIZE;

lazy_static! {
    /// Zobrist table, seeded deterministically so that repeated runs (and
    /// tests) see the same hashes.
    static ref ZOBRIST: [[u64; 2]; MAX_POINTS] = {
        let mut rng = SmallRng::seed_from_u64(0x6a09_e667_f3bc_c908);
        let mut table = [[0u64; 2]; MAX_POINTS];

        for entry in table.iter_mut() {
            entry[0] = rng.gen();
            entry[1] = rng.gen();
        }

        table
    };

    static ref ZOBRIST_PASS: u64 = {
        let mut rng = SmallRng::seed_from_u64(0xbb67_ae85_84ca_a73b);

        rng.gen()
    };
}

/// A rules-correct Go board of variable size (up to 19x19). Implements only
/// what the search core needs: legality, capture, simple (non-superko) ko
/// avoidance, and Chinese-style area scoring.
#[derive(Clone)]
pub struct Board {
    size: usize,
    stones: Vec<Option<Color>>,
    komi: f32,
    ko_point: Option<Point>,
    hash: u64,
    pass_count: u16,
    move_number: u16
}

impl Board {
    pub fn new(size: usize, komi: f32) -> Self {
        assert!(size > 0 && size <= MAX_BOARD_SIZE);

        Self {
            size,
            stones: vec! [None; size * size],
            komi,
            ko_point: None,
            hash: 0,
            pass_count: 0,
            move_number: 0
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn komi(&self) -> f32 {
        self.komi
    }

    pub fn move_number(&self) -> u16 {
        self.move_number
    }

    pub fn pass_count(&self) -> u16 {
        self.pass_count
    }

    pub fn at(&self, point: Point) -> Option<Color> {
        self.stones[point.to_index()]
    }

    /// The 64-bit position hash used to address the transposition table.
    /// Does not encode the side-to-move, which is tracked alongside it by
    /// the caller (see `SearchNode` identity in the tree module).
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn all_points(&self) -> impl Iterator<Item = Point> + '_ {
        let size = self.size;

        (0..size * size).map(Point::from_index)
    }

    fn neighbors(&self, point: Point) -> Vec<Point> {
        let (x, y) = point.to_xy(self.size);
        let mut out = Vec::with_capacity(4);

        if x > 0 { out.push(Point::from_xy(x - 1, y, self.size)); }
        if x + 1 < self.size { out.push(Point::from_xy(x + 1, y, self.size)); }
        if y > 0 { out.push(Point::from_xy(x, y - 1, self.size)); }
        if y + 1 < self.size { out.push(Point::from_xy(x, y + 1, self.size)); }

        out
    }

    /// Returns the group containing `point` and its distinct liberty
    /// points, via a breadth-first flood fill. `point` must be occupied.
    fn group_and_liberties(&self, point: Point) -> (Vec<Point>, Vec<Point>) {
        let color = self.stones[point.to_index()].expect("group_and_liberties called on an empty point");
        let mut visited = vec! [false; self.stones.len()];
        let mut liberties = std::collections::HashSet::new();
        let mut group = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(point);
        visited[point.to_index()] = true;

        while let Some(p) = queue.pop_front() {
            group.push(p);

            for n in self.neighbors(p) {
                match self.stones[n.to_index()] {
                    None => { liberties.insert(n); },
                    Some(c) if c == color && !visited[n.to_index()] => {
                        visited[n.to_index()] = true;
                        queue.push_back(n);
                    },
                    _ => { }
                }
            }
        }

        (group, liberties.into_iter().collect())
    }

    /// The group of stones connected to `point`, which must be occupied.
    pub fn group(&self, point: Point) -> Vec<Point> {
        self.group_and_liberties(point).0
    }

    /// The liberty points of the group containing `point`, which must be
    /// occupied.
    pub fn liberties_of(&self, point: Point) -> Vec<Point> {
        self.group_and_liberties(point).1
    }

    /// The number of distinct liberties of the group containing `point`,
    /// which must be occupied.
    pub fn liberty_count(&self, point: Point) -> usize {
        self.group_and_liberties(point).1.len()
    }

    /// Returns true if playing `color` at `point` is legal: the point must
    /// be empty, must not immediately recapture the simple ko point, and
    /// the resulting position must not be suicide (own group ends up with
    /// zero liberties after resolving captures).
    pub fn is_valid(&self, color: Color, point: Point) -> bool {
        if self.stones[point.to_index()].is_some() {
            return false;
        }

        if self.ko_point == Some(point) {
            return false;
        }

        let mut trial = self.clone();
        trial.stones[point.to_index()] = Some(color);

        let opponent = color.opposite();
        let mut any_captured = false;

        for n in trial.neighbors(point) {
            if trial.stones[n.to_index()] == Some(opponent) {
                let (group, liberties) = trial.group_and_liberties(n);

                if liberties.is_empty() {
                    any_captured = true;
                    for p in group {
                        trial.stones[p.to_index()] = None;
                    }
                }
            }
        }

        let (_, own_liberties) = trial.group_and_liberties(point);

        !own_liberties.is_empty() || any_captured
    }

    /// Plays `mv` as `color`. Returns `false` (and performs no mutation) if
    /// the move is illegal; the caller is expected to have already checked
    /// `is_valid` during move generation, so this is mostly a defensive
    /// re-check.
    pub fn place(&mut self, color: Color, mv: Move) -> bool {
        match mv {
            Move::Resign => true, // ends the game without touching board state
            Move::Pass => {
                self.ko_point = None;
                self.pass_count += 1;
                self.move_number += 1;
                self.hash ^= *ZOBRIST_PASS;

                true
            },
            Move::Place(point) => {
                if !self.is_valid(color, point) {
                    return false;
                }

                self.stones[point.to_index()] = Some(color);
                self.hash ^= ZOBRIST[point.to_index()][color.as_index()];

                let opponent = color.opposite();
                let mut captured = Vec::new();

                for n in self.neighbors(point) {
                    if self.stones[n.to_index()] == Some(opponent) {
                        let (group, liberties) = self.group_and_liberties(n);

                        if liberties.is_empty() {
                            captured.extend(group);
                        }
                    }
                }

                captured.sort();
                captured.dedup();

                for p in &captured {
                    self.stones[p.to_index()] = None;
                    self.hash ^= ZOBRIST[p.to_index()][opponent.as_index()];
                }

                // a simple (non-superko) ko point only arises when exactly one
                // stone was captured and the placed stone's group is itself a
                // single stone with a single liberty (the point just vacated).
                self.ko_point = if captured.len() == 1 {
                    let (group, liberties) = self.group_and_liberties(point);

                    if group.len() == 1 && liberties.len() == 1 {
                        Some(captured[0])
                    } else {
                        None
                    }
                } else {
                    None
                };

                self.pass_count = 0;
                self.move_number += 1;

                true
            }
        }
    }

    /// Returns every legal move for `color`, including `Move::Pass` which is
    /// always legal.
    pub fn legal_moves(&self, color: Color) -> Vec<Move> {
        let mut out = vec! [Move::Pass];

        for point in self.all_points() {
            if self.is_valid(color, point) {
                out.push(Move::Place(point));
            }
        }

        out
    }

    /// True once both sides have passed in succession.
    pub fn is_scoreable(&self) -> bool {
        self.pass_count >= 2
    }

    /// Chinese-style area score: stones-on-board plus territory whose
    /// empty region borders exactly one color. Returns `(black, white)`.
    pub fn get_score(&self) -> (usize, usize) {
        let mut black = 0;
        let mut white = 0;
        let mut visited = vec! [false; self.stones.len()];

        for point in self.all_points() {
            match self.stones[point.to_index()] {
                Some(Color::Black) => black += 1,
                Some(Color::White) => white += 1,
                None => {
                    if visited[point.to_index()] {
                        continue;
                    }

                    let (region, borders) = self.flood_empty(point, &mut visited);

                    if borders == (true, false) {
                        black += region;
                    } else if borders == (false, true) {
                        white += region;
                    }
                    // contested (seki-like) regions count for neither side.
                }
            }
        }

        (black, white)
    }

    /// Floods the empty region containing `point`, returning its size and
    /// which colors it borders as `(borders_black, borders_white)`.
    fn flood_empty(&self, point: Point, visited: &mut [bool]) -> (usize, (bool, bool)) {
        let mut queue = VecDeque::new();
        let mut size = 0;
        let mut borders_black = false;
        let mut borders_white = false;

        queue.push_back(point);
        visited[point.to_index()] = true;

        while let Some(p) = queue.pop_front() {
            size += 1;

            for n in self.neighbors(p) {
                match self.stones[n.to_index()] {
                    Some(Color::Black) => borders_black = true,
                    Some(Color::White) => borders_white = true,
                    None if !visited[n.to_index()] => {
                        visited[n.to_index()] = true;
                        queue.push_back(n);
                    },
                    None => { }
                }
            }
        }

        (size, (borders_black, borders_white))
    }

    /// Per-point ownership at the current position: `0` for black, `1` for
    /// white, `2` for a point in a contested (or still-open) empty region.
    /// Indexed exactly like `all_points()`. Used to accumulate the
    /// ownership/criticality statistics tracked per search-tree node.
    pub fn territory(&self) -> Vec<u8> {
        let mut owner = vec![2u8; self.stones.len()];
        let mut visited = vec![false; self.stones.len()];

        for point in self.all_points() {
            match self.stones[point.to_index()] {
                Some(Color::Black) => owner[point.to_index()] = 0,
                Some(Color::White) => owner[point.to_index()] = 1,
                None => {
                    if visited[point.to_index()] {
                        continue;
                    }

                    let mut region = Vec::new();
                    let mut queue = VecDeque::new();
                    let mut borders_black = false;
                    let mut borders_white = false;

                    queue.push_back(point);
                    visited[point.to_index()] = true;

                    while let Some(p) = queue.pop_front() {
                        region.push(p);

                        for n in self.neighbors(p) {
                            match self.stones[n.to_index()] {
                                Some(Color::Black) => borders_black = true,
                                Some(Color::White) => borders_white = true,
                                None if !visited[n.to_index()] => {
                                    visited[n.to_index()] = true;
                                    queue.push_back(n);
                                },
                                None => { }
                            }
                        }
                    }

                    let region_owner = match (borders_black, borders_white) {
                        (true, false) => 0,
                        (false, true) => 1,
                        _ => 2
                    };

                    for p in region {
                        owner[p.to_index()] = region_owner;
                    }
                }
            }
        }

        owner
    }

    /// The final margin from black's perspective, including komi: positive
    /// means black is ahead.
    pub fn final_score(&self) -> f32 {
        let (black, white) = self.get_score();

        black as f32 - (white as f32 + self.komi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_has_no_territory() {
        let board = Board::new(9, 7.5);

        assert_eq!(board.get_score(), (0, 0));
        assert_eq!(board.final_score(), -7.5);
    }

    #[test]
    fn simple_capture() {
        let mut board = Board::new(9, 7.5);

        board.place(Color::White, Move::Place(Point::from_xy(4, 4, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(3, 4, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(5, 4, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(4, 3, 9)));
        assert!(board.at(Point::from_xy(4, 4, 9)).is_some());

        board.place(Color::Black, Move::Place(Point::from_xy(4, 5, 9)));
        assert_eq!(board.at(Point::from_xy(4, 4, 9)), None);
    }

    #[test]
    fn suicide_is_illegal() {
        let mut board = Board::new(9, 7.5);

        board.place(Color::Black, Move::Place(Point::from_xy(0, 1, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(1, 0, 9)));

        assert!(!board.is_valid(Color::White, Point::from_xy(0, 0, 9)));
    }

    #[test]
    fn simple_ko_forbids_immediate_recapture() {
        let mut board = Board::new(9, 7.5);

        // shape (x, y), 9x9: black surrounds a lone white stone at (1, 1)
        // except for the point (1, 0), whose own neighbors are otherwise
        // white so that recapturing there leaves black with a single
        // liberty -- the classic corner-ko shape.
        board.place(Color::Black, Move::Place(Point::from_xy(0, 1, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(2, 1, 9)));
        board.place(Color::Black, Move::Place(Point::from_xy(1, 2, 9)));
        board.place(Color::White, Move::Place(Point::from_xy(0, 0, 9)));
        board.place(Color::White, Move::Place(Point::from_xy(2, 0, 9)));
        board.place(Color::White, Move::Place(Point::from_xy(1, 1, 9)));

        assert!(board.place(Color::Black, Move::Place(Point::from_xy(1, 0, 9))));
        assert_eq!(board.at(Point::from_xy(1, 1, 9)), None);

        // white may not immediately retake the ko point.
        assert!(!board.is_valid(Color::White, Point::from_xy(1, 1, 9)));

        // once black plays elsewhere, the simple ko restriction lifts.
        board.place(Color::Black, Move::Place(Point::from_xy(5, 5, 9)));
        assert!(board.is_valid(Color::White, Point::from_xy(1, 1, 9)));
    }

    #[test]
    fn two_passes_are_scoreable() {
        let mut board = Board::new(9, 7.5);

        assert!(!board.is_scoreable());
        board.place(Color::Black, Move::Pass);
        assert!(!board.is_scoreable());
        board.place(Color::White, Move::Pass);
        assert!(board.is_scoreable());
    }

    #[test]
    fn hash_changes_after_a_move() {
        let mut board = Board::new(9, 7.5);
        let before = board.hash();

        board.place(Color::Black, Move::Place(Point::from_xy(4, 4, 9)));

        assert_ne!(before, board.hash());
    }

    #[test]
    fn territory_matches_get_score_on_an_empty_board() {
        let board = Board::new(9, 7.5);
        let territory = board.territory();

        assert!(territory.iter().all(|&owner| owner == 2));
    }

    #[test]
    fn territory_assigns_surrounded_region_to_its_color() {
        let mut board = Board::new(5, 7.5);

        for (x, y) in [(0, 1), (1, 0), (2, 1), (1, 2)] {
            board.place(Color::Black, Move::Place(Point::from_xy(x, y, 5)));
        }

        let territory = board.territory();

        assert_eq!(territory[Point::from_xy(1, 1, 5).to_index()], 0);
    }
}
