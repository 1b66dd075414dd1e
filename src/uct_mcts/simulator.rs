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

//! A light rollout policy used to finish out a position once the tree
//! search has bottomed out, without needing a trained network. Real
//! engines weight candidate moves by a learned pattern table; this crate
//! ships only the reference uniform-random table described by the
//! ambient spec -- good enough to terminate a playout, not good enough to
//! play strong Go on its own.

use rand::Rng;

use go_board::{Board, Color, Move};

use crate::options::PolicyChecker;

/// Relative sampling weight for a candidate move, indexed by how far it is
/// (in board steps) from the center of the board. Pure uniform weighting
/// (a flat `1.0` everywhere) would be just as defensible; this shape gives
/// a mild center bias so random rollouts don't spend all their moves
/// shuffling stones along the first line.
const RATING_BY_RING: [f32; 4] = [1.0, 1.25, 1.1, 0.9];

fn rating_of(board: &Board, point: go_board::Point) -> f32 {
    let size = board.size();
    let (x, y) = point.to_xy(size);
    let center = (size as f32 - 1.0) / 2.0;
    let dist = ((x as f32 - center).abs().max((y as f32 - center).abs()) / center.max(1.0) * 3.0) as usize;

    RATING_BY_RING[dist.min(RATING_BY_RING.len() - 1)]
}

/// Plays a capped-length random rollout from `board` to (near-)completion
/// and returns the final score from black's perspective, same convention
/// as `Board::final_score`.
pub struct Simulator {
    pub max_moves: usize
}

impl Simulator {
    pub fn new(max_moves: usize) -> Self {
        Self { max_moves }
    }

    pub fn rollout(&self, board: &Board, color: Color, checker: &dyn PolicyChecker, rng: &mut impl Rng) -> f32 {
        self.play_to_end(board, color, checker, rng).final_score()
    }

    /// Same as `rollout`, but also returns the per-point ownership of the
    /// finished position, for folding into a node's ownership/criticality
    /// statistics.
    pub fn rollout_with_ownership(&self, board: &Board, color: Color, checker: &dyn PolicyChecker, rng: &mut impl Rng) -> (f32, Vec<u8>) {
        let finished = self.play_to_end(board, color, checker, rng);

        (finished.final_score(), finished.territory())
    }

    fn play_to_end(&self, board: &Board, mut color: Color, checker: &dyn PolicyChecker, rng: &mut impl Rng) -> Board {
        let mut board = board.clone();
        let mut moves_played = 0;

        while !board.is_scoreable() && moves_played < self.max_moves {
            let candidates: Vec<Move> = board.legal_moves(color).into_iter()
                .filter(|mv| match mv.point() {
                    Some(point) => checker.should_include(&board, color, point),
                    None => true
                })
                .collect();

            let mv = if candidates.len() <= 1 {
                Move::Pass
            } else {
                let weights: Vec<f32> = candidates.iter()
                    .map(|mv| mv.point().map(|p| rating_of(&board, p)).unwrap_or(0.01))
                    .collect();
                let total: f32 = weights.iter().sum();
                let mut pick = rng.gen::<f32>() * total;
                let mut chosen = candidates.len() - 1;

                for (i, w) in weights.iter().enumerate() {
                    if pick <= *w {
                        chosen = i;
                        break;
                    }
                    pick -= *w;
                }

                candidates[chosen]
            };

            board.place(color, mv);
            color = color.opposite();
            moves_played += 1;
        }

        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StandardPolicyChecker;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn rollout_terminates_within_the_move_cap() {
        let board = Board::new(5, 7.5);
        let simulator = Simulator::new(200);
        let mut rng = SmallRng::seed_from_u64(42);

        let score = simulator.rollout(&board, Color::Black, &StandardPolicyChecker, &mut rng);

        assert!(score.is_finite());
    }

    #[test]
    fn empty_board_immediate_double_pass_scores_to_komi() {
        let board = Board::new(5, 7.5);
        let simulator = Simulator::new(0);
        let mut rng = SmallRng::seed_from_u64(1);

        let score = simulator.rollout(&board, Color::Black, &StandardPolicyChecker, &mut rng);

        assert_eq!(score, -7.5);
    }
}
