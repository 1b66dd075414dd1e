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

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use go_board::features::NUM_FEATURE_PLANES;
use go_board::symmetry::Transform;
use go_board::{Board, Color, Features};

use uct_mcts::predict::PredictResponse;
use uct_mcts::predict_service::Accelerator;

/// One weight per feature plane plus a bias, read out per point for the
/// policy softmax and summed for the value sigmoid. Not trained on
/// anything -- its only job is to produce a non-uniform, deterministic
/// response shaped like a real network's, so a `BatchScheduler` wrapping
/// it exercises the exact same code paths as one wrapping a trained model.
pub struct LinearEvaluator {
    plane_weights: [f32; NUM_FEATURE_PLANES],
    bias: f32
}

impl LinearEvaluator {
    pub fn new(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut plane_weights = [0.0f32; NUM_FEATURE_PLANES];

        for w in plane_weights.iter_mut() {
            *w = rng.gen_range(-1.0..1.0);
        }

        Self { plane_weights, bias: rng.gen_range(-0.1..0.1) }
    }

    fn score(&self, planes: &[f32], num_points: usize) -> PredictResponse {
        let mut logits = vec![0.0f32; num_points + 1];
        let mut total = self.bias;

        for point in 0..num_points {
            let mut logit = 0.0;

            for (plane, &w) in self.plane_weights.iter().enumerate() {
                logit += planes[plane * num_points + point] * w;
            }

            logits[point] = logit;
            total += logit;
        }

        // the pass logit gets no signal of its own -- it only competes on
        // an even footing with however confident the point logits are.
        logits[num_points] = 0.0;

        let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
        let sum: f32 = exp.iter().sum();
        let policy: Vec<f32> = exp.into_iter().map(|e| e / sum).collect();

        let value = 1.0 / (1.0 + (-total / num_points.max(1) as f32).exp());

        PredictResponse::new(value, policy)
    }
}

impl Default for LinearEvaluator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Accelerator for LinearEvaluator {
    fn forward(&self, requests: Vec<(Board, Color)>) -> Vec<PredictResponse> {
        requests.into_iter()
            .map(|(board, color)| {
                let num_points = board.size() * board.size();
                let planes = board.get_features(color, Transform::Identity);

                self.score(&planes, num_points)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_sums_to_one_and_value_is_finite() {
        let evaluator = LinearEvaluator::new(7);
        let board = Board::new(9, 7.5);
        let responses = evaluator.forward(vec![(board, Color::Black)]);

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].policy().len(), 82);

        let sum: f32 = responses[0].policy().iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(responses[0].value().is_finite());
        assert!(responses[0].value() >= 0.0 && responses[0].value() <= 1.0);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = LinearEvaluator::new(3);
        let b = LinearEvaluator::new(3);
        let board = Board::new(5, 7.5);

        let ra = a.forward(vec![(board.clone(), Color::White)]);
        let rb = b.forward(vec![(board, Color::White)]);

        assert_eq!(ra[0].policy(), rb[0].policy());
    }
}
