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

//! The seam between the search core and whatever evaluates a position --
//! a local accelerator, a remote inference server, or (in tests) a stub.
//! The search core only ever talks to this trait; everything about how the
//! network itself is trained or run is somebody else's problem.

use go_board::{Board, Color};

/// The value and policy the search core needs for one position. `policy`
/// is indexed exactly like `Board::all_points()`, with one extra trailing
/// entry for `Move::Pass`.
#[derive(Clone, Debug)]
pub struct PredictResponse {
    value: f32,
    policy: Vec<f32>
}

impl PredictResponse {
    pub fn new(value: f32, policy: Vec<f32>) -> Self {
        Self { value, policy }
    }

    /// The value from the perspective of the color that was asked about,
    /// folded into `[0, 1]` (`1.0` meaning a certain win).
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn policy(&self) -> &[f32] {
        &self.policy
    }
}

/// Evaluates positions, synchronously, one request at a time or in a
/// caller-chosen batch. Implementors decide for themselves whether that
/// means running a local model or shelling out to a remote server.
pub trait Predictor: Send + Sync {
    /// The largest number of positions this predictor can usefully
    /// evaluate in one call -- callers use this to size their batches.
    fn max_batch_size(&self) -> usize;

    /// Evaluates `requests` and returns one response per request, in the
    /// same order.
    fn predict(&self, requests: &[(Board, Color)]) -> Vec<PredictResponse>;
}

/// A uniform prior over every legal move and a coin-flip value. Used as a
/// reference evaluator when no real network is available, and in tests
/// that only care about search mechanics.
#[derive(Clone, Copy, Default)]
pub struct UniformPredictor;

impl Predictor for UniformPredictor {
    fn max_batch_size(&self) -> usize {
        1
    }

    fn predict(&self, requests: &[(Board, Color)]) -> Vec<PredictResponse> {
        requests.iter()
            .map(|(board, _)| {
                let num_points = board.size() * board.size();

                PredictResponse::new(0.5, vec![1.0; num_points + 1])
            })
            .collect()
    }
}

/// Always returns a non-finite policy, used in tests to exercise the
/// "no finite candidates" fallback path in the search core.
#[derive(Clone, Copy, Default)]
pub struct NanPredictor;

impl Predictor for NanPredictor {
    fn max_batch_size(&self) -> usize {
        1
    }

    fn predict(&self, requests: &[(Board, Color)]) -> Vec<PredictResponse> {
        requests.iter()
            .map(|(board, _)| {
                let num_points = board.size() * board.size();

                PredictResponse::new(0.5, vec![std::f32::NEG_INFINITY; num_points + 1])
            })
            .collect()
    }
}

/// Lets a boxed trait object stand in for a concrete predictor wherever a
/// `SearchController<P: Predictor>` is built from a choice made at runtime
/// (e.g. `goctl` picking between a local accelerator and a distributed
/// client depending on what was passed on the command line).
impl Predictor for Box<dyn Predictor + Send + Sync> {
    fn max_batch_size(&self) -> usize {
        (**self).max_batch_size()
    }

    fn predict(&self, requests: &[(Board, Color)]) -> Vec<PredictResponse> {
        (**self).predict(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use go_board::Board;

    #[test]
    fn uniform_predictor_covers_every_point_plus_pass() {
        let board = Board::new(9, 7.5);
        let responses = UniformPredictor.predict(&[(board, Color::Black)]);

        assert_eq!(responses[0].policy().len(), 82);
    }
}
