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

extern crate go_board;
extern crate uct_mcts;
extern crate uct_nn;

use std::sync::Arc;
use std::thread;

use go_board::{Board, Color};

use uct_mcts::predict_service::BatchScheduler;
use uct_nn::LinearEvaluator;

#[test]
fn sixteen_concurrent_callers_against_an_eight_wide_batch_all_get_a_valid_response() {
    let scheduler = Arc::new(BatchScheduler::new(LinearEvaluator::new(5), 8));

    let handles: Vec<_> = (0..16).map(|i| {
        let scheduler = scheduler.clone();
        let color = if i % 2 == 0 { Color::Black } else { Color::White };

        thread::spawn(move || scheduler.submit(Board::new(9, 7.5), color))
    }).collect();

    for handle in handles {
        let response = handle.join().expect("worker thread panicked");

        assert_eq!(response.policy().len(), 82);
        assert!((response.policy().iter().sum::<f32>() - 1.0).abs() < 1e-3);
        assert!(response.value().is_finite());
    }
}
