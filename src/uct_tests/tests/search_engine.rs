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

//! End-to-end search behavior against the real `BatchScheduler` +
//! `LinearEvaluator` stack this workspace ships, rather than the
//! `UniformPredictor` stub the unit tests inside `uct_mcts` use.

extern crate go_board;
extern crate uct_mcts;
extern crate uct_nn;

use std::sync::Arc;

use go_board::{Board, Color, Move};

use uct_mcts::engine::SearchEngine;
use uct_mcts::komi::{DynamicKomi, KomiMode};
use uct_mcts::options::{StandardDeterministicSearch, StandardPolicyChecker};
use uct_mcts::pool::Pool;
use uct_mcts::predict_service::BatchScheduler;
use uct_mcts::time_control::RolloutLimit;
use uct_mcts::tree::NodePool;

use uct_nn::LinearEvaluator;

#[test]
fn a_single_threaded_fixed_playout_search_returns_a_real_move() {
    let predictor = BatchScheduler::new(LinearEvaluator::new(1), 1);
    let node_pool = Arc::new(NodePool::new(4096));
    let engine = Arc::new(SearchEngine::new(predictor, uct_mcts::Simulator::new(30)));
    let board = Board::new(9, 7.5);
    let checker = StandardPolicyChecker;

    let root = engine.expand_root(&node_pool, None, &board, Color::Black, &checker);
    let pool = Pool::new(engine, node_pool.clone(), 1);

    pool.enqueue(
        root,
        board,
        Color::Black,
        Box::new(StandardDeterministicSearch::new()),
        Box::new(RolloutLimit::new(100)),
        DynamicKomi::new(KomiMode::Off, 7.5, 0)
    );

    let node = node_pool.node(root);
    assert!(node.move_count() >= 100);

    let best = node.children.iter().max_by_key(|c| c.move_count()).expect("an empty 9x9 board has candidates");
    assert!(best.move_count() > 0);
    assert!(matches!(best.mv, Move::Place(_) | Move::Pass));
}

#[test]
fn generate_move_on_a_board_with_no_legal_moves_passes() {
    use uct_mcts::predict::UniformPredictor;
    use uct_mcts::SearchController;

    // a 1x1 board has no legal placements for either color once the
    // single point is filled, so the only candidate is pass.
    let mut board = Board::new(1, 7.5);
    board.place(Color::Black, Move::Place(go_board::Point::from_xy(0, 0, 1)));

    let controller = SearchController::new(UniformPredictor, 64, 1);
    let generated = controller.generate_move(&board, Color::White, Box::new(StandardDeterministicSearch::new()));

    assert_eq!(generated.mv, Move::Pass);
}
