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
extern crate rand;
extern crate uct_mcts;

use go_board::{Board, Color};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use uct_mcts::engine::SearchEngine;
use uct_mcts::komi::{DynamicKomi, KomiMode};
use uct_mcts::options::StandardPolicyChecker;
use uct_mcts::predict::UniformPredictor;
use uct_mcts::simulator::Simulator;
use uct_mcts::tree::NodePool;

#[test]
fn expanding_the_root_after_a_real_move_keeps_the_played_child_s_statistics() {
    let node_pool = NodePool::new(4096);
    let engine = SearchEngine::new(UniformPredictor, Simulator::new(30));
    let board = Board::new(5, 7.5);
    let checker = StandardPolicyChecker;
    let komi = DynamicKomi::new(KomiMode::Off, board.komi(), 0);
    let mut rng = SmallRng::seed_from_u64(7);

    let root = engine.expand_root(&node_pool, None, &board, Color::Black, &checker);

    for _ in 0..200 {
        engine.playout(&node_pool, root, &board, Color::Black, &checker, &komi, &mut rng);
    }

    let (played_move, expected_count) = {
        let node = node_pool.node(root);
        let (_, child) = node.children.iter().enumerate()
            .max_by_key(|(_, c)| c.move_count())
            .expect("an empty board always has candidate moves");

        (child.mv, child.move_count())
    };

    assert!(expected_count > 0, "the most-visited child should have actually been explored");

    let mut next_board = board.clone();
    next_board.place(Color::Black, played_move);

    let next_root = engine.expand_root(&node_pool, Some(root), &next_board, Color::White, &checker);

    assert_eq!(node_pool.node(next_root).move_count(), expected_count);
}
