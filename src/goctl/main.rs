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

//! A thin GTP front-end over `uct_mcts::SearchController`. Ad hoc by design
//! -- flags are parsed with hand-written regexes instead of a CLI crate,
//! the same way the rest of this workspace prefers `regex` over a
//! heavier-weight dependency it does not otherwise need.

extern crate go_board;
extern crate uct_distributed;
extern crate uct_mcts;
extern crate uct_nn;
extern crate uct_utils;
#[macro_use] extern crate lazy_static;
extern crate regex;

mod gtp;

use std::io::{self, BufRead, Write};

use regex::Regex;

use std::time::Duration;

use uct_distributed::DistributedClient;
use uct_mcts::predict::Predictor;
use uct_mcts::predict_service::BatchScheduler;
use uct_mcts::{SearchController, SearchMode};
use uct_nn::LinearEvaluator;

/// The subset of `uct_utils::config`'s tunables that `goctl` also accepts
/// as `--flag=value` command line arguments, overriding the environment.
struct Args {
    threads: usize,
    playouts: usize,
    main_time_millis: u64,
    batch_size: usize,
    servers: String,
    ponder: bool,
    model_hash: u64
}

impl Args {
    fn parse(raw: &[String]) -> Self {
        lazy_static! {
            static ref FLAG: Regex = Regex::new(r"^--([a-zA-Z][a-zA-Z\-]*)=(.*)$").unwrap();
        }

        let mut args = Args {
            threads: *uct_utils::config::NUM_THREADS,
            playouts: *uct_utils::config::NUM_ROLLOUT,
            main_time_millis: 0,
            batch_size: *uct_utils::config::BATCH_SIZE,
            servers: uct_utils::config::SERVERS.clone(),
            ponder: *uct_utils::config::PONDER,
            model_hash: *uct_utils::config::MODEL_HASH
        };

        for arg in raw {
            let captures = match FLAG.captures(arg) {
                Some(captures) => captures,
                None => continue // not a recognized flag, silently ignored
            };
            let value = &captures[2];

            match &captures[1] {
                "threads" => args.threads = value.parse().unwrap_or(args.threads),
                "playouts" => args.playouts = value.parse().unwrap_or(args.playouts),
                "time" => args.main_time_millis = value.parse().unwrap_or(args.main_time_millis),
                "batch-size" => args.batch_size = value.parse().unwrap_or(args.batch_size),
                "servers" => args.servers = value.to_string(),
                "ponder" => args.ponder = value.parse().unwrap_or(args.ponder),
                "model-hash" => args.model_hash = value.parse().unwrap_or(args.model_hash),
                _ => {} // unknown flag, ignored rather than treated as fatal
            }
        }

        args
    }
}

/// Builds the predictor `goctl` searches with: a `DistributedClient` talking
/// to the configured remote servers (falling back to a local accelerator if
/// none of them answer), or just the local accelerator if no servers were
/// given at all.
fn build_predictor(args: &Args) -> Box<dyn Predictor + Send + Sync> {
    let servers = match uct_utils::config::parse_server_list(&args.servers) {
        Ok(servers) => servers,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    let local: Box<dyn Predictor + Send + Sync> =
        Box::new(BatchScheduler::new(LinearEvaluator::new(args.model_hash), args.batch_size));

    if servers.is_empty() {
        local
    } else {
        Box::new(DistributedClient::new(servers, args.model_hash, args.threads, args.batch_size, local))
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&raw_args);

    let predictor = build_predictor(&args);
    let mut controller = SearchController::new(predictor, *uct_utils::config::UCT_HASH_SIZE, args.threads);

    if args.main_time_millis > 0 {
        controller.set_time_settings(Duration::from_millis(args.main_time_millis), Duration::ZERO, 0);
        controller.set_mode(SearchMode::Tournament);
    } else {
        controller.set_mode(SearchMode::FixedPlayouts { playouts: args.playouts });
    }

    let mut session = gtp::Session::new(controller, args.ponder);
    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break
        };

        match session.handle(&line) {
            Some(reply) => {
                let mut out = stdout.lock();
                let _ = write!(out, "{}", reply);
                let _ = out.flush();
            }
            None => break // "quit" was received
        }
    }
}
