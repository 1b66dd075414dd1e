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

//! Server half of the remote-evaluator pair: accepts TCP connections up to
//! a thread cap and serves `(planes) -> (policy, value)` requests until the
//! peer closes.

use std::io;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use go_board::features::NUM_FEATURE_PLANES;

use crate::wire;

/// Evaluates one already wire-decoded `C*N` feature-plane request. This is
/// the seam `InferenceServer` dispatches to -- a real deployment plugs in
/// whatever runs the actual network; this crate ships only a uniform
/// reference implementation so the server is runnable standalone.
pub trait PlaneEvaluator: Send + Sync {
    /// Returns `(policy, value)`, where `policy` has `num_points + 1`
    /// entries (the last one is the pass probability).
    fn evaluate(&self, planes: &[f32], num_points: usize) -> (Vec<f32>, f32);
}

/// A uniform prior over every point plus pass, and a coin-flip value.
/// Mirrors `uct_mcts::predict::UniformPredictor`, but at the raw-plane
/// layer the wire protocol actually speaks.
#[derive(Clone, Copy, Default)]
pub struct UniformPlaneEvaluator;

impl PlaneEvaluator for UniformPlaneEvaluator {
    fn evaluate(&self, _planes: &[f32], num_points: usize) -> (Vec<f32>, f32) {
        (vec![1.0 / (num_points + 1) as f32; num_points + 1], 0.5)
    }
}

pub struct InferenceServer<E: PlaneEvaluator> {
    evaluator: Arc<E>,
    model_hash: u64,
    thread_cap: usize,
    num_points: usize
}

impl<E: PlaneEvaluator + 'static> InferenceServer<E> {
    pub fn new(evaluator: E, model_hash: u64, thread_cap: usize, board_size: usize) -> Self {
        Self { evaluator: Arc::new(evaluator), model_hash, thread_cap, num_points: board_size * board_size }
    }

    /// Accepts connections forever. Each connection gets its own thread,
    /// up to `thread_cap`; beyond that a newcomer is dropped immediately,
    /// without a handshake.
    pub fn listen(&self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        let active = Arc::new(AtomicUsize::new(0));

        for incoming in listener.incoming() {
            let stream = match incoming {
                Ok(stream) => stream,
                Err(_) => continue
            };

            let previous = active.fetch_add(1, Ordering::AcqRel);

            if previous >= self.thread_cap {
                active.fetch_sub(1, Ordering::AcqRel);
                drop(stream);
                continue;
            }

            let evaluator = self.evaluator.clone();
            let active = active.clone();
            let model_hash = self.model_hash;
            let num_points = self.num_points;

            thread::spawn(move || {
                let _ = Self::serve_connection(stream, &*evaluator, model_hash, num_points);
                active.fetch_sub(1, Ordering::AcqRel);
            });
        }

        Ok(())
    }

    fn serve_connection(mut stream: TcpStream, evaluator: &E, model_hash: u64, num_points: usize) -> io::Result<()> {
        let _client_hash = wire::read_hash(&mut stream)?;
        wire::write_hash(&mut stream, model_hash)?;

        let plane_bytes = NUM_FEATURE_PLANES * num_points;

        loop {
            let raw = match wire::read_request(&mut stream, plane_bytes) {
                Ok(raw) => raw,
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(err) => return Err(err)
            };

            let planes = wire::decode_request(&raw);
            let (policy, value) = evaluator.evaluate(&planes, num_points);

            wire::write_response(&mut stream, &policy, value)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;
    use std::time::Duration;

    #[test]
    fn a_matching_handshake_then_one_request_round_trips() {
        let server = InferenceServer::new(UniformPlaneEvaluator, 42, 4, 3);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handle = thread::spawn(move || server.listen(addr));

        // give the listener a moment to bind.
        thread::sleep(Duration::from_millis(50));

        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        wire::write_hash(&mut client, 42).unwrap();
        let remote_hash = wire::read_hash(&mut client).unwrap();
        assert_eq!(remote_hash, 42);

        wire::write_request(&mut client, &vec![0.0; NUM_FEATURE_PLANES * 9]).unwrap();
        let (policy, value) = wire::read_response(&mut client, 9).unwrap();

        assert_eq!(policy.len(), 10);
        assert_eq!(value, 0.5);

        drop(client);
        drop(handle); // listener thread runs forever; dropping the handle just detaches it.
    }
}
