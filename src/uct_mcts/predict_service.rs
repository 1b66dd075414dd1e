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

//! Coalesces concurrently-submitted evaluation requests from many worker
//! threads into fixed-size batches for a single local accelerator. Mirrors
//! the shape of a GPU-bound neural network forward pass: a lone call is
//! wasteful, so whichever thread's request completes the batch pays to run
//! it, and everyone else's request rides along for free.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use go_board::{Board, Color};

use crate::predict::{PredictResponse, Predictor};

/// Runs a batch of `(Board, Color)` requests through whatever actually
/// computes value/policy -- a local model, or a stub in tests.
pub trait Accelerator: Send + Sync {
    fn forward(&self, requests: Vec<(Board, Color)>) -> Vec<PredictResponse>;
}

struct Pending {
    board: Board,
    to_move: Color,
    reply: Sender<PredictResponse>
}

/// Batches requests for a single [`Accelerator`]. Safe to share across
/// worker threads: `submit` blocks the calling thread until its request
/// has been evaluated, either as part of a batch it completed itself, or
/// one flushed early by the adaptive wait timer.
pub struct BatchScheduler<A: Accelerator> {
    accelerator: A,
    queue: Mutex<VecDeque<Pending>>,
    batch_size: usize,
    wait_time_nanos: AtomicU64
}

const MIN_WAIT_NANOS: u64 = 50_000; // 50us
const MAX_WAIT_NANOS: u64 = 5_000_000; // 5ms

impl<A: Accelerator> BatchScheduler<A> {
    pub fn new(accelerator: A, batch_size: usize) -> Self {
        Self {
            accelerator,
            queue: Mutex::new(VecDeque::with_capacity(2 * batch_size)),
            batch_size,
            wait_time_nanos: AtomicU64::new(MIN_WAIT_NANOS)
        }
    }

    /// Submits one request and blocks until it has been evaluated, either
    /// synchronously (this call completed a full batch) or asynchronously
    /// (another thread's request did, or the wait timer expired first).
    pub fn submit(&self, board: Board, to_move: Color) -> PredictResponse {
        let (reply, rx) = bounded(1);

        {
            let mut queue = self.queue.lock().expect("batch queue poisoned");
            queue.push_back(Pending { board, to_move, reply });

            if queue.len() >= self.batch_size {
                let batch = queue.drain(..self.batch_size).collect::<Vec<_>>();
                drop(queue);
                self.flush(batch);

                return rx.recv().expect("accelerator dropped a reply sender");
            }
        }

        let wait = Duration::from_nanos(self.wait_time_nanos.load(Ordering::Relaxed));

        match rx.recv_timeout(wait) {
            Ok(response) => response,
            Err(_) => {
                // nobody completed a batch in time -- flush whatever is
                // queued now, including (at least) our own request.
                let mut queue = self.queue.lock().expect("batch queue poisoned");
                let batch = queue.drain(..).collect::<Vec<_>>();
                drop(queue);

                if !batch.is_empty() {
                    self.flush(batch);
                }

                rx.recv().expect("accelerator dropped a reply sender")
            }
        }
    }

    fn flush(&self, batch: Vec<Pending>) {
        let started_at = Instant::now();
        let batch_len = batch.len();
        let requests = batch.iter().map(|p| (p.board.clone(), p.to_move)).collect();
        let responses = self.accelerator.forward(requests);

        self.tune_wait_time(batch_len, started_at.elapsed());

        for (pending, response) in batch.into_iter().zip(responses.into_iter()) {
            let _ = pending.reply.send(response);
        }
    }

    /// Grows the wait window when batches are arriving under-sized (worth
    /// waiting longer to amortize the accelerator call), and shrinks it
    /// when the accelerator is staying fed (waiting longer would only add
    /// latency).
    fn tune_wait_time(&self, batch_len: usize, _elapsed: Duration) {
        let current = self.wait_time_nanos.load(Ordering::Relaxed);

        let next = if batch_len < self.batch_size {
            current + current / 4 + 1
        } else {
            current.saturating_sub(current / 8 + 1)
        };

        self.wait_time_nanos.store(next.clamp(MIN_WAIT_NANOS, MAX_WAIT_NANOS), Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn wait_time(&self) -> Duration {
        Duration::from_nanos(self.wait_time_nanos.load(Ordering::Relaxed))
    }
}

/// Lets a `BatchScheduler` stand in directly for a `Predictor` in
/// `SearchEngine`, so a single worker's `expand_node` call transparently
/// rides along with whatever other workers submitted at the same moment.
impl<A: Accelerator> Predictor for BatchScheduler<A> {
    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn predict(&self, requests: &[(Board, Color)]) -> Vec<PredictResponse> {
        requests.iter()
            .map(|(board, color)| self.submit(board.clone(), *color))
            .collect()
    }
}
