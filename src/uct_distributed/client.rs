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

//! Client half of the remote-evaluator pair: a pool of persistent TCP
//! workers spread across the configured servers, with round-robin
//! dispatch, oversubscription-aware skipping, a 500 ms per-request bound,
//! and a background task that keeps trying to reach the configured
//! worker count. Falls through to a local [`Predictor`] whenever no
//! remote socket is currently available, rather than blocking forever --
//! this is the one place this crate intentionally diverges from the
//! "sleep and retry forever" behavior of the implementation it was
//! modeled on (see `DESIGN.md`).

use std::collections::VecDeque;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use go_board::{Board, Color, Features};

use uct_mcts::{PredictResponse, Predictor};
use uct_utils::config::ServerAddr;

use crate::wire;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);
const REPROBE_INTERVAL: Duration = Duration::from_secs(1);

struct RequestState {
    response: Option<PredictResponse>,
    /// A duplicate handle onto the socket the worker currently holding
    /// this request is using, so a timed-out requester can force the
    /// connection closed without racing the worker for ownership of the
    /// original `TcpStream`.
    shutdown_handle: Option<TcpStream>,
    /// Set by a requester that gave up before any worker picked the
    /// request up; the worker that eventually pops it discards the
    /// output instead of computing and signalling.
    poisoned: bool
}

struct PendingRequest {
    planes: Vec<f32>,
    num_points: usize,
    state: Mutex<RequestState>,
    ready: Condvar
}

impl PendingRequest {
    fn new(planes: Vec<f32>, num_points: usize) -> Self {
        Self {
            planes,
            num_points,
            state: Mutex::new(RequestState { response: None, shutdown_handle: None, poisoned: false }),
            ready: Condvar::new()
        }
    }
}

struct ServerHandle {
    addr: ServerAddr,
    active_sockets: AtomicUsize,
    active_pending: AtomicUsize,
    queue: Mutex<VecDeque<Arc<PendingRequest>>>,
    has_work: Condvar
}

impl ServerHandle {
    fn new(addr: ServerAddr) -> Self {
        Self {
            addr,
            active_sockets: AtomicUsize::new(0),
            active_pending: AtomicUsize::new(0),
            queue: Mutex::new(VecDeque::new()),
            has_work: Condvar::new()
        }
    }
}

fn connect_one(addr: &ServerAddr, model_hash: u64) -> io::Result<TcpStream> {
    let socket_addr = (addr.host.as_str(), addr.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not resolve server address"))?;

    let stream = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT)?;
    stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;
    stream.set_write_timeout(Some(CONNECT_TIMEOUT))?;

    wire::write_hash(&mut &stream, model_hash)?;
    let remote_hash = wire::read_hash(&mut &stream)?;

    if remote_hash != model_hash {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "model hash mismatch"));
    }

    // handshake done -- give ordinary requests their own, longer-lived
    // timeout budget.
    stream.set_read_timeout(Some(REQUEST_TIMEOUT))?;
    stream.set_write_timeout(Some(REQUEST_TIMEOUT))?;

    Ok(stream)
}

/// One persistent connection's life: pop a request, hand the peer its
/// planes, wait for the response, hand it back. On any I/O error the
/// worker requeues whatever it was holding (rather than letting it
/// silently expire) and exits; the reprobe task is responsible for
/// replacing the lost socket.
fn worker_loop(server: Arc<ServerHandle>, mut stream: TcpStream, active_sockets_total: Arc<AtomicUsize>) {
    loop {
        let entry = {
            let mut queue = server.queue.lock().expect("server queue poisoned");

            while queue.is_empty() {
                queue = server.has_work.wait(queue).expect("server queue poisoned");
            }

            queue.pop_front().expect("queue was just observed non-empty")
        };

        {
            let mut state = entry.state.lock().expect("request state poisoned");

            if state.poisoned {
                continue;
            }

            state.shutdown_handle = stream.try_clone().ok();
        }

        let result = wire::write_request(&mut stream, &entry.planes)
            .and_then(|_| wire::read_response(&mut stream, entry.num_points));

        match result {
            Ok((policy, value)) => {
                let mut state = entry.state.lock().expect("request state poisoned");
                state.shutdown_handle = None;
                state.response = Some(PredictResponse::new(value, policy));
                entry.ready.notify_all();
            }
            Err(_) => {
                server.active_sockets.fetch_sub(1, Ordering::AcqRel);
                active_sockets_total.fetch_sub(1, Ordering::AcqRel);

                // don't strand the request this socket was holding --
                // put it back for another worker to pick up.
                server.queue.lock().expect("server queue poisoned").push_front(entry);
                server.has_work.notify_one();

                return;
            }
        }
    }
}

/// The client half of the remote-evaluator pair. Implements
/// `uct_mcts::Predictor` directly, so it plugs into `SearchEngine` exactly
/// like a `BatchScheduler` would.
pub struct DistributedClient {
    servers: Vec<Arc<ServerHandle>>,
    ptr: AtomicUsize,
    active_sockets_total: Arc<AtomicUsize>,
    active_pending_total: AtomicUsize,
    model_hash: u64,
    configured_threads: usize,
    batch_size: usize,
    running: Arc<AtomicBool>,
    fallback: Box<dyn Predictor + Send + Sync>,
    reprobe: Mutex<Option<thread::JoinHandle<()>>>
}

/// Tops up every server's connection count towards its fair share of
/// whatever capacity is still missing. Connection failures are silent --
/// the caller (either `new` or the reprobe task) will simply try again
/// later.
fn top_up_servers(servers: &[Arc<ServerHandle>], active_sockets_total: &Arc<AtomicUsize>, model_hash: u64, configured_threads: usize) {
    if servers.is_empty() {
        return;
    }

    let remaining = configured_threads.saturating_sub(active_sockets_total.load(Ordering::Acquire));

    if remaining == 0 {
        return;
    }

    let per_server = (remaining + servers.len() - 1) / servers.len();

    for server in servers {
        for _ in 0..per_server {
            let stream = match connect_one(&server.addr, model_hash) {
                Ok(stream) => stream,
                Err(_) => continue
            };

            server.active_sockets.fetch_add(1, Ordering::AcqRel);
            active_sockets_total.fetch_add(1, Ordering::AcqRel);

            let server = server.clone();
            let active_sockets_total = active_sockets_total.clone();

            thread::spawn(move || worker_loop(server, stream, active_sockets_total));
        }
    }
}

impl DistributedClient {
    /// Builds the client and immediately tries to reach `configured_threads`
    /// connections spread across `servers`, then starts the background
    /// reprobe task. `fallback` is used for every `predict` call made while
    /// no server currently has a live socket.
    pub fn new(
        servers: Vec<ServerAddr>,
        model_hash: u64,
        configured_threads: usize,
        batch_size: usize,
        fallback: Box<dyn Predictor + Send + Sync>
    ) -> Self {
        let servers: Vec<Arc<ServerHandle>> = servers.into_iter().map(|addr| Arc::new(ServerHandle::new(addr))).collect();
        let active_sockets_total = Arc::new(AtomicUsize::new(0));
        let configured_threads = configured_threads.max(1);
        let running = Arc::new(AtomicBool::new(true));

        top_up_servers(&servers, &active_sockets_total, model_hash, configured_threads);

        let reprobe = {
            let servers = servers.clone();
            let active_sockets_total = active_sockets_total.clone();
            let running = running.clone();

            thread::spawn(move || {
                while running.load(Ordering::Acquire) {
                    thread::sleep(REPROBE_INTERVAL);

                    if active_sockets_total.load(Ordering::Acquire) < configured_threads {
                        top_up_servers(&servers, &active_sockets_total, model_hash, configured_threads);
                    }
                }
            })
        };

        Self {
            servers,
            ptr: AtomicUsize::new(0),
            active_sockets_total,
            active_pending_total: AtomicUsize::new(0),
            model_hash,
            configured_threads,
            batch_size: batch_size.max(1),
            running,
            fallback,
            reprobe: Mutex::new(Some(reprobe))
        }
    }

    /// Evaluates one position. Falls straight through to the local
    /// fallback predictor if no server currently has a live socket;
    /// otherwise picks a server round-robin (batched `batch_size`-wide so
    /// consecutive positions from the same wave land together), skips
    /// over-loaded servers, and retries on dispatch timeout.
    pub fn forward(&self, board: &Board, color: Color) -> PredictResponse {
        let planes = board.get_features(color, go_board::symmetry::Transform::Identity);
        let num_points = board.size() * board.size();

        loop {
            if self.servers.is_empty() || self.active_sockets_total.load(Ordering::Acquire) == 0 {
                return self.fallback.predict(&[(board.clone(), color)]).remove(0);
            }

            let ptr = self.ptr.fetch_add(1, Ordering::Relaxed);
            let server = &self.servers[(ptr / self.batch_size) % self.servers.len()];
            let server_sockets = server.active_sockets.load(Ordering::Acquire);

            if server_sockets == 0 {
                continue;
            }

            let server_pending = server.active_pending.load(Ordering::Acquire);

            if server_pending >= server_sockets {
                let pool_pending = self.active_pending_total.load(Ordering::Acquire);
                let pool_sockets = self.active_sockets_total.load(Ordering::Acquire);

                // server_pending / server_sockets > pool_pending / pool_sockets,
                // cross-multiplied to avoid division.
                if server_pending * pool_sockets > pool_pending * server_sockets {
                    continue;
                }
            }

            let entry = Arc::new(PendingRequest::new(planes.clone(), num_points));

            server.queue.lock().expect("server queue poisoned").push_back(entry.clone());
            server.active_pending.fetch_add(1, Ordering::AcqRel);
            self.active_pending_total.fetch_add(1, Ordering::AcqRel);
            server.has_work.notify_one();

            let guard = entry.state.lock().expect("request state poisoned");
            let (mut state, wait_result) = entry
                .ready
                .wait_timeout_while(guard, REQUEST_TIMEOUT, |state| state.response.is_none())
                .expect("request state poisoned");

            server.active_pending.fetch_sub(1, Ordering::AcqRel);
            self.active_pending_total.fetch_sub(1, Ordering::AcqRel);

            if wait_result.timed_out() && state.response.is_none() {
                if let Some(handle) = state.shutdown_handle.take() {
                    let _ = handle.shutdown(Shutdown::Both);
                } else {
                    state.poisoned = true;
                }

                drop(state);
                continue;
            }

            if let Some(response) = state.response.take() {
                return response;
            }
        }
    }

}

impl Predictor for DistributedClient {
    fn max_batch_size(&self) -> usize {
        1
    }

    fn predict(&self, requests: &[(Board, Color)]) -> Vec<PredictResponse> {
        requests.iter().map(|(board, color)| self.forward(board, *color)).collect()
    }
}

impl Drop for DistributedClient {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.reprobe.lock().expect("reprobe handle lock poisoned").take() {
            let _ = handle.join();
        }

        // per-socket worker threads are intentionally left detached, the
        // same way the implementation this was modeled on never joins
        // them either -- they simply exit the next time their server's
        // queue hands them a poisoned request or their socket errors out.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uct_mcts::predict::UniformPredictor;

    #[test]
    fn falls_through_to_the_local_predictor_when_no_server_is_reachable() {
        let client = DistributedClient::new(
            vec![ServerAddr { host: "127.0.0.1".into(), port: 1 }],
            42,
            2,
            1,
            Box::new(UniformPredictor)
        );

        let board = Board::new(5, 7.5);
        let response = client.forward(&board, Color::Black);

        assert_eq!(response.policy().len(), 26);
    }

    #[test]
    fn with_no_servers_configured_every_call_uses_the_fallback() {
        let client = DistributedClient::new(vec![], 42, 2, 1, Box::new(UniformPredictor));
        let board = Board::new(9, 7.5);

        let response = client.forward(&board, Color::White);

        assert_eq!(response.policy().len(), 82);
    }
}
