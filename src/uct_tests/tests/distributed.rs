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
extern crate uct_distributed;
extern crate uct_mcts;
extern crate uct_utils;

use std::convert::TryInto;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use go_board::{Board, Color};

use uct_distributed::{DistributedClient, InferenceServer, UniformPlaneEvaluator};
use uct_mcts::predict::{Predictor, UniformPredictor};
use uct_utils::config::ServerAddr;

#[test]
fn an_unreachable_server_falls_through_to_the_local_fallback() {
    // port 1 is a privileged port nothing in this test suite is listening
    // on, so the client's initial connection attempt fails immediately and
    // `active_sockets_total` never leaves zero.
    let client = DistributedClient::new(
        vec![ServerAddr { host: "127.0.0.1".into(), port: 1 }],
        7,
        2,
        4,
        Box::new(UniformPredictor)
    );

    let board = Board::new(9, 7.5);
    let response = client.forward(&board, Color::Black);

    assert_eq!(response.policy().len(), 82);
    assert_eq!(response.value(), 0.5);
}

#[test]
fn a_client_with_a_matching_hash_gets_a_well_shaped_response_over_a_real_socket() {
    let server = InferenceServer::new(UniformPlaneEvaluator, 99, 4, 5);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    thread::spawn(move || server.listen(addr));
    thread::sleep(Duration::from_millis(50));

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(1))).unwrap();

    client.write_all(&99u64.to_le_bytes()).unwrap();

    let mut hash_buf = [0u8; 8];
    client.read_exact(&mut hash_buf).unwrap();
    assert_eq!(u64::from_le_bytes(hash_buf), 99);

    let num_points = 25;
    let request = vec![0u8; 4 * num_points]; // NUM_FEATURE_PLANES * num_points, all zero
    client.write_all(&request).unwrap();

    let mut response = vec![0u8; (num_points + 2) * 4];
    client.read_exact(&mut response).unwrap();

    let value = f32::from_ne_bytes(response[response.len() - 4..].try_into().unwrap());
    assert_eq!(value, 0.5);

    drop(client); // clean shutdown: the server handles our EOF silently.
}
