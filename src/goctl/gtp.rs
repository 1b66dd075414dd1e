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

//! The smallest useful slice of the Go Text Protocol: enough for a human
//! or a tournament manager to drive a game (`boardsize`, `clear_board`,
//! `komi`, `play`, `genmove`) without pulling in a dedicated GTP crate.

use go_board::{Board, Color, Move, Point};
use uct_mcts::options::StandardDeterministicSearch;
use uct_mcts::predict::Predictor;
use uct_mcts::SearchController;

const KNOWN_COMMANDS: &[&str] = &[
    "protocol_version", "name", "version", "list_commands", "known_command",
    "boardsize", "clear_board", "komi", "play", "genmove", "quit"
];

/// Parses a GTP vertex like `Q16` or `pass` into a `Move`. Column letters
/// skip `I` (to avoid confusion with `1`), matching every other Go client.
fn parse_vertex(vertex: &str, size: usize) -> Option<Move> {
    if vertex.eq_ignore_ascii_case("pass") {
        return Some(Move::Pass);
    }

    let mut chars = vertex.chars();
    let column = chars.next()?.to_ascii_uppercase();
    let row: usize = chars.as_str().parse().ok()?;

    if row == 0 || row > size {
        return None;
    }

    let column_index = if column < 'I' {
        (column as u8 - b'A') as usize
    } else if column > 'I' {
        (column as u8 - b'A' - 1) as usize
    } else {
        return None // 'I' itself is never a valid column
    };

    if column_index >= size {
        return None;
    }

    Some(Move::Place(Point::from_xy(column_index, row - 1, size)))
}

fn format_vertex(point: Point, size: usize) -> String {
    let (x, y) = point.to_xy(size);
    let column = if x < 8 { b'A' + x as u8 } else { b'A' + x as u8 + 1 };

    format!("{}{}", column as char, y + 1)
}

fn parse_color(token: &str) -> Option<Color> {
    match token.to_ascii_lowercase().as_str() {
        "b" | "black" => Some(Color::Black),
        "w" | "white" => Some(Color::White),
        _ => None
    }
}

/// Holds the board position a GTP session is currently playing on, and the
/// engine it asks for moves. Single-threaded by design -- GTP is a
/// request/response text protocol, there is never more than one command in
/// flight.
pub struct Session<P: Predictor + 'static> {
    controller: SearchController<P>,
    board: Board,
    to_move: Color,
    ponder: bool
}

impl<P: Predictor + 'static> Session<P> {
    pub fn new(controller: SearchController<P>, ponder: bool) -> Self {
        Self { controller, board: Board::new(19, 7.5), to_move: Color::Black, ponder }
    }

    /// Handles one line of input. Returns `None` only for `quit`, signaling
    /// the caller to stop reading; any other command (even a malformed
    /// one) produces a reply.
    pub fn handle(&mut self, line: &str) -> Option<String> {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            return Some(String::new());
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        match command {
            "quit" => {
                self.controller.stop_pondering();
                None
            }
            "protocol_version" => Some(ok("2")),
            "name" => Some(ok("goctl")),
            "version" => Some(ok("0.0.0")),
            "list_commands" => Some(ok(&KNOWN_COMMANDS.join("\n"))),
            "known_command" => {
                let known = rest.first().map(|c| KNOWN_COMMANDS.contains(c)).unwrap_or(false);
                Some(ok(if known { "true" } else { "false" }))
            }
            "boardsize" => match rest.first().and_then(|s| s.parse::<usize>().ok()) {
                Some(size) if size > 0 => {
                    self.board = Board::new(size, self.board.komi());
                    Some(ok(""))
                }
                _ => Some(err("invalid size"))
            },
            "clear_board" => {
                self.controller.stop_pondering();
                self.board = Board::new(self.board.size(), self.board.komi());
                self.to_move = Color::Black;
                Some(ok(""))
            }
            "komi" => match rest.first().and_then(|s| s.parse::<f32>().ok()) {
                Some(komi) => {
                    self.board = Board::new(self.board.size(), komi);
                    Some(ok(""))
                }
                None => Some(err("invalid komi"))
            },
            "play" => self.handle_play(&rest),
            "genmove" => self.handle_genmove(&rest),
            _ => Some(err("unknown command"))
        }
    }

    fn handle_play(&mut self, rest: &[&str]) -> Option<String> {
        let (color, vertex) = match (rest.first(), rest.get(1)) {
            (Some(color), Some(vertex)) => (*color, *vertex),
            _ => return Some(err("syntax error"))
        };

        let color = match parse_color(color) {
            Some(color) => color,
            None => return Some(err("invalid color"))
        };

        let mv = match parse_vertex(vertex, self.board.size()) {
            Some(mv) => mv,
            None => return Some(err("invalid vertex"))
        };

        if !self.board.place(color, mv) {
            return Some(err("illegal move"));
        }

        self.to_move = color.opposite();
        Some(ok(""))
    }

    fn handle_genmove(&mut self, rest: &[&str]) -> Option<String> {
        self.controller.stop_pondering();

        let color = match rest.first().and_then(|c| parse_color(c)) {
            Some(color) => color,
            None => return Some(err("invalid color"))
        };

        let options = Box::new(StandardDeterministicSearch::new());
        let generated = self.controller.generate_move(&self.board, color, options);

        if generated.mv == Move::Resign {
            return Some(ok("resign"));
        }

        self.board.place(color, generated.mv);
        self.to_move = color.opposite();

        let reply = match generated.mv {
            Move::Pass => "pass".to_string(),
            Move::Place(point) => format_vertex(point, self.board.size()),
            Move::Resign => unreachable!("handled above")
        };

        if self.ponder {
            let opponent_options = Box::new(StandardDeterministicSearch::new());
            self.controller.start_pondering(self.board.clone(), self.to_move, opponent_options);
        }

        Some(ok(&reply))
    }
}

fn ok(body: &str) -> String {
    format!("= {}\n\n", body)
}

fn err(body: &str) -> String {
    format!("? {}\n\n", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uct_mcts::predict::UniformPredictor;

    fn session() -> Session<UniformPredictor> {
        Session::new(SearchController::new(UniformPredictor, 4096, 2), false)
    }

    #[test]
    fn protocol_handshake_replies() {
        let mut session = session();

        assert_eq!(session.handle("protocol_version"), Some("= 2\n\n".to_string()));
        assert_eq!(session.handle("name"), Some("= goctl\n\n".to_string()));
    }

    #[test]
    fn boardsize_then_play_then_genmove_round_trips() {
        let mut session = session();

        assert_eq!(session.handle("boardsize 9"), Some("= \n\n".to_string()));
        assert_eq!(session.handle("clear_board"), Some("= \n\n".to_string()));
        assert_eq!(session.handle("play black Q16"), Some("? invalid vertex\n\n".to_string()));
        assert_eq!(session.handle("play black C3"), Some("= \n\n".to_string()));

        let reply = session.handle("genmove white").unwrap();
        assert!(reply.starts_with("= "));
    }

    #[test]
    fn quit_ends_the_session() {
        let mut session = session();

        assert_eq!(session.handle("quit"), None);
    }

    #[test]
    fn vertex_round_trips_skipping_the_letter_i() {
        let point = parse_vertex("J10", 19).unwrap();

        if let Move::Place(point) = point {
            assert_eq!(format_vertex(point, 19), "J10");
        } else {
            panic!("expected a placement");
        }
    }
}
