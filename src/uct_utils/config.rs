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

//! Process-wide tunables, read once from the environment with sane defaults.
//! Mirrors the way the original engine kept everything behind `lazy_static`
//! globals instead of threading a configuration struct through every call.

use regex::Regex;
use std::env;
use std::fmt;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

lazy_static! {
    /// The number of worker threads to use during search.
    pub static ref NUM_THREADS: usize = env_or("NUM_THREADS", 16);

    /// The number of concurrent games to play during self-play (unused by the
    /// search core itself, kept for parity with the collaborator that drives it).
    pub static ref NUM_GAMES: usize = env_or("NUM_GAMES", 16);

    /// The playout budget used by `fixed_playouts` mode.
    pub static ref NUM_ROLLOUT: usize = env_or("NUM_ROLLOUT", 1600);

    /// The maximum number of batch-worker tasks (G contexts x I streams) run by
    /// the `BatchScheduler`.
    pub static ref BATCH_SIZE: usize = env_or("BATCH_SIZE", 16);

    /// The number of concurrent batch contexts.
    pub static ref NUM_BATCH_CONTEXTS: usize = env_or("NUM_BATCH_CONTEXTS", 2);

    /// The number of interleaved streams per batch context.
    pub static ref NUM_BATCH_STREAMS: usize = env_or("NUM_BATCH_STREAMS", 2);

    /// The number of entries in the transposition hash table.
    pub static ref UCT_HASH_SIZE: usize = env_or("UCT_HASH_SIZE", 1_048_576);

    /// Whether to think on the opponent's turn.
    pub static ref PONDER: bool = env_or("PONDER", false);

    /// The comma-separated `host:port` list of remote inference servers.
    pub static ref SERVERS: String = env::var("SERVERS").unwrap_or_default();

    /// How many worker sockets to maintain per remote server.
    pub static ref SOCKETS_PER_SERVER: usize = env_or("SOCKETS_PER_SERVER", 4);

    /// The temperature used when sampling a move from the root softmax.
    pub static ref TEMPERATURE: f32 = env_or("TEMPERATURE", 1.0);

    /// Identifies which local model a `DistributedClient`/`InferenceServer`
    /// pair are speaking to each other about, so a client never silently
    /// evaluates positions against a server running different weights.
    pub static ref MODEL_HASH: u64 = env_or("MODEL_HASH", 0);
}

/// A resolved `host:port` pair for a remote inference server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(fmt, "{}:{}", self.host, self.port)
    }
}

/// A fatal configuration error, surfaced only during controller initialization
/// (never from within a worker thread).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String
}

impl fmt::Display for ConfigError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(fmt, "{}", self.message)
    }
}

impl std::error::Error for ConfigError { }

/// Parses a comma-separated `host:port,host:port,...` list into a list of
/// `ServerAddr`. An empty string yields an empty list (distributed inference
/// is simply unused, not an error).
///
/// # Arguments
///
/// * `raw` - the comma-separated list, as it would arrive from the CLI or
///   the `SERVERS` environment variable.
///
pub fn parse_server_list(raw: &str) -> Result<Vec<ServerAddr>, ConfigError> {
    lazy_static! {
        static ref HOST_PORT: Regex = Regex::new(r"^([^:\s]+):([0-9]{1,5})$").unwrap();
    }

    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Ok(vec! []);
    }

    trimmed.split(',')
        .map(|entry| {
            let entry = entry.trim();
            let captures = HOST_PORT.captures(entry).ok_or_else(|| ConfigError {
                message: format!("malformed server address `{}`, expected host:port", entry)
            })?;
            let host = captures[1].to_string();
            let port: u16 = captures[2].parse().map_err(|_| ConfigError {
                message: format!("port out of range in `{}`", entry)
            })?;

            Ok(ServerAddr { host, port })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_ok() {
        assert_eq!(parse_server_list(""), Ok(vec! []));
        assert_eq!(parse_server_list("   "), Ok(vec! []));
    }

    #[test]
    fn parses_multiple_servers() {
        let servers = parse_server_list("127.0.0.1:8080,example.com:9000").unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0], ServerAddr { host: "127.0.0.1".into(), port: 8080 });
        assert_eq!(servers[1], ServerAddr { host: "example.com".into(), port: 9000 });
    }

    #[test]
    fn rejects_malformed_entry() {
        assert!(parse_server_list("not-a-valid-address").is_err());
        assert!(parse_server_list("127.0.0.1:8080,garbage").is_err());
        assert!(parse_server_list("127.0.0.1:notaport").is_err());
    }
}
