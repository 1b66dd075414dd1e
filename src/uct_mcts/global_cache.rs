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

//! A process-wide cache of evaluated positions, shared by every search
//! running in this process. Positions recur often enough across searches
//! (transpositions across different root moves, re-evaluating a position
//! after `generate_move` advances the tree) that skipping the accelerator
//! entirely is worth a concurrent hash map lookup.

use dashmap::DashMap;
use go_board::Color;

use crate::predict::PredictResponse;

lazy_static! {
    static ref CACHE: DashMap<(u64, Color), PredictResponse> = DashMap::new();
}

/// Returns the cached response for `(hash, color)` if present, otherwise
/// computes it with `f`, caches it, and returns it. `f` returning `None`
/// means "do not cache this", e.g. because the accelerator is shutting
/// down.
pub fn get_or_insert(hash: u64, color: Color, f: impl FnOnce() -> Option<PredictResponse>) -> Option<PredictResponse> {
    if let Some(existing) = CACHE.get(&(hash, color)) {
        return Some(existing.clone());
    }

    let computed = f()?;

    CACHE.insert((hash, color), computed.clone());

    Some(computed)
}

/// Drops every cached entry. Exposed for tests and for long-running
/// processes that want to bound memory between unrelated games.
pub fn clear() {
    CACHE.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_second_lookup_does_not_call_the_closure() {
        clear();

        let mut calls = 0;
        let first = get_or_insert(42, Color::Black, || { calls += 1; Some(PredictResponse::new(0.5, vec![1.0])) });
        assert!(first.is_some());

        let mut second_calls = 0;
        let second = get_or_insert(42, Color::Black, || { second_calls += 1; Some(PredictResponse::new(0.9, vec![2.0])) });

        assert!(second.is_some());
        assert_eq!(calls, 1);
        assert_eq!(second_calls, 0);
        assert_eq!(second.unwrap().value(), 0.5);
    }
}
