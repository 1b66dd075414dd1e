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

//! Dynamic komi: nudges the effective komi used by the search away from
//! the game's real komi, so that a handicap game (or a position where one
//! side is heavily favored) still produces a competitive-feeling search
//! instead of one side coasting once it is comfortably ahead.

/// Per-handicap-stone compensation, in points, folded into the effective
/// komi for the early middlegame of a handicap game. Index `0` is the
/// (unused) no-handicap entry; index `n` is the weight for an `n`-stone
/// handicap.
pub const HANDICAP_WEIGHT: [f32; 9] = [
    0.0, 0.0, 4.0, 5.0, 6.0, 6.5, 7.0, 7.5, 8.0
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KomiMode {
    /// Always use the game's real komi.
    Off,
    /// Ramp the handicap compensation linearly out of the komi over the
    /// first part of the game.
    Linear,
    /// Additionally nudge komi based on how lopsided the current value
    /// estimate is, so a position that looks like a sure win doesn't let
    /// the loser's half of the board go unexplored.
    ValueSituational
}

/// How many moves the linear ramp takes to fully remove the handicap
/// compensation.
const RAMP_LENGTH: u16 = 60;

/// How far (in points) a maximally lopsided value estimate is allowed to
/// move the effective komi in `ValueSituational` mode.
const MAX_VALUE_ADJUSTMENT: f32 = 4.0;

#[derive(Clone, Copy)]
pub struct DynamicKomi {
    mode: KomiMode,
    base_komi: f32,
    handicap: u8
}

impl DynamicKomi {
    pub fn new(mode: KomiMode, base_komi: f32, handicap: u8) -> Self {
        Self { mode, base_komi, handicap }
    }

    fn handicap_weight(&self) -> f32 {
        HANDICAP_WEIGHT.get(self.handicap as usize).copied().unwrap_or_else(|| *HANDICAP_WEIGHT.last().unwrap())
    }

    /// The komi the search should actually use, given how far into the
    /// game `move_number` is and (for `ValueSituational`) the current
    /// black-win-rate estimate at the root, in `[0, 1]`.
    pub fn adjusted_komi(&self, move_number: u16, black_win_rate: f32) -> f32 {
        match self.mode {
            KomiMode::Off => self.base_komi,
            KomiMode::Linear => self.base_komi - self.ramped_handicap_component(move_number),
            KomiMode::ValueSituational => {
                let linear = self.base_komi - self.ramped_handicap_component(move_number);
                let imbalance = (black_win_rate - 0.5).clamp(-0.5, 0.5);

                // if black is winning comfortably, increase the effective
                // komi so that black's search stays honest about what is
                // still contested; symmetric for white.
                linear - imbalance * 2.0 * MAX_VALUE_ADJUSTMENT
            }
        }
    }

    fn ramped_handicap_component(&self, move_number: u16) -> f32 {
        if self.handicap < 2 {
            return 0.0;
        }

        let remaining = RAMP_LENGTH.saturating_sub(move_number) as f32;

        self.handicap_weight() * (remaining / RAMP_LENGTH as f32).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_mode_always_returns_base_komi() {
        let komi = DynamicKomi::new(KomiMode::Off, 7.5, 4);

        assert_eq!(komi.adjusted_komi(0, 0.9), 7.5);
        assert_eq!(komi.adjusted_komi(200, 0.1), 7.5);
    }

    #[test]
    fn linear_mode_ramps_handicap_compensation_to_zero() {
        let komi = DynamicKomi::new(KomiMode::Linear, 0.5, 4);

        let early = komi.adjusted_komi(0, 0.5);
        let late = komi.adjusted_komi(RAMP_LENGTH, 0.5);

        assert!(early < late);
        assert_eq!(late, 0.5);
    }

    #[test]
    fn value_situational_pulls_komi_up_when_black_is_winning() {
        let komi = DynamicKomi::new(KomiMode::ValueSituational, 7.5, 0);

        let neutral = komi.adjusted_komi(100, 0.5);
        let black_winning = komi.adjusted_komi(100, 0.95);

        assert!(black_winning > neutral);
    }

    #[test]
    fn no_handicap_has_no_ramp() {
        let komi = DynamicKomi::new(KomiMode::Linear, 7.5, 0);

        assert_eq!(komi.adjusted_komi(0, 0.5), 7.5);
    }
}
