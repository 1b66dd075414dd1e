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

/// Returns the smallest of the two given values.
pub fn min(a: f32, b: f32) -> f32 {
    if a < b { a } else { b }
}

/// Returns the largest of the two given values.
pub fn max(a: f32, b: f32) -> f32 {
    if a > b { a } else { b }
}

/// Returns the sum of all finite elements of `values`, ignoring any
/// `-Inf` entries (used to mask illegal moves in a policy vector).
///
/// # Arguments
///
/// * `values` -
///
pub fn sum_finite_f32(values: &[f32]) -> f32 {
    values.iter().filter(|v| v.is_finite()).sum()
}

/// Divides every finite element of `values` by `total`, leaving `-Inf`
/// entries untouched.
///
/// # Arguments
///
/// * `values` -
/// * `total` -
///
pub fn normalize_finite_f32(values: &mut [f32], total: f32) {
    debug_assert!(total > 0.0);

    let recip = total.recip();

    for v in values.iter_mut() {
        if v.is_finite() {
            *v *= recip;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_ignores_negative_infinity() {
        let values = [1.0, f32::NEG_INFINITY, 2.0, 3.0];

        assert_eq!(sum_finite_f32(&values), 6.0);
    }

    #[test]
    fn normalize_sums_to_one() {
        let mut values = [1.0, f32::NEG_INFINITY, 1.0, 2.0];
        let total = sum_finite_f32(&values);

        normalize_finite_f32(&mut values, total);

        assert!((sum_finite_f32(&values) - 1.0).abs() < 1e-6);
        assert!(values[1].is_infinite());
    }
}
