// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Numeric core of the HyperLogLog estimate.
//!
//! Stateless functions only: the representations hand over the register count
//! `m`, the indicator sum `Σ 2^(-R_j)` over all registers, and the number of
//! zero registers, and get back the corrected estimate.

/// 2^32 as used by the range-correction formulas.
const TWO_TO_32: f64 = 4_294_967_296.0;

/// Cutoff above which the large-range correction applies.
const LARGE_ESTIMATOR_CUTOFF: f64 = TWO_TO_32 / 30.0;

/// The `alpha * m^2` constant of the raw HyperLogLog estimator.
///
/// `m` must be a power of two with at least 16 registers. Small register
/// counts use the published empirical constants; larger counts use the
/// closed-form approximation.
pub(crate) fn alpha_m_squared(m: usize) -> f64 {
    debug_assert!(m >= 16 && m.is_power_of_two());

    let m = m as f64;
    match m as u64 {
        16 => 0.673 * m * m,
        32 => 0.697 * m * m,
        64 => 0.7092 * m * m,
        _ => (0.7213 / (1.0 + 1.079 / m)) * m * m,
    }
}

/// Cutoff below which the small-range (linear counting) correction applies.
pub(crate) fn small_estimator_cutoff(m: usize) -> f64 {
    (m as f64) * 5.0 / 2.0
}

/// The linear counting estimate `m * ln(m / V)` where `V` is the number of
/// zero registers. Only meaningful when `V > 0`.
pub(crate) fn small_estimator(m: usize, number_of_zeroes: usize) -> f64 {
    debug_assert!(number_of_zeroes > 0);
    let m = m as f64;
    m * (m / number_of_zeroes as f64).ln()
}

/// The large-range correction `-2^32 * ln(1 - E / 2^32)`.
///
/// Past 2^32 the logarithm has no argument left; the estimate degenerates to
/// zero there, matching the sibling implementations.
pub(crate) fn large_estimator(estimator: f64) -> f64 {
    let ratio = estimator / TWO_TO_32;
    if ratio >= 1.0 {
        0.0
    } else {
        -TWO_TO_32 * (1.0 - ratio).ln()
    }
}

/// Apply the raw estimator and its range corrections.
///
/// `indicator_sum` is `Σ 2^(-R_j)` over all `m` registers and
/// `number_of_zeroes` is the count of registers still at zero (`V` in the
/// paper).
pub(crate) fn estimate(m: usize, indicator_sum: f64, number_of_zeroes: usize) -> f64 {
    let estimator = alpha_m_squared(m) / indicator_sum;

    if number_of_zeroes != 0 && estimator <= small_estimator_cutoff(m) {
        small_estimator(m, number_of_zeroes)
    } else if estimator <= LARGE_ESTIMATOR_CUTOFF {
        estimator
    } else {
        large_estimator(estimator)
    }
}

/// Compute `1 / 2^value` without loss for the register range.
#[inline]
pub(crate) fn inv_pow2(value: u8) -> f64 {
    if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-f64::from(value))
    }
}
