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

//! The HLL facade: parameters, representation state machine, and union.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::error::Error;
use crate::hll::bit_vector::BitVector;
use crate::hll::estimator;
use crate::hll::serialization;

/// Smallest supported `log2m` (16 registers).
pub const MIN_LOG2M: u32 = 4;
/// Largest supported `log2m` (2^30 registers).
pub const MAX_LOG2M: u32 = 30;
/// Smallest supported register width in bits.
pub const MIN_REGWIDTH: u32 = 1;
/// Largest supported register width in bits.
pub const MAX_REGWIDTH: u32 = 8;

/// Default `log2m`, matching the postgresql-hll default.
pub const DEFAULT_LOG2M: u32 = 11;
/// Default register width, matching the postgresql-hll default.
pub const DEFAULT_REGWIDTH: u32 = 5;

/// Largest fixed explicit threshold; the wire encoding stores the exponent
/// and the cutoff contract caps it below 31.
const MAX_EXPLICIT_THRESHOLD: u32 = 1 << 30;

/// Upper bound on the automatically chosen explicit threshold.
const MAX_AUTO_EXPLICIT_THRESHOLD: usize = 160;

/// The representation an [`Hll`] currently uses.
///
/// Instances only ever move forward through this hierarchy:
/// `Empty → Explicit → Sparse → Full`, skipping disabled stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HllType {
    /// No values added yet.
    Empty = 1,
    /// Values held exactly, as a set of raw hashes.
    Explicit = 2,
    /// Probabilistic registers held as an index-to-value map.
    Sparse = 3,
    /// Probabilistic registers held as a dense packed array.
    Full = 4,
}

/// Promotion cutoff for the EXPLICIT representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitThreshold {
    /// Choose the cutoff from the memory footprint of the FULL payload.
    Auto,
    /// Skip the EXPLICIT representation entirely.
    Disabled,
    /// Promote once more than this many distinct values are held. Must be a
    /// power of two no larger than 2^30 so the wire format can carry its
    /// exponent.
    Fixed(u32),
}

/// Validated construction parameters plus values derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Params {
    pub log2m: u32,
    pub regwidth: u32,
    pub threshold: ExplicitThreshold,
    pub sparse_enabled: bool,

    /// Number of probabilistic registers, `2^log2m`.
    pub m: usize,
    /// Mask selecting the register-index bits of a raw hash.
    pub m_bits_mask: u64,
    /// Largest storable register value, `2^regwidth - 1`.
    pub value_max: u8,
    /// Bits of the hash inspected for the trailing-zero count.
    pub pw_bits: u32,
    /// Resolved EXPLICIT promotion cutoff; zero when disabled.
    pub explicit_threshold: usize,
    /// SPARSE entry count past which FULL is cheaper; zero when disabled.
    pub sparse_threshold: usize,
}

impl Params {
    pub(crate) fn new(
        log2m: u32,
        regwidth: u32,
        threshold: ExplicitThreshold,
        sparse_enabled: bool,
    ) -> Result<Self, Error> {
        if !(MIN_LOG2M..=MAX_LOG2M).contains(&log2m) {
            return Err(Error::parameter_out_of_range(format!(
                "log2m must be at least {MIN_LOG2M} and at most {MAX_LOG2M}"
            ))
            .with_context("log2m", log2m));
        }
        if !(MIN_REGWIDTH..=MAX_REGWIDTH).contains(&regwidth) {
            return Err(Error::parameter_out_of_range(format!(
                "regwidth must be at least {MIN_REGWIDTH} and at most {MAX_REGWIDTH}"
            ))
            .with_context("regwidth", regwidth));
        }

        let m = 1usize << log2m;
        let full_payload_bytes = (m * regwidth as usize).div_ceil(8);

        let explicit_threshold = match threshold {
            ExplicitThreshold::Auto => {
                // The largest count of 8-byte raw values whose payload still
                // fits in the FULL payload.
                (full_payload_bytes / 8).min(MAX_AUTO_EXPLICIT_THRESHOLD)
            }
            ExplicitThreshold::Disabled => 0,
            ExplicitThreshold::Fixed(value) => {
                if value == 0 || !value.is_power_of_two() || value > MAX_EXPLICIT_THRESHOLD {
                    return Err(Error::parameter_out_of_range(
                        "fixed explicit threshold must be a power of two at most 2^30",
                    )
                    .with_context("threshold", value));
                }
                value as usize
            }
        };

        // Largest power of two at which the sparse payload is still no wider
        // than the dense one.
        let sparse_threshold = if sparse_enabled {
            let cutoff = (m * regwidth as usize) / (log2m + regwidth) as usize;
            1usize << cutoff.ilog2()
        } else {
            0
        };

        Ok(Self {
            log2m,
            regwidth,
            threshold,
            sparse_enabled,
            m,
            m_bits_mask: (m as u64) - 1,
            value_max: ((1u32 << regwidth) - 1) as u8,
            pw_bits: 64 - log2m,
            explicit_threshold,
            sparse_threshold,
        })
    }

    /// Size in bytes of the FULL payload, `ceil(m * regwidth / 8)`.
    pub(crate) fn full_payload_bytes(&self) -> usize {
        (self.m * self.regwidth as usize).div_ceil(8)
    }

    /// Width in bits of a packed SPARSE entry.
    pub(crate) fn short_word_length(&self) -> u32 {
        self.log2m + self.regwidth
    }

    /// The register a raw hash falls into (its low `log2m` bits).
    pub(crate) fn register_index(&self, raw_value: u64) -> usize {
        (raw_value & self.m_bits_mask) as usize
    }

    /// The register value a raw hash contributes: one past the trailing-zero
    /// count of the remaining bits, clamped to the register capacity. A zero
    /// substream counts as `pw_bits + 1` before clamping.
    pub(crate) fn register_value(&self, raw_value: u64) -> u8 {
        let substream = raw_value >> self.log2m;
        let p_w = if substream == 0 {
            self.pw_bits + 1
        } else {
            substream.trailing_zeros() + 1
        };
        p_w.min(u32::from(self.value_max)) as u8
    }
}

/// Backing storage for each [`HllType`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Storage {
    Empty,
    Explicit(BTreeSet<u64>),
    Sparse(BTreeMap<u32, u8>),
    Full(BitVector),
}

/// A probabilistic set of hashed 64-bit elements, useful for computing the
/// approximate cardinality of a stream in very small storage.
///
/// Adding the first values keeps them exactly; past the explicit threshold
/// they are folded into probabilistic registers, first as a sparse map and
/// finally as a dense packed register array. Serialized instances are
/// byte-compatible with postgresql-hll, java-hll and js-hll.
///
/// Values passed to [`add_raw`](Hll::add_raw) must already be hashed with a
/// strong (not necessarily cryptographic) 64-bit hash such as MurmurHash3;
/// the estimator performs no hashing itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Hll {
    pub(crate) params: Params,
    pub(crate) storage: Storage,
}

impl Hll {
    /// Create an empty estimator with the given `log2m` and `regwidth`, an
    /// automatic explicit threshold, and the sparse representation enabled.
    ///
    /// # Errors
    ///
    /// Returns `ParameterOutOfRange` if `log2m` is outside `[4, 30]` or
    /// `regwidth` is outside `[1, 8]`.
    pub fn new(log2m: u32, regwidth: u32) -> Result<Self, Error> {
        Self::builder().log2m(log2m).regwidth(regwidth).build()
    }

    /// Create a new builder for `Hll`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hll_storage::hll::{ExplicitThreshold, Hll};
    ///
    /// let hll = Hll::builder()
    ///     .log2m(13)
    ///     .regwidth(5)
    ///     .explicit_threshold(ExplicitThreshold::Disabled)
    ///     .sparse_enabled(false)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(hll.cardinality(), 0);
    /// ```
    pub fn builder() -> HllBuilder {
        HllBuilder::default()
    }

    pub(crate) fn from_parts(params: Params, storage: Storage) -> Self {
        Self { params, storage }
    }

    /// The configured `log2m` parameter.
    pub fn log2m(&self) -> u32 {
        self.params.log2m
    }

    /// The configured register width in bits.
    pub fn regwidth(&self) -> u32 {
        self.params.regwidth
    }

    /// The configured explicit threshold setting.
    pub fn explicit_threshold(&self) -> ExplicitThreshold {
        self.params.threshold
    }

    /// Whether the sparse representation is enabled.
    pub fn sparse_enabled(&self) -> bool {
        self.params.sparse_enabled
    }

    /// The representation currently in use.
    pub fn hll_type(&self) -> HllType {
        match &self.storage {
            Storage::Empty => HllType::Empty,
            Storage::Explicit(_) => HllType::Explicit,
            Storage::Sparse(_) => HllType::Sparse,
            Storage::Full(_) => HllType::Full,
        }
    }

    /// Add an already-hashed value.
    ///
    /// It is very important that the value be hashed with a strong 64-bit
    /// hash function; feeding raw identifiers skews the estimate badly.
    pub fn add_raw(&mut self, raw_value: u64) {
        let params = &self.params;
        // Promotions build the successor storage completely before swapping
        // it in, so a panic mid-way never leaves a half-migrated state.
        let promoted = match &mut self.storage {
            Storage::Empty => Some(Self::first_storage(params, raw_value)),
            Storage::Explicit(values) => {
                values.insert(raw_value);
                if values.len() > params.explicit_threshold {
                    Some(Self::promote_explicit(params, values))
                } else {
                    None
                }
            }
            Storage::Sparse(registers) => {
                Self::update_sparse(params, registers, raw_value);
                if registers.len() > params.sparse_threshold {
                    Some(Storage::Full(Self::full_from_sparse(params, registers)))
                } else {
                    None
                }
            }
            Storage::Full(vector) => {
                Self::update_full(params, vector, raw_value);
                None
            }
        };

        if let Some(storage) = promoted {
            self.storage = storage;
        }
    }

    /// Storage for the first value added to an empty instance.
    fn first_storage(params: &Params, raw_value: u64) -> Storage {
        if params.explicit_threshold > 0 {
            Storage::Explicit(BTreeSet::from([raw_value]))
        } else if params.sparse_enabled {
            let mut registers = BTreeMap::new();
            Self::update_sparse(params, &mut registers, raw_value);
            Storage::Sparse(registers)
        } else {
            let mut vector = BitVector::new(params.regwidth, params.m);
            Self::update_full(params, &mut vector, raw_value);
            Storage::Full(vector)
        }
    }

    /// Replay explicit values into the next enabled representation.
    fn promote_explicit(params: &Params, values: &BTreeSet<u64>) -> Storage {
        if params.sparse_enabled {
            let mut registers = BTreeMap::new();
            for &value in values {
                Self::update_sparse(params, &mut registers, value);
            }
            Storage::Sparse(registers)
        } else {
            let mut vector = BitVector::new(params.regwidth, params.m);
            for &value in values {
                Self::update_full(params, &mut vector, value);
            }
            Storage::Full(vector)
        }
    }

    /// Copy sparse entries into a freshly allocated register array.
    fn full_from_sparse(params: &Params, registers: &BTreeMap<u32, u8>) -> BitVector {
        let mut vector = BitVector::new(params.regwidth, params.m);
        for (&index, &value) in registers {
            vector.set_max_register(index as usize, value);
        }
        vector
    }

    fn update_sparse(params: &Params, registers: &mut BTreeMap<u32, u8>, raw_value: u64) {
        let index = params.register_index(raw_value) as u32;
        let value = params.register_value(raw_value);
        // Zero-valued registers are never stored.
        if value > registers.get(&index).copied().unwrap_or(0) {
            registers.insert(index, value);
        }
    }

    fn update_full(params: &Params, vector: &mut BitVector, raw_value: u64) {
        vector.set_max_register(params.register_index(raw_value), params.register_value(raw_value));
    }

    /// The cardinality estimate, rounded up to a whole count.
    ///
    /// Exact while the instance is EMPTY or EXPLICIT; probabilistic after
    /// promotion.
    pub fn cardinality(&self) -> u64 {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Explicit(values) => values.len() as u64,
            Storage::Sparse(registers) => {
                let m = self.params.m;
                let zeroes = m - registers.len();
                let mut indicator_sum = zeroes as f64;
                for &value in registers.values() {
                    indicator_sum += estimator::inv_pow2(value);
                }
                estimator::estimate(m, indicator_sum, zeroes).ceil() as u64
            }
            Storage::Full(vector) => {
                let m = vector.count();
                let mut nonzero = 0usize;
                let mut nonzero_sum = 0.0;
                for (_, value) in vector.nonzero_registers() {
                    nonzero += 1;
                    nonzero_sum += estimator::inv_pow2(value);
                }
                let zeroes = m - nonzero;
                estimator::estimate(m, zeroes as f64 + nonzero_sum, zeroes).ceil() as u64
            }
        }
    }

    /// Fold `other` into this instance.
    ///
    /// `other` is never modified. When the two sides use different
    /// representations, this side is promoted to the higher one first.
    ///
    /// # Errors
    ///
    /// Returns `ParameterMismatch`, with this instance untouched, unless both
    /// sides agree on `log2m`, `regwidth`, the explicit threshold setting and
    /// the sparse flag.
    pub fn union(&mut self, other: &Hll) -> Result<(), Error> {
        if self.params != other.params {
            return Err(Error::parameter_mismatch(
                "estimators must share log2m, regwidth, explicit threshold and sparse settings",
            )
            .with_context("log2m", self.params.log2m)
            .with_context("other_log2m", other.params.log2m)
            .with_context("regwidth", self.params.regwidth)
            .with_context("other_regwidth", other.params.regwidth));
        }

        match &other.storage {
            Storage::Empty => {}
            Storage::Explicit(other_values) => {
                // Replaying through add_raw applies promotion rules exactly
                // as if the values had been added directly.
                for &value in other_values {
                    self.add_raw(value);
                }
            }
            Storage::Sparse(other_registers) => self.union_sparse(other_registers),
            Storage::Full(other_vector) => self.union_full(other_vector),
        }
        Ok(())
    }

    fn union_sparse(&mut self, other_registers: &BTreeMap<u32, u8>) {
        match &mut self.storage {
            Storage::Empty => {
                self.storage = Storage::Sparse(other_registers.clone());
            }
            Storage::Explicit(values) => {
                // The sparse side cannot absorb raw hashes, so adopt a copy
                // of it and replay our exact values on top.
                let replay = std::mem::take(values);
                self.storage = Storage::Sparse(other_registers.clone());
                for value in replay {
                    self.add_raw(value);
                }
            }
            Storage::Sparse(registers) => {
                for (&index, &value) in other_registers {
                    if value > registers.get(&index).copied().unwrap_or(0) {
                        registers.insert(index, value);
                    }
                }
                if registers.len() > self.params.sparse_threshold {
                    let vector = Self::full_from_sparse(&self.params, registers);
                    self.storage = Storage::Full(vector);
                }
            }
            Storage::Full(vector) => {
                for (&index, &value) in other_registers {
                    vector.set_max_register(index as usize, value);
                }
            }
        }
    }

    fn union_full(&mut self, other_vector: &BitVector) {
        match &mut self.storage {
            Storage::Empty => {
                self.storage = Storage::Full(other_vector.clone());
            }
            Storage::Explicit(values) => {
                let replay = std::mem::take(values);
                self.storage = Storage::Full(other_vector.clone());
                for value in replay {
                    self.add_raw(value);
                }
            }
            Storage::Sparse(registers) => {
                let registers = std::mem::take(registers);
                let mut vector = other_vector.clone();
                for (index, value) in registers {
                    vector.set_max_register(index as usize, value);
                }
                self.storage = Storage::Full(vector);
            }
            Storage::Full(vector) => {
                for (index, value) in other_vector.nonzero_registers() {
                    vector.set_max_register(index, value);
                }
            }
        }
    }

    /// Reset to the EMPTY representation, discarding all values.
    pub fn clear(&mut self) {
        self.storage = Storage::Empty;
    }

    /// Serialize to the storage format (schema version 1).
    pub fn to_bytes(&self) -> Vec<u8> {
        serialization::to_bytes(self)
    }

    /// Deserialize an instance serialized with [`to_bytes`](Hll::to_bytes)
    /// by this or any sibling implementation.
    ///
    /// Duplicate or out-of-order EXPLICIT values are tolerated and
    /// deduplicated; use [`from_bytes_strict`](Hll::from_bytes_strict) to
    /// reject them.
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error naming what was malformed; no partially
    /// decoded instance is ever produced.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serialization::from_bytes(bytes, false)
    }

    /// Like [`from_bytes`](Hll::from_bytes), but requires EXPLICIT payload
    /// values to be strictly ascending as the format prescribes.
    pub fn from_bytes_strict(bytes: &[u8]) -> Result<Self, Error> {
        serialization::from_bytes(bytes, true)
    }

    /// Check the internal invariants of the current representation.
    ///
    /// Intended for tests and debugging; a violation means the instance was
    /// corrupted and is reported as `InternalInvariant`.
    pub fn validate(&self) -> Result<(), Error> {
        match &self.storage {
            Storage::Empty => {}
            Storage::Explicit(values) => {
                if self.params.explicit_threshold > 0
                    && values.len() > self.params.explicit_threshold
                {
                    return Err(Error::internal_invariant(
                        "explicit storage exceeds its promotion threshold",
                    )
                    .with_context("len", values.len())
                    .with_context("threshold", self.params.explicit_threshold));
                }
            }
            Storage::Sparse(registers) => {
                for (&index, &value) in registers {
                    if index as usize >= self.params.m {
                        return Err(Error::internal_invariant(
                            "sparse register index out of range",
                        )
                        .with_context("index", index)
                        .with_context("m", self.params.m));
                    }
                    if value == 0 || value > self.params.value_max {
                        return Err(Error::internal_invariant(
                            "sparse register value out of range",
                        )
                        .with_context("index", index)
                        .with_context("value", value));
                    }
                }
            }
            Storage::Full(vector) => {
                for (index, value) in vector.nonzero_registers() {
                    if value > self.params.value_max {
                        return Err(Error::internal_invariant("register value out of range")
                            .with_context("index", index)
                            .with_context("value", value));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`Hll`].
#[derive(Debug, Clone)]
pub struct HllBuilder {
    log2m: u32,
    regwidth: u32,
    threshold: ExplicitThreshold,
    sparse_enabled: bool,
}

impl Default for HllBuilder {
    fn default() -> Self {
        Self {
            log2m: DEFAULT_LOG2M,
            regwidth: DEFAULT_REGWIDTH,
            threshold: ExplicitThreshold::Auto,
            sparse_enabled: true,
        }
    }
}

impl HllBuilder {
    /// Set the log-base-2 of the register count. Must be in `[4, 30]`.
    pub fn log2m(mut self, log2m: u32) -> Self {
        self.log2m = log2m;
        self
    }

    /// Set the register width in bits. Must be in `[1, 8]`.
    pub fn regwidth(mut self, regwidth: u32) -> Self {
        self.regwidth = regwidth;
        self
    }

    /// Set when the EXPLICIT representation is abandoned.
    pub fn explicit_threshold(mut self, threshold: ExplicitThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    /// Enable or disable the SPARSE representation.
    pub fn sparse_enabled(mut self, sparse_enabled: bool) -> Self {
        self.sparse_enabled = sparse_enabled;
        self
    }

    /// Validate the parameters and build an empty estimator.
    ///
    /// # Errors
    ///
    /// Returns `ParameterOutOfRange` naming the offending parameter.
    pub fn build(self) -> Result<Hll, Error> {
        let params = Params::new(
            self.log2m,
            self.regwidth,
            self.threshold,
            self.sparse_enabled,
        )?;
        Ok(Hll {
            params,
            storage: Storage::Empty,
        })
    }
}
