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

//! HyperLogLog estimator with storage-format interoperability.
//!
//! # Overview
//!
//! [`Hll`] estimates the number of distinct 64-bit hashed values in a stream
//! using sub-linear memory. It moves through up to four representations as
//! values arrive, trading exactness for bounded storage:
//!
//! - **EMPTY**: a sentinel for the empty set.
//! - **EXPLICIT**: the raw hashes themselves, exact, until a configurable
//!   threshold.
//! - **SPARSE**: a map from register index to register value, for streams
//!   that touch few registers.
//! - **FULL**: a dense bit-packed array of all `2^log2m` registers.
//!
//! Serialized form (schema version 1) is byte-compatible with the sibling
//! implementations postgresql-hll, java-hll and js-hll: the same values added
//! to any of them produce identical bytes.
//!
//! # Parameters
//!
//! - `log2m` in `[4, 30]`: log2 of the register count. Standard error of the
//!   probabilistic estimate is about `1.04 / sqrt(2^log2m)`.
//! - `regwidth` in `[1, 8]`: bits per register, bounding the largest
//!   observable run of trailing zeros.
//! - [`ExplicitThreshold`]: when to abandon exact storage.
//! - `sparse_enabled`: whether the map-based stage is used at all.

mod bit_vector;
mod estimator;
mod serialization;
mod sketch;

pub use sketch::ExplicitThreshold;
pub use sketch::Hll;
pub use sketch::HllBuilder;
pub use sketch::HllType;
pub use sketch::DEFAULT_LOG2M;
pub use sketch::DEFAULT_REGWIDTH;
pub use sketch::MAX_LOG2M;
pub use sketch::MAX_REGWIDTH;
pub use sketch::MIN_LOG2M;
pub use sketch::MIN_REGWIDTH;
