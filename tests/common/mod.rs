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

//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::hash::Hash;

/// Hash a counter into a well-distributed 64-bit value with MurmurHash3,
/// the hash conventionally paired with this estimator.
pub fn hash<H: Hash>(value: H) -> u64 {
    let mut hasher = mur3::Hasher128::with_seed(0);
    value.hash(&mut hasher);
    let (low, _high) = hasher.finish128();
    low
}

/// Build a raw value that sets the register at `register_index` to exactly
/// `register_value` when added to an HLL with the given `log2m`.
pub fn construct_hll_value(log2m: u32, register_index: u64, register_value: u32) -> u64 {
    debug_assert!(register_value >= 1);
    let substream_value = 1u64 << (register_value - 1);
    (substream_value << log2m) | register_index
}
