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

//! HyperLogLog cardinality estimation with a storage-compatible wire format.
//!
//! This crate implements the HLL storage format (schema version 1) shared by
//! `postgresql-hll`, `java-hll` and `js-hll`: an estimator built here and one
//! built by any of those implementations produce byte-identical serialized
//! output and agree on cardinality estimates for the same stream of hashed
//! values.
//!
//! The estimator accepts **already-hashed** 64-bit values via
//! [`Hll::add_raw`](hll::Hll::add_raw); it performs no hashing of its own.
//! MurmurHash3 is the conventional choice of hash function for feeding it.
//!
//! ```
//! use hll_storage::hll::Hll;
//!
//! let mut hll = Hll::new(11, 5).unwrap();
//! hll.add_raw(0x1fab_0243_9ab3_0fe5);
//! hll.add_raw(0x6b83_92fe_0e11_c4d7);
//! assert_eq!(hll.cardinality(), 2);
//!
//! let bytes = hll.to_bytes();
//! let restored = Hll::from_bytes(&bytes).unwrap();
//! assert_eq!(restored, hll);
//! ```

mod codec;
pub mod error;
pub mod hll;

pub use error::Error;
pub use error::ErrorKind;
pub use hll::Hll;
