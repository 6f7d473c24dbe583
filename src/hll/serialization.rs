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

//! The storage format, schema version 1.
//!
//! Every serialized HLL opens with a version byte (schema version in the high
//! nibble, type code in the low nibble) and a parameters byte (regwidth − 1
//! in the high 3 bits, log2m in the low 5). The non-EMPTY types add a cutoff
//! byte — bit 7 reserved, bit 6 the sparse-enabled flag, low 6 bits the
//! explicit cutoff field — followed by a type-specific payload:
//!
//! - EXPLICIT: the raw values as big-endian u64 words, ascending.
//! - SPARSE: `(index << regwidth) | value` entries of `log2m + regwidth`
//!   bits, ascending by index, packed MSB-first.
//! - FULL: all `2^log2m` registers of `regwidth` bits, packed MSB-first.
//!
//! Packed payloads zero-pad the final byte; decoders must ignore a trailing
//! all-zero partial entry.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use byteorder::BigEndian;
use byteorder::ByteOrder;

use crate::codec::BitReader;
use crate::codec::BitWriter;
use crate::error::DecodeKind;
use crate::error::Error;
use crate::hll::bit_vector::BitVector;
use crate::hll::sketch::ExplicitThreshold;
use crate::hll::sketch::Hll;
use crate::hll::sketch::Params;
use crate::hll::sketch::Storage;

/// The schema version this module reads and writes.
pub(crate) const SCHEMA_VERSION: u8 = 1;

// Type codes carried in the low nibble of the version byte.
const TYPE_EMPTY: u8 = 1;
const TYPE_EXPLICIT: u8 = 2;
const TYPE_SPARSE: u8 = 3;
const TYPE_FULL: u8 = 4;

// Cutoff byte layout: [reserved | sparse_enabled | cutoff_field(6)].
const SPARSE_ENABLED_SHIFT: u32 = 6;
const CUTOFF_FIELD_MASK: u8 = (1 << 6) - 1;
const CUTOFF_DISABLED: u8 = 0;
const CUTOFF_AUTO: u8 = 63;

/// Header size for the non-EMPTY types; EMPTY stops after the parameters
/// byte.
const HEADER_BYTES: usize = 3;
const EMPTY_BYTES: usize = 2;

const EXPLICIT_WORD_BYTES: usize = 8;

pub(crate) fn to_bytes(hll: &Hll) -> Vec<u8> {
    let params = &hll.params;
    match &hll.storage {
        Storage::Empty => vec![version_byte(TYPE_EMPTY), parameters_byte(params)],
        Storage::Explicit(values) => encode_explicit(params, values),
        Storage::Sparse(registers) => encode_sparse(params, registers),
        Storage::Full(vector) => encode_full(params, vector),
    }
}

fn encode_explicit(params: &Params, values: &BTreeSet<u64>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_BYTES + values.len() * EXPLICIT_WORD_BYTES);
    bytes.push(version_byte(TYPE_EXPLICIT));
    bytes.push(parameters_byte(params));
    bytes.push(cutoff_byte(params));

    // BTreeSet iteration is ascending, which is the wire order.
    let mut word = [0u8; EXPLICIT_WORD_BYTES];
    for &value in values {
        BigEndian::write_u64(&mut word, value);
        bytes.extend_from_slice(&word);
    }
    bytes
}

fn encode_sparse(params: &Params, registers: &BTreeMap<u32, u8>) -> Vec<u8> {
    let header = vec![
        version_byte(TYPE_SPARSE),
        parameters_byte(params),
        cutoff_byte(params),
    ];
    let width = params.short_word_length();
    let mut writer = BitWriter::new(header, width, registers.len());
    for (&index, &value) in registers {
        writer.write_bits((u64::from(index) << params.regwidth) | u64::from(value), width);
    }
    writer.into_bytes()
}

fn encode_full(params: &Params, vector: &BitVector) -> Vec<u8> {
    let header = vec![
        version_byte(TYPE_FULL),
        parameters_byte(params),
        cutoff_byte(params),
    ];
    let mut writer = BitWriter::new(header, params.regwidth, params.m);
    for value in vector.registers() {
        writer.write_bits(u64::from(value), params.regwidth);
    }
    writer.into_bytes()
}

pub(crate) fn from_bytes(bytes: &[u8], strict: bool) -> Result<Hll, Error> {
    if bytes.len() < EMPTY_BYTES {
        return Err(Error::decode(
            DecodeKind::BadLength,
            "input is shorter than the smallest serialized HLL",
        )
        .with_context("len", bytes.len()));
    }

    let schema_version = bytes[0] >> 4;
    if schema_version != SCHEMA_VERSION {
        return Err(Error::decode(DecodeKind::UnknownVersion, "unregistered schema version")
            .with_context("version", schema_version));
    }

    let type_code = bytes[0] & 0x0F;
    let regwidth = u32::from(bytes[1] >> 5) + 1;
    let log2m = u32::from(bytes[1] & 0x1F);

    if type_code == TYPE_EMPTY {
        if bytes.len() != EMPTY_BYTES {
            return Err(Error::decode(
                DecodeKind::BadLength,
                "an EMPTY HLL carries no payload",
            )
            .with_context("len", bytes.len()));
        }
        // The 2-byte form has no cutoff byte, so EMPTY instances come back
        // with the default settings.
        let params = new_params(log2m, regwidth, ExplicitThreshold::Auto, true)?;
        return Ok(Hll::from_parts(params, Storage::Empty));
    }
    if !(TYPE_EXPLICIT..=TYPE_FULL).contains(&type_code) {
        return Err(
            Error::decode(DecodeKind::UnknownType, "unregistered type code")
                .with_context("type", type_code),
        );
    }

    if bytes.len() < HEADER_BYTES {
        return Err(Error::decode(
            DecodeKind::BadLength,
            "input ends before the cutoff byte",
        )
        .with_context("len", bytes.len()));
    }
    let (threshold, sparse_enabled) = unpack_cutoff_byte(bytes[2])?;
    let params = new_params(log2m, regwidth, threshold, sparse_enabled)?;

    let storage = match type_code {
        TYPE_EXPLICIT => decode_explicit(bytes, strict)?,
        TYPE_SPARSE => decode_sparse(&params, bytes),
        _ => decode_full(&params, bytes)?,
    };
    Ok(Hll::from_parts(params, storage))
}

/// Validate decoded parameters, reporting failures as decode errors.
fn new_params(
    log2m: u32,
    regwidth: u32,
    threshold: ExplicitThreshold,
    sparse_enabled: bool,
) -> Result<Params, Error> {
    Params::new(log2m, regwidth, threshold, sparse_enabled).map_err(|error| {
        Error::decode(DecodeKind::BadParameters, "parameters byte failed validation")
            .with_context("log2m", log2m)
            .with_context("regwidth", regwidth)
            .set_source(error)
    })
}

fn decode_explicit(bytes: &[u8], strict: bool) -> Result<Storage, Error> {
    let payload = &bytes[HEADER_BYTES..];
    if payload.len() % EXPLICIT_WORD_BYTES != 0 {
        return Err(Error::decode(
            DecodeKind::BadLength,
            "EXPLICIT payload is not a whole number of 8-byte values",
        )
        .with_context("payload_len", payload.len()));
    }

    let mut values = BTreeSet::new();
    let mut previous = None;
    for chunk in payload.chunks_exact(EXPLICIT_WORD_BYTES) {
        let value = BigEndian::read_u64(chunk);
        if strict {
            if previous.is_some_and(|previous| value <= previous) {
                return Err(Error::decode(
                    DecodeKind::NonMonotonicExplicit,
                    "EXPLICIT values must be strictly ascending",
                )
                .with_context("value", value));
            }
            previous = Some(value);
        }
        values.insert(value);
    }
    Ok(Storage::Explicit(values))
}

fn decode_sparse(params: &Params, bytes: &[u8]) -> Storage {
    let mut registers = BTreeMap::new();
    for word in BitReader::new(bytes, HEADER_BYTES, params.short_word_length()) {
        let value = (word & u64::from(params.value_max)) as u8;
        // Zero-valued entries are unset registers; in particular the final
        // padding entry decodes as zero and is dropped here.
        if value != 0 {
            registers.insert((word >> params.regwidth) as u32, value);
        }
    }
    Storage::Sparse(registers)
}

fn decode_full(params: &Params, bytes: &[u8]) -> Result<Storage, Error> {
    let expected = HEADER_BYTES + params.full_payload_bytes();
    if bytes.len() != expected {
        return Err(Error::decode(
            DecodeKind::BadLength,
            "FULL payload must hold exactly the configured registers",
        )
        .with_context("len", bytes.len())
        .with_context("expected", expected));
    }

    let mut vector = BitVector::new(params.regwidth, params.m);
    // Iterate the register count, not the word count: when regwidth does not
    // divide 8 the padding bits could otherwise read as one extra register.
    let reader = BitReader::new(bytes, HEADER_BYTES, params.regwidth);
    for (index, word) in reader.take(params.m).enumerate() {
        if word != 0 {
            vector.set_register(index, word as u8);
        }
    }
    Ok(Storage::Full(vector))
}

fn version_byte(type_code: u8) -> u8 {
    (SCHEMA_VERSION << 4) | type_code
}

fn parameters_byte(params: &Params) -> u8 {
    (((params.regwidth - 1) as u8) << 5) | params.log2m as u8
}

fn cutoff_byte(params: &Params) -> u8 {
    let field = match params.threshold {
        ExplicitThreshold::Auto => CUTOFF_AUTO,
        ExplicitThreshold::Disabled => CUTOFF_DISABLED,
        // Fixed thresholds are powers of two, stored as exponent + 1.
        ExplicitThreshold::Fixed(value) => value.trailing_zeros() as u8 + 1,
    };
    ((params.sparse_enabled as u8) << SPARSE_ENABLED_SHIFT) | field
}

fn unpack_cutoff_byte(byte: u8) -> Result<(ExplicitThreshold, bool), Error> {
    // Bit 7 is reserved; tolerated on read, always written as zero.
    let sparse_enabled = (byte >> SPARSE_ENABLED_SHIFT) & 1 == 1;
    let threshold = match byte & CUTOFF_FIELD_MASK {
        CUTOFF_DISABLED => ExplicitThreshold::Disabled,
        CUTOFF_AUTO => ExplicitThreshold::Auto,
        field @ 1..=31 => ExplicitThreshold::Fixed(1u32 << (field - 1)),
        field => {
            return Err(Error::decode(
                DecodeKind::BadParameters,
                "explicit cutoff exponent is outside the supported range",
            )
            .with_context("cutoff", field))
        }
    };
    Ok((threshold, sparse_enabled))
}
