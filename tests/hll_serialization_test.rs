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

//! Wire-format tests: golden byte fixtures, cross-implementation vectors,
//! round-trips across the parameter grid, and malformed-input handling.

mod common;

use common::construct_hll_value;
use common::hash;
use hll_storage::error::DecodeKind;
use hll_storage::error::ErrorKind;
use hll_storage::hll::ExplicitThreshold;
use hll_storage::hll::Hll;
use hll_storage::hll::HllType;

#[test]
fn test_empty_fixture() {
    let hll = Hll::new(13, 5).unwrap();
    assert_eq!(hll.to_bytes(), vec![0x11, 0x8D]);
    assert_eq!(hll.cardinality(), 0);

    let restored = Hll::from_bytes(&[0x11, 0x8D]).unwrap();
    assert_eq!(restored.hll_type(), HllType::Empty);
    assert_eq!(restored.log2m(), 13);
    assert_eq!(restored.regwidth(), 5);
    assert_eq!(restored.cardinality(), 0);
}

#[test]
fn test_explicit_fixture_single_value() {
    let mut hll = Hll::new(11, 5).unwrap();
    hll.add_raw(0x7FFF_FFFF_FFFF_FFFF);

    assert_eq!(hll.hll_type(), HllType::Explicit);
    assert_eq!(hll.cardinality(), 1);
    // Header, then the hash verbatim in big-endian order.
    assert_eq!(
        hll.to_bytes(),
        vec![0x12, 0x8B, 0x7F, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn test_explicit_fixture_cross_implementation() {
    // Produced by a sibling implementation at log2m=13, regwidth=5 with one
    // value; decoding and re-encoding must reproduce it bit for bit.
    let fixture: Vec<u8> = vec![
        0x12, 0x8D, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xF6, 0xA5, 0xC4, 0x20,
    ];

    let hll = Hll::from_bytes(&fixture).unwrap();
    assert_eq!(hll.hll_type(), HllType::Explicit);
    assert_eq!(hll.log2m(), 13);
    assert_eq!(hll.regwidth(), 5);
    assert_eq!(hll.explicit_threshold(), ExplicitThreshold::Auto);
    assert!(hll.sparse_enabled());
    assert_eq!(hll.cardinality(), 1);
    assert_eq!(hll.to_bytes(), fixture);

    // The same value added locally serializes identically.
    let mut local = Hll::new(13, 5).unwrap();
    local.add_raw(0xFFFF_FFFF_F6A5_C420);
    assert_eq!(local.to_bytes(), fixture);
}

#[test]
fn test_explicit_values_sorted_ascending() {
    let mut hll = Hll::new(11, 5).unwrap();
    for raw_value in [0xDEAD_BEEF_0000_0001, 0x0000_0000_0000_0005, u64::MAX] {
        hll.add_raw(raw_value);
    }

    let bytes = hll.to_bytes();
    let words: Vec<u64> = bytes[3..]
        .chunks_exact(8)
        .map(|chunk| u64::from_be_bytes(chunk.try_into().unwrap()))
        .collect();
    assert_eq!(
        words,
        vec![0x0000_0000_0000_0005, 0xDEAD_BEEF_0000_0001, u64::MAX]
    );
}

#[test]
fn test_sparse_fixture() {
    // log2m=12, regwidth=5: 17-bit entries (index << 5) | value. Registers
    // 0..=2 at values 9, 10, 11 pack as the words 9, 42, 75.
    let mut hll = Hll::builder()
        .log2m(12)
        .regwidth(5)
        .explicit_threshold(ExplicitThreshold::Disabled)
        .build()
        .unwrap();
    for index in 0..3u64 {
        hll.add_raw(construct_hll_value(12, index, index as u32 + 9));
    }

    assert_eq!(hll.hll_type(), HllType::Sparse);
    assert_eq!(
        hll.to_bytes(),
        vec![0x13, 0x8C, 0x40, 0x00, 0x04, 0x80, 0x0A, 0x80, 0x09, 0x60]
    );

    let restored = Hll::from_bytes(&hll.to_bytes()).unwrap();
    assert_eq!(restored, hll);
}

#[test]
fn test_sparse_tolerates_trailing_zero_padding() {
    let mut hll = Hll::builder()
        .log2m(12)
        .regwidth(5)
        .explicit_threshold(ExplicitThreshold::Disabled)
        .build()
        .unwrap();
    for index in 0..3u64 {
        hll.add_raw(construct_hll_value(12, index, index as u32 + 9));
    }

    // An extra all-zero byte only adds unset-register bits; the decode must
    // ignore it and re-encode canonically.
    let mut padded = hll.to_bytes();
    padded.push(0x00);
    let restored = Hll::from_bytes(&padded).unwrap();
    assert_eq!(restored, hll);
    assert_eq!(restored.to_bytes(), hll.to_bytes());
}

#[test]
fn test_full_fixture() {
    let mut hll = Hll::builder()
        .log2m(13)
        .regwidth(5)
        .explicit_threshold(ExplicitThreshold::Disabled)
        .sparse_enabled(false)
        .build()
        .unwrap();
    hll.add_raw(0);

    let bytes = hll.to_bytes();
    // Version/type, parameters, cutoff (explicit off, sparse off).
    assert_eq!(&bytes[..3], &[0x14, 0x8D, 0x00]);
    assert_eq!(bytes.len(), 3 + 5120);
    // Register 0 holds 31; everything after is zero.
    assert_eq!(bytes[3], 0xF8);
    assert!(bytes[4..].iter().all(|&byte| byte == 0));

    let restored = Hll::from_bytes(&bytes).unwrap();
    assert_eq!(restored, hll);
}

#[test]
fn test_round_trip_parameter_grid() {
    for log2m in [4, 11, 16] {
        for regwidth in [1, 5, 8] {
            for threshold in [
                ExplicitThreshold::Auto,
                ExplicitThreshold::Disabled,
                ExplicitThreshold::Fixed(128),
            ] {
                for sparse_enabled in [true, false] {
                    for count in [0u64, 1, 100, 1000] {
                        let mut hll = Hll::builder()
                            .log2m(log2m)
                            .regwidth(regwidth)
                            .explicit_threshold(threshold)
                            .sparse_enabled(sparse_enabled)
                            .build()
                            .unwrap();
                        for i in 0..count {
                            hll.add_raw(hash(i));
                        }

                        let bytes = hll.to_bytes();
                        let restored = Hll::from_bytes(&bytes).unwrap();
                        let context = format!(
                            "log2m={log2m} regwidth={regwidth} {threshold:?} \
                             sparse={sparse_enabled} count={count}"
                        );
                        assert_eq!(restored.hll_type(), hll.hll_type(), "{context}");
                        assert_eq!(restored.cardinality(), hll.cardinality(), "{context}");
                        assert_eq!(restored.to_bytes(), bytes, "{context}");
                        restored.validate().unwrap();
                    }
                }
            }
        }
    }
}

#[test]
fn test_threshold_setting_survives_round_trip() {
    for threshold in [
        ExplicitThreshold::Auto,
        ExplicitThreshold::Fixed(1),
        ExplicitThreshold::Fixed(128),
        ExplicitThreshold::Fixed(1 << 30),
    ] {
        let mut hll = Hll::builder()
            .log2m(11)
            .regwidth(5)
            .explicit_threshold(threshold)
            .build()
            .unwrap();
        hll.add_raw(42);

        let restored = Hll::from_bytes(&hll.to_bytes()).unwrap();
        assert_eq!(restored.explicit_threshold(), threshold);
        assert!(restored.sparse_enabled());
    }

    // DISABLED has no explicit stage, so serialize from the sparse form.
    let mut hll = Hll::builder()
        .log2m(11)
        .regwidth(5)
        .explicit_threshold(ExplicitThreshold::Disabled)
        .build()
        .unwrap();
    hll.add_raw(42);
    let restored = Hll::from_bytes(&hll.to_bytes()).unwrap();
    assert_eq!(restored.explicit_threshold(), ExplicitThreshold::Disabled);
}

#[test]
fn test_empty_serializes_to_two_bytes_regardless_of_settings() {
    for (threshold, sparse_enabled) in [
        (ExplicitThreshold::Auto, true),
        (ExplicitThreshold::Disabled, false),
        (ExplicitThreshold::Fixed(64), true),
    ] {
        let hll = Hll::builder()
            .log2m(11)
            .regwidth(5)
            .explicit_threshold(threshold)
            .sparse_enabled(sparse_enabled)
            .build()
            .unwrap();
        assert_eq!(hll.to_bytes(), vec![0x11, 0x8B]);
    }
}

#[test]
fn test_decode_rejects_unknown_version() {
    for version_nibble in [0u8, 2, 15] {
        let bytes = [(version_nibble << 4) | 0x01, 0x8B];
        let error = Hll::from_bytes(&bytes).unwrap_err();
        assert_eq!(
            error.kind(),
            ErrorKind::Decode(DecodeKind::UnknownVersion)
        );
    }
}

#[test]
fn test_decode_rejects_unknown_type() {
    for type_nibble in [0u8, 5, 15] {
        let bytes = [0x10 | type_nibble, 0x8B, 0x7F];
        let error = Hll::from_bytes(&bytes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Decode(DecodeKind::UnknownType));
    }
}

#[test]
fn test_decode_rejects_bad_log2m() {
    // log2m=3 and log2m=31 are outside the storable range.
    for bad_parameters in [0x83u8, 0x9F] {
        let error = Hll::from_bytes(&[0x12, bad_parameters, 0x7F]).unwrap_err();
        assert_eq!(
            error.kind(),
            ErrorKind::Decode(DecodeKind::BadParameters)
        );
    }
}

#[test]
fn test_decode_rejects_oversized_cutoff_exponent() {
    // Cutoff fields 32..=62 would mean thresholds past 2^31.
    let error = Hll::from_bytes(&[0x12, 0x8B, 0x20]).unwrap_err();
    assert_eq!(
        error.kind(),
        ErrorKind::Decode(DecodeKind::BadParameters)
    );
}

#[test]
fn test_decode_rejects_bad_lengths() {
    // Too short for any HLL.
    for bytes in [&[][..], &[0x12][..]] {
        let error = Hll::from_bytes(bytes).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Decode(DecodeKind::BadLength));
    }

    // EMPTY must be exactly two bytes.
    let error = Hll::from_bytes(&[0x11, 0x8B, 0x00]).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode(DecodeKind::BadLength));

    // Non-EMPTY types need their cutoff byte.
    let error = Hll::from_bytes(&[0x12, 0x8B]).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode(DecodeKind::BadLength));

    // EXPLICIT payloads come in whole 8-byte values.
    let error = Hll::from_bytes(&[0x12, 0x8B, 0x7F, 0x01, 0x02, 0x03]).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode(DecodeKind::BadLength));

    // FULL payloads are exactly ceil(m * regwidth / 8) bytes.
    let mut hll = Hll::builder()
        .log2m(11)
        .regwidth(5)
        .explicit_threshold(ExplicitThreshold::Disabled)
        .sparse_enabled(false)
        .build()
        .unwrap();
    hll.add_raw(1);
    let mut truncated = hll.to_bytes();
    truncated.pop();
    let error = Hll::from_bytes(&truncated).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode(DecodeKind::BadLength));
}

#[test]
fn test_strict_decode_rejects_unordered_explicit() {
    let descending = [
        0x12, 0x8B, 0x7F, //
        0, 0, 0, 0, 0, 0, 0, 5, //
        0, 0, 0, 0, 0, 0, 0, 3,
    ];
    let error = Hll::from_bytes_strict(&descending).unwrap_err();
    assert_eq!(
        error.kind(),
        ErrorKind::Decode(DecodeKind::NonMonotonicExplicit)
    );

    // Lenient decoding sorts it out.
    let hll = Hll::from_bytes(&descending).unwrap();
    assert_eq!(hll.cardinality(), 2);

    let duplicated = [
        0x12, 0x8B, 0x7F, //
        0, 0, 0, 0, 0, 0, 0, 5, //
        0, 0, 0, 0, 0, 0, 0, 5,
    ];
    let error = Hll::from_bytes_strict(&duplicated).unwrap_err();
    assert_eq!(
        error.kind(),
        ErrorKind::Decode(DecodeKind::NonMonotonicExplicit)
    );
    let hll = Hll::from_bytes(&duplicated).unwrap();
    assert_eq!(hll.cardinality(), 1);
}

#[test]
fn test_strict_decode_accepts_canonical_bytes() {
    let mut hll = Hll::new(11, 5).unwrap();
    for i in 0..50u64 {
        hll.add_raw(hash(i));
    }
    let bytes = hll.to_bytes();
    let restored = Hll::from_bytes_strict(&bytes).unwrap();
    assert_eq!(restored, hll);
}

#[test]
fn test_decode_never_partially_applies() {
    // A bad input produces an error and no instance; the source buffer is
    // untouched and a subsequent good decode is unaffected.
    let mut hll = Hll::new(11, 5).unwrap();
    hll.add_raw(7);
    let good = hll.to_bytes();

    let mut bad = good.clone();
    bad.truncate(good.len() - 3);
    assert!(Hll::from_bytes(&bad).is_err());

    let restored = Hll::from_bytes(&good).unwrap();
    assert_eq!(restored, hll);
}
