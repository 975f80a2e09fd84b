//! Edge-case tests for managed rule names: decode must classify every
//! input without panicking, and only well-formed names may be managed.

use jit_access::grant::token::{MalformedReason, PREFIX};
use jit_access::grant::{decode, encode};
use jit_access::time::MAX_TICKS;
use jit_access::{Nonce, Ticks, TokenDecode};

#[test]
fn edge_decode_classifies_known_shapes() {
    let cases: &[(&str, Option<MalformedReason>, bool)] = &[
        ("JIT_ab12cd34_638843328000000000", None, true),
        ("JIT_AB12CD34_638843328000000000", None, true),
        ("manual-allow-office", None, false),
        ("jit_ab12cd34_638843328000000000", None, false),
        ("JITab12cd34_638843328000000000", None, false),
        ("JIT", None, false),
        ("", None, false),
        ("JIT_malformed", Some(MalformedReason::FieldCount(2)), false),
        ("JIT_", Some(MalformedReason::FieldCount(2)), false),
        ("JIT_a_b_c", Some(MalformedReason::FieldCount(4)), false),
        ("JIT__638843328000000000", Some(MalformedReason::InvalidNonce), false),
        ("JIT_ab-cd_638843328000000000", Some(MalformedReason::InvalidNonce), false),
        ("JIT_ab12cd34_", Some(MalformedReason::DeadlineNotInteger), false),
        ("JIT_ab12cd34_-1", Some(MalformedReason::DeadlineNotInteger), false),
        ("JIT_ab12cd34_+5", Some(MalformedReason::DeadlineNotInteger), false),
        ("JIT_ab12cd34_ 5", Some(MalformedReason::DeadlineNotInteger), false),
        ("JIT_ab12cd34_6.5", Some(MalformedReason::DeadlineNotInteger), false),
        (
            "JIT_ab12cd34_99999999999999999999999",
            Some(MalformedReason::DeadlineOutOfRange),
            false,
        ),
    ];

    for (name, reason, managed) in cases {
        let decoded = decode(name);
        match reason {
            Some(expected) => assert_eq!(
                decoded,
                TokenDecode::Malformed(expected.clone()),
                "name {name:?}"
            ),
            None if *managed => assert!(decoded.is_managed(), "name {name:?} should be managed"),
            None => assert_eq!(decoded, TokenDecode::Foreign, "name {name:?}"),
        }
    }
}

#[test]
fn edge_max_tick_boundary() {
    let at_max = format!("{PREFIX}_deadbeef_{MAX_TICKS}");
    assert!(decode(&at_max).is_managed());

    let past_max = format!("{PREFIX}_deadbeef_{}", MAX_TICKS + 1);
    assert_eq!(
        decode(&past_max),
        TokenDecode::Malformed(MalformedReason::DeadlineOutOfRange)
    );

    assert_eq!(
        decode(&format!("{PREFIX}_deadbeef_{}", u64::MAX)),
        TokenDecode::Malformed(MalformedReason::DeadlineOutOfRange)
    );
}

#[test]
fn edge_zero_and_leading_zero_deadlines() {
    let zero = decode("JIT_deadbeef_0").managed().unwrap();
    assert_eq!(zero.deadline.get(), 0);

    let padded = decode("JIT_deadbeef_000123").managed().unwrap();
    assert_eq!(padded.deadline.get(), 123);
}

#[test]
fn edge_generated_names_always_decode() {
    let deadlines = [
        Ticks::new(0).unwrap(),
        Ticks::new(638_843_328_000_000_000).unwrap(),
        Ticks::new(MAX_TICKS).unwrap(),
    ];
    for len in 8..=32 {
        for deadline in deadlines {
            let nonce = Nonce::generate(len);
            let name = encode(&nonce, deadline);
            let managed = decode(&name).managed().unwrap_or_else(|| panic!("{name}"));
            assert_eq!(managed.nonce, nonce);
            assert_eq!(managed.deadline, deadline);
        }
    }
}

#[test]
fn edge_nonce_length_is_clamped() {
    assert_eq!(Nonce::generate(1).as_str().len(), 8);
    assert_eq!(Nonce::generate(1000).as_str().len(), 32);
    assert!(Nonce::generate(12)
        .as_str()
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
}

#[test]
fn edge_decode_never_panics_on_arbitrary_bytes() {
    let samples = [
        "JIT_\u{0}_1",
        "JIT_é_1",
        "JIT_ab_١٢٣",
        "JIT_ab_１２３",
        "JIT_____",
        "JIT_ab_18446744073709551616",
        "\u{feff}JIT_ab_1",
    ];
    for name in samples {
        let decoded = decode(name);
        assert!(!decoded.is_managed(), "{name:?} must not be managed");
    }
}
