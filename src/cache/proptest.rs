//! Property-Based Tests for Fingerprinting
//!
//! Uses proptest to verify the fingerprint contract across arbitrary
//! inputs:
//!
//! 1. **Determinism**: the same input always fingerprints identically
//! 2. **Content Sensitivity**: any single-byte mutation changes the key
//! 3. **Normalization**: logically equal pricing lookups fingerprint
//!    identically regardless of case, whitespace, and characteristic order

#![cfg(test)]

use proptest::prelude::*;

use super::fingerprint::{Fingerprint, PricingKey};

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for arbitrary binary inputs (images are opaque bytes here)
fn bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// Strategy for text fields as they arrive from recognition APIs:
/// mixed case, stray whitespace
fn field_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9' -]{0,24}"
}

fn pricing_key_strategy() -> impl Strategy<Value = PricingKey> {
    (
        field_strategy(),
        field_strategy(),
        "[0-9]{0,4}",
        field_strategy(),
        "[a-z]{2}",
        prop::collection::vec(field_strategy(), 0..4),
    )
        .prop_map(
            |(card_name, set_name, number, finish, language, characteristics)| PricingKey {
                card_name,
                set_name,
                number,
                finish,
                language,
                characteristics,
            },
        )
}

// =============================================================================
// Binary Fingerprint Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: fingerprinting is deterministic across repeated calls.
    #[test]
    fn prop_fingerprint_deterministic(data in bytes_strategy()) {
        prop_assert_eq!(Fingerprint::of_bytes(&data), Fingerprint::of_bytes(&data));
    }

    /// Property: flipping any single bit produces a different fingerprint.
    #[test]
    fn prop_fingerprint_bit_sensitive(
        data in prop::collection::vec(any::<u8>(), 1..1024),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut mutated = data.clone();
        let at = index.index(mutated.len());
        mutated[at] ^= 1 << bit;
        prop_assert_ne!(Fingerprint::of_bytes(&data), Fingerprint::of_bytes(&mutated));
    }

    /// Property: the hex form always round-trips through `from_hex`.
    #[test]
    fn prop_fingerprint_hex_roundtrip(data in bytes_strategy()) {
        let fp = Fingerprint::of_bytes(&data);
        prop_assert_eq!(Fingerprint::from_hex(fp.as_str()), Some(fp));
    }
}

// =============================================================================
// Pricing Key Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: case and surrounding whitespace never change the key.
    #[test]
    fn prop_pricing_key_case_whitespace_invariant(key in pricing_key_strategy()) {
        let noisy = PricingKey {
            card_name: format!("  {}  ", key.card_name.to_uppercase()),
            set_name: key.set_name.to_lowercase(),
            number: format!("{} ", key.number),
            finish: key.finish.to_uppercase(),
            language: key.language.to_uppercase(),
            characteristics: key.characteristics.clone(),
        };
        prop_assert_eq!(key.fingerprint(), noisy.fingerprint());
    }

    /// Property: characteristic order never changes the key.
    #[test]
    fn prop_pricing_key_characteristic_order_invariant(key in pricing_key_strategy()) {
        let mut reversed = key.clone();
        reversed.characteristics.reverse();
        prop_assert_eq!(key.fingerprint(), reversed.fingerprint());
    }

    /// Property: pricing keys are stable across repeated fingerprinting.
    #[test]
    fn prop_pricing_key_deterministic(key in pricing_key_strategy()) {
        prop_assert_eq!(key.fingerprint(), key.fingerprint());
    }
}
