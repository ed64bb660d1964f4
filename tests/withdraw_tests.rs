//! Property tests for the withdrawal-permission bit set.

use rand::{rngs::StdRng, Rng, SeedableRng};
use venuekit::exchange::WithdrawPermissions;

const KNOWN_BITS: u32 = (1 << 18) - 1;

#[test]
fn support_is_subset_check_over_random_masks() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..10_000 {
        let granted = WithdrawPermissions::from_bits(rng.gen::<u32>() & KNOWN_BITS);
        let requested = WithdrawPermissions::from_bits(rng.gen::<u32>() & KNOWN_BITS);
        let expected = requested.bits() & granted.bits() == requested.bits();
        assert_eq!(
            granted.supports(requested),
            expected,
            "granted={:#x} requested={:#x}",
            granted.bits(),
            requested.bits()
        );
        assert!(granted.supports(granted));
        assert!(granted.supports(WithdrawPermissions::NONE));
    }
}

#[test]
fn every_set_bit_gets_exactly_one_label() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1_000 {
        let mask = rng.gen::<u32>() & KNOWN_BITS;
        let rendered = WithdrawPermissions::from_bits(mask).to_string();
        if mask == 0 {
            assert_eq!(rendered, WithdrawPermissions::NONE_TEXT);
        } else {
            assert_eq!(rendered.split(" & ").count(), mask.count_ones() as usize);
        }
    }
}

#[test]
fn empty_set_renders_sentinel() {
    assert_eq!(
        WithdrawPermissions::from_bits(0).to_string(),
        "NONE, WEBSITE ONLY"
    );
}

#[test]
fn single_permission_renders_its_label() {
    assert_eq!(
        WithdrawPermissions::AUTO_WITHDRAW_CRYPTO.to_string(),
        "AUTO WITHDRAW CRYPTO"
    );
    assert_eq!(
        WithdrawPermissions::WITHDRAW_FIAT_VIA_WEBSITE_ONLY.to_string(),
        "WITHDRAW FIAT VIA WEBSITE ONLY"
    );
}
