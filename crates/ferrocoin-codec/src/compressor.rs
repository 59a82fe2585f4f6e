//! Amount compression.
//!
//! A lossless re-encoding of satoshi amounts that makes the common cases
//! (round numbers, whole-coin multiples) fit in one or two varint bytes.

use ferrocoin_primitives::MAX_MONEY;

/// Compress an amount for varint serialization.
///
/// The amount is split into a mantissa and a power-of-ten exponent, so
/// trailing decimal zeros cost nothing. Defined only for
/// 0 <= n <= [`MAX_MONEY`].
pub fn compress_amount(n: u64) -> u64 {
    assert!(n <= MAX_MONEY);

    if n == 0 {
        return 0;
    }
    let mut e = 0u64;
    let mut n = n;
    while n % 10 == 0 && e < 9 {
        n /= 10;
        e += 1;
    }
    if e < 9 {
        let d = n % 10;
        debug_assert!((1..=9).contains(&d));
        n /= 10;
        1 + (n * 9 + d - 1) * 10 + e
    } else {
        1 + (n - 1) * 10 + 9
    }
}

/// Invert [`compress_amount`].
///
/// Total over all of `u64`; range checking against [`MAX_MONEY`] is the
/// caller's job since only decode paths care.
pub fn decompress_amount(x: u64) -> u64 {
    if x == 0 {
        return 0;
    }
    let mut x = x - 1;
    let e = x % 10;
    x /= 10;
    let mut n = if e < 9 {
        let d = (x % 9) + 1;
        x /= 9;
        x * 10 + d
    } else {
        x + 1
    };
    for _ in 0..e {
        n = n.saturating_mul(10);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrocoin_primitives::COIN;

    #[test]
    fn test_known_amounts() {
        assert_eq!(compress_amount(0), 0);
        assert_eq!(compress_amount(1), 1);
        assert_eq!(compress_amount(COIN / 100), 7); // 1 cent
        assert_eq!(compress_amount(COIN), 9);
        assert_eq!(compress_amount(50 * COIN), 50);
        assert_eq!(compress_amount(MAX_MONEY), 21_000_000);
    }

    #[test]
    fn test_amount_roundtrip() {
        for n in [0, 1, 2, 9, 10, 99, 100, COIN - 1, COIN, COIN + 1, MAX_MONEY] {
            assert_eq!(decompress_amount(compress_amount(n)), n);
        }
        for _ in 0..10_000 {
            let n = fastrand::u64(..=MAX_MONEY);
            assert_eq!(decompress_amount(compress_amount(n)), n);
        }
    }
}
