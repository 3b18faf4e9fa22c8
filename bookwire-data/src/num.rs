//! Fixed-point to decimal conversion helpers.
//!
//! Raw on-chain quantities are `U256` scaled by the pool's decimals; candle
//! volumes and averages are display-level [`Decimal`]s. `Decimal` carries 28
//! significant digits, so conversions truncate excess fractional digits
//! rather than fail.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

/// Convert a raw fixed-point quantity into a [`Decimal`] with the point
/// placed `scale` digits from the right.
///
/// eg/ `scaled_decimal(1_500_000_000_000_000_000, 18)` == `1.5`
pub fn scaled_decimal(raw: U256, scale: u32) -> Decimal {
    let digits = raw.to_string();

    let (int_part, frac_part) = if digits.len() as u32 <= scale {
        let mut frac = "0".repeat(scale as usize - digits.len());
        frac.push_str(&digits);
        (String::from("0"), frac)
    } else {
        let split = digits.len() - scale as usize;
        (digits[..split].to_string(), digits[split..].to_string())
    };

    // Truncate fractional digits that exceed Decimal's 28 significant
    // digits; whole-part overflow saturates.
    let budget = 28usize.saturating_sub(int_part.len());
    let frac_part = &frac_part[..frac_part.len().min(budget)];

    let rendered = if frac_part.is_empty() {
        int_part.clone()
    } else {
        format!("{int_part}.{frac_part}")
    };

    Decimal::from_str(&rendered).unwrap_or_else(|error| {
        warn!(%raw, scale, %error, "quantity exceeds Decimal range, saturating");
        Decimal::MAX
    })
}

/// Convert a raw price quantity into a [`Decimal`] without scaling.
pub fn decimal_from_u256(raw: U256) -> Decimal {
    scaled_decimal(raw, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scaled_decimal() {
        struct TestCase {
            raw: U256,
            scale: u32,
            expected: Decimal,
        }

        let tests = vec![
            TestCase {
                // TC0: whole token at 18dp
                raw: U256::from(10).pow(U256::from(18)),
                scale: 18,
                expected: dec!(1),
            },
            TestCase {
                // TC1: half token at 18dp
                raw: U256::from(500_000_000_000_000_000u64),
                scale: 18,
                expected: dec!(0.5),
            },
            TestCase {
                // TC2: sub-unit value smaller than the scale
                raw: U256::from(42u64),
                scale: 6,
                expected: dec!(0.000042),
            },
            TestCase {
                // TC3: zero
                raw: U256::ZERO,
                scale: 18,
                expected: dec!(0),
            },
            TestCase {
                // TC4: no scaling
                raw: U256::from(2_000_000_000u64),
                scale: 0,
                expected: dec!(2000000000),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = scaled_decimal(test.raw, test.scale);
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_scaled_decimal_truncates_excess_digits() {
        // 1e18 + 1 wei at 18dp exceeds nothing; a 30-digit raw at 18dp does.
        let raw = U256::from_str_radix("123456789012345678901234567890", 10).unwrap();
        let actual = scaled_decimal(raw, 18);
        assert_eq!(actual, dec!(123456789012.3456789012345678));
    }
}
