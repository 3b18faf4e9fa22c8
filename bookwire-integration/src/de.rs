use alloy_primitives::U256;

/// Determine the `DateTime<Utc>` from the provided `Duration` since the epoch.
pub fn datetime_utc_from_epoch_duration(
    duration: std::time::Duration,
) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from(std::time::UNIX_EPOCH + duration)
}

/// Deserialize a `String` as the desired type.
pub fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::de::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let data: &str = serde::de::Deserialize::deserialize(deserializer)?;
    data.parse::<T>().map_err(serde::de::Error::custom)
}

/// Serialize any `Display` value as its `String` rendering.
pub fn se_display<T, S>(value: T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: serde::Serializer,
{
    serializer.collect_str(&value)
}

/// SerDe a [`U256`] as a decimal string (never hex, never a JSON number),
/// preserving full precision on the wire.
///
/// eg/ `#[serde(with = "bookwire_integration::de::u256_decimal")]`
pub mod u256_decimal {
    use super::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = <&str as Deserialize>::deserialize(deserializer)?;
        U256::from_str_radix(data, 10).map_err(serde::de::Error::custom)
    }
}

/// Parse a decimal string into a [`U256`].
pub fn u256_from_decimal_str(data: &str) -> Option<U256> {
    U256::from_str_radix(data, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    struct Quantity {
        #[serde(with = "u256_decimal")]
        value: U256,
    }

    #[test]
    fn test_u256_decimal_serde() {
        struct TestCase {
            input: &'static str,
            expected: U256,
        }

        let tests = vec![
            TestCase {
                // TC0: zero
                input: r#"{"value":"0"}"#,
                expected: U256::ZERO,
            },
            TestCase {
                // TC1: one whole 18dp token
                input: r#"{"value":"1000000000000000000"}"#,
                expected: U256::from(10).pow(U256::from(18)),
            },
            TestCase {
                // TC2: larger than u128
                input: r#"{"value":"340282366920938463463374607431768211457"}"#,
                expected: U256::from(u128::MAX) + U256::from(2),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<Quantity>(test.input).unwrap();
            assert_eq!(actual.value, test.expected, "TC{index} de failed");

            let round_trip = serde_json::to_string(&actual).unwrap();
            assert_eq!(round_trip, test.input, "TC{index} se failed");
        }
    }

    #[test]
    fn test_u256_decimal_rejects_hex() {
        assert!(serde_json::from_str::<Quantity>(r#"{"value":"0x10"}"#).is_err());
    }
}
