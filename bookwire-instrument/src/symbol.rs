use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::{SmolStr, StrExt, format_smolstr};
use std::fmt::{Display, Formatter};

/// Bookwire new type representing a wire market symbol `String` identifier:
/// the lowercase concatenation of base and quote currency symbols.
///
/// eg/ "wethusdc", "wbtcusdt", etc
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct Symbol(SmolStr);

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Symbol::new)
    }
}

impl<S> From<S> for Symbol
where
    S: Into<SmolStr>,
{
    fn from(input: S) -> Self {
        Symbol::new(input)
    }
}

impl Symbol {
    /// Construct a new [`Symbol`] new type, lower-casing the provided input.
    pub fn new<S>(input: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(input.into().to_lowercase_smolstr())
    }

    /// Construct the [`Symbol`] for a base / quote currency symbol pairing.
    pub fn from_pair(base: &str, quote: &str) -> Self {
        Self::new(format_smolstr!("{base}{quote}"))
    }
}

/// Lowercase hex rendering of an [`Address`], the form user channels are
/// keyed by (`/ws/<address>`).
pub fn lowercase_address(address: &Address) -> String {
    format!("{address:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_symbol_from_pair_lowercases() {
        assert_eq!(Symbol::from_pair("WETH", "USDC").as_ref(), "wethusdc");
    }

    #[test]
    fn test_lowercase_address() {
        let address =
            Address::from_str("0xDeaDbeefdEAdbeefdEadbEEFdeadbeEFdEaDbeeF").unwrap();
        assert_eq!(
            lowercase_address(&address),
            "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
        );
    }
}
