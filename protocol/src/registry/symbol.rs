//! Token symbols.
//!
//! The three confidential tokens the application ships with are a closed
//! set of enum variants. Tokens a user deployed themselves are carried in
//! [`TokenSymbol::Deployed`] and only resolve if the deployed-token store
//! knows about them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A token symbol, resolved through [`super::TokenResolver`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenSymbol {
    /// Confidential USD.
    ZUsd,
    /// Confidential Bitcoin.
    ZBtc,
    /// Confidential Ether.
    ZEth,
    /// A user-deployed token, keyed by its symbol string.
    Deployed(String),
}

impl TokenSymbol {
    /// The tokens that ship in the static registry.
    pub const BUILTIN: [TokenSymbol; 3] = [TokenSymbol::ZUsd, TokenSymbol::ZBtc, TokenSymbol::ZEth];

    pub fn as_str(&self) -> &str {
        match self {
            Self::ZUsd => "zUSD",
            Self::ZBtc => "zBTC",
            Self::ZEth => "zETH",
            Self::Deployed(s) => s,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Deployed(_))
    }

    /// Builtin symbols match case-insensitively; anything else becomes a
    /// [`TokenSymbol::Deployed`] and is left for the resolver to accept or
    /// reject.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "zusd" => Self::ZUsd,
            "zbtc" => Self::ZBtc,
            "zeth" => Self::ZEth,
            _ => Self::Deployed(trimmed.to_string()),
        }
    }
}

impl FromStr for TokenSymbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSymbol({})", self.as_str())
    }
}

impl Serialize for TokenSymbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TokenSymbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_symbols_parse_case_insensitively() {
        assert_eq!("zUSD".parse::<TokenSymbol>().unwrap(), TokenSymbol::ZUsd);
        assert_eq!("ZBTC".parse::<TokenSymbol>().unwrap(), TokenSymbol::ZBtc);
        assert_eq!(" zeth ".parse::<TokenSymbol>().unwrap(), TokenSymbol::ZEth);
    }

    #[test]
    fn unknown_symbols_become_deployed() {
        let sym: TokenSymbol = "zGOLD".parse().unwrap();
        assert_eq!(sym, TokenSymbol::Deployed("zGOLD".to_string()));
        assert!(!sym.is_builtin());
        assert_eq!(sym.to_string(), "zGOLD");
    }

    #[test]
    fn serde_uses_display_form() {
        let json = serde_json::to_string(&TokenSymbol::ZUsd).unwrap();
        assert_eq!(json, "\"zUSD\"");
        let back: TokenSymbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TokenSymbol::ZUsd);
    }
}
