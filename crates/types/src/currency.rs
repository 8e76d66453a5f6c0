//! Currency identifiers
//!
//! A currency is referred to by a short ticker (`MANA`, `DAI`, ...). Tickers
//! are normalised to uppercase so `mana` and `MANA` name the same ratio
//! entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted ticker.
pub const MAX_CURRENCY_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyError {
    #[error("currency ticker must not be empty")]
    Empty,
    #[error("currency ticker longer than {MAX_CURRENCY_LEN} characters: {0}")]
    TooLong(String),
    #[error("currency ticker contains invalid character {ch:?}: {ticker}")]
    InvalidCharacter { ticker: String, ch: char },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyId(String);

impl CurrencyId {
    pub fn new(ticker: &str) -> Result<Self, CurrencyError> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(CurrencyError::Empty);
        }
        if ticker.len() > MAX_CURRENCY_LEN {
            return Err(CurrencyError::TooLong(ticker.to_string()));
        }
        if let Some(ch) = ticker
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(CurrencyError::InvalidCharacter {
                ticker: ticker.to_string(),
                ch,
            });
        }
        Ok(Self(ticker.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<CurrencyId> for String {
    fn from(value: CurrencyId) -> Self {
        value.0
    }
}

impl TryFrom<String> for CurrencyId {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CurrencyId::new(&value)
    }
}

impl FromStr for CurrencyId {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyId::new(s)
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
