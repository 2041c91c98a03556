use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An account address in canonical form: `0x` followed by 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse an address typed in by a person.
    ///
    /// It must start with `0x` and be 64 to 66 characters long after trimming.
    pub fn try_from_input(input: &str) -> Result<Address, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ErrorKind::InvalidAddress("Please enter an address".to_owned()).into());
        }
        if !input.starts_with("0x") {
            return Err(ErrorKind::InvalidAddress("Address must start with 0x".to_owned()).into());
        }
        if input.len() < 64 || input.len() > 66 {
            return Err(ErrorKind::InvalidAddress("Invalid address length".to_owned()).into());
        }
        Self::canonicalize(&input[2..])
    }

    /// Parse an address as the chain or the indexer reports it. These may be
    /// short (like `0x1`) and may omit the `0x` prefix.
    pub fn try_from_chain(s: &str) -> Result<Address, Error> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > 64 {
            return Err(ErrorKind::InvalidAddress(s.to_owned()).into());
        }
        Self::canonicalize(digits)
    }

    fn canonicalize(digits: &str) -> Result<Address, Error> {
        let padded = format!("{:0>64}", digits.to_lowercase());
        if hex::decode(&padded).is_err() {
            return Err(ErrorKind::InvalidAddress(format!("0x{digits} is not hex")).into());
        }
        Ok(Address(format!("0x{padded}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short display form, like `0xe900...5988`
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Address, Error> {
        Address::try_from_chain(&s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> String {
        a.0
    }
}
