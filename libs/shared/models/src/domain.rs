use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainParseError {
    #[error("insuredId must be a 5-digit code, got {0:?}")]
    InsuredId(String),

    #[error("slotId must be a positive integer, got {0}")]
    SlotId(i64),

    #[error("country {0:?} is not supported")]
    UnsupportedCountry(String),
}

/// Countries that own a processing lane and a local record store.
///
/// Adding a country means adding a variant here; every `match` over it
/// (routing lanes, country stores) then has to be extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountryCode {
    #[serde(rename = "PE")]
    Pe,
    #[serde(rename = "CL")]
    Cl,
}

impl CountryCode {
    pub const ALL: [CountryCode; 2] = [CountryCode::Pe, CountryCode::Cl];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountryCode::Pe => "PE",
            CountryCode::Cl => "CL",
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = DomainParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "PE" => Ok(CountryCode::Pe),
            "CL" => Ok(CountryCode::Cl),
            other => Err(DomainParseError::UnsupportedCountry(other.to_string())),
        }
    }
}

/// Insured-person code: exactly five ASCII digits, leading zeros kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InsuredId(String);

impl InsuredId {
    pub const LENGTH: usize = 5;

    pub fn parse(raw: &str) -> Result<Self, DomainParseError> {
        if raw.len() == Self::LENGTH && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DomainParseError::InsuredId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InsuredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InsuredId {
    type Error = DomainParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InsuredId> for String {
    fn from(value: InsuredId) -> Self {
        value.0
    }
}

/// Opaque reference into the availability oracle. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SlotId(u64);

impl SlotId {
    pub fn new(raw: i64) -> Result<Self, DomainParseError> {
        if raw > 0 {
            Ok(Self(raw as u64))
        } else {
            Err(DomainParseError::SlotId(raw))
        }
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SlotId {
    type Error = DomainParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotId> for i64 {
    fn from(value: SlotId) -> Self {
        value.0 as i64
    }
}
