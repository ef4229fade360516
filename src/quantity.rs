use std::fmt;
use std::ops::{Sub, SubAssign};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

lazy_static! {
    static ref CPU_RE: Regex = Regex::new(r"^([0-9]+)(m)?$").unwrap();
    static ref MEMORY_RE: Regex =
        Regex::new(r"^([0-9]+)(Ei|Pi|Ti|Gi|Mi|Ki|E|P|T|G|g|M|m|K|k)?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid cpu quantity {0:?}")]
    InvalidCpu(String),
    #[error("invalid memory quantity {0:?}")]
    InvalidMemory(String),
    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),
    #[error("total {0} is out of range")]
    TotalOutOfRange(&'static str),
}

/// A non-negative amount in a fixed base unit: milli-cores for CPU, bytes for
/// memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceQuantity(u64);

impl ResourceQuantity {
    pub const ZERO: ResourceQuantity = ResourceQuantity(0);

    pub const fn new(value: u64) -> Self {
        ResourceQuantity(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: ResourceQuantity) -> Option<ResourceQuantity> {
        self.0.checked_add(rhs.0).map(ResourceQuantity)
    }
}

impl From<u64> for ResourceQuantity {
    fn from(value: u64) -> Self {
        ResourceQuantity(value)
    }
}

impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Sub for ResourceQuantity {
    type Output = ResourceQuantity;

    fn sub(self, rhs: ResourceQuantity) -> ResourceQuantity {
        ResourceQuantity(self.0 - rhs.0)
    }
}

impl SubAssign for ResourceQuantity {
    fn sub_assign(&mut self, rhs: ResourceQuantity) {
        self.0 -= rhs.0;
    }
}

/// Parses a CPU quantity into milli-cores.
///
/// Accepts whole cores ("2") or milli-cores ("500m"). Fractional values such as
/// "0.5" are rejected.
pub fn parse_cpu(text: &str) -> Result<ResourceQuantity, ParseError> {
    let caps = CPU_RE
        .captures(text)
        .ok_or_else(|| ParseError::InvalidCpu(text.to_string()))?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| ParseError::OutOfRange(text.to_string()))?;

    let milli = if caps.get(2).is_some() {
        Some(amount)
    } else {
        amount.checked_mul(1000)
    };

    milli
        .map(ResourceQuantity)
        .ok_or_else(|| ParseError::OutOfRange(text.to_string()))
}

/// Parses a memory quantity into bytes.
pub fn parse_memory(text: &str) -> Result<ResourceQuantity, ParseError> {
    let caps = MEMORY_RE
        .captures(text)
        .ok_or_else(|| ParseError::InvalidMemory(text.to_string()))?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| ParseError::OutOfRange(text.to_string()))?;

    let factor = match caps.get(2) {
        Some(suffix) => memory_factor(suffix.as_str())
            .ok_or_else(|| ParseError::InvalidMemory(text.to_string()))?,
        None => 1,
    };

    amount
        .checked_mul(factor)
        .map(ResourceQuantity)
        .ok_or_else(|| ParseError::OutOfRange(text.to_string()))
}

fn memory_factor(suffix: &str) -> Option<u64> {
    // single letter suffixes are case-insensitive
    let suffix = if suffix.len() == 1 {
        suffix.to_ascii_uppercase()
    } else {
        suffix.to_string()
    };

    let factor = match suffix.as_str() {
        "K" => 1000u64,
        "M" => 1000u64.pow(2),
        "G" => 1000u64.pow(3),
        "T" => 1000u64.pow(4),
        "P" => 1000u64.pow(5),
        "E" => 1000u64.pow(6),
        "Ki" => 1024u64,
        "Mi" => 1024u64.pow(2),
        "Gi" => 1024u64.pow(3),
        "Ti" => 1024u64.pow(4),
        "Pi" => 1024u64.pow(5),
        "Ei" => 1024u64.pow(6),
        _ => return None,
    };
    Some(factor)
}
