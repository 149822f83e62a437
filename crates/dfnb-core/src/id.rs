//! Cell identity newtypes.
//!
//! Every notebook cell carries a long identifier (a UUID in practice) that is
//! assigned once and survives edits, reorders and re-execution. The short form
//! is the first [`SHORT_ID_LEN`] hex digits of that identifier with `-`
//! separators removed. It is what the prompt shows, what backend messages use
//! as a correlation key, and what the dependency graph uses as its node key.
//!
//! Eight hex digits are exactly 32 bits, so [`ShortCellId`] is stored as a
//! `u32` and rendered back as zero-padded lowercase hex.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of hex digits in a short cell id.
pub const SHORT_ID_LEN: usize = 8;

/// Short, session-unique cell identifier (8 lowercase hex digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortCellId(u32);

impl ShortCellId {
    /// Derives the short id from a long cell id.
    ///
    /// Separators are skipped and the first eight remaining characters must be
    /// hex digits. Anything after them is ignored.
    pub fn shorten(long_id: &str) -> Result<Self, CoreError> {
        if long_id.is_empty() {
            return Err(CoreError::invalid(long_id, "empty identifier"));
        }

        let mut value: u32 = 0;
        let mut taken = 0;
        for ch in long_id.chars().filter(|c| *c != '-') {
            if taken == SHORT_ID_LEN {
                break;
            }
            let digit = ch.to_digit(16).ok_or_else(|| {
                CoreError::invalid(long_id, format!("non-hex character '{ch}' in prefix"))
            })?;
            value = (value << 4) | digit;
            taken += 1;
        }

        if taken < SHORT_ID_LEN {
            return Err(CoreError::invalid(
                long_id,
                format!("expected at least {SHORT_ID_LEN} hex digits, found {taken}"),
            ));
        }
        Ok(ShortCellId(value))
    }

    /// Parses an already-short id: exactly eight hex digits, no separators.
    pub fn parse(short: &str) -> Result<Self, CoreError> {
        if short.len() != SHORT_ID_LEN || !short.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::invalid(
                short,
                format!("short ids are exactly {SHORT_ID_LEN} hex digits"),
            ));
        }
        u32::from_str_radix(short, 16)
            .map(ShortCellId)
            .map_err(|e| CoreError::invalid(short, e.to_string()))
    }

    /// Builds a short id from its numeric value.
    pub const fn from_raw(raw: u32) -> Self {
        ShortCellId(raw)
    }

    /// The numeric value of this short id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShortCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for ShortCellId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShortCellId::parse(s)
    }
}

impl TryFrom<String> for ShortCellId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ShortCellId::parse(&value)
    }
}

impl From<ShortCellId> for String {
    fn from(id: ShortCellId) -> Self {
        id.to_string()
    }
}

/// Long-lived cell identifier together with its derived short form.
///
/// Construction validates that a short form can be derived, so holding a
/// `CellId` means [`CellId::short`] never fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellId {
    long: String,
    short: ShortCellId,
}

impl CellId {
    pub fn new(long: impl Into<String>) -> Result<Self, CoreError> {
        let long = long.into();
        let short = ShortCellId::shorten(&long)?;
        Ok(CellId { long, short })
    }

    pub fn as_str(&self) -> &str {
        &self.long
    }

    pub fn short(&self) -> ShortCellId {
        self.short
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.long)
    }
}

impl TryFrom<String> for CellId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CellId::new(value)
    }
}

impl From<CellId> for String {
    fn from(id: CellId) -> Self {
        id.long
    }
}
