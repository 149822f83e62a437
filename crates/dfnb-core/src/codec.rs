//! Cell identity codec.
//!
//! The backend reports which cell a message belongs to through its numeric
//! execution counter. The reference backend puts the short id's 32-bit value
//! in that counter, so decoding is a range check. Other backends may encode
//! differently; the coordinator only talks to [`ExecutionCountCodec`].

use crate::error::CoreError;
use crate::id::ShortCellId;

/// Translation between backend execution counters and short cell ids.
pub trait ExecutionCountCodec: Send + Sync {
    /// Decodes a counter. `None` means the counter belongs to a legacy,
    /// non-dataflow execution and carries no cell identity.
    fn decode(&self, counter: i64) -> Option<ShortCellId>;

    /// Encodes a short id the way the backend would report it.
    fn encode(&self, id: ShortCellId) -> i64;
}

/// Counter is the short id's value, i.e. the id read as a hex number.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexPrefixCodec;

impl ExecutionCountCodec for HexPrefixCodec {
    fn decode(&self, counter: i64) -> Option<ShortCellId> {
        u32::try_from(counter).ok().map(ShortCellId::from_raw)
    }

    fn encode(&self, id: ShortCellId) -> i64 {
        i64::from(id.raw())
    }
}

/// Derives the short id for a long cell id.
pub fn shorten(long_id: &str) -> Result<ShortCellId, CoreError> {
    ShortCellId::shorten(long_id)
}

/// Decodes an execution counter with the default codec.
pub fn widen(counter: i64) -> Option<ShortCellId> {
    HexPrefixCodec.decode(counter)
}
