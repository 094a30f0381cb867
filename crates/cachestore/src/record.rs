//! Record framing using nom
//!
//! Record layout:
//! ```text
//! CSREC01\n
//! [8 bytes: stored_at unix millis u64 little-endian]
//! [4 bytes: payload length u32 little-endian]
//! [payload]
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nom::{
    bytes::complete::{tag, take},
    number::complete::{le_u32, le_u64},
    sequence::tuple,
    IResult,
};

use crate::error::{Error, Result};

/// Magic header for stored records
pub const RECORD_MAGIC: &[u8] = b"CSREC01\n";

/// Size of the fixed part of a record
pub const HEADER_LEN: usize = RECORD_MAGIC.len() + 8 + 4;

/// A persisted payload stamped with the time it was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Unix time in milliseconds at which the payload was stored
    pub stored_at_ms: u64,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a record stamped with the current time
    pub fn new(payload: Vec<u8>) -> Self {
        Self::stamped(SystemTime::now(), payload)
    }

    /// Create a record stamped with the given time
    pub fn stamped(at: SystemTime, payload: Vec<u8>) -> Self {
        let stored_at_ms = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            stored_at_ms,
            payload,
        }
    }

    /// Time at which the payload was stored
    pub fn stored_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.stored_at_ms)
    }

    /// Encode the record into its on-disk form
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u32::try_from(self.payload.len())
            .map_err(|_| Error::ValueTooLarge(self.payload.len()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(RECORD_MAGIC);
        out.extend_from_slice(&self.stored_at_ms.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode a record, rejecting truncated input and trailing bytes
    pub fn decode(input: &[u8]) -> Result<Self> {
        if input.len() < HEADER_LEN {
            return Err(Error::Parse("Input too short for record header".to_string()));
        }
        if &input[..RECORD_MAGIC.len()] != RECORD_MAGIC {
            return Err(Error::Parse("Invalid record magic header".to_string()));
        }

        let (rest, (stored_at_ms, payload)) = parse_record(input)?;
        if !rest.is_empty() {
            return Err(Error::Parse(format!(
                "{} trailing bytes after record",
                rest.len()
            )));
        }

        Ok(Self {
            stored_at_ms,
            payload: payload.to_vec(),
        })
    }
}

fn parse_record(input: &[u8]) -> IResult<&[u8], (u64, &[u8])> {
    let (input, (_, stored_at_ms, len)) = tuple((tag(RECORD_MAGIC), le_u64, le_u32))(input)?;
    let (input, payload) = take(len)(input)?;
    Ok((input, (stored_at_ms, payload)))
}
