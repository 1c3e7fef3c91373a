//! The paired-marker record.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;

use crate::constants::{MARKER_SIZE, MAX_RECORD_LEN};
use crate::error::{FormatError, Result, TapeError};
use crate::marker::Marker;

/// A data record and its two length markers.
///
/// The markers are never stored separately: both are derived from the
/// payload length, so a `FramedRecord` cannot be written with markers that
/// disagree. On the read side one is only built once the trailing marker has
/// been checked against the leading one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedRecord {
    payload: Bytes,
    bad: bool,
}

impl FramedRecord {
    /// Wraps a payload for writing.
    ///
    /// Empty payloads are rejected since their marker would read as a tape mark.
    pub fn new(payload: Bytes) -> Result<Self> {
        if payload.is_empty() {
            return Err(TapeError::EmptyRecord);
        }
        if payload.len() > MAX_RECORD_LEN {
            return Err(TapeError::RecordTooLarge(payload.len()));
        }
        Ok(Self {
            payload,
            bad: false,
        })
    }

    /// Rebuilds a record read from an image.
    ///
    /// `leading` is the marker before the payload and `trailing` the one after.
    pub(crate) fn from_markers(
        offset: u64,
        leading: Marker,
        payload: Bytes,
        trailing: u32,
    ) -> std::result::Result<Self, FormatError> {
        let leading_value = leading.as_u32();
        if leading_value != trailing {
            return Err(FormatError::MarkerMismatch {
                offset,
                leading: leading_value,
                trailing,
            });
        }
        let bad = matches!(leading, Marker::Data { bad: true, .. });
        Ok(Self { payload, bad })
    }

    /// The marker value written before and after the payload.
    pub fn marker(&self) -> Marker {
        Marker::Data {
            length: self.payload.len() as u32,
            bad: self.bad,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the record carries the bad-data flag.
    pub fn is_bad(&self) -> bool {
        self.bad
    }

    /// Size of the record on the image, markers included.
    pub fn encoded_len(&self) -> u64 {
        (self.payload.len() + 2 * MARKER_SIZE) as u64
    }

    /// Writes leading marker, payload and trailing marker.
    ///
    /// These are three separate writes. A failure in between leaves a
    /// partial frame, which readers detect through the marker pair.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        let marker = self.marker().as_u32();
        sink.write_u32::<LittleEndian>(marker)?;
        sink.write_all(&self.payload)?;
        sink.write_u32::<LittleEndian>(marker)?;
        Ok(())
    }
}
