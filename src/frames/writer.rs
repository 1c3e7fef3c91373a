use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;
use log::trace;

use crate::constants::MARKER_SIZE;
use crate::error::Result;
use crate::frames::record::FramedRecord;
use crate::marker::Marker;

/// Writer for SimH frames.
///
/// Appends data records and sentinel markers to a sink and keeps track of
/// how many bytes have been written. The writer does not enforce the order of
/// frames; that is the job of [`crate::writer::TapeWriter`].
pub struct FrameWriter<Sink: Write> {
    /// The underlying writer.
    sink: Sink,
    /// Number of bytes written so far.
    pos: u64,
}

impl<Sink: Write> FrameWriter<Sink> {
    /// Creates a new FrameWriter at position zero.
    pub fn new(sink: Sink) -> Self {
        Self::at_position(sink, 0)
    }

    /// Creates a FrameWriter over a sink that already holds `pos` bytes.
    pub fn at_position(sink: Sink, pos: u64) -> Self {
        Self { sink, pos }
    }

    /// Current position in the image.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Writes one framed record.
    pub fn write_framed(&mut self, record: &FramedRecord) -> Result<()> {
        trace!(
            "Writing record of {} bytes at offset {}",
            record.len(),
            self.pos
        );
        record.write_to(&mut self.sink)?;
        self.pos += record.encoded_len();
        Ok(())
    }

    /// Wraps `payload` in a framed record and writes it.
    ///
    /// Empty payloads and payloads longer than the marker can describe are
    /// rejected before anything is written.
    pub fn write_record(&mut self, payload: Bytes) -> Result<u64> {
        let record = FramedRecord::new(payload)?;
        self.write_framed(&record)?;
        Ok(record.encoded_len())
    }

    /// Writes a tape mark.
    pub fn write_tape_mark(&mut self) -> Result<()> {
        self.write_marker(Marker::TapeMark)
    }

    /// Writes the end-of-medium marker.
    pub fn write_end_of_medium(&mut self) -> Result<()> {
        self.write_marker(Marker::EndOfMedium)
    }

    fn write_marker(&mut self, marker: Marker) -> Result<()> {
        trace!("Writing {:?} at offset {}", marker, self.pos);
        self.sink.write_u32::<LittleEndian>(marker.as_u32())?;
        self.pos += MARKER_SIZE as u64;
        Ok(())
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Returns the underlying sink, consuming self.
    pub fn into_inner(self) -> Sink {
        self.sink
    }

    /// Returns a reference to the underlying sink.
    pub fn get_ref(&self) -> &Sink {
        &self.sink
    }

    /// Returns a mutable reference to the underlying sink.
    pub fn get_mut(&mut self) -> &mut Sink {
        &mut self.sink
    }
}
