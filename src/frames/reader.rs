use std::io::{ErrorKind, Read, Result as IoResult};

use bytes::BytesMut;
use log::{debug, warn};

use crate::constants::MARKER_SIZE;
use crate::error::{FormatError, Result};
use crate::frames::record::FramedRecord;
use crate::marker::Marker;

/// Result of a frame read operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePiece {
    /// A data record with matching markers.
    Record(FramedRecord),
    /// End of one file.
    TapeMark,
    /// Erased tape, carries no data.
    EraseGap,
    /// End of the image.
    EndOfMedium,
    /// Physical end of the stream - no more frames to read.
    EOF,
}

/// A wrapper around any `Read` source that tracks the current position.
pub struct ReadPositionTracker<Source: Read> {
    /// The underlying source to read from
    source: Source,

    /// The current position in the source
    position: u64,
}

impl<Source: Read> ReadPositionTracker<Source> {
    /// Create a new ReadPositionTracker wrapping the given source.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    /// Returns the current position in the source.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the underlying source, consuming self.
    pub fn into_inner(self) -> Source {
        self.source
    }

    /// Reads until `buf` is full or the stream ends, returning the byte count.
    fn read_full(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<Source: Read> Read for ReadPositionTracker<Source> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let bytes_read = self.source.read(buf)?;
        self.position += bytes_read as u64;
        Ok(bytes_read)
    }
}

/// State for frame reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameReaderState {
    /// Reading frames.
    Active,
    /// We just read end-of-medium, only trailing bytes are checked.
    AfterEndOfMedium,
    /// Nothing more can be read, either the stream ended or its position is lost.
    Finished,
}

/// Reader for SimH frames.
///
/// Returns one [`FramePiece`] per call. Framing problems come back as
/// [`FormatError`]s wrapped in [`crate::error::TapeError::Format`]; the caller
/// decides whether to stop. After a marker mismatch the reader is already
/// positioned on the next frame. After truncation or a reserved marker it
/// only returns [`FramePiece::EOF`].
pub struct FrameReader<Source: Read> {
    source: ReadPositionTracker<Source>,
    state: FrameReaderState,
    /// Offset of the frame returned last.
    frame_begin: u64,
}

impl<Source: Read> FrameReader<Source> {
    /// Creates a FrameReader at the start of an image.
    pub fn new(source: Source) -> Self {
        Self {
            source: ReadPositionTracker::new(source),
            state: FrameReaderState::Active,
            frame_begin: 0,
        }
    }

    /// Reads a marker. `Ok(None)` means the stream ended cleanly before it.
    fn read_marker(&mut self) -> Result<Option<u32>> {
        let offset = self.source.position();
        let mut raw = [0u8; MARKER_SIZE];
        let found = self.source.read_full(&mut raw)?;
        match found {
            0 => Ok(None),
            MARKER_SIZE => Ok(Some(u32::from_le_bytes(raw))),
            _ => {
                self.state = FrameReaderState::Finished;
                Err(FormatError::TruncatedMarker { offset, found }.into())
            }
        }
    }

    fn read_record(&mut self, marker: Marker, length: u32) -> Result<FramedRecord> {
        let offset = self.frame_begin;
        let mut payload = BytesMut::zeroed(length as usize);
        let found = self.source.read_full(&mut payload)?;
        if found < payload.len() {
            self.state = FrameReaderState::Finished;
            return Err(FormatError::TruncatedRecord {
                offset,
                expected: payload.len(),
                found,
            }
            .into());
        }

        let trailing = match self.read_marker()? {
            Some(trailing) => trailing,
            None => {
                self.state = FrameReaderState::Finished;
                return Err(FormatError::TruncatedMarker {
                    offset: self.source.position(),
                    found: 0,
                }
                .into());
            }
        };

        let record = FramedRecord::from_markers(offset, marker, payload.freeze(), trailing)?;
        Ok(record)
    }

    /// Counts and discards whatever follows end-of-medium.
    fn check_after_end_of_medium(&mut self) -> Result<FramePiece> {
        self.state = FrameReaderState::Finished;
        let offset = self.source.position();
        let count = std::io::copy(&mut self.source, &mut std::io::sink())?;
        if count > 0 {
            warn!("{} bytes after end-of-medium at offset {}", count, offset);
            return Err(FormatError::DataAfterEndOfMedium { offset, count }.into());
        }
        Ok(FramePiece::EOF)
    }

    /// Reads the next frame.
    pub fn next_frame(&mut self) -> Result<FramePiece> {
        match self.state {
            FrameReaderState::Finished => return Ok(FramePiece::EOF),
            FrameReaderState::AfterEndOfMedium => return self.check_after_end_of_medium(),
            FrameReaderState::Active => {}
        }

        self.frame_begin = self.source.position();
        let value = match self.read_marker()? {
            Some(value) => value,
            None => {
                debug!("End of stream at offset {}", self.frame_begin);
                self.state = FrameReaderState::Finished;
                return Ok(FramePiece::EOF);
            }
        };

        match Marker::from_u32(value) {
            Marker::TapeMark => Ok(FramePiece::TapeMark),
            Marker::EraseGap => Ok(FramePiece::EraseGap),
            Marker::EndOfMedium => {
                self.state = FrameReaderState::AfterEndOfMedium;
                Ok(FramePiece::EndOfMedium)
            }
            marker @ Marker::Data { length, .. } => {
                self.read_record(marker, length).map(FramePiece::Record)
            }
            Marker::Reserved(value) => {
                self.state = FrameReaderState::Finished;
                Err(FormatError::ReservedMarker {
                    offset: self.frame_begin,
                    value,
                }
                .into())
            }
        }
    }

    /// Offset of the frame most recently returned.
    pub fn frame_begin(&self) -> u64 {
        self.frame_begin
    }

    /// Current position in the image.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Returns the underlying source, consuming self.
    pub fn into_inner(self) -> Source {
        self.source.into_inner()
    }
}

impl<Source: Read> Iterator for FrameReader<Source> {
    type Item = Result<FramePiece>;

    /// Yields frames until [`FramePiece::EOF`], which is not yielded.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Ok(FramePiece::EOF) => None,
            other => Some(other),
        }
    }
}
