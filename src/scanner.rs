// Copyright 2024
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Validation of existing tape images.
//!
//! The scanner walks every frame of an image and collects framing problems
//! instead of stopping at the first one. Only I/O errors end a scan early.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::constants::{LEGACY_EOT_TAPE_MARKS, MAX_BLOCK_SIZE, RECORD_LENGTH_MASK};
use crate::error::{FormatError, Result, TapeError};
use crate::frames::reader::{FramePiece, FrameReader};

/// Options for the scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Records longer than this are reported.
    pub max_record_len: u32,

    /// Treat three consecutive tape marks as the end of the tape, as older
    /// tools wrote instead of end-of-medium.
    pub legacy_triple_mark_eot: bool,

    /// Render the report as CSV rather than text.
    pub csv: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_record_len: MAX_BLOCK_SIZE,
            legacy_triple_mark_eot: false,
            csv: false,
        }
    }
}

/// Kind of a frame seen during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Record,
    BadRecord,
    TapeMark,
    EraseGap,
    EndOfMedium,
    Reserved,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Record => "record",
            FrameKind::BadRecord => "bad-record",
            FrameKind::TapeMark => "tape-mark",
            FrameKind::EraseGap => "erase-gap",
            FrameKind::EndOfMedium => "end-of-medium",
            FrameKind::Reserved => "reserved",
        };
        f.write_str(name)
    }
}

/// One frame of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub index: u64,
    pub offset: u64,
    pub kind: FrameKind,
    /// Payload length for records.
    pub length: Option<u32>,
}

/// A framing problem and the frame it belongs to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub frame_index: Option<u64>,
    pub error: FormatError,
}

/// Statistics for one file on the tape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileScan {
    pub index: usize,
    pub bytes: u64,
    pub records: u64,
    pub min_record: u32,
    pub max_record: u32,
    /// False when the image ended before the file's tape mark.
    pub closed: bool,
}

impl FileScan {
    fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    fn add_record(&mut self, length: u32) {
        if self.records == 0 || length < self.min_record {
            self.min_record = length;
        }
        self.max_record = self.max_record.max(length);
        self.records += 1;
        self.bytes += length as u64;
    }

    /// Average record size, zero for empty files.
    pub fn average_record(&self) -> u64 {
        if self.records == 0 {
            0
        } else {
            self.bytes / self.records
        }
    }
}

/// Everything a scan found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub frames: Vec<FrameEntry>,
    pub files: Vec<FileScan>,
    pub diagnostics: Vec<Diagnostic>,
    pub tape_marks: u64,
    pub end_of_medium: bool,
    /// Set when the scan stopped at three consecutive tape marks.
    pub legacy_end_of_tape: bool,
    /// Number of bytes read from the image.
    pub image_bytes: u64,
}

impl ScanReport {
    /// True when no framing problem was found.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Writes one CSV row per frame, followed by problems not tied to a frame.
    ///
    /// Columns are `frame,offset,kind,length,status`.
    pub fn write_csv<W: Write>(&self, sink: W) -> Result<()> {
        let mut by_frame: HashMap<u64, Vec<&FormatError>> = HashMap::new();
        for diagnostic in &self.diagnostics {
            if let Some(index) = diagnostic.frame_index {
                by_frame.entry(index).or_default().push(&diagnostic.error);
            }
        }

        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(["frame", "offset", "kind", "length", "status"])?;
        for frame in &self.frames {
            let status = match by_frame.get(&frame.index) {
                Some(errors) => errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
                None => "ok".to_string(),
            };
            writer.write_record([
                frame.index.to_string(),
                frame.offset.to_string(),
                frame.kind.to_string(),
                frame.length.map(|l| l.to_string()).unwrap_or_default(),
                status,
            ])?;
        }
        for diagnostic in self.diagnostics.iter().filter(|d| d.frame_index.is_none()) {
            writer.write_record([
                String::new(),
                diagnostic.error.offset().to_string(),
                String::new(),
                String::new(),
                diagnostic.error.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            write!(
                f,
                "File {} : {:12} bytes in {:7} blocks of avg size {}",
                file.index,
                file.bytes,
                file.records,
                file.average_record()
            )?;
            if !file.closed {
                write!(f, " (no tape mark)")?;
            }
            writeln!(f)?;
        }
        if self.legacy_end_of_tape {
            writeln!(f, "Triple Mark (old End of Tape indicator)")?;
        }
        if self.end_of_medium {
            writeln!(f, "End of Medium")?;
        }
        for diagnostic in &self.diagnostics {
            match diagnostic.frame_index {
                Some(index) => writeln!(f, "ERROR: frame {}: {}", index, diagnostic.error)?,
                None => writeln!(f, "ERROR: {}", diagnostic.error)?,
            }
        }
        write!(
            f,
            "{} frames, {} files, {} tape marks, {} errors",
            self.frames.len(),
            self.files.len(),
            self.tape_marks,
            self.diagnostics.len()
        )
    }
}

/// Validates the framing of tape images.
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scans an image from any reader.
    pub fn scan<R: Read>(&self, source: R) -> Result<ScanReport> {
        let mut reader = FrameReader::new(source);
        let mut report = ScanReport::default();
        let mut current = FileScan::new(0);
        let mut consecutive_marks = 0usize;

        loop {
            let index = report.frames.len() as u64;
            let piece = match reader.next_frame() {
                Ok(piece) => piece,
                Err(TapeError::Format(error)) => {
                    warn!("{}", error);
                    let frame_index = Self::entry_for_error(&error).map(|(kind, length)| {
                        report.frames.push(FrameEntry {
                            index,
                            offset: error.offset(),
                            kind,
                            length,
                        });
                        index
                    });
                    report.diagnostics.push(Diagnostic { frame_index, error });
                    consecutive_marks = 0;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let offset = reader.frame_begin();
            let (kind, length) = match &piece {
                FramePiece::Record(record) => {
                    consecutive_marks = 0;
                    let length = record.len() as u32;
                    let kind = if record.is_bad() {
                        report.diagnostics.push(Diagnostic {
                            frame_index: Some(index),
                            error: FormatError::BadRecord { offset, length },
                        });
                        FrameKind::BadRecord
                    } else {
                        FrameKind::Record
                    };
                    if length > self.config.max_record_len {
                        report.diagnostics.push(Diagnostic {
                            frame_index: Some(index),
                            error: FormatError::OversizedRecord {
                                offset,
                                length,
                                max: self.config.max_record_len,
                            },
                        });
                    }
                    current.add_record(length);
                    (kind, Some(length))
                }
                FramePiece::TapeMark => {
                    report.tape_marks += 1;
                    consecutive_marks += 1;
                    if self.config.legacy_triple_mark_eot
                        && consecutive_marks == LEGACY_EOT_TAPE_MARKS
                    {
                        // The second mark closed an empty file that belongs to the end marker.
                        report.files.pop();
                        report.legacy_end_of_tape = true;
                        report.frames.push(FrameEntry {
                            index,
                            offset,
                            kind: FrameKind::TapeMark,
                            length: None,
                        });
                        info!("Triple tape mark at offset {}, stopping", offset);
                        break;
                    }
                    let next_index = current.index + 1;
                    current.closed = true;
                    report
                        .files
                        .push(std::mem::replace(&mut current, FileScan::new(next_index)));
                    (FrameKind::TapeMark, None)
                }
                FramePiece::EraseGap => (FrameKind::EraseGap, None),
                FramePiece::EndOfMedium => {
                    report.end_of_medium = true;
                    if current.records > 0 {
                        report.diagnostics.push(Diagnostic {
                            frame_index: Some(index),
                            error: FormatError::MissingTapeMark { offset },
                        });
                        report.files.push(current.clone());
                    }
                    (FrameKind::EndOfMedium, None)
                }
                FramePiece::EOF => {
                    let offset = reader.position();
                    if !report.end_of_medium {
                        if current.records > 0 {
                            report.diagnostics.push(Diagnostic {
                                frame_index: None,
                                error: FormatError::MissingTapeMark { offset },
                            });
                            report.files.push(current.clone());
                        }
                        report.diagnostics.push(Diagnostic {
                            frame_index: None,
                            error: FormatError::MissingEndOfMedium { offset },
                        });
                    }
                    break;
                }
            };

            report.frames.push(FrameEntry {
                index,
                offset,
                kind,
                length,
            });
        }

        report.image_bytes = reader.position();
        debug!(
            "Scanned {} frames, {} diagnostics",
            report.frames.len(),
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// The frame entry a format error stands for, if it belongs to a frame.
    fn entry_for_error(error: &FormatError) -> Option<(FrameKind, Option<u32>)> {
        match error {
            FormatError::MarkerMismatch { leading, .. } => {
                Some((FrameKind::Record, Some(leading & RECORD_LENGTH_MASK)))
            }
            FormatError::TruncatedRecord { expected, .. } => {
                Some((FrameKind::Record, Some(*expected as u32)))
            }
            FormatError::ReservedMarker { .. } => Some((FrameKind::Reserved, None)),
            _ => None,
        }
    }
}

/// Scans the image at `path`.
pub fn scan_image<P: AsRef<Path>>(path: P, config: &ScanConfig) -> Result<ScanReport> {
    let path = path.as_ref();
    let image = File::open(path).map_err(|source| TapeError::OpenSource {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Scanning tape file: {}", path.display());
    Scanner::new(config.clone()).scan(BufReader::new(image))
}
