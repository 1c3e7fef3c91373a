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

//! SimH tape image writer.
//!
//! This module builds a tape image from a list of source files. Each file is
//! split into blocks by a [`BlockChunker`], every block becomes one data
//! record, and the file is closed with a tape mark. The image ends with a
//! single end-of-medium marker.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

use crate::chunker::BlockChunker;
use crate::definition::{load_definition, BlockSize, SourceSpec};
use crate::error::{Result, TapeError};
use crate::frames::record::FramedRecord;
use crate::frames::writer::FrameWriter;

/// Configuration options for a TapeWriter.
#[derive(Debug, Clone, Default)]
pub struct TapeWriterConfig {
    /// Log every marker written, not only one line per file.
    pub verbose: bool,
}

/// Enum to represent the state of a TapeWriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterState {
    /// Ready for the next file.
    Idle,
    /// Opening a source file.
    OpeningFile,
    /// Writing data records for the current file.
    Chunking,
    /// Source drained, writing its tape mark.
    ClosingFile,
    /// All files written, writing end-of-medium.
    WritingEndOfMedium,
    /// End-of-medium written and flushed.
    Done,
    /// An error occurred. Terminal.
    Failed,
}

/// What was written for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Name of the source, usually its path.
    pub name: String,
    pub block_size: BlockSize,
    /// Number of data records written.
    pub records: u64,
    /// Number of payload bytes written.
    pub bytes: u64,
}

/// What was written for a whole image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageSummary {
    pub files: Vec<FileSummary>,
    /// Total size of the image in bytes.
    pub image_bytes: u64,
}

/// Writer for SimH tape images.
///
/// Files are appended strictly in order. The first error moves the writer to
/// a failed state; nothing that was already written is undone.
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use simhtape::definition::{BlockSize, SourceSpec};
/// use simhtape::writer::TapeWriter;
///
/// let image = File::create("backup.tap").unwrap();
/// let mut writer = TapeWriter::new(image);
///
/// writer.append_file(&SourceSpec::new("BACKUP.DUMP", BlockSize::B16384)).unwrap();
/// writer.append_reader("notes", &b"some notes"[..], BlockSize::B2048).unwrap();
///
/// let summary = writer.finish().unwrap();
/// println!("wrote {} bytes", summary.image_bytes);
/// ```
pub struct TapeWriter<Sink: Write> {
    frame_writer: FrameWriter<Sink>,
    config: TapeWriterConfig,
    state: WriterState,
    summary: ImageSummary,
}

impl<Sink: Write> TapeWriter<Sink> {
    /// Creates a new TapeWriter with default configuration.
    pub fn new(sink: Sink) -> Self {
        Self::with_config(sink, TapeWriterConfig::default())
    }

    /// Creates a new TapeWriter with custom configuration.
    pub fn with_config(sink: Sink, config: TapeWriterConfig) -> Self {
        Self {
            frame_writer: FrameWriter::new(sink),
            config,
            state: WriterState::Idle,
            summary: ImageSummary::default(),
        }
    }

    fn check_ready(&self) -> Result<()> {
        match self.state {
            WriterState::Idle => Ok(()),
            WriterState::Done => Err(TapeError::WritingFinishedImage),
            _ => Err(TapeError::WriterFailed),
        }
    }

    /// Runs `step`, moving to the failed state if it returns an error.
    fn guard<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = step(self);
        if let Err(e) = &result {
            debug!("Tape writer failed: {}", e);
            self.state = WriterState::Failed;
        }
        result
    }

    /// Appends one source file followed by a tape mark.
    ///
    /// The file is opened here and closed before this returns, whether or not
    /// an error occurred.
    pub fn append_file(&mut self, spec: &SourceSpec) -> Result<FileSummary> {
        self.check_ready()?;
        let name = spec.path.display().to_string();
        self.guard(|writer| {
            writer.state = WriterState::OpeningFile;
            let source = File::open(&spec.path).map_err(|source| TapeError::OpenSource {
                path: spec.path.clone(),
                source,
            })?;
            writer.write_source(&name, Some(spec.path.as_path()), source, spec.block_size)
        })
    }

    /// Appends data from any reader as one file on the tape.
    pub fn append_reader<R: Read>(
        &mut self,
        name: &str,
        source: R,
        block_size: BlockSize,
    ) -> Result<FileSummary> {
        self.check_ready()?;
        self.guard(|writer| writer.write_source(name, None, source, block_size))
    }

    fn write_source<R: Read>(
        &mut self,
        name: &str,
        path: Option<&Path>,
        source: R,
        block_size: BlockSize,
    ) -> Result<FileSummary> {
        info!("Adding file: {} with block size: {}", name, block_size);
        self.state = WriterState::Chunking;

        let mut chunker = BlockChunker::new(source, block_size);
        let mut file_summary = FileSummary {
            name: name.to_string(),
            block_size,
            records: 0,
            bytes: 0,
        };

        loop {
            let chunk = match chunker.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(TapeError::Io(source)) => {
                    return Err(match path {
                        Some(path) => TapeError::ReadSource {
                            path: path.to_path_buf(),
                            source,
                        },
                        None => TapeError::Io(source),
                    });
                }
                Err(e) => return Err(e),
            };
            let record = FramedRecord::new(chunk.bytes)?;
            self.frame_writer.write_framed(&record)?;
            if self.config.verbose {
                info!(
                    "Wrote header and trailer value: {} (final: {})",
                    record.len(),
                    chunk.is_final
                );
            }
            file_summary.records += 1;
            file_summary.bytes += record.len() as u64;
        }
        drop(chunker);

        self.state = WriterState::ClosingFile;
        self.frame_writer.write_tape_mark()?;
        if self.config.verbose {
            info!("EOF: wrote tape mark");
        }
        debug!(
            "{}: {} bytes in {} records",
            name, file_summary.bytes, file_summary.records
        );

        self.summary.files.push(file_summary.clone());
        self.state = WriterState::Idle;
        Ok(file_summary)
    }

    /// Writes end-of-medium and flushes the image.
    pub fn finish(&mut self) -> Result<ImageSummary> {
        self.check_ready()?;
        self.guard(|writer| {
            writer.state = WriterState::WritingEndOfMedium;
            writer.frame_writer.write_end_of_medium()?;
            if writer.config.verbose {
                info!("EOM: wrote end-of-medium");
            }
            writer.frame_writer.flush()?;
            writer.state = WriterState::Done;
            writer.summary.image_bytes = writer.frame_writer.position();
            Ok(writer.summary.clone())
        })
    }

    /// Summary of the files written so far.
    pub fn summary(&self) -> &ImageSummary {
        &self.summary
    }

    /// Returns the underlying sink, consuming self.
    pub fn into_inner(self) -> Sink {
        self.frame_writer.into_inner()
    }
}

// Methods for testing only
#[cfg(test)]
impl<Sink: Write> TapeWriter<Sink> {
    /// Get the current writer state (testing only)
    pub(crate) fn get_state(&self) -> WriterState {
        self.state
    }

    /// Get a reference to the frame writer (testing only)
    pub(crate) fn get_frame_writer(&self) -> &FrameWriter<Sink> {
        &self.frame_writer
    }
}

/// Builds an image at `image_path` from `specs`.
///
/// A partially written image is left on disk if a source fails.
pub fn create_image<P: AsRef<Path>>(
    image_path: P,
    specs: &[SourceSpec],
    config: &TapeWriterConfig,
) -> Result<ImageSummary> {
    let image_path = image_path.as_ref();
    let image = File::create(image_path).map_err(|source| TapeError::CreateFile {
        path: image_path.to_path_buf(),
        source,
    })?;

    let mut writer = TapeWriter::with_config(BufWriter::new(image), config.clone());
    for spec in specs {
        writer.append_file(spec)?;
    }
    let summary = writer.finish()?;
    info!(
        "Wrote {} files to {} ({} bytes)",
        summary.files.len(),
        image_path.display(),
        summary.image_bytes
    );
    Ok(summary)
}

/// Builds an image from a definition file.
///
/// The whole definition is validated before the image is created.
pub fn create_image_from_definition<P: AsRef<Path>, D: AsRef<Path>>(
    image_path: P,
    definition_path: D,
    config: &TapeWriterConfig,
) -> Result<ImageSummary> {
    let specs = load_definition(definition_path)?;
    create_image(image_path, &specs, config)
}
