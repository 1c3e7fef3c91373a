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

//! Extraction of the files stored on a tape image.
//!
//! Each file on the tape (the records between two tape marks) is written to
//! its own output file, `file0`, `file1`, ... in the output directory.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::constants::{DUMP_FILE_PREFIX, LEGACY_EOT_TAPE_MARKS};
use crate::error::{ErrorPolicy, FormatError, Result, TapeError};
use crate::frames::reader::{FramePiece, FrameReader};

/// Options for the dumper.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Directory the extracted files are written to.
    pub output_dir: PathBuf,

    /// Prefix of the extracted file names, followed by the file number.
    pub file_prefix: String,

    /// What to do with framing problems.
    pub policy: ErrorPolicy,

    /// Treat three consecutive tape marks as the end of the tape.
    pub legacy_triple_mark_eot: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: DUMP_FILE_PREFIX.to_string(),
            policy: ErrorPolicy::FailFast,
            legacy_triple_mark_eot: false,
        }
    }
}

/// A file written by the dumper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedFile {
    pub index: usize,
    pub path: PathBuf,
    pub bytes: u64,
    pub records: u64,
}

/// Result of a dump.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DumpSummary {
    pub files: Vec<DumpedFile>,
    /// Problems skipped under [`ErrorPolicy::Collect`].
    pub diagnostics: Vec<FormatError>,
    pub end_of_medium: bool,
}

/// An output file being filled.
struct OpenFile<Sink: Write> {
    index: usize,
    path: PathBuf,
    writer: Sink,
    bytes: u64,
    records: u64,
}

impl<Sink: Write> OpenFile<Sink> {
    fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        self.writer
            .write_all(payload)
            .map_err(|source| TapeError::WriteOutput {
                path: self.path.clone(),
                source,
            })?;
        self.bytes += payload.len() as u64;
        self.records += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<DumpedFile> {
        self.writer
            .flush()
            .map_err(|source| TapeError::WriteOutput {
                path: self.path.clone(),
                source,
            })?;
        info!("Dumped {} ({} bytes)", self.path.display(), self.bytes);
        Ok(DumpedFile {
            index: self.index,
            path: self.path,
            bytes: self.bytes,
            records: self.records,
        })
    }
}

/// Position of a dump within the tape.
#[derive(Default)]
struct DumpProgress {
    current: Option<OpenFile<BufWriter<File>>>,
    next_index: usize,
    /// Tape marks seen with no data before them. Their empty files are
    /// created lazily so legacy end-of-tape marks never produce files.
    pending_empty: usize,
    consecutive_marks: usize,
}

/// Extracts files from tape images.
pub struct Dumper {
    config: DumpConfig,
}

impl Dumper {
    pub fn new(config: DumpConfig) -> Self {
        Self { config }
    }

    fn create_file(&self, index: usize) -> Result<OpenFile<BufWriter<File>>> {
        let path = self
            .config
            .output_dir
            .join(format!("{}{}", self.config.file_prefix, index));
        debug!("Creating {}", path.display());
        let file = File::create(&path).map_err(|source| TapeError::CreateFile {
            path: path.clone(),
            source,
        })?;
        Ok(OpenFile {
            index,
            path,
            writer: BufWriter::new(file),
            bytes: 0,
            records: 0,
        })
    }

    /// Applies the error policy to a framing problem.
    fn handle(&self, summary: &mut DumpSummary, error: FormatError) -> Result<()> {
        match self.config.policy {
            ErrorPolicy::FailFast => Err(error.into()),
            ErrorPolicy::Collect => {
                warn!("Skipping: {}", error);
                summary.diagnostics.push(error);
                Ok(())
            }
        }
    }

    /// Writes out the empty files whose tape marks were seen but not yet created.
    fn create_pending(&self, summary: &mut DumpSummary, progress: &mut DumpProgress) -> Result<()> {
        while progress.pending_empty > 0 {
            let file = self.create_file(progress.next_index)?;
            summary.files.push(file.finish()?);
            progress.next_index += 1;
            progress.pending_empty -= 1;
        }
        Ok(())
    }

    /// Closes the open file and creates pending empty ones.
    fn close_all(&self, summary: &mut DumpSummary, progress: &mut DumpProgress) -> Result<()> {
        if let Some(file) = progress.current.take() {
            summary.files.push(file.finish()?);
        }
        self.create_pending(summary, progress)
    }

    /// Extracts every file of an image from any reader.
    ///
    /// Files whose closing tape mark was read are on disk even when the dump
    /// stops at a later error.
    pub fn dump<R: Read>(&self, source: R) -> Result<DumpSummary> {
        let mut reader = FrameReader::new(source);
        let mut summary = DumpSummary::default();
        let mut progress = DumpProgress::default();

        let result = self.read_frames(&mut reader, &mut summary, &mut progress);
        let closed = self.close_all(&mut summary, &mut progress);
        result?;
        closed?;
        Ok(summary)
    }

    fn read_frames<R: Read>(
        &self,
        reader: &mut FrameReader<R>,
        summary: &mut DumpSummary,
        progress: &mut DumpProgress,
    ) -> Result<()> {
        loop {
            let piece = match reader.next_frame() {
                Ok(piece) => piece,
                Err(TapeError::Format(error)) => {
                    self.handle(summary, error)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match piece {
                FramePiece::Record(record) => {
                    progress.consecutive_marks = 0;
                    if record.is_bad() {
                        warn!(
                            "Record at offset {} is flagged as bad, keeping its data",
                            reader.frame_begin()
                        );
                    }
                    self.create_pending(summary, progress)?;
                    if progress.current.is_none() {
                        progress.current = Some(self.create_file(progress.next_index)?);
                        progress.next_index += 1;
                    }
                    if let Some(file) = progress.current.as_mut() {
                        file.write_record(record.payload())?;
                    }
                }
                FramePiece::TapeMark => {
                    progress.consecutive_marks += 1;
                    if self.config.legacy_triple_mark_eot
                        && progress.consecutive_marks == LEGACY_EOT_TAPE_MARKS
                    {
                        // The previous mark is part of the end-of-tape sequence.
                        progress.pending_empty = progress.pending_empty.saturating_sub(1);
                        info!("Triple tape mark at offset {}, stopping", reader.frame_begin());
                        return Ok(());
                    }
                    match progress.current.take() {
                        Some(file) => summary.files.push(file.finish()?),
                        None => progress.pending_empty += 1,
                    }
                }
                FramePiece::EraseGap => {}
                FramePiece::EndOfMedium => {
                    summary.end_of_medium = true;
                    if let Some(file) = progress.current.take() {
                        summary.files.push(file.finish()?);
                        self.handle(
                            summary,
                            FormatError::MissingTapeMark {
                                offset: reader.frame_begin(),
                            },
                        )?;
                    }
                    return Ok(());
                }
                FramePiece::EOF => {
                    self.close_all(summary, progress)?;
                    let offset = (*reader).position();
                    return self.handle(summary, FormatError::MissingEndOfMedium { offset });
                }
            }
        }
    }
}

/// Extracts every file of the image at `path`.
pub fn dump_image<P: AsRef<Path>>(path: P, config: &DumpConfig) -> Result<DumpSummary> {
    let path = path.as_ref();
    let image = File::open(path).map_err(|source| TapeError::OpenSource {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Dumping files from {}", path.display());
    Dumper::new(config.clone()).dump(BufReader::new(image))
}
