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

//! Source file definitions for building a tape image.
//!
//! A definition file is a CSV file with one row per file to place on the
//! tape, in tape order:
//!
//! ```text
//! # path, block size
//! BACKUP.DUMP, 16384
//! README.TXT, 2048
//! ```
//!
//! The whole definition is validated before any image is created.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, Trim};
use log::debug;

use crate::error::{Result, TapeError};

/// One of the block sizes the format supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockSize {
    B2048,
    B4096,
    B8192,
    B16384,
}

impl BlockSize {
    /// Number of bytes in a block.
    pub fn bytes(&self) -> usize {
        match self {
            BlockSize::B2048 => 2048,
            BlockSize::B4096 => 4096,
            BlockSize::B8192 => 8192,
            BlockSize::B16384 => 16384,
        }
    }
}

impl TryFrom<u32> for BlockSize {
    type Error = TapeError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            2048 => Ok(BlockSize::B2048),
            4096 => Ok(BlockSize::B4096),
            8192 => Ok(BlockSize::B8192),
            16384 => Ok(BlockSize::B16384),
            other => Err(TapeError::UnsupportedBlockSize(other.to_string())),
        }
    }
}

impl FromStr for BlockSize {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| TapeError::UnsupportedBlockSize(s.to_string()))?;
        BlockSize::try_from(value)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// A file to place on the tape and the block size to split it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub block_size: BlockSize,
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>, block_size: BlockSize) -> Self {
        Self {
            path: path.into(),
            block_size,
        }
    }
}

/// Parses definition rows from any reader.
///
/// Rows are `(path, block size)`. Blank lines and lines starting with `#`
/// are skipped. Errors name the 1-based row of the definition.
pub fn parse_definition<R: Read>(reader: R) -> Result<Vec<SourceSpec>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut specs = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(specs.len() + 1);

        if record.len() != 2 {
            return Err(TapeError::InvalidDefinition {
                row,
                reason: format!("expected 2 fields (path, block size), found {}", record.len()),
            });
        }

        let path = &record[0];
        if path.is_empty() {
            return Err(TapeError::InvalidDefinition {
                row,
                reason: "empty file path".to_string(),
            });
        }

        let block_size = record[1]
            .parse::<BlockSize>()
            .map_err(|e| TapeError::InvalidDefinition {
                row,
                reason: format!("{} for input file {}", e, path),
            })?;

        debug!("Definition row {}: {} with block size {}", row, path, block_size);
        specs.push(SourceSpec::new(path, block_size));
    }

    Ok(specs)
}

/// Loads and validates a definition file.
pub fn load_definition<P: AsRef<Path>>(path: P) -> Result<Vec<SourceSpec>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TapeError::OpenSource {
        path: path.to_path_buf(),
        source,
    })?;
    parse_definition(file)
}
