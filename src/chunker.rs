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

//! Splits a source stream into fixed-size blocks.
//!
//! Every chunk except the last is exactly one block long. The last chunk is
//! between 1 byte and a full block. An empty source yields no chunks at all.

use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::definition::BlockSize;
use crate::error::Result;

/// One block of source data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The block contents, never empty.
    pub bytes: Bytes,
    /// True when the chunk is short, so no more chunks follow for this source.
    pub is_final: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// State of the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkerState {
    /// More data may follow.
    Active,
    /// No more chunks, either because the source ended or a read failed.
    Done,
}

/// Reads a source in blocks of a fixed size.
///
/// A read returning zero bytes is taken as end of stream. Reads that return
/// less than requested are continued until the block is full, so short reads
/// from pipes do not produce short chunks in the middle of a file.
///
/// Each block is handed out before the next one is read. A short block is
/// flagged as final; when the source length is an exact multiple of the
/// block size the last full chunk is not flagged and the following call
/// returns `None`.
pub struct BlockChunker<Source: Read> {
    source: Source,
    block_size: usize,
    state: ChunkerState,
    bytes_read: u64,
    chunks_emitted: u64,
}

impl<Source: Read> BlockChunker<Source> {
    /// Creates a chunker. The block size has already been validated.
    pub fn new(source: Source, block_size: BlockSize) -> Self {
        Self {
            source,
            block_size: block_size.bytes(),
            state: ChunkerState::Active,
            bytes_read: 0,
            chunks_emitted: 0,
        }
    }

    /// Reads up to one block, continuing after short reads.
    ///
    /// Returns fewer than `block_size` bytes only at end of stream.
    fn fill_block(&mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::zeroed(self.block_size);
        let mut filled = 0;

        while filled < self.block_size {
            match self.source.read(&mut buffer[filled..]) {
                Ok(0) => {
                    self.state = ChunkerState::Done;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ChunkerState::Done;
                    return Err(e.into());
                }
            }
        }

        buffer.truncate(filled);
        self.bytes_read += filled as u64;
        Ok(buffer.freeze())
    }

    /// Returns the next chunk, or `None` once the source is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.state == ChunkerState::Done {
            return Ok(None);
        }

        let bytes = self.fill_block()?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let is_final = bytes.len() < self.block_size;
        self.chunks_emitted += 1;

        Ok(Some(Chunk { bytes, is_final }))
    }

    /// Total bytes read from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Number of chunks returned so far.
    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted
    }

    /// Returns the underlying source, consuming self.
    pub fn into_inner(self) -> Source {
        self.source
    }
}

impl<Source: Read> Iterator for BlockChunker<Source> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
