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

//! Utility functions for tests

use std::io::{self, Read, Write};

use crate::definition::BlockSize;
use crate::writer::TapeWriter;

/// Little-endian bytes of a marker value.
pub fn marker(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encodes a data frame by hand, independently of the writer.
pub fn data_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&marker(payload.len() as u32));
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&marker(payload.len() as u32));
    frame
}

/// Builds an in-memory image holding `files` in order.
pub fn build_image(files: &[(&[u8], BlockSize)]) -> Vec<u8> {
    let mut writer = TapeWriter::new(Vec::new());
    for (i, (data, block_size)) in files.iter().enumerate() {
        writer
            .append_reader(&format!("file{}", i), *data, *block_size)
            .unwrap();
    }
    writer.finish().unwrap();
    writer.into_inner()
}

/// Deterministic test data.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A reader that returns at most `max_read` bytes per call and is
/// interrupted every other call.
pub struct TricklingReader<R: Read> {
    inner: R,
    max_read: usize,
    calls: usize,
}

impl<R: Read> TricklingReader<R> {
    pub fn new(inner: R, max_read: usize) -> Self {
        Self {
            inner,
            max_read,
            calls: 0,
        }
    }
}

impl<R: Read> Read for TricklingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        if self.calls % 2 == 0 {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        let len = buf.len().min(self.max_read);
        self.inner.read(&mut buf[..len])
    }
}

/// A reader that yields `good` bytes and then fails.
pub struct FailingReader {
    remaining: usize,
}

impl FailingReader {
    pub fn new(good: usize) -> Self {
        Self { remaining: good }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        }
        let len = buf.len().min(self.remaining);
        buf[..len].fill(0x55);
        self.remaining -= len;
        Ok(len)
    }
}

/// A sink that accepts `limit` bytes and then fails.
pub struct FailingWriter {
    pub written: Vec<u8>,
    limit: usize,
}

impl FailingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            written: Vec::new(),
            limit,
        }
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit - self.written.len();
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
        }
        let len = buf.len().min(room);
        self.written.extend_from_slice(&buf[..len]);
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
