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

//! simhtape builds, scans and dumps SimH-format tape images.
//!
//! A SimH tape image emulates a magnetic tape as a flat file of records.
//! Each record is bracketed by two identical 4-byte length markers; tape
//! marks separate the files on the tape and an end-of-medium marker closes
//! the image. These images are used to move AOS/VS backup tapes in and out
//! of emulated systems.

pub mod chunker;
pub mod constants;
pub mod definition;
pub mod dumper;
pub mod error;
pub mod frames;
pub mod marker;
pub mod scanner;
pub mod writer;


// Re-exports for a cleaner API
pub use definition::{BlockSize, SourceSpec};
pub use error::{ErrorPolicy, FormatError, Result, TapeError};
pub use writer::{TapeWriter, TapeWriterConfig};
