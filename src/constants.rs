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

//! Constants used in the SimH tape image format.

/// Size of a record length marker in bytes.
pub const MARKER_SIZE: usize = 4;

/// Marker value of a tape mark (end of one file on the tape).
pub const TAPE_MARK: u32 = 0x0000_0000;

/// Marker value of end-of-medium (end of the whole image).
pub const END_OF_MEDIUM: u32 = 0xFFFF_FFFF;

/// Marker value of an erase gap. Readers skip these, the writer never emits them.
pub const ERASE_GAP: u32 = 0xFFFF_FFFE;

/// Flag bit set on records that were read from tape with an error (class 8).
pub const BAD_RECORD_FLAG: u32 = 0x8000_0000;

/// Mask extracting the record length from a data marker.
pub const RECORD_LENGTH_MASK: u32 = 0x00FF_FFFF;

/// Mask extracting the record class (top nibble) from a marker.
pub const CLASS_MASK: u32 = 0xF000_0000;

/// Class nibble of good data records.
pub const CLASS_GOOD_DATA: u32 = 0x0000_0000;

/// Class nibble of bad data records.
pub const CLASS_BAD_DATA: u32 = 0x8000_0000;

/// Largest payload a single record may carry.
pub const MAX_RECORD_LEN: usize = RECORD_LENGTH_MASK as usize;

/// Largest supported block size, used as the default record bound when scanning.
pub const MAX_BLOCK_SIZE: u32 = 16384;

/// Number of consecutive tape marks older tools wrote instead of end-of-medium.
pub const LEGACY_EOT_TAPE_MARKS: usize = 3;

/// Default file name prefix for files extracted by the dumper.
pub const DUMP_FILE_PREFIX: &str = "file";
