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

//! Length markers of the SimH tape format.
//!
//! Every frame on the tape starts with a 4-byte little-endian marker. Most
//! markers carry a record length, a few reserved values are sentinels.
//! A data record of length zero is never written, so a marker of zero is
//! always a tape mark.

use crate::constants::{
    BAD_RECORD_FLAG, CLASS_BAD_DATA, CLASS_GOOD_DATA, CLASS_MASK, END_OF_MEDIUM, ERASE_GAP,
    RECORD_LENGTH_MASK, TAPE_MARK,
};

/// A classified marker value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// End of one file's data.
    TapeMark,
    /// End of the whole image.
    EndOfMedium,
    /// Erased tape, carries no data.
    EraseGap,
    /// Header or trailer of a data record.
    Data {
        /// Payload length in bytes.
        length: u32,
        /// Whether the record is flagged as read with an error.
        bad: bool,
    },
    /// Any value in a class this crate does not interpret.
    Reserved(u32),
}

impl Marker {
    /// Marker for a good data record of `length` bytes.
    pub fn data(length: u32) -> Self {
        Marker::Data { length, bad: false }
    }

    /// Classifies a raw marker value.
    pub fn from_u32(value: u32) -> Self {
        match value {
            TAPE_MARK => Marker::TapeMark,
            END_OF_MEDIUM => Marker::EndOfMedium,
            ERASE_GAP => Marker::EraseGap,
            _ => {
                let class = value & CLASS_MASK;
                let length = value & RECORD_LENGTH_MASK;
                // Bits between the class nibble and the length must be clear.
                if value & !(CLASS_MASK | RECORD_LENGTH_MASK) != 0 || length == 0 {
                    return Marker::Reserved(value);
                }
                match class {
                    CLASS_GOOD_DATA => Marker::Data { length, bad: false },
                    CLASS_BAD_DATA => Marker::Data { length, bad: true },
                    _ => Marker::Reserved(value),
                }
            }
        }
    }

    /// Raw value of the marker as written to the image.
    pub fn as_u32(&self) -> u32 {
        match *self {
            Marker::TapeMark => TAPE_MARK,
            Marker::EndOfMedium => END_OF_MEDIUM,
            Marker::EraseGap => ERASE_GAP,
            Marker::Data { length, bad } => {
                let length = length & RECORD_LENGTH_MASK;
                if bad {
                    length | BAD_RECORD_FLAG
                } else {
                    length
                }
            }
            Marker::Reserved(value) => value,
        }
    }

    /// Returns true for tape marks, end-of-medium and erase gaps.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            Marker::TapeMark | Marker::EndOfMedium | Marker::EraseGap
        )
    }
}

impl From<u32> for Marker {
    fn from(value: u32) -> Self {
        Marker::from_u32(value)
    }
}
