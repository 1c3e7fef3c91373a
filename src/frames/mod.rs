//! Frame-level functionality for SimH tape images.
//!
//! A tape image is a plain sequence of frames with no file header. Data
//! frames bracket their payload with two identical length markers, sentinel
//! frames are a single marker:
//!
//! ```text
//! +----------+---------------------+----------+
//! |  length  |       payload       |  length  |    data frame
//! | (4 bytes)|   (length bytes)    | (4 bytes)|
//! +----------+---------------------+----------+
//!
//! +----------+
//! | 00000000 |    tape mark, ends one file
//! +----------+
//!
//! +----------+
//! | FFFFFFFF |    end of medium, ends the image
//! +----------+
//! ```
//!
//! All markers are little-endian. Because both markers of a data frame are
//! equal, an image can be walked backwards as well as forwards.
//!
//! # Key Components
//!
//! - [`record::FramedRecord`]: a payload together with its paired markers.
//! - [`writer::FrameWriter`]: appends frames to a sink.
//! - [`reader::FrameReader`]: reads frames back and reports framing problems.

pub mod reader;
pub mod record;
pub mod writer;
