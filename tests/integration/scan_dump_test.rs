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

//! Integration tests for scanning and dumping images on disk.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use simhtape::dumper::{dump_image, DumpConfig};
use simhtape::error::{ErrorKind, ErrorPolicy, FormatError, Result};
use simhtape::scanner::{scan_image, ScanConfig};
use simhtape::writer::{create_image, TapeWriterConfig};
use simhtape::{BlockSize, SourceSpec};

/// Writes `sizes.len()` source files and builds an image from them.
fn build_image_file(dir: &Path, sizes: &[(usize, BlockSize)]) -> Result<std::path::PathBuf> {
    let specs: Vec<SourceSpec> = sizes
        .iter()
        .enumerate()
        .map(|(i, (len, block_size))| {
            let path = dir.join(format!("in{}", i));
            let data: Vec<u8> = (0..*len).map(|b| (b * 7 % 256) as u8).collect();
            fs::write(&path, data).expect("Failed to write source");
            SourceSpec::new(path, *block_size)
        })
        .collect();
    let image = dir.join("tape.img");
    create_image(&image, &specs, &TapeWriterConfig::default())?;
    Ok(image)
}

#[test]
fn test_scan_created_image() -> Result<()> {
    let dir = tempdir()?;
    let image = build_image_file(
        dir.path(),
        &[(2048, BlockSize::B2048), (3000, BlockSize::B2048), (0, BlockSize::B4096)],
    )?;

    let report = scan_image(&image, &ScanConfig::default())?;
    assert!(report.is_clean());
    assert!(report.end_of_medium);
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.files[0].records, 1);
    assert_eq!(report.files[1].records, 2);
    assert_eq!(report.files[1].min_record, 952);
    assert_eq!(report.files[2].records, 0);
    assert_eq!(report.image_bytes, fs::metadata(&image)?.len());

    let mut csv = Vec::new();
    report.write_csv(&mut csv)?;
    let csv = String::from_utf8(csv).expect("CSV is UTF-8");
    // Header plus one row per frame.
    assert_eq!(csv.lines().count(), 1 + report.frames.len());
    assert!(csv.lines().skip(1).all(|line| line.ends_with(",ok")));
    Ok(())
}

#[test]
fn test_scan_and_dump_damaged_image() -> Result<()> {
    // Initialize logger to see diagnostic messages
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();

    let dir = tempdir()?;
    let image = build_image_file(dir.path(), &[(5000, BlockSize::B2048)])?;

    // Flip the trailing marker of the second record.
    let mut bytes = fs::read(&image)?;
    let second_trailer = (2048 + 8) + 4 + 2048;
    bytes[second_trailer] ^= 0x01;
    fs::write(&image, &bytes)?;

    let report = scan_image(&image, &ScanConfig::default())?;
    assert_eq!(report.diagnostics.len(), 1);
    assert!(matches!(
        report.diagnostics[0].error,
        FormatError::MarkerMismatch { offset: 2056, .. }
    ));
    assert!(report.to_string().contains("ERROR: frame 1"));

    let out = tempdir()?;
    let err = dump_image(
        &image,
        &DumpConfig {
            output_dir: out.path().to_path_buf(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);

    let summary = dump_image(
        &image,
        &DumpConfig {
            output_dir: out.path().to_path_buf(),
            policy: ErrorPolicy::Collect,
            ..Default::default()
        },
    )?;
    assert_eq!(summary.diagnostics.len(), 1);
    // The damaged record is left out.
    assert_eq!(summary.files[0].bytes, 5000 - 2048);
    Ok(())
}

#[test]
fn test_scan_missing_image() {
    let dir = tempdir().unwrap();
    let err = scan_image(dir.path().join("absent.img"), &ScanConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn test_trailing_garbage_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let image = build_image_file(dir.path(), &[(10, BlockSize::B2048)])?;
    let mut bytes = fs::read(&image)?;
    let end = bytes.len() as u64;
    bytes.extend_from_slice(b"garbage");
    fs::write(&image, &bytes)?;

    let report = scan_image(&image, &ScanConfig::default())?;
    assert_eq!(
        report.diagnostics[0].error,
        FormatError::DataAfterEndOfMedium {
            offset: end,
            count: 7
        }
    );
    Ok(())
}
