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

//! Integration tests for creating images and dumping them back.
//!
//! These tests verify that files written into an image through a definition
//! file are restored byte for byte by the dumper.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{tempdir, NamedTempFile};

use simhtape::dumper::{dump_image, DumpConfig};
use simhtape::error::{ErrorKind, Result, TapeError};
use simhtape::writer::{create_image, create_image_from_definition, TapeWriterConfig};
use simhtape::{BlockSize, SourceSpec};

/// Helper function to write random bytes to a file in `dir`.
fn random_file(dir: &Path, name: &str, len: usize, seed: u64) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    let path = dir.join(name);
    fs::write(&path, data).expect("Failed to write source file");
    path
}

/// Helper function to write a definition file listing `rows`.
fn definition_file(rows: &[(&Path, &str)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create definition file");
    for (path, block_size) in rows {
        writeln!(file, "{},{}", path.display(), block_size).expect("Failed to write definition");
    }
    file.flush().expect("Failed to flush definition");
    file
}

#[test]
fn test_definition_round_trip() -> Result<()> {
    let sources = tempdir()?;
    let f1 = random_file(sources.path(), "f1", 10_000, 1);
    let f2 = random_file(sources.path(), "f2", 4096, 2);
    let empty = sources.path().join("empty");
    fs::write(&empty, b"")?;

    let definition = definition_file(&[
        (f1.as_path(), "2048"),
        (empty.as_path(), "8192"),
        (f2.as_path(), "4096"),
    ]);

    let out = tempdir()?;
    let image = out.path().join("tape.img");
    let created =
        create_image_from_definition(&image, definition.path(), &TapeWriterConfig::default())?;

    assert_eq!(created.files.len(), 3);
    // 10000 bytes in 2048-byte blocks is four full records and one of 1808.
    assert_eq!(created.files[0].records, 5);
    assert_eq!(created.files[1].records, 0);
    assert_eq!(created.files[2].records, 1);
    assert_eq!(created.image_bytes, fs::metadata(&image)?.len());
    assert_eq!(created.image_bytes, 10_000 + 5 * 8 + 4 + 4 + (4096 + 8) + 4 + 4);

    let dump_dir = tempdir()?;
    let dumped = dump_image(
        &image,
        &DumpConfig {
            output_dir: dump_dir.path().to_path_buf(),
            ..Default::default()
        },
    )?;

    assert!(dumped.end_of_medium);
    assert_eq!(dumped.files.len(), 3);
    assert_eq!(fs::read(dump_dir.path().join("file0"))?, fs::read(&f1)?);
    assert_eq!(fs::read(dump_dir.path().join("file1"))?, Vec::<u8>::new());
    assert_eq!(fs::read(dump_dir.path().join("file2"))?, fs::read(&f2)?);

    Ok(())
}

#[test]
fn test_every_block_size_round_trips() -> Result<()> {
    let sources = tempdir()?;
    let specs: Vec<SourceSpec> = [
        BlockSize::B2048,
        BlockSize::B4096,
        BlockSize::B8192,
        BlockSize::B16384,
    ]
    .iter()
    .enumerate()
    .map(|(i, block_size)| {
        let path = random_file(sources.path(), &format!("src{}", i), 40_000 + i * 17, i as u64);
        SourceSpec::new(path, *block_size)
    })
    .collect();

    let image = sources.path().join("all.img");
    create_image(&image, &specs, &TapeWriterConfig { verbose: true })?;

    let dump_dir = tempdir()?;
    dump_image(
        &image,
        &DumpConfig {
            output_dir: dump_dir.path().to_path_buf(),
            ..Default::default()
        },
    )?;

    for (i, spec) in specs.iter().enumerate() {
        assert_eq!(
            fs::read(dump_dir.path().join(format!("file{}", i)))?,
            fs::read(&spec.path)?,
            "file {} with block size {}",
            i,
            spec.block_size
        );
    }
    Ok(())
}

#[test]
fn test_unsupported_block_size_creates_nothing() {
    let out = tempdir().unwrap();
    let f1 = random_file(out.path(), "f1", 100, 3);
    let missing = out.path().join("never-read");
    let definition = definition_file(&[(f1.as_path(), "2048"), (missing.as_path(), "1000")]);

    let image = out.path().join("tape.img");
    let err = create_image_from_definition(&image, definition.path(), &TapeWriterConfig::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, TapeError::InvalidDefinition { row: 2, .. }));
    assert!(err.to_string().contains("1000"));
    assert!(!image.exists());
}

#[test]
fn test_missing_source_leaves_partial_image() {
    let out = tempdir().unwrap();
    let f1 = random_file(out.path(), "f1", 3000, 4);
    let missing = out.path().join("missing");
    let definition = definition_file(&[(f1.as_path(), "2048"), (missing.as_path(), "2048")]);

    let image = out.path().join("tape.img");
    let err = create_image_from_definition(&image, definition.path(), &TapeWriterConfig::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(matches!(&err, TapeError::OpenSource { path, .. } if path == &missing));

    // The first file and its tape mark are on disk, without end-of-medium.
    let written = fs::read(&image).unwrap();
    assert_eq!(written.len(), 3000 + 2 * 8 + 4);
    assert_eq!(&written[written.len() - 4..], &[0u8, 0, 0, 0]);
}

#[test]
fn test_missing_definition() {
    let out = tempdir().unwrap();
    let err = create_image_from_definition(
        out.path().join("tape.img"),
        out.path().join("nope.csv"),
        &TapeWriterConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
}
