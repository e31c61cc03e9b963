//! Verify command implementation.

use seglog_core::{Index, LogDir, Replay, SegmentInfo, StartTimestamp};
use std::collections::BTreeSet;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of records that decoded.
    pub valid_records: usize,
    /// Number of segments with a corrupt line.
    pub corrupt_segments: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corrupt_segments == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command. Nothing in the directory is modified.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log directory at {:?}", path);
    println!();

    let result = verify(path)?;

    println!("Segments checked: {}", result.segments_checked);
    println!("Valid records:    {}", result.valid_records);
    println!("Corrupt segments: {}", result.corrupt_segments);
    for error in &result.errors {
        println!("  - {}", error);
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

/// Checks the index and decodes every segment file in `path`.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let dir = LogDir::open(path, false)?;
    let mut result = VerifyResult::default();

    let indexed: BTreeSet<StartTimestamp> = match Index::read_entries(dir.index_path()) {
        Ok((entries, torn)) => {
            if torn > 0 {
                result
                    .errors
                    .push(format!("index ends with {torn} bytes of an unterminated entry"));
            }
            entries.into_iter().collect()
        }
        Err(err) => {
            result.errors.push(format!("index: {err}"));
            BTreeSet::new()
        }
    };

    let on_disk = dir.list_segments()?;
    for start in &on_disk {
        result.segments_checked += 1;
        if !indexed.contains(start) {
            result.errors.push(format!("segment {start} is not indexed"));
        }

        let info = SegmentInfo::stat(&dir, *start)?;
        let mut corrupt = false;
        for record in Replay::new(vec![info]) {
            match record {
                Ok(_) => result.valid_records += 1,
                Err(err) => {
                    corrupt = true;
                    result.errors.push(err.to_string());
                }
            }
        }
        if corrupt {
            result.corrupt_segments += 1;
        }
    }

    let on_disk: BTreeSet<StartTimestamp> = on_disk.into_iter().collect();
    for start in indexed.difference(&on_disk) {
        result.errors.push(format!("indexed segment {start} is missing"));
    }

    Ok(result)
}
