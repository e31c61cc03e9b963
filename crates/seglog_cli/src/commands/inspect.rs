//! Inspect command implementation.

use seglog_core::{Index, LogDir, SegmentInfo, StartTimestamp};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Log directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory path.
    pub path: String,
    /// Number of index entries.
    pub index_entries: usize,
    /// Bytes of an unterminated final index line.
    pub torn_index_bytes: usize,
    /// Number of segment files on disk.
    pub segment_count: usize,
    /// Total segment bytes.
    pub total_size: u64,
    /// Indexed segments whose file is missing.
    pub missing_segments: Vec<String>,
    /// Segment files absent from the index.
    pub unindexed_segments: Vec<String>,
    /// Per-segment details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentSummary>>,
}

/// Details of one segment file.
#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    /// Segment name.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Whether the index records this segment.
    pub indexed: bool,
}

/// Runs the inspect command. Nothing in the directory is modified.
pub fn run(
    path: &Path,
    show_segments: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_segments)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects inspection data for `path`.
pub fn inspect(
    path: &Path,
    show_segments: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let dir = LogDir::open(path, false)?;
    let (entries, torn_index_bytes) = Index::read_entries(dir.index_path())?;
    let indexed: BTreeSet<StartTimestamp> = entries.iter().copied().collect();
    let on_disk = dir.list_segments()?;
    let on_disk_set: BTreeSet<StartTimestamp> = on_disk.iter().copied().collect();

    let mut total_size = 0;
    let mut summaries = Vec::with_capacity(on_disk.len());
    for start in &on_disk {
        let info = SegmentInfo::stat(&dir, *start)?;
        total_size += info.size;
        summaries.push(SegmentSummary {
            name: info.name,
            size: info.size,
            indexed: indexed.contains(start),
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        index_entries: entries.len(),
        torn_index_bytes,
        segment_count: on_disk.len(),
        total_size,
        missing_segments: indexed
            .difference(&on_disk_set)
            .map(|start| start.file_name())
            .collect(),
        unindexed_segments: on_disk_set
            .difference(&indexed)
            .map(|start| start.file_name())
            .collect(),
        segments: show_segments.then_some(summaries),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("seglog Log Inspection");
    println!("=====================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Index:");
    println!("  Entries:          {}", result.index_entries);
    if result.torn_index_bytes > 0 {
        println!("  Torn tail:        {} bytes", result.torn_index_bytes);
    }
    println!("  Missing segments: {}", result.missing_segments.len());
    println!();
    println!("Segments:");
    println!("  Count:      {}", result.segment_count);
    println!("  Total size: {}", format_size(result.total_size));
    println!("  Unindexed:  {}", result.unindexed_segments.len());

    if let Some(segments) = &result.segments {
        println!();
        for segment in segments {
            println!(
                "  {} {:>10}{}",
                segment.name,
                format_size(segment.size),
                if segment.indexed { "" } else { "  (unindexed)" }
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reports_missing_and_unindexed() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index"), "100\n200\n").unwrap();
        fs::write(temp.path().join("100"), "abc\n").unwrap();
        fs::write(temp.path().join("300"), "defgh\n").unwrap();

        let result = inspect(temp.path(), true).unwrap();
        assert_eq!(result.index_entries, 2);
        assert_eq!(result.segment_count, 2);
        assert_eq!(result.total_size, 10);
        assert_eq!(result.missing_segments, vec!["200"]);
        assert_eq!(result.unindexed_segments, vec!["300"]);

        let segments = result.segments.unwrap();
        assert!(segments[0].indexed);
        assert!(!segments[1].indexed);
    }

    #[test]
    fn does_not_repair_index() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index"), "100\n2").unwrap();

        let result = inspect(temp.path(), false).unwrap();
        assert_eq!(result.torn_index_bytes, 1);
        assert!(result.segments.is_none());
        assert_eq!(fs::read_to_string(temp.path().join("index")).unwrap(), "100\n2");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
