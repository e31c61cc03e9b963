//! Lazy replay over sealed segments.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::segment::SegmentInfo;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Iterator over every record of a set of segments.
///
/// Segments are read in ascending start-timestamp order, lines in file
/// order. The first undecodable line of a segment is yielded as
/// [`CoreError::SegmentCorruption`] and the rest of that segment is
/// skipped; replay then continues with the next segment. A segment that
/// cannot be opened is yielded as an error in the same way.
///
/// # Example
///
/// ```rust,no_run
/// # use seglog_core::LogWriter;
/// # let writer = LogWriter::new("logs", 4096, 64 * 1024)?;
/// for record in writer.replay()? {
///     match record {
///         Ok(record) => println!("{record}"),
///         Err(err) => eprintln!("skipping: {err}"),
///     }
/// }
/// # Ok::<(), seglog_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct Replay {
    segments: std::vec::IntoIter<SegmentInfo>,
    current: Option<SegmentCursor>,
}

impl Replay {
    /// Creates a replay over `segments`, sorting them by start timestamp.
    #[must_use]
    pub fn new(mut segments: Vec<SegmentInfo>) -> Self {
        segments.sort_by_key(|info| info.start_timestamp);
        Self {
            segments: segments.into_iter(),
            current: None,
        }
    }

    /// Returns the number of segments not yet opened.
    #[must_use]
    pub fn remaining_segments(&self) -> usize {
        self.segments.len()
    }
}

impl Iterator for Replay {
    type Item = CoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let info = self.segments.next()?;
                match info.open_reader() {
                    Ok(reader) => self.current = Some(SegmentCursor::new(info, reader)),
                    Err(err) => return Some(Err(err)),
                }
            }
            let cursor = self.current.as_mut()?;

            match cursor.next_record() {
                Some(Ok(record)) => return Some(Ok(record)),
                Some(Err(err)) => {
                    self.current = None;
                    return Some(Err(err));
                }
                None => self.current = None,
            }
        }
    }
}

#[derive(Debug)]
struct SegmentCursor {
    info: SegmentInfo,
    reader: BufReader<File>,
    line: usize,
    buf: Vec<u8>,
}

impl SegmentCursor {
    fn new(info: SegmentInfo, reader: BufReader<File>) -> Self {
        Self {
            info,
            reader,
            line: 0,
            buf: Vec::new(),
        }
    }

    fn next_record(&mut self) -> Option<CoreResult<Record>> {
        self.buf.clear();
        self.line += 1;
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(err) => {
                return Some(Err(CoreError::segment_read(
                    self.info.name.as_str(),
                    self.line,
                    err,
                )))
            }
        }

        if self.buf.last() != Some(&b'\n') {
            return Some(Err(CoreError::segment_corruption(
                self.info.name.as_str(),
                self.line,
                "line has no terminator, segment is truncated",
            )));
        }

        Some(Record::decode(&self.buf).map_err(|err| {
            CoreError::segment_corruption(self.info.name.as_str(), self.line, err.to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StartTimestamp;
    use std::path::Path;
    use tempfile::tempdir;

    const LINE_A: &str = "[2006-01-02T15:04:05Z] info alpha\n";
    const LINE_B: &str = "[2006-01-02T15:04:06Z] warn beta\n";
    const LINE_C: &str = "[2006-01-02T15:04:07Z] error gamma\n";

    fn segment(dir: &Path, start: i64, contents: &str) -> SegmentInfo {
        let start = StartTimestamp::new(start);
        let path = dir.join(start.file_name());
        std::fs::write(&path, contents).unwrap();
        SegmentInfo {
            name: start.file_name(),
            start_timestamp: start,
            path,
            size: contents.len() as u64,
        }
    }

    fn messages(replay: Replay) -> Vec<Result<String, CoreError>> {
        replay
            .map(|r| r.map(|record| String::from_utf8(record.into_message()).unwrap()))
            .collect()
    }

    #[test]
    fn empty_replay() {
        assert_eq!(Replay::new(Vec::new()).count(), 0);
    }

    #[test]
    fn reads_segments_in_start_order() {
        let temp = tempdir().unwrap();
        let late = segment(temp.path(), 200, LINE_C);
        let early = segment(temp.path(), 100, &format!("{LINE_A}{LINE_B}"));

        let got: Vec<_> = messages(Replay::new(vec![late, early]))
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(got, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn truncated_line_is_reported_and_replay_continues() {
        let temp = tempdir().unwrap();
        let truncated = format!("{LINE_A}{}", &LINE_B[..20]);
        let first = segment(temp.path(), 1, &truncated);
        let second = segment(temp.path(), 2, LINE_C);

        let got = messages(Replay::new(vec![first, second]));
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].as_deref().unwrap(), "alpha");
        assert!(matches!(
            got[1],
            Err(CoreError::SegmentCorruption { ref segment, line: 2, .. }) if segment == "1"
        ));
        assert_eq!(got[2].as_deref().unwrap(), "gamma");
    }

    #[test]
    fn corrupt_line_skips_rest_of_segment() {
        let temp = tempdir().unwrap();
        let bad = segment(temp.path(), 1, &format!("{LINE_A}not a record\n{LINE_B}"));

        let got = messages(Replay::new(vec![bad]));
        assert_eq!(got.len(), 2);
        assert!(got[0].is_ok());
        let err = got[1].as_ref().unwrap_err();
        assert!(err.is_parse_error());
        assert!(err.to_string().contains("line 2"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn read_failure_names_segment_and_line() {
        let temp = tempdir().unwrap();
        // Opening a directory succeeds on Linux, reading it fails.
        std::fs::create_dir(temp.path().join("9")).unwrap();
        let unreadable = SegmentInfo {
            name: "9".to_string(),
            start_timestamp: StartTimestamp::new(9),
            path: temp.path().join("9"),
            size: 0,
        };
        let present = segment(temp.path(), 10, LINE_B);

        let got = messages(Replay::new(vec![unreadable, present]));
        assert_eq!(got.len(), 2);
        let err = got[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CoreError::SegmentRead { segment, line: 1, .. } if segment == "9"
        ));
        assert!(err.is_io_error());
        assert_eq!(got[1].as_deref().unwrap(), "beta");
    }

    #[test]
    fn missing_file_is_reported() {
        let temp = tempdir().unwrap();
        let missing = SegmentInfo {
            name: "7".to_string(),
            start_timestamp: StartTimestamp::new(7),
            path: temp.path().join("7"),
            size: 0,
        };
        let present = segment(temp.path(), 8, LINE_A);

        let mut replay = Replay::new(vec![missing, present]);
        assert_eq!(replay.remaining_segments(), 2);
        assert!(replay.next().unwrap().is_err());
        assert_eq!(replay.next().unwrap().unwrap().message(), b"alpha");
        assert!(replay.next().is_none());
    }
}
