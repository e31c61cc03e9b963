//! Write command implementation.

use seglog_core::{Config, Level, LogWriter, TimestampFormat};
use std::io::{self, BufRead};
use std::path::Path;
use tracing::debug;

/// Options for the write command.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Level stamped on every record.
    pub level: Level,
    /// Whether to use UTC timestamps.
    pub utc: bool,
    /// Memtable capacity override.
    pub buffer_capacity: Option<usize>,
    /// Segment budget override.
    pub segment_budget: Option<u64>,
}

/// Runs the write command.
///
/// Writes each message as one record, or each stdin line when `messages`
/// is empty.
pub fn run(
    path: &Path,
    messages: &[String],
    options: &WriteOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = LogWriter::open(path, config(options))?;

    let mut written = 0usize;
    if messages.is_empty() {
        for line in io::stdin().lock().lines() {
            writer.write(line?.as_bytes())?;
            written += 1;
        }
    } else {
        for message in messages {
            writer.write(message.as_bytes())?;
            written += 1;
        }
    }
    debug!(records = written, "submitted records");

    writer.close()?;
    let stats = writer.stats();
    println!(
        "Wrote {} records ({} new segments, {} segments total)",
        written,
        stats.segments_flushed,
        writer.segment_count()
    );
    Ok(())
}

fn config(options: &WriteOptions) -> Config {
    let mut config = Config::new().level(options.level);
    if options.utc {
        config = config.timestamp_format(TimestampFormat::Utc);
    }
    if let Some(capacity) = options.buffer_capacity {
        config = config.buffer_capacity(capacity);
    }
    if let Some(budget) = options.segment_budget {
        config = config.segment_size_budget(budget);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_messages_as_records() {
        let temp = tempdir().unwrap();
        let options = WriteOptions {
            level: Level::Warn,
            utc: true,
            buffer_capacity: Some(64),
            segment_budget: None,
        };

        run(
            temp.path(),
            &["disk at 91%".to_string(), "disk at 95%".to_string()],
            &options,
        )
        .unwrap();

        let writer = LogWriter::open(temp.path(), Config::new()).unwrap();
        let records: Vec<_> = writer.replay().unwrap().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.level() == Level::Warn));
        assert_eq!(records[1].message(), b"disk at 95%");
        assert_eq!(writer.segment_count(), 2);
    }

    #[test]
    fn config_applies_overrides() {
        let options = WriteOptions {
            level: Level::Debug,
            utc: false,
            buffer_capacity: None,
            segment_budget: Some(1024),
        };

        let config = config(&options);
        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.timestamp_format, TimestampFormat::Local);
        assert_eq!(config.segment_size_budget, 1024);
        assert_eq!(config.buffer_capacity, Config::default().buffer_capacity);
    }
}
