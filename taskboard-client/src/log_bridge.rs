//! Client logging. `env_logger` decides what gets logged (`RUST_LOG`, default
//! `warn`); every accepted record is appended to the client log file. Warnings
//! and errors are also kept in a small buffer so the binary can show what
//! went wrong when a command fails.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, SecondsFormat, Utc};
use env_logger::Logger;
use log::{Level, Log, Metadata, Record, SetLoggerError};

const MAX_PROBLEMS: usize = 32;

static SINK: OnceLock<&'static FileSink> = OnceLock::new();

/// ~/.config/taskboard/logs/client.log
pub fn default_log_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("logs")
        .join("client.log")
}

struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
    problems: Mutex<VecDeque<String>>,
}

impl FileSink {
    fn new(path: PathBuf) -> Self {
        let file = Self::open(&path).ok();
        Self {
            path,
            file: Mutex::new(file),
            problems: Mutex::new(VecDeque::with_capacity(MAX_PROBLEMS)),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Append one line. A file that failed to open is retried on each write.
    fn write_line(&self, line: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if guard.is_none() {
            *guard = Self::open(&self.path).ok();
        }
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }

    fn remember(&self, line: String) {
        if let Ok(mut problems) = self.problems.lock() {
            if problems.len() == MAX_PROBLEMS {
                problems.pop_front();
            }
            problems.push_back(line);
        }
    }

    fn problems(&self) -> Vec<String> {
        self.problems
            .lock()
            .map(|problems| problems.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

fn format_line(at: DateTime<Utc>, level: Level, target: &str, message: &str) -> String {
    format!(
        "{} {:<5} {} {}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        level,
        target,
        message.replace('\n', "\\n")
    )
}

struct ClientLogger {
    filter: Logger,
    sink: &'static FileSink,
}

impl Log for ClientLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.filter.matches(record) {
            return;
        }
        let line = format_line(
            Utc::now(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        self.sink.write_line(&line);
        if record.level() <= Level::Warn {
            self.sink.remember(line);
        }
    }

    fn flush(&self) {
        self.sink.flush();
    }
}

/// Install the client logger, writing to `path`.
pub fn init(path: PathBuf) -> Result<(), SetLoggerError> {
    let filter =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).build();
    let max_level = filter.filter();
    let sink: &'static FileSink = Box::leak(Box::new(FileSink::new(path)));
    let logger = Box::leak(Box::new(ClientLogger { filter, sink }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    let _ = SINK.set(sink);
    Ok(())
}

/// Warnings and errors logged since `init`, oldest first.
pub fn recent_problems() -> Vec<String> {
    SINK.get().map(|sink| sink.problems()).unwrap_or_default()
}

/// Record a problem directly in the log file when no logger could be installed.
pub fn write_fallback_line(path: &Path, message: &str) {
    let sink = FileSink::new(path.to_path_buf());
    sink.write_line(&format_line(Utc::now(), Level::Error, "taskboard.log_bridge", message));
    sink.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(
            format_line(at, Level::Warn, "taskboard_core::executor", "first\nsecond"),
            "2026-03-01T09:30:00.000Z WARN  taskboard_core::executor first\\nsecond"
        );
    }

    #[test]
    fn test_sink_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("client.log");
        write_fallback_line(&path, "logger already set");

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("ERROR taskboard.log_bridge logger already set\n"));
    }

    #[test]
    fn test_sink_keeps_latest_problems() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("client.log"));
        for i in 0..(MAX_PROBLEMS + 2) {
            sink.remember(i.to_string());
        }
        let problems = sink.problems();
        assert_eq!(problems.len(), MAX_PROBLEMS);
        assert_eq!(problems[0], "2");
        assert_eq!(problems.last().map(String::as_str), Some("33"));
    }
}
