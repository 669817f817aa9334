//! Reading captured daemon output

use std::io::{self, SeekFrom};
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::daemon::DaemonConfig;
use crate::error::Result;

/// Default number of lines returned by [`read_logs`].
pub const DEFAULT_LOG_LINES: usize = 50;

/// Bytes read per step when scanning a log backwards.
const TAIL_CHUNK: u64 = 8 * 1024;

/// Which log to read and how much of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// Read the stderr capture instead of stdout.
    pub error: bool,
    pub lines: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            error: false,
            lines: DEFAULT_LOG_LINES,
        }
    }
}

impl LogOptions {
    #[must_use]
    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }

    #[must_use]
    pub fn with_lines(mut self, lines: usize) -> Self {
        self.lines = lines;
        self
    }
}

/// Last lines of the daemon's stdout or stderr capture.
pub async fn read_logs(config: &DaemonConfig, options: LogOptions) -> Result<Vec<String>> {
    let path = if options.error {
        &config.error_file
    } else {
        &config.log_file
    };
    tail(path, options.lines).await
}

/// Last `lines` lines of `path`; a log that was never written is empty.
///
/// Logs only grow, so the file is read backwards in chunks until enough
/// lines are buffered. Output is raw bytes from the child, so invalid UTF-8
/// is replaced.
pub async fn tail(path: &Path, lines: usize) -> Result<Vec<String>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if lines == 0 {
        return Ok(Vec::new());
    }

    let mut pos = file.metadata().await?.len();
    let mut buf = Vec::new();
    let mut newlines = 0;
    // One newline more than requested: the last line normally ends in one
    while pos > 0 && newlines <= lines {
        let step = pos.min(TAIL_CHUNK);
        pos -= step;

        let mut chunk = vec![0u8; usize::try_from(step).unwrap_or_default()];
        file.seek(SeekFrom::Start(pos)).await?;
        file.read_exact(&mut chunk).await?;
        newlines += chunk.iter().filter(|&&b| b == b'\n').count();

        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let content = String::from_utf8_lossy(&buf);
    let all_lines: Vec<&str> = content.lines().collect();
    let start = all_lines.len().saturating_sub(lines);
    Ok(all_lines[start..].iter().map(|line| line.to_string()).collect())
}
