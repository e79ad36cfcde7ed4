//! Line source abstraction
//!
//! The reader worker pulls raw text lines from a [`LineSource`]. A real
//! serial port, a capture file, stdin and the demo device all sit behind
//! this trait so the worker can be exercised with mocks.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt, UartiumError};

/// A producer of raw text lines
///
/// `read_line` may block for a bounded time. `Ok(None)` means "nothing this
/// time" (read timeout, blank line); [`UartiumError::Disconnected`] means the
/// source is gone for good. Other errors are treated as transient.
#[cfg_attr(test, mockall::automock)]
pub trait LineSource: Send {
    /// Open the source. Called once, before the worker thread starts.
    fn start(&mut self) -> Result<()>;

    /// Release the source. Called once when the worker exits.
    fn stop(&mut self);

    /// Read the next line, without its trailing newline
    fn read_line(&mut self) -> Result<Option<String>>;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        (**self).read_line()
    }
}

/// Line source over any buffered reader
///
/// Bytes are decoded as UTF-8 with replacement and surrounding whitespace is
/// trimmed. End of stream is reported as a disconnect.
pub struct ReaderLineSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead + Send> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
        }
    }
}

impl ReaderLineSource<BufReader<std::io::Stdin>> {
    /// Read lines from standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> LineSource for ReaderLineSource<R> {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn read_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .context("reading line")?;
        if n == 0 {
            return Err(UartiumError::Disconnected("end of stream".to_string()));
        }

        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim();
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line.to_string()))
        }
    }
}

/// Line source over a capture file, opened on `start`
pub struct FileLineSource {
    path: PathBuf,
    inner: Option<ReaderLineSource<BufReader<File>>>,
}

impl FileLineSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSource for FileLineSource {
    fn start(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .map_err(|e| UartiumError::Source(format!("cannot open {:?}: {}", self.path, e)))?;
        self.inner = Some(ReaderLineSource::new(BufReader::new(file)));
        tracing::info!("Opened capture file {:?}", self.path);
        Ok(())
    }

    fn stop(&mut self) {
        self.inner = None;
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        match self.inner.as_mut() {
            Some(reader) => reader.read_line(),
            None => Err(UartiumError::Source("file source not started".to_string())),
        }
    }
}
