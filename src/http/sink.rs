//! Temporary body sink.
//!
//! # Responsibilities
//! - Capture a response body while the transfer writes it
//! - Serve the same bytes back, from the start, for response assembly
//! - Keep memory bounded: bodies past the memory limit spill to a temp file
//!
//! # Design Decisions
//! - The slot is lazily filled: `get` creates a sink when none is live
//! - Only a live sink or "absent" may be stored; a closed sink is rejected
//! - Consumption takes the sink out of the slot, leaving it empty

use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;

use crate::error::UsageError;

/// Bytes held in memory before a sink rolls over to disk.
pub const DEFAULT_MEMORY_LIMIT: usize = 2 * 1024 * 1024;

/// Spillable read/write byte store.
#[derive(Debug)]
pub struct BodySink {
    file: Option<SpooledTempFile>,
}

impl BodySink {
    pub fn new(memory_limit: usize) -> Self {
        Self {
            file: Some(SpooledTempFile::new(memory_limit)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.file.is_some()
    }

    /// Release the backing storage. Any further I/O fails.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Whether the sink has spilled from memory to a temporary file.
    pub fn is_spilled(&self) -> bool {
        self.file.as_ref().is_some_and(SpooledTempFile::is_rolled)
    }

    /// Total bytes stored, leaving the cursor where it was.
    pub fn len(&mut self) -> io::Result<u64> {
        let file = self.file_mut()?;
        let position = file.stream_position()?;
        let end = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(position))?;
        Ok(end)
    }

    pub fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn file_mut(&mut self) -> io::Result<&mut SpooledTempFile> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "body sink is closed"))
    }
}

impl Read for BodySink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut()?.read(buf)
    }
}

impl Write for BodySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Seek for BodySink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file_mut()?.seek(pos)
    }
}

/// Holder for "the current sink" of one transfer handle.
#[derive(Debug)]
pub struct SinkSlot {
    current: Option<BodySink>,
    memory_limit: usize,
}

impl SinkSlot {
    pub fn new(memory_limit: usize) -> Self {
        Self {
            current: None,
            memory_limit,
        }
    }

    /// The live sink, created on first access.
    pub fn get(&mut self) -> &mut BodySink {
        let memory_limit = self.memory_limit;
        if !self.is_filled() {
            self.current = Some(BodySink::new(memory_limit));
        }
        self.current.get_or_insert_with(|| BodySink::new(memory_limit))
    }

    /// Store a sink, or clear the slot with `None`.
    pub fn set(&mut self, sink: Option<BodySink>) -> Result<(), UsageError> {
        match sink {
            Some(sink) if !sink.is_live() => Err(UsageError::ClosedSink),
            sink => {
                self.current = sink;
                Ok(())
            }
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Take the current sink out (creating one if absent), leaving the slot empty.
    pub fn take(&mut self) -> BodySink {
        self.get();
        self.current
            .take()
            .unwrap_or_else(|| BodySink::new(self.memory_limit))
    }

    pub fn is_filled(&self) -> bool {
        self.current.as_ref().is_some_and(BodySink::is_live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_creates_once() {
        let mut slot = SinkSlot::new(DEFAULT_MEMORY_LIMIT);
        assert!(!slot.is_filled());

        slot.get().write_all(b"abc").unwrap();
        slot.get().write_all(b"def").unwrap();
        assert!(slot.is_filled());

        let mut sink = slot.take();
        assert!(!slot.is_filled());
        sink.seek(SeekFrom::Start(0)).unwrap();
        let mut out = String::new();
        sink.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abcdef");
    }

    #[test]
    fn test_clear_yields_fresh_sink() {
        let mut slot = SinkSlot::new(DEFAULT_MEMORY_LIMIT);
        slot.get().write_all(b"stale").unwrap();
        slot.clear();
        assert_eq!(slot.get().len().unwrap(), 0);
    }

    #[test]
    fn test_set_rejects_closed_sink() {
        let mut slot = SinkSlot::new(DEFAULT_MEMORY_LIMIT);
        let mut sink = BodySink::new(16);
        sink.close();
        assert!(matches!(slot.set(Some(sink)), Err(UsageError::ClosedSink)));
        assert!(slot.set(Some(BodySink::new(16))).is_ok());
        assert!(slot.set(None).is_ok());
        assert!(!slot.is_filled());
    }

    #[test]
    fn test_spills_past_memory_limit() {
        let mut sink = BodySink::new(8);
        sink.write_all(b"0123").unwrap();
        assert!(!sink.is_spilled());
        sink.write_all(b"456789abcdef").unwrap();
        assert!(sink.is_spilled());
        assert_eq!(sink.len().unwrap(), 16);
    }

    #[test]
    fn test_closed_sink_refuses_io() {
        let mut sink = BodySink::new(8);
        sink.close();
        assert!(sink.write_all(b"x").is_err());
        assert!(!sink.is_live());
    }
}
