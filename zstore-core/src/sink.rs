//! Random-access byte sinks
//!
//! Download paths write reconstructed bytes through a positional-write
//! contract rather than a sequential writer, so a future streamed decode
//! can place shard contents directly at their destination offsets.
//! Backends that only have sequential readers buffer the whole object and
//! emit a single `write_at(all_bytes, 0)`.

use parking_lot::Mutex;
use std::fs::File;
use std::io;
use std::sync::Arc;

/// Positional write contract for download destinations.
///
/// Implementations must tolerate concurrent calls at disjoint offsets.
pub trait WriteAt: Send + Sync {
    /// Write the full buffer at the given byte offset.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;
}

impl WriteAt for File {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.write_all_at(buf, offset)
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut written = 0;
            while written < buf.len() {
                let n = self.seek_write(&buf[written..], offset + written as u64)?;
                written += n;
            }
            Ok(())
        }
    }
}

impl<T: WriteAt + ?Sized> WriteAt for &T {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        (**self).write_at(buf, offset)
    }
}

impl<T: WriteAt + ?Sized> WriteAt for Arc<T> {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        (**self).write_at(buf, offset)
    }
}

/// Growable in-memory sink, mainly for tests and buffered reconstruction.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl WriteAt for SharedBuffer {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        let offset = offset as usize;
        let end = offset + buf.len();
        let mut inner = self.inner.lock();
        if inner.len() < end {
            inner.resize(end, 0);
        }
        inner[offset..end].copy_from_slice(buf);
        Ok(())
    }
}
