//! Random-access reads over a forward-only entry stream
//!
//! An [`ArchiveFile`] keeps two cursors: `pos`, the position the caller asked
//! for, and `stream_pos`, how far the live decompression stream has been
//! consumed. Moving `pos` is free; the cost is paid on the next read:
//!
//! - `stream_pos > pos`: the stream is already past the target, so it is
//!   dropped and the entry reopened from byte 0 through the resolver
//! - `stream_pos < pos`: the gap is skipped on the live stream
//!
//! Reading front to back therefore uses a single stream, while reading back
//! to front reopens the entry for every request.

use crate::archive::ZipStream;
use crate::error::{Result, Zip2Error};
use crate::path::VirtualPath;
use crate::provider::Zip2FileSystem;
use std::fmt;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use tracing::{debug, info};

/// Forward-only payload stream of one entry
pub trait EntryStream: Read + Send {
    /// Whether [`skip`](EntryStream::skip) is implemented
    ///
    /// Readers over streams that return false discard bytes through `read`.
    fn supports_skip(&self) -> bool {
        false
    }

    /// Skip up to `n` bytes, returning how many were skipped (0 at end of entry)
    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let _ = n;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream has no bulk skip",
        ))
    }
}

impl<R: BufRead + Send> EntryStream for ZipStream<R> {
    fn supports_skip(&self) -> bool {
        true
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        ZipStream::skip(self, n)
    }
}

/// Opens an entry from scratch, positioned at byte 0 of its payload
pub trait EntryOpener {
    type Stream: EntryStream;

    fn open_entry(&self, path: &VirtualPath) -> Result<Self::Stream>;
}

/// Lock handle returned by [`FileChannel::try_lock`]
///
/// Archive entries are immutable, so this crate never hands one out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLock {
    pub position: u64,
    pub size: u64,
    pub shared: bool,
}

/// Random-access file handle as seen by hosts dispatching on path schemes
pub trait FileChannel: Send {
    /// Release the handle and its stream
    fn close(self: Box<Self>) -> Result<()>;

    fn position(&self) -> u64;

    fn set_position(&mut self, pos: u64);

    fn size(&self) -> u64;

    /// Read at the current position; 0 means end of file
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn truncate(&mut self, len: u64) -> Result<()>;

    fn force(&mut self, meta_data: bool) -> Result<()>;

    fn try_lock(&mut self, position: u64, size: u64, shared: bool) -> Result<Option<FileLock>>;
}

/// Read-only random-access view of one archive entry
pub struct ArchiveFile<O: EntryOpener = Zip2FileSystem> {
    opener: O,
    full_path: VirtualPath,
    length: u64,
    pos: u64,
    stream_pos: u64,
    stream: Option<O::Stream>,
    skip_using_read: bool,
    skip_buffer: Vec<u8>,
    skip_buffer_size: usize,
}

impl<O: EntryOpener> ArchiveFile<O> {
    /// Wrap a stream positioned at byte 0 of the entry named by `full_path`
    pub fn new(
        opener: O,
        full_path: VirtualPath,
        stream: O::Stream,
        length: u64,
        skip_buffer_size: usize,
    ) -> Self {
        ArchiveFile {
            opener,
            full_path,
            length,
            pos: 0,
            stream_pos: 0,
            stream: Some(stream),
            skip_using_read: false,
            skip_buffer: Vec::new(),
            skip_buffer_size: skip_buffer_size.max(1),
        }
    }

    pub fn entry_name(&self) -> &str {
        self.full_path.entry_name()
    }

    pub fn full_path(&self) -> &VirtualPath {
        &self.full_path
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Move the logical cursor; the stream is not touched until the next read
    pub fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn size(&self) -> u64 {
        self.length
    }

    /// True once a stream without bulk skip forced the read-and-discard path
    pub fn skips_by_reading(&self) -> bool {
        self.skip_using_read
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.sync_stream()? {
            // Positioned beyond the end of the entry
            return Ok(0);
        }
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(0),
        };
        match stream.read(buf) {
            Ok(n) => {
                self.pos += n as u64;
                self.stream_pos += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.discard_stream();
                Err(e.into())
            }
        }
    }

    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Zip2Error::ReadOnly(self.entry_name().to_string()))
    }

    pub fn truncate(&mut self, _len: u64) -> Result<()> {
        Err(Zip2Error::ReadOnly(self.entry_name().to_string()))
    }

    /// Nothing is ever buffered for writing
    pub fn force(&mut self, _meta_data: bool) -> Result<()> {
        Ok(())
    }

    pub fn try_lock(&mut self, _position: u64, _size: u64, _shared: bool) -> Result<Option<FileLock>> {
        Ok(None)
    }

    pub fn close(mut self) {
        self.stream.take();
        info!("Closed {}", self.full_path);
    }

    /// Bring the live stream to `pos`; false when the entry ends before it
    fn sync_stream(&mut self) -> Result<bool> {
        if self.stream_pos > self.pos {
            debug!(
                "Backward seek in {} ({} -> {}), reopening entry",
                self.full_path, self.stream_pos, self.pos
            );
            self.stream = None;
        }
        if self.stream.is_none() {
            self.stream = Some(self.opener.open_entry(&self.full_path)?);
            self.stream_pos = 0;
        }
        if self.stream_pos < self.pos {
            let gap = self.pos - self.stream_pos;
            match self.skip_forward(gap) {
                Ok(skipped) => self.stream_pos += skipped,
                Err(e) => {
                    self.discard_stream();
                    return Err(e);
                }
            }
        }
        Ok(self.stream_pos == self.pos)
    }

    /// Drop a stream whose offset is no longer known after a failed call
    ///
    /// The next read reopens the entry from byte 0.
    fn discard_stream(&mut self) {
        if self.stream.take().is_some() {
            debug!("Dropped stream of {} after an error", self.full_path);
        }
        self.stream_pos = 0;
    }

    fn skip_forward(&mut self, gap: u64) -> Result<u64> {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(0),
        };

        if !self.skip_using_read && !stream.supports_skip() {
            debug!(
                "Bulk skip unavailable for {}, discarding through reads",
                self.full_path
            );
            self.skip_using_read = true;
        }

        let mut done = 0u64;
        if !self.skip_using_read {
            while done < gap {
                match stream.skip(gap - done)? {
                    0 => return Ok(done),
                    n => done += n,
                }
            }
        }

        if self.skip_using_read {
            if self.skip_buffer.is_empty() {
                self.skip_buffer = vec![0u8; self.skip_buffer_size];
            }
            while done < gap {
                let want = (gap - done).min(self.skip_buffer.len() as u64) as usize;
                let n = stream.read(&mut self.skip_buffer[..want])?;
                if n == 0 {
                    break;
                }
                done += n as u64;
            }
        }
        Ok(done)
    }
}

impl<O> FileChannel for ArchiveFile<O>
where
    O: EntryOpener + Send,
{
    fn close(self: Box<Self>) -> Result<()> {
        ArchiveFile::close(*self);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) {
        ArchiveFile::set_position(self, pos)
    }

    fn size(&self) -> u64 {
        self.length
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        ArchiveFile::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        ArchiveFile::write(self, buf)
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        ArchiveFile::truncate(self, len)
    }

    fn force(&mut self, meta_data: bool) -> Result<()> {
        ArchiveFile::force(self, meta_data)
    }

    fn try_lock(&mut self, position: u64, size: u64, shared: bool) -> Result<Option<FileLock>> {
        ArchiveFile::try_lock(self, position, size, shared)
    }
}

impl<O: EntryOpener> Read for ArchiveFile<O> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ArchiveFile::read(self, buf).map_err(io::Error::from)
    }
}

impl<O: EntryOpener> Seek for ArchiveFile<O> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let pos = match target {
            SeekFrom::Start(pos) => Some(pos),
            SeekFrom::End(delta) => self.length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match pos {
            Some(pos) => {
                self.pos = pos;
                Ok(pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

impl<O: EntryOpener> Drop for ArchiveFile<O> {
    fn drop(&mut self) {
        if self.stream.take().is_some() {
            debug!("Released stream of {} without close", self.full_path);
        }
    }
}

impl<O: EntryOpener> fmt::Display for ArchiveFile<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_name())
    }
}

impl<O: EntryOpener> fmt::Debug for ArchiveFile<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveFile")
            .field("path", &self.full_path.as_str())
            .field("length", &self.length)
            .field("pos", &self.pos)
            .field("stream_pos", &self.stream_pos)
            .field("open", &self.stream.is_some())
            .field("skip_using_read", &self.skip_using_read)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MemoryStream {
        data: Arc<Vec<u8>>,
        offset: usize,
        bulk_skip: bool,
        skip_error: Option<io::ErrorKind>,
        skip_calls: Arc<AtomicUsize>,
        // Reads left until one fails with Interrupted; 0 never fails
        interrupt_countdown: Arc<AtomicUsize>,
    }

    impl Read for MemoryStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let before = self
                .interrupt_countdown
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if before == Ok(1) {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
            }
            let rest = &self.data[self.offset..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.offset += n;
            Ok(n)
        }
    }

    impl EntryStream for MemoryStream {
        fn supports_skip(&self) -> bool {
            self.bulk_skip
        }

        fn skip(&mut self, n: u64) -> io::Result<u64> {
            self.skip_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(kind) = self.skip_error {
                return Err(io::Error::new(kind, "entry cannot be decoded"));
            }
            let n = (n as usize).min(self.data.len() - self.offset);
            self.offset += n;
            Ok(n as u64)
        }
    }

    #[derive(Clone)]
    struct MemoryOpener {
        data: Arc<Vec<u8>>,
        bulk_skip: bool,
        skip_error: Option<io::ErrorKind>,
        opens: Arc<AtomicUsize>,
        skip_calls: Arc<AtomicUsize>,
        interrupt_countdown: Arc<AtomicUsize>,
    }

    impl MemoryOpener {
        fn new(data: &[u8], bulk_skip: bool) -> Self {
            MemoryOpener {
                data: Arc::new(data.to_vec()),
                bulk_skip,
                skip_error: None,
                opens: Arc::new(AtomicUsize::new(0)),
                skip_calls: Arc::new(AtomicUsize::new(0)),
                interrupt_countdown: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Fail the `nth` read across all streams of this opener, once
        fn interrupt_read(self, nth: usize) -> Self {
            self.interrupt_countdown.store(nth, Ordering::SeqCst);
            self
        }

        fn failing_skip(mut self, kind: io::ErrorKind) -> Self {
            self.skip_error = Some(kind);
            self
        }

        fn file(&self) -> ArchiveFile<MemoryOpener> {
            let stream = self.stream();
            let path = VirtualPath::parse("zip2:mem.zip!a.txt");
            ArchiveFile::new(self.clone(), path, stream, self.data.len() as u64, 4)
        }

        fn stream(&self) -> MemoryStream {
            MemoryStream {
                data: Arc::clone(&self.data),
                offset: 0,
                bulk_skip: self.bulk_skip,
                skip_error: self.skip_error,
                skip_calls: Arc::clone(&self.skip_calls),
                interrupt_countdown: Arc::clone(&self.interrupt_countdown),
            }
        }
    }

    impl EntryOpener for MemoryOpener {
        type Stream = MemoryStream;

        fn open_entry(&self, _path: &VirtualPath) -> Result<MemoryStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(self.stream())
        }
    }

    fn read_at(file: &mut ArchiveFile<MemoryOpener>, pos: u64, len: usize) -> Vec<u8> {
        file.set_position(pos);
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = file.read(&mut buf[filled..]).unwrap();
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        buf
    }

    #[test]
    fn test_sequential_reads_reuse_stream() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut file = opener.file();

        assert_eq!(read_at(&mut file, 0, 4), b"0123");
        assert_eq!(read_at(&mut file, 4, 3), b"456");
        assert_eq!(read_at(&mut file, 8, 2), b"89");
        assert_eq!(opener.opens.load(Ordering::SeqCst), 0);
        assert_eq!(file.position(), 10);
    }

    #[test]
    fn test_backward_seek_reopens() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut file = opener.file();

        assert_eq!(read_at(&mut file, 7, 3), b"789");
        assert_eq!(read_at(&mut file, 0, 3), b"012");
        assert_eq!(opener.opens.load(Ordering::SeqCst), 1);

        // Same position again is not a backward seek
        assert_eq!(read_at(&mut file, 3, 2), b"34");
        assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_position_is_lazy() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut file = opener.file();
        file.set_position(9);
        file.set_position(0);
        file.set_position(5);
        assert_eq!(opener.skip_calls.load(Ordering::SeqCst), 0);
        assert_eq!(read_at(&mut file, 5, 1), b"5");
        assert_eq!(opener.skip_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_skip_is_permanent() {
        let opener = MemoryOpener::new(b"abcdefghijklmnopqrstuvwxyz", false);
        let mut file = opener.file();

        assert_eq!(read_at(&mut file, 10, 3), b"klm");
        assert!(file.skips_by_reading());
        assert_eq!(read_at(&mut file, 20, 2), b"uv");
        assert_eq!(read_at(&mut file, 1, 2), b"bc");
        assert!(file.skips_by_reading());
        assert_eq!(opener.skip_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_interrupted_skip_is_retried_from_scratch() {
        let data: Vec<u8> = (0..32).collect();
        let opener = MemoryOpener::new(&data, false).interrupt_read(2);
        let mut file = opener.file();

        file.set_position(10);
        let mut buf = [0u8; 4];
        Read::read_exact(&mut file, &mut buf).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);
        assert_eq!(file.position(), 14);
        assert_eq!(opener.opens.load(Ordering::SeqCst), 1);

        // The reopened stream keeps serving forward reads
        Read::read_exact(&mut file, &mut buf).unwrap();
        assert_eq!(buf, [14, 15, 16, 17]);
        assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interrupted_read_is_retried_at_same_offset() {
        let data: Vec<u8> = (0..16).collect();
        let opener = MemoryOpener::new(&data, true).interrupt_read(2);
        let mut file = opener.file();

        let mut buf = [0u8; 3];
        Read::read_exact(&mut file, &mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2]);
        Read::read_exact(&mut file, &mut buf).unwrap();
        assert_eq!(buf, [3, 4, 5]);
        assert_eq!(file.position(), 6);
    }

    #[test]
    fn test_skip_error_surfaces_without_fallback() {
        let opener = MemoryOpener::new(b"0123456789", true).failing_skip(io::ErrorKind::Unsupported);
        let mut file = opener.file();

        file.set_position(5);
        let mut buf = [0u8; 2];
        let err = file.read(&mut buf).unwrap_err();
        assert!(matches!(err, Zip2Error::Io(ref e) if e.kind() == io::ErrorKind::Unsupported));
        assert!(!file.skips_by_reading());

        // The error repeats on retry instead of turning into discarding reads
        assert!(file.read(&mut buf).is_err());
        assert!(!file.skips_by_reading());
        assert_eq!(opener.skip_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_read_past_end() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut file = opener.file();
        assert!(read_at(&mut file, 15, 4).is_empty());
        assert_eq!(read_at(&mut file, 9, 4), b"9");
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mutations_rejected() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut file = opener.file();

        let err = file.write(b"x").unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "File is read-only: a.txt");
        assert!(file.truncate(0).unwrap_err().is_unsupported());
        assert!(file.force(true).is_ok());
        assert!(file.try_lock(0, u64::MAX, false).unwrap().is_none());
        assert_eq!(file.size(), 10);
    }

    #[test]
    fn test_io_traits() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut file = opener.file();

        file.seek(SeekFrom::End(-3)).unwrap();
        let mut tail = String::new();
        file.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "789");

        file.seek(SeekFrom::Start(2)).unwrap();
        file.seek(SeekFrom::Current(1)).unwrap();
        let mut one = [0u8; 1];
        Read::read_exact(&mut file, &mut one).unwrap();
        assert_eq!(&one, b"3");

        assert!(file.seek(SeekFrom::Current(-10)).is_err());
        assert_eq!(file.to_string(), "a.txt");
    }

    #[test]
    fn test_boxed_channel() {
        let opener = MemoryOpener::new(b"0123456789", true);
        let mut channel: Box<dyn FileChannel> = Box::new(opener.file());
        channel.set_position(6);
        let mut buf = [0u8; 2];
        assert_eq!(channel.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"67");
        assert_eq!(channel.position(), 8);
        assert!(channel.write(b"x").unwrap_err().is_unsupported());
        channel.close().unwrap();
    }
}
