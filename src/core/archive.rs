//! Forward-only zip entry enumerator
//!
//! Walks the local file headers of a zip container from the first byte,
//! yielding one entry at a time. The payload of the current entry is exposed
//! through [`std::io::Read`] and is valid until the next call to
//! [`ZipStream::next_entry`]. There is no way back: revisiting an entry means
//! opening a new stream over the container.
//!
//! Supported layout:
//! - stored (method 0) and deflate (method 8) entries
//! - entries whose sizes and CRC-32 trail the payload in a data descriptor
//!   (flag bit 3); their declared size is reported as unknown
//! - zip64 sizes in the local header extra field
//!
//! Other compression methods and encrypted entries can be enumerated and
//! skipped, but reading their payload fails.

use crate::error::{Result, Zip2Error};
use flate2::bufread::DeflateDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use tracing::debug;

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

const ZIP64_EXTRA_FIELD_TAG: u16 = 0x0001;
const ZIP64_MARKER: u32 = 0xFFFF_FFFF;

pub const FLAG_ENCRYPTED: u16 = 1;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
pub const FLAG_UTF8: u16 = 1 << 11;

/// Zip stream over a container file on disk
pub type ContainerStream = ZipStream<BufReader<File>>;

/// Compression method of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflated,
    Other(u16),
}

impl CompressionMethod {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Other(code) => code,
        }
    }
}

/// Metadata of the entry the stream is currently positioned on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Entry name as stored in the container (`/` separated)
    pub name: String,
    /// Directory entries are the ones whose name ends with `/`
    pub is_dir: bool,
    /// Uncompressed size, `None` when it is only known after the payload
    pub declared_size: Option<u64>,
    /// Compressed size, `None` when it is only known after the payload
    pub compressed_size: Option<u64>,
    /// CRC-32 from the local header (0 when deferred to a data descriptor)
    pub crc32: u32,
    pub method: CompressionMethod,
}

struct EntryState {
    name: String,
    method: CompressionMethod,
    declared_size: Option<u64>,
    compressed_size: Option<u64>,
    expected_crc: Option<u32>,
    has_descriptor: bool,
    zip64: bool,
    unreadable: Option<String>,
    hasher: crc32fast::Hasher,
    produced: u64,
}

enum Body<R> {
    /// Positioned at a local header signature
    Idle(R),
    /// Positioned at the first payload byte; decoder not created yet
    Pending(R),
    Stored { inner: R, remaining: u64 },
    Deflated(DeflateDecoder<R>),
    /// Enumeration ended or an earlier error left the stream unusable
    Done,
}

/// Sequential reader over the entries of a zip container
pub struct ZipStream<R: BufRead> {
    body: Body<R>,
    entry: Option<EntryState>,
    verify_checksums: bool,
}

impl ContainerStream {
    /// Open a container file with the given read buffer capacity
    pub fn open_file<P: AsRef<std::path::Path>>(path: P, buffer_size: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(ZipStream::new(BufReader::with_capacity(buffer_size, file)))
    }
}

impl<R: BufRead> ZipStream<R> {
    pub fn new(reader: R) -> Self {
        ZipStream {
            body: Body::Idle(reader),
            entry: None,
            verify_checksums: true,
        }
    }

    /// Enable or disable CRC-32 and length checks of fully read entries
    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Advance to the next entry, discarding whatever is left of the current one
    ///
    /// Returns `Ok(None)` once the central directory (or a clean end of input)
    /// is reached.
    pub fn next_entry(&mut self) -> Result<Option<EntryRecord>> {
        self.close_entry()?;

        let mut inner = match std::mem::replace(&mut self.body, Body::Done) {
            Body::Idle(inner) => inner,
            _ => return Ok(None),
        };

        if inner.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let signature = read_u32(&mut inner)?;
        match signature {
            LOCAL_FILE_HEADER_SIGNATURE => {}
            CENTRAL_DIRECTORY_SIGNATURE
            | END_OF_CENTRAL_DIRECTORY_SIGNATURE
            | ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE => return Ok(None),
            other => {
                return Err(Zip2Error::InvalidArchive(format!(
                    "unexpected signature {:08x}",
                    other
                )))
            }
        }

        let (state, record) = read_local_header(&mut inner)?;
        debug!(
            "Entry {} ({:?}, declared size {:?})",
            record.name, record.method, record.declared_size
        );

        self.body = Body::Pending(inner);
        self.entry = Some(state);
        Ok(Some(record))
    }

    /// Discard the rest of the current entry so the stream sits on the next header
    pub fn close_entry(&mut self) -> Result<()> {
        let (readable, compressed_size, produced, descriptor) = match &self.entry {
            None => return Ok(()),
            Some(entry) => (
                entry.unreadable.is_none(),
                entry.compressed_size,
                entry.produced,
                entry.has_descriptor.then_some(entry.zip64),
            ),
        };

        // Untouched entries with a known compressed size are skipped without decoding
        if let (Some(compressed), 0) = (compressed_size, produced) {
            match std::mem::replace(&mut self.body, Body::Done) {
                Body::Pending(mut inner) => {
                    skip_raw(&mut inner, compressed)?;
                    if let Some(zip64) = descriptor {
                        read_data_descriptor(&mut inner, zip64)?;
                    }
                    self.entry = None;
                    self.body = Body::Idle(inner);
                    return Ok(());
                }
                other => self.body = other,
            }
        }

        if !readable {
            return Err(self.unreadable_error());
        }

        io::copy(self, &mut io::sink())?;
        Ok(())
    }

    /// Skip up to `n` payload bytes of the current entry
    ///
    /// Returns the number of bytes skipped; 0 means the entry is exhausted.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut Read::by_ref(self).take(n), &mut io::sink())
    }

    fn unreadable_error(&self) -> Zip2Error {
        let reason = self
            .entry
            .as_ref()
            .and_then(|entry| entry.unreadable.clone())
            .unwrap_or_else(|| "entry cannot be read".to_string());
        Zip2Error::UnsupportedArchive(reason)
    }

    fn start_body(&mut self) -> io::Result<()> {
        if !matches!(self.body, Body::Pending(_)) {
            return Ok(());
        }

        let (method, compressed_size) = match &self.entry {
            Some(entry) => (entry.method, entry.compressed_size),
            None => return Ok(()),
        };
        if let CompressionMethod::Other(code) = method {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("compression method {} is not supported", code),
            ));
        }

        let inner = match std::mem::replace(&mut self.body, Body::Done) {
            Body::Pending(inner) => inner,
            other => {
                self.body = other;
                return Ok(());
            }
        };
        self.body = match method {
            CompressionMethod::Deflated => Body::Deflated(DeflateDecoder::new(inner)),
            _ => Body::Stored {
                inner,
                remaining: compressed_size.unwrap_or(0),
            },
        };
        Ok(())
    }

    fn finish_entry(&mut self) -> io::Result<()> {
        let mut inner = match std::mem::replace(&mut self.body, Body::Done) {
            Body::Stored { inner, .. } | Body::Pending(inner) | Body::Idle(inner) => inner,
            Body::Deflated(decoder) => decoder.into_inner(),
            Body::Done => return Ok(()),
        };
        let mut entry = match self.entry.take() {
            Some(entry) => entry,
            None => {
                self.body = Body::Idle(inner);
                return Ok(());
            }
        };

        if entry.has_descriptor {
            let (crc, size) = read_data_descriptor(&mut inner, entry.zip64)?;
            entry.expected_crc = Some(crc);
            entry.declared_size = Some(size);
        }

        if self.verify_checksums {
            verify_entry(&entry).map_err(io::Error::from)?;
        }

        self.body = Body::Idle(inner);
        Ok(())
    }
}

impl<R: BufRead> Read for ZipStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match &self.entry {
            None => return Ok(0),
            Some(entry) if entry.unreadable.is_some() => {
                return Err(self.unreadable_error().into());
            }
            Some(_) => {}
        }

        self.start_body()?;

        let n = match &mut self.body {
            Body::Stored { inner, remaining } => {
                if *remaining == 0 {
                    0
                } else {
                    let max = (*remaining).min(buf.len() as u64) as usize;
                    let n = inner.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "container ended inside a stored entry",
                        ));
                    }
                    *remaining -= n as u64;
                    n
                }
            }
            Body::Deflated(decoder) => decoder.read(buf)?,
            Body::Idle(_) | Body::Pending(_) | Body::Done => 0,
        };

        if n == 0 {
            self.finish_entry()?;
            return Ok(0);
        }

        if let Some(entry) = self.entry.as_mut() {
            entry.hasher.update(&buf[..n]);
            entry.produced += n as u64;
        }
        Ok(n)
    }
}

fn read_local_header<R: Read>(inner: &mut R) -> Result<(EntryState, EntryRecord)> {
    let _version_needed = read_u16(inner)?;
    let flags = read_u16(inner)?;
    let method = CompressionMethod::from_code(read_u16(inner)?);
    let _mod_time = read_u16(inner)?;
    let _mod_date = read_u16(inner)?;
    let crc32 = read_u32(inner)?;
    let compressed32 = read_u32(inner)?;
    let uncompressed32 = read_u32(inner)?;
    let name_len = read_u16(inner)? as usize;
    let extra_len = read_u16(inner)? as usize;

    let mut name_bytes = vec![0u8; name_len];
    inner.read_exact(&mut name_bytes)?;
    let mut extra = vec![0u8; extra_len];
    inner.read_exact(&mut extra)?;

    let name = if flags & FLAG_UTF8 != 0 {
        String::from_utf8(name_bytes)
            .map_err(|_| Zip2Error::InvalidArchive("entry name is not valid UTF-8".into()))?
    } else {
        String::from_utf8_lossy(&name_bytes).into_owned()
    };

    let mut uncompressed = u64::from(uncompressed32);
    let mut compressed = u64::from(compressed32);
    let zip64 = uncompressed32 == ZIP64_MARKER || compressed32 == ZIP64_MARKER;
    if zip64 {
        let (u, c) = parse_zip64_extra(&extra, uncompressed32, compressed32)?;
        uncompressed = u;
        compressed = c;
    }

    let has_descriptor = flags & FLAG_DATA_DESCRIPTOR != 0;
    // With a data descriptor the header sizes are placeholders
    let (declared_size, compressed_size, expected_crc) = if has_descriptor {
        if compressed > 0 {
            (None, Some(compressed), None)
        } else {
            (None, None, None)
        }
    } else {
        (Some(uncompressed), Some(compressed), Some(crc32))
    };

    let unreadable = if flags & FLAG_ENCRYPTED != 0 {
        Some(format!("entry {} is encrypted", name))
    } else if let CompressionMethod::Other(code) = method {
        Some(format!("entry {} uses unsupported compression method {}", name, code))
    } else {
        None
    };

    if compressed_size.is_none() {
        if unreadable.is_some() {
            return Err(Zip2Error::UnsupportedArchive(format!(
                "entry {} cannot be skipped: its size trails an undecodable payload",
                name
            )));
        }
        if method == CompressionMethod::Stored {
            return Err(Zip2Error::UnsupportedArchive(format!(
                "stored entry {} has no size in its local header",
                name
            )));
        }
    }

    let record = EntryRecord {
        is_dir: name.ends_with('/'),
        name: name.clone(),
        declared_size,
        compressed_size,
        crc32: if has_descriptor { 0 } else { crc32 },
        method,
    };
    let state = EntryState {
        name,
        method,
        declared_size,
        compressed_size,
        expected_crc,
        has_descriptor,
        zip64,
        unreadable,
        hasher: crc32fast::Hasher::new(),
        produced: 0,
    };
    Ok((state, record))
}

fn parse_zip64_extra(extra: &[u8], uncompressed32: u32, compressed32: u32) -> Result<(u64, u64)> {
    let mut offset = 0;
    while offset + 4 <= extra.len() {
        let tag = u16::from_le_bytes([extra[offset], extra[offset + 1]]);
        let size = u16::from_le_bytes([extra[offset + 2], extra[offset + 3]]) as usize;
        let data_start = offset + 4;
        let data_end = data_start + size;
        if data_end > extra.len() {
            break;
        }
        if tag == ZIP64_EXTRA_FIELD_TAG {
            let mut data = &extra[data_start..data_end];
            let uncompressed = if uncompressed32 == ZIP64_MARKER {
                read_u64(&mut data)?
            } else {
                u64::from(uncompressed32)
            };
            let compressed = if compressed32 == ZIP64_MARKER {
                read_u64(&mut data)?
            } else {
                u64::from(compressed32)
            };
            return Ok((uncompressed, compressed));
        }
        offset = data_end;
    }
    Err(Zip2Error::InvalidArchive(
        "zip64 size marker without zip64 extra field".into(),
    ))
}

fn read_data_descriptor<R: Read>(inner: &mut R, zip64: bool) -> io::Result<(u32, u64)> {
    let first = read_u32(inner)?;
    let crc = if first == DATA_DESCRIPTOR_SIGNATURE {
        read_u32(inner)?
    } else {
        first
    };
    let size = if zip64 {
        let _compressed = read_u64(inner)?;
        read_u64(inner)?
    } else {
        let _compressed = read_u32(inner)?;
        u64::from(read_u32(inner)?)
    };
    Ok((crc, size))
}

fn verify_entry(entry: &EntryState) -> Result<()> {
    if let Some(expected) = entry.declared_size {
        if expected != entry.produced {
            return Err(Zip2Error::InvalidArchive(format!(
                "entry {} declares {} bytes but holds {}",
                entry.name, expected, entry.produced
            )));
        }
    }
    if let Some(expected) = entry.expected_crc {
        let actual = entry.hasher.clone().finalize();
        if expected != actual {
            return Err(Zip2Error::ChecksumMismatch {
                entry: entry.name.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}

fn skip_raw<R: Read>(inner: &mut R, n: u64) -> io::Result<()> {
    let skipped = io::copy(&mut inner.by_ref().take(n), &mut io::sink())?;
    if skipped < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "container ended inside an entry",
        ));
    }
    Ok(())
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
