//! Zip container builder for tests and benchmarks
//!
//! Produces small but well-formed zip files with full control over how each
//! entry is laid out, including entries whose size is only recorded in a
//! trailing data descriptor (as written by streaming zip writers).

use crate::core::archive::{
    CENTRAL_DIRECTORY_SIGNATURE, DATA_DESCRIPTOR_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIGNATURE,
    FLAG_DATA_DESCRIPTOR, FLAG_UTF8, LOCAL_FILE_HEADER_SIGNATURE,
};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::path::Path;

struct CentralRecord {
    name: String,
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

/// In-memory zip writer
///
/// # Examples
///
/// ```
/// use zip2_fs::fixture::ZipBuilder;
///
/// let bytes = ZipBuilder::new()
///     .stored("a.txt", b"0123456789")
///     .streamed("dir/b.txt", b"hello")
///     .finish();
/// assert_eq!(&bytes[..4], b"PK\x03\x04");
/// ```
#[derive(Default)]
pub struct ZipBuilder {
    out: Vec<u8>,
    central: Vec<CentralRecord>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uncompressed entry with sizes in the local header
    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        let crc = crc32fast::hash(data);
        self.push(name, 0, 0, crc, data, data.len() as u32, false)
    }

    /// Deflated entry with sizes in the local header
    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let crc = crc32fast::hash(data);
        let compressed = deflate(data);
        self.push(name, 0, 8, crc, &compressed, data.len() as u32, false)
    }

    /// Deflated entry whose sizes trail the payload in a signed data descriptor
    pub fn streamed(self, name: &str, data: &[u8]) -> Self {
        let crc = crc32fast::hash(data);
        let compressed = deflate(data);
        self.push(name, FLAG_DATA_DESCRIPTOR, 8, crc, &compressed, data.len() as u32, true)
    }

    /// Like [`ZipBuilder::streamed`], but the descriptor omits its optional signature
    pub fn streamed_unsigned(mut self, name: &str, data: &[u8]) -> Self {
        let crc = crc32fast::hash(data);
        let compressed = deflate(data);
        let offset = self.out.len() as u32;
        self.write_local_header(name, FLAG_DATA_DESCRIPTOR, 8, 0, 0, 0);
        self.out.extend_from_slice(&compressed);
        self.put_u32(crc);
        self.put_u32(compressed.len() as u32);
        self.put_u32(data.len() as u32);
        self.central.push(CentralRecord {
            name: name.to_string(),
            flags: FLAG_DATA_DESCRIPTOR | FLAG_UTF8,
            method: 8,
            crc32: crc,
            compressed_size: compressed.len() as u32,
            uncompressed_size: data.len() as u32,
            local_header_offset: offset,
        });
        self
    }

    /// Directory entry; a trailing `/` is added when missing
    pub fn directory(self, name: &str) -> Self {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        self.push(&name, 0, 0, 0, &[], 0, false)
    }

    /// Entry with an arbitrary method code and pre-encoded payload
    pub fn raw_entry(self, name: &str, method: u16, payload: &[u8], uncompressed_size: u32) -> Self {
        self.push(name, 0, method, 0, payload, uncompressed_size, false)
    }

    /// Append the central directory and return the container bytes
    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.out.len() as u32;
        let records = std::mem::take(&mut self.central);
        for record in &records {
            self.put_u32(CENTRAL_DIRECTORY_SIGNATURE);
            self.put_u16(20); // version made by
            self.put_u16(20); // version needed
            self.put_u16(record.flags);
            self.put_u16(record.method);
            self.put_u16(0); // mod time
            self.put_u16(0x21); // mod date (1980-01-01)
            self.put_u32(record.crc32);
            self.put_u32(record.compressed_size);
            self.put_u32(record.uncompressed_size);
            self.put_u16(record.name.len() as u16);
            self.put_u16(0); // extra
            self.put_u16(0); // comment
            self.put_u16(0); // disk number
            self.put_u16(0); // internal attributes
            self.put_u32(if record.name.ends_with('/') { 0x10 } else { 0 });
            self.put_u32(record.local_header_offset);
            self.out.extend_from_slice(record.name.as_bytes());
        }
        let cd_size = self.out.len() as u32 - cd_offset;

        self.put_u32(END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        self.put_u16(0);
        self.put_u16(0);
        self.put_u16(records.len() as u16);
        self.put_u16(records.len() as u16);
        self.put_u32(cd_size);
        self.put_u32(cd_offset);
        self.put_u16(0);
        self.out
    }

    /// Write the finished container to disk
    pub fn write_to<P: AsRef<Path>>(self, path: P) -> io::Result<()> {
        let bytes = self.finish();
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        mut self,
        name: &str,
        flags: u16,
        method: u16,
        crc: u32,
        payload: &[u8],
        uncompressed_size: u32,
        descriptor: bool,
    ) -> Self {
        let offset = self.out.len() as u32;
        if descriptor {
            self.write_local_header(name, flags, method, 0, 0, 0);
        } else {
            self.write_local_header(name, flags, method, crc, payload.len() as u32, uncompressed_size);
        }
        self.out.extend_from_slice(payload);
        if descriptor {
            self.put_u32(DATA_DESCRIPTOR_SIGNATURE);
            self.put_u32(crc);
            self.put_u32(payload.len() as u32);
            self.put_u32(uncompressed_size);
        }
        self.central.push(CentralRecord {
            name: name.to_string(),
            flags: flags | FLAG_UTF8,
            method,
            crc32: crc,
            compressed_size: payload.len() as u32,
            uncompressed_size,
            local_header_offset: offset,
        });
        self
    }

    fn write_local_header(
        &mut self,
        name: &str,
        flags: u16,
        method: u16,
        crc: u32,
        compressed_size: u32,
        uncompressed_size: u32,
    ) {
        self.put_u32(LOCAL_FILE_HEADER_SIGNATURE);
        self.put_u16(20);
        self.put_u16(flags | FLAG_UTF8);
        self.put_u16(method);
        self.put_u16(0);
        self.put_u16(0x21);
        self.put_u32(crc);
        self.put_u32(compressed_size);
        self.put_u32(uncompressed_size);
        self.put_u16(name.len() as u16);
        self.put_u16(0);
        self.out.extend_from_slice(name.as_bytes());
    }

    fn put_u16(&mut self, value: u16) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}
