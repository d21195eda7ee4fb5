//! # zip2-fs - Read-Only Zip Virtual File System
//!
//! `zip2-fs` serves the entries of zip containers as read-only files under
//! composite `zip2:<container>!<entry>` paths. Entries are reached through a
//! forward-only decompression stream; [`ArchiveFile`] layers random access on
//! top by skipping forward and reopening the entry when a read moves backward.
//!
//! - **Path resolution**: existence, directory checks, sizes and listings
//!   answered by scanning the container
//! - **Random access**: seek anywhere in an entry, including entries whose
//!   size is only recorded after their payload
//! - **SQLite VFS**: open a database stored inside a zip container
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::io::Read;
//! use zip2_fs::{OpenMode, Result, VirtualPath, Zip2FileSystem};
//!
//! # fn main() -> Result<()> {
//! let fs = Zip2FileSystem::new();
//! let path = VirtualPath::parse("zip2:~/data/app.zip!db/main.sqlite");
//!
//! if fs.exists(&path) && !fs.is_directory(&path) {
//!     let mut file = fs.open(&path, OpenMode::Read)?;
//!     file.set_position(fs.size(&path).saturating_sub(16));
//!     let mut tail = Vec::new();
//!     file.read_to_end(&mut tail)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Scheme Dispatch
//!
//! ```rust,no_run
//! use zip2_fs::{registry, FileChannel, Zip2FileSystem};
//!
//! # fn main() -> zip2_fs::Result<()> {
//! Zip2FileSystem::new().register();
//! let provider = registry::provider_for("zip2:/data/app.zip!a.txt")?;
//! let mut channel = provider.open("zip2:/data/app.zip!a.txt", "r")?;
//! let mut buf = [0u8; 64];
//! let n = channel.read(&mut buf)?;
//! # Ok(())
//! # }
//! ```

pub mod core;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{archive, channel, config, error, path, provider, vfs};

pub use crate::core::registry;

// Re-export core types that users need
pub use crate::core::{
    archive::{CompressionMethod, EntryRecord, ZipStream},
    channel::{ArchiveFile, EntryOpener, EntryStream, FileChannel, FileLock},
    config::{FsConfig, IO_BUFFER_SIZE},
    error::{Result, Zip2Error},
    path::{VirtualPath, ENTRY_SEPARATOR, SCHEME},
    provider::{FileSystemProvider, OpenMode, TempFile, Zip2FileSystem},
    vfs::{register_vfs, unregister_vfs, VFS_NAME},
};
