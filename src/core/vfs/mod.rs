//! Read-only SQLite VFS over `zip2:` paths
//!
//! Once registered, SQLite can open a database stored inside a zip container
//! by naming the VFS and passing a composite path:
//!
//! ```rust,no_run
//! use rusqlite::{Connection, OpenFlags};
//! use zip2_fs::{register_vfs, Zip2FileSystem, VFS_NAME};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! register_vfs(Zip2FileSystem::new())?;
//! let conn = Connection::open_with_flags_and_vfs(
//!     "zip2:/data/app.zip!db/main.sqlite",
//!     OpenFlags::SQLITE_OPEN_READ_ONLY,
//!     VFS_NAME,
//! )?;
//! let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
//! # Ok(())
//! # }
//! ```

mod file;
#[allow(clippy::module_inception)]
mod vfs;


pub use vfs::{register_vfs, unregister_vfs, ZipVfs, VFS_NAME};
