//! Read-only `zip2:` file system
//!
//! [`Zip2FileSystem`] answers path-level questions about entries inside zip
//! containers and opens them for random access. It keeps no state between
//! calls: every query parses its path and scans the container from the first
//! entry. Containers are expected to be opened rarely (typically once when a
//! database starts) and to be small enough that a linear scan per query is
//! cheap, so no entry index is kept.
//!
//! Metadata queries (`exists`, `is_directory`, `size`) never fail: an
//! unreadable or missing container reads as "not there". Opening and
//! listing surface their errors. Every mutation is rejected.

use crate::archive::{ContainerStream, EntryRecord};
use crate::channel::{ArchiveFile, EntryOpener, FileChannel};
use crate::config::FsConfig;
use crate::error::{Result, Zip2Error};
use crate::path::{VirtualPath, SCHEME};
use crate::registry;
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Access mode requested when opening an entry
///
/// Every mode yields a read-only channel; write modes are accepted so that
/// hosts which always ask for `rw` can still read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    ReadWrite,
    ReadWriteSync,
    ReadWriteData,
}

impl FromStr for OpenMode {
    type Err = Zip2Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "r" => Ok(OpenMode::Read),
            "rw" => Ok(OpenMode::ReadWrite),
            "rws" => Ok(OpenMode::ReadWriteSync),
            "rwd" => Ok(OpenMode::ReadWriteData),
            other => Err(Zip2Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenMode::Read => "r",
            OpenMode::ReadWrite => "rw",
            OpenMode::ReadWriteSync => "rws",
            OpenMode::ReadWriteData => "rwd",
        })
    }
}

/// Disk-backed temporary file handed out by `create_temp_file`
#[derive(Debug)]
pub enum TempFile {
    /// Removed when the value is dropped
    DeleteOnDrop(TempPath),
    /// Left on disk for the caller to clean up
    Persistent(PathBuf),
}

impl TempFile {
    pub fn path(&self) -> &Path {
        match self {
            TempFile::DeleteOnDrop(path) => &**path,
            TempFile::Persistent(path) => path.as_path(),
        }
    }
}

/// Operations a host path-dispatch layer invokes on a registered scheme
///
/// Paths are full strings including the scheme tag.
pub trait FileSystemProvider: Send + Sync {
    fn scheme(&self) -> &str;

    fn exists(&self, path: &str) -> bool;

    fn is_directory(&self, path: &str) -> bool;

    fn size(&self, path: &str) -> u64;

    /// Milliseconds since the Unix epoch; 0 when unknown
    fn last_modified(&self, path: &str) -> u64;

    fn parent(&self, path: &str) -> Option<String>;

    fn is_absolute(&self, path: &str) -> bool;

    /// The path with its scheme tag removed
    fn unwrap(&self, path: &str) -> PathBuf;

    fn to_real_path(&self, path: &str) -> String;

    fn can_write(&self, path: &str) -> bool;

    fn set_read_only(&self, path: &str) -> bool;

    fn new_directory_stream(&self, path: &str) -> Result<Vec<String>>;

    fn create_directory(&self, path: &str) -> Result<()>;

    fn create_file(&self, path: &str) -> Result<bool>;

    fn create_temp_file(
        &self,
        path: &str,
        suffix: &str,
        delete_on_exit: bool,
        in_temp_dir: bool,
    ) -> Result<TempFile>;

    fn delete(&self, path: &str) -> Result<()>;

    fn move_to(&self, path: &str, target: &str) -> Result<()>;

    fn new_input_stream(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    fn new_output_stream(&self, path: &str, append: bool) -> Result<Box<dyn Write + Send>>;

    fn open(&self, path: &str, mode: &str) -> Result<Box<dyn FileChannel>>;
}

/// Stateless resolver for `zip2:container!entry` paths
#[derive(Debug, Clone, Default)]
pub struct Zip2FileSystem {
    config: FsConfig,
}

impl Zip2FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom configuration, rejecting invalid values
    pub fn with_config(config: FsConfig) -> Result<Self> {
        Ok(Zip2FileSystem {
            config: config.checked()?,
        })
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Install this file system in the process-wide scheme registry
    pub fn register(self) -> Arc<Self> {
        let fs = Arc::new(self);
        registry::register(fs.clone());
        fs
    }

    /// Remove the `zip2` scheme from the registry
    pub fn unregister() {
        registry::unregister(SCHEME);
    }

    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    pub fn get_path(&self, raw: &str) -> VirtualPath {
        VirtualPath::parse(raw)
    }

    /// True for the archive root and for every entry present in the container
    pub fn exists(&self, path: &VirtualPath) -> bool {
        if path.is_root() {
            return true;
        }
        match self.locate(path) {
            Ok(found) => found.is_some(),
            Err(e) => {
                swallowed("exists", path, &e);
                false
            }
        }
    }

    /// True for the root, for directory entries, and for names other entries nest under
    ///
    /// The first decisive entry in container order wins: a file entry `x`
    /// listed before `x/...` entries reports `false`.
    pub fn is_directory(&self, path: &VirtualPath) -> bool {
        if path.is_root() {
            return true;
        }
        match self.scan_is_directory(path) {
            Ok(result) => result,
            Err(e) => {
                swallowed("is_directory", path, &e);
                false
            }
        }
    }

    /// Uncompressed size of the entry; 0 when absent or unreadable
    ///
    /// Entries whose size is only recorded after their payload are measured
    /// by skipping through them.
    pub fn size(&self, path: &VirtualPath) -> u64 {
        match self.scan_size(path) {
            Ok(size) => size,
            Err(e) => {
                swallowed("size", path, &e);
                0
            }
        }
    }

    /// Entries carry no reliable modification time
    pub fn last_modified(&self, _path: &VirtualPath) -> u64 {
        0
    }

    pub fn parent(&self, path: &VirtualPath) -> Option<VirtualPath> {
        let entry = path.entry_name();
        let idx = entry.rfind('/')?;
        Some(path.child(&entry[..idx]))
    }

    /// Absoluteness follows the container path on the host file system
    pub fn is_absolute(&self, path: &VirtualPath) -> bool {
        path.container_path().is_absolute()
    }

    pub fn unwrap(&self, path: &VirtualPath) -> PathBuf {
        PathBuf::from(path.without_scheme())
    }

    /// Archives have no links, so every path is already canonical
    pub fn to_real_path(&self, path: &VirtualPath) -> VirtualPath {
        path.clone()
    }

    pub fn can_write(&self, _path: &VirtualPath) -> bool {
        false
    }

    pub fn set_read_only(&self, _path: &VirtualPath) -> bool {
        true
    }

    /// Direct children of a directory, one level deep
    ///
    /// Entries nested further down contribute their first path component,
    /// so directories without an explicit entry are still listed. Children
    /// are reported without a trailing `/`, each once.
    pub fn new_directory_stream(&self, path: &VirtualPath) -> Result<Vec<VirtualPath>> {
        let dir = path.entry_name();
        let dir_prefix = if dir.is_empty() || dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{}/", dir)
        };

        debug!("Listing {}", path);
        let mut stream = self.open_container(path)?;
        let mut seen = HashSet::new();
        let mut children = Vec::new();
        while let Some(entry) = stream.next_entry()? {
            let rest = match entry.name.strip_prefix(dir_prefix.as_str()) {
                Some(rest) if !rest.is_empty() => rest,
                _ => continue,
            };
            let child = match rest.find('/') {
                Some(idx) => &rest[..idx],
                None => rest,
            };
            if child.is_empty() {
                continue;
            }
            let name = format!("{}{}", dir_prefix, child);
            if seen.insert(name.clone()) {
                children.push(path.child(&name));
            }
        }
        Ok(children)
    }

    /// Directories inside an archive already exist or cannot be made; either way nothing to do
    pub fn create_directory(&self, _path: &VirtualPath) -> Result<()> {
        Ok(())
    }

    pub fn create_file(&self, _path: &VirtualPath) -> Result<bool> {
        Err(Zip2Error::Unsupported("write"))
    }

    pub fn delete(&self, _path: &VirtualPath) -> Result<()> {
        Err(Zip2Error::Unsupported("write"))
    }

    pub fn move_to(&self, _path: &VirtualPath, _target: &str) -> Result<()> {
        Err(Zip2Error::Unsupported("write"))
    }

    pub fn new_output_stream(&self, _path: &VirtualPath, _append: bool) -> Result<Box<dyn Write + Send>> {
        Err(Zip2Error::Unsupported("write"))
    }

    /// Create a temporary file on disk; only legal in the system temp directory
    pub fn create_temp_file(
        &self,
        path: &VirtualPath,
        suffix: &str,
        delete_on_exit: bool,
        in_temp_dir: bool,
    ) -> Result<TempFile> {
        if !in_temp_dir {
            return Err(Zip2Error::ReadOnlyFileSystem);
        }

        let stem = path
            .entry_name()
            .rsplit('/')
            .find(|part| !part.is_empty())
            .map(str::to_string)
            .or_else(|| {
                path.container_path()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| SCHEME.to_string());

        let file = tempfile::Builder::new()
            .prefix(&format!("{}.", stem))
            .suffix(suffix)
            .tempfile()?;
        let temp_path = file.into_temp_path();
        debug!("Created temp file {:?} for {}", temp_path, path);

        if delete_on_exit {
            Ok(TempFile::DeleteOnDrop(temp_path))
        } else {
            Ok(TempFile::Persistent(temp_path.keep().map_err(std::io::Error::from)?))
        }
    }

    /// Open an entry for random-access reads
    ///
    /// The returned file starts on the stream this scan found; its length
    /// comes from a separate [`Zip2FileSystem::size`] scan.
    pub fn open(&self, path: &VirtualPath, mode: OpenMode) -> Result<ArchiveFile> {
        if path.is_root() {
            return Err(Zip2Error::NotFound(path.to_string()));
        }
        let stream = self.open_entry(path)?;
        let length = self.size(path);
        info!("Opened {} (mode {}, {} bytes)", path, mode, length);
        Ok(ArchiveFile::new(
            self.clone(),
            path.clone(),
            stream,
            length,
            self.config.skip_buffer_size,
        ))
    }

    pub fn new_input_stream(&self, path: &VirtualPath) -> Result<ArchiveFile> {
        self.open(path, OpenMode::Read)
    }

    fn open_container(&self, path: &VirtualPath) -> Result<ContainerStream> {
        let stream = ContainerStream::open_file(path.container_path(), self.config.io_buffer_size)?;
        Ok(stream.with_checksums(self.config.verify_checksums))
    }

    /// Scan for the exact entry name, leaving the stream at the start of its payload
    fn locate(&self, path: &VirtualPath) -> Result<Option<(ContainerStream, EntryRecord)>> {
        let name = path.entry_name();
        let mut stream = self.open_container(path)?;
        while let Some(entry) = stream.next_entry()? {
            if entry.name == name {
                return Ok(Some((stream, entry)));
            }
        }
        Ok(None)
    }

    fn scan_is_directory(&self, path: &VirtualPath) -> Result<bool> {
        let name = path.entry_name();
        let nested_prefix = format!("{}/", name.trim_end_matches('/'));
        let mut stream = self.open_container(path)?;
        while let Some(entry) = stream.next_entry()? {
            if entry.name == name {
                return Ok(entry.is_dir);
            }
            if entry.name.starts_with(&nested_prefix) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn scan_size(&self, path: &VirtualPath) -> Result<u64> {
        let (mut stream, entry) = match self.locate(path)? {
            Some(found) => found,
            None => return Ok(0),
        };
        if let Some(size) = entry.declared_size {
            return Ok(size);
        }

        debug!("Measuring {} by skipping its payload", path);
        let mut total = 0u64;
        loop {
            let skipped = stream.skip(self.config.size_probe_chunk)?;
            if skipped == 0 {
                break;
            }
            total += skipped;
        }
        Ok(total)
    }
}

impl EntryOpener for Zip2FileSystem {
    type Stream = ContainerStream;

    fn open_entry(&self, path: &VirtualPath) -> Result<ContainerStream> {
        match self.locate(path)? {
            Some((stream, _)) => Ok(stream),
            None => Err(Zip2Error::NotFound(path.to_string())),
        }
    }
}

impl FileSystemProvider for Zip2FileSystem {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn exists(&self, path: &str) -> bool {
        Zip2FileSystem::exists(self, &VirtualPath::parse(path))
    }

    fn is_directory(&self, path: &str) -> bool {
        Zip2FileSystem::is_directory(self, &VirtualPath::parse(path))
    }

    fn size(&self, path: &str) -> u64 {
        Zip2FileSystem::size(self, &VirtualPath::parse(path))
    }

    fn last_modified(&self, path: &str) -> u64 {
        Zip2FileSystem::last_modified(self, &VirtualPath::parse(path))
    }

    fn parent(&self, path: &str) -> Option<String> {
        Zip2FileSystem::parent(self, &VirtualPath::parse(path)).map(|p| p.to_string())
    }

    fn is_absolute(&self, path: &str) -> bool {
        Zip2FileSystem::is_absolute(self, &VirtualPath::parse(path))
    }

    fn unwrap(&self, path: &str) -> PathBuf {
        Zip2FileSystem::unwrap(self, &VirtualPath::parse(path))
    }

    fn to_real_path(&self, path: &str) -> String {
        Zip2FileSystem::to_real_path(self, &VirtualPath::parse(path)).to_string()
    }

    fn can_write(&self, path: &str) -> bool {
        Zip2FileSystem::can_write(self, &VirtualPath::parse(path))
    }

    fn set_read_only(&self, path: &str) -> bool {
        Zip2FileSystem::set_read_only(self, &VirtualPath::parse(path))
    }

    fn new_directory_stream(&self, path: &str) -> Result<Vec<String>> {
        let children = Zip2FileSystem::new_directory_stream(self, &VirtualPath::parse(path))?;
        Ok(children.into_iter().map(|p| p.to_string()).collect())
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        Zip2FileSystem::create_directory(self, &VirtualPath::parse(path))
    }

    fn create_file(&self, path: &str) -> Result<bool> {
        Zip2FileSystem::create_file(self, &VirtualPath::parse(path))
    }

    fn create_temp_file(
        &self,
        path: &str,
        suffix: &str,
        delete_on_exit: bool,
        in_temp_dir: bool,
    ) -> Result<TempFile> {
        Zip2FileSystem::create_temp_file(
            self,
            &VirtualPath::parse(path),
            suffix,
            delete_on_exit,
            in_temp_dir,
        )
    }

    fn delete(&self, path: &str) -> Result<()> {
        Zip2FileSystem::delete(self, &VirtualPath::parse(path))
    }

    fn move_to(&self, path: &str, target: &str) -> Result<()> {
        Zip2FileSystem::move_to(self, &VirtualPath::parse(path), target)
    }

    fn new_input_stream(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = Zip2FileSystem::new_input_stream(self, &VirtualPath::parse(path))?;
        Ok(Box::new(file))
    }

    fn new_output_stream(&self, path: &str, append: bool) -> Result<Box<dyn Write + Send>> {
        Zip2FileSystem::new_output_stream(self, &VirtualPath::parse(path), append)
    }

    fn open(&self, path: &str, mode: &str) -> Result<Box<dyn FileChannel>> {
        let mode = mode.parse::<OpenMode>()?;
        let file = Zip2FileSystem::open(self, &VirtualPath::parse(path), mode)?;
        Ok(Box::new(file))
    }
}

fn swallowed(op: &str, path: &VirtualPath, err: &Zip2Error) {
    if err.is_not_found() {
        debug!("{} {}: {}", op, path, err);
    } else {
        warn!("{} {} failed, reporting default: {}", op, path, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ZipBuilder;
    use tempfile::TempDir;

    /// Container with `a.txt` (known size) and `dir/b.txt` (size in a data descriptor)
    fn scenario() -> (TempDir, String) {
        let temp_dir = TempDir::new().unwrap();
        let container = temp_dir.path().join("c.zip");
        ZipBuilder::new()
            .stored("a.txt", b"ABCDEFGHIJ")
            .streamed("dir/b.txt", b"hello")
            .write_to(&container)
            .unwrap();
        let prefix = format!("zip2:{}!", container.display());
        (temp_dir, prefix)
    }

    fn vp(prefix: &str, entry: &str) -> VirtualPath {
        VirtualPath::parse(&format!("{}{}", prefix, entry))
    }

    #[test]
    fn test_exists() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        assert!(fs.exists(&vp(&c, "a.txt")));
        assert!(fs.exists(&vp(&c, "dir/b.txt")));
        assert!(fs.exists(&vp(&c, "")));
        assert!(!fs.exists(&vp(&c, "missing.txt")));
        // Implicit directories have no entry of their own
        assert!(!fs.exists(&vp(&c, "dir")));
    }

    #[test]
    fn test_is_directory() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        assert!(fs.is_directory(&vp(&c, "")));
        assert!(fs.is_directory(&vp(&c, "dir")));
        assert!(!fs.is_directory(&vp(&c, "a.txt")));
        assert!(!fs.is_directory(&vp(&c, "dir/b.txt")));
        assert!(!fs.is_directory(&vp(&c, "di")));
    }

    #[test]
    fn test_sizes_known_and_measured() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        assert_eq!(fs.size(&vp(&c, "a.txt")), 10);
        assert_eq!(fs.size(&vp(&c, "dir/b.txt")), 5);
        assert_eq!(fs.size(&vp(&c, "dir/b.txt")), 5);
        assert_eq!(fs.size(&vp(&c, "missing")), 0);
    }

    #[test]
    fn test_small_probe_chunk_measures_same_size() {
        let (_dir, c) = scenario();
        let config = FsConfig::default().with_size_probe_chunk(2);
        let fs = Zip2FileSystem::with_config(config).unwrap();
        assert_eq!(fs.size(&vp(&c, "dir/b.txt")), 5);
    }

    #[test]
    fn test_list_root() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        let children: Vec<String> = fs
            .new_directory_stream(&vp(&c, ""))
            .unwrap()
            .iter()
            .map(|p| p.entry_name().to_string())
            .collect();
        assert_eq!(children, vec!["a.txt", "dir"]);
    }

    #[test]
    fn test_parent() {
        let fs = Zip2FileSystem::new();
        let path = VirtualPath::parse("zip2:c.zip!dir/sub/b.txt");
        let parent = fs.parent(&path).unwrap();
        assert_eq!(parent.as_str(), "zip2:c.zip!dir/sub");
        assert_eq!(fs.parent(&parent).unwrap().as_str(), "zip2:c.zip!dir");
        assert!(fs.parent(&VirtualPath::parse("zip2:c.zip!a.txt")).is_none());
    }

    #[test]
    fn test_path_level_answers() {
        let fs = Zip2FileSystem::new();
        let abs = VirtualPath::parse("zip2:/data/c.zip!a.txt");
        let rel = VirtualPath::parse("zip2:data/c.zip!a.txt");
        assert!(fs.is_absolute(&abs));
        assert!(!fs.is_absolute(&rel));
        assert_eq!(fs.unwrap(&abs), PathBuf::from("/data/c.zip!a.txt"));
        assert_eq!(fs.to_real_path(&abs), abs);
        assert_eq!(fs.last_modified(&abs), 0);
        assert!(!fs.can_write(&abs));
        assert!(fs.set_read_only(&abs));
        assert_eq!(fs.scheme(), "zip2");
    }

    #[test]
    fn test_missing_container() {
        let fs = Zip2FileSystem::new();
        let path = VirtualPath::parse("zip2:/nonexistent/dir/c.zip!a.txt");
        assert!(!fs.exists(&path));
        assert!(!fs.is_directory(&path));
        assert_eq!(fs.size(&path), 0);
        assert!(fs.new_directory_stream(&path).is_err());
        assert!(fs.open(&path, OpenMode::Read).is_err());
    }

    #[test]
    fn test_open_root_not_found() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        let err = fs.open(&vp(&c, ""), OpenMode::Read).unwrap_err();
        assert!(err.is_not_found());
        let err = fs.open(&vp(&c, "nope"), OpenMode::Read).unwrap_err();
        assert!(matches!(err, Zip2Error::NotFound(_)));
    }

    #[test]
    fn test_open_reads_payload() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        let mut file = fs.open(&vp(&c, "a.txt"), OpenMode::ReadWrite).unwrap();
        assert_eq!(file.size(), 10);
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "ABCDEFGHIJ");
        file.close();
    }

    #[test]
    fn test_mutations_rejected() {
        let (_dir, c) = scenario();
        let fs = Zip2FileSystem::new();
        let path = vp(&c, "a.txt");
        assert!(fs.create_directory(&vp(&c, "new-dir")).is_ok());
        assert!(fs.create_file(&path).unwrap_err().is_unsupported());
        assert!(fs.delete(&path).unwrap_err().is_unsupported());
        assert!(fs.move_to(&path, "zip2:other.zip!a.txt").unwrap_err().is_unsupported());
        assert!(fs.new_output_stream(&path, true).err().unwrap().is_unsupported());
        // Container untouched
        assert_eq!(fs.size(&path), 10);
    }

    #[test]
    fn test_temp_files() {
        let fs = Zip2FileSystem::new();
        let path = VirtualPath::parse("zip2:/data/c.zip!db/main.sqlite");

        let err = fs.create_temp_file(&path, ".tmp", true, false).unwrap_err();
        assert!(matches!(err, Zip2Error::ReadOnlyFileSystem));

        let temp = fs.create_temp_file(&path, ".tmp", true, true).unwrap();
        let temp_path = temp.path().to_path_buf();
        assert!(temp_path.exists());
        assert!(temp_path.starts_with(std::env::temp_dir()));
        let file_name = temp_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("main.sqlite."));
        assert!(file_name.ends_with(".tmp"));
        drop(temp);
        assert!(!temp_path.exists());

        let kept = fs.create_temp_file(&path, ".tmp", false, true).unwrap();
        assert!(matches!(kept, TempFile::Persistent(_)));
        assert!(kept.path().exists());
        std::fs::remove_file(kept.path()).unwrap();
    }

    #[test]
    fn test_open_mode_parsing() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("rws".parse::<OpenMode>().unwrap(), OpenMode::ReadWriteSync);
        assert!(matches!(
            "w".parse::<OpenMode>(),
            Err(Zip2Error::InvalidMode(_))
        ));
        assert_eq!(OpenMode::ReadWriteData.to_string(), "rwd");
    }

    #[test]
    fn test_provider_trait_surface() {
        let (_dir, c) = scenario();
        let provider: Box<dyn FileSystemProvider> = Box::new(Zip2FileSystem::new());
        let a = format!("{}a.txt", c);

        assert!(provider.exists(&a));
        assert_eq!(provider.size(&a), 10);
        assert_eq!(
            provider.new_directory_stream(&c).unwrap(),
            vec![format!("{}a.txt", c), format!("{}dir", c)]
        );

        let mut channel = provider.open(&a, "r").unwrap();
        channel.set_position(8);
        let mut buf = [0u8; 4];
        assert_eq!(channel.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"IJ");
        channel.close().unwrap();

        let mut input = provider.new_input_stream(&a).unwrap();
        let mut all = Vec::new();
        input.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"ABCDEFGHIJ");

        assert!(provider.open(&a, "x").is_err());
    }
}
