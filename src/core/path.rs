//! Composite `zip2:` path parsing
//!
//! A virtual path addresses an entry inside a zip container on the real
//! file system:
//!
//! ```text
//! zip2:~/data/app.zip!db/main.sqlite
//! ^^^^ ^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^
//! tag  container       entry
//! ```
//!
//! Paths are parsed fresh for every operation and never mutated.

use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Scheme tag handled by this file system
pub const SCHEME: &str = "zip2";

/// Separator between the container path and the entry path
pub const ENTRY_SEPARATOR: char = '!';

/// Parsed `zip2:container!entry` path
///
/// # Examples
///
/// ```
/// use zip2_fs::VirtualPath;
///
/// let path = VirtualPath::parse("zip2:/data/app.zip!\\db\\main.sqlite");
/// assert_eq!(path.container_path().to_str(), Some("/data/app.zip"));
/// assert_eq!(path.entry_name(), "db/main.sqlite");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    raw: String,
    container_path: PathBuf,
    entry_name: String,
}

impl VirtualPath {
    pub fn parse(raw: &str) -> Self {
        VirtualPath {
            raw: raw.to_string(),
            container_path: PathBuf::from(expand_user_home(container_part(raw))),
            entry_name: normalize_entry_name(raw),
        }
    }

    /// The full path string this value was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Location of the container on the real file system
    pub fn container_path(&self) -> &std::path::Path {
        &self.container_path
    }

    /// Normalized entry name; empty for the archive root
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn is_root(&self) -> bool {
        self.entry_name.is_empty()
    }

    /// `zip2:<container>!`, the prefix every entry of this container shares
    pub fn archive_prefix(&self) -> String {
        format!("{}:{}{}", SCHEME, container_part(&self.raw), ENTRY_SEPARATOR)
    }

    /// Path of another entry inside the same container
    pub fn child(&self, entry_name: &str) -> VirtualPath {
        VirtualPath::parse(&format!("{}{}", self.archive_prefix(), entry_name))
    }

    /// The raw path with the scheme tag removed
    pub fn without_scheme(&self) -> &str {
        strip_scheme(&self.raw)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VirtualPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(VirtualPath::parse(s))
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        VirtualPath::parse(raw)
    }
}

fn strip_scheme(raw: &str) -> &str {
    raw.strip_prefix(SCHEME)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(raw)
}

fn container_part(raw: &str) -> &str {
    let path = strip_scheme(raw);
    match path.find(ENTRY_SEPARATOR) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

fn normalize_entry_name(raw: &str) -> String {
    let entry = match raw.find(ENTRY_SEPARATOR) {
        Some(idx) if idx > 0 => &raw[idx + 1..],
        _ => "",
    };
    let entry = entry.replace('\\', "/");
    entry.trim_start_matches('/').to_string()
}

/// Expand a leading `~` to the user's home directory
pub fn expand_user_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return path.to_string(),
    };
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}
