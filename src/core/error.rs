use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Zip2Error {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("File is read-only: {0}")]
    ReadOnly(String),

    #[error("File system is read-only")]
    ReadOnlyFileSystem,

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Unsupported archive feature: {0}")]
    UnsupportedArchive(String),

    #[error("Checksum mismatch in entry {entry}: expected {expected:08x}, found {actual:08x}")]
    ChecksumMismatch {
        entry: String,
        expected: u32,
        actual: u32,
    },

    #[error("Invalid open mode: {0} (expected r, rw, rws or rwd)")]
    InvalidMode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No file system registered for path: {0}")]
    UnknownScheme(String),

    #[error("VFS registration failed: {0}")]
    VfsRegistrationFailed(i32),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Zip2Error {
    /// True for every failure caused by attempting to mutate the read-only file system.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Zip2Error::Unsupported(_) | Zip2Error::ReadOnly(_))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Zip2Error::NotFound(_) => true,
            Zip2Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<Zip2Error> for io::Error {
    fn from(err: Zip2Error) -> Self {
        let kind = match err {
            Zip2Error::Io(inner) => return inner,
            Zip2Error::NotFound(_) | Zip2Error::UnknownScheme(_) => io::ErrorKind::NotFound,
            Zip2Error::Unsupported(_)
            | Zip2Error::ReadOnly(_)
            | Zip2Error::ReadOnlyFileSystem
            | Zip2Error::UnsupportedArchive(_) => io::ErrorKind::Unsupported,
            Zip2Error::InvalidArchive(_) | Zip2Error::ChecksumMismatch { .. } => {
                io::ErrorKind::InvalidData
            }
            Zip2Error::InvalidMode(_) | Zip2Error::Config(_) => io::ErrorKind::InvalidInput,
            Zip2Error::VfsRegistrationFailed(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, Zip2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_errors_are_unsupported() {
        assert!(Zip2Error::Unsupported("write").is_unsupported());
        assert!(Zip2Error::ReadOnly("a.txt".into()).is_unsupported());
        assert!(!Zip2Error::NotFound("a.txt".into()).is_unsupported());
    }

    #[test]
    fn test_io_conversion_keeps_kind() {
        let err: io::Error = Zip2Error::NotFound("zip2:x.zip!a".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err: io::Error = Zip2Error::ReadOnly("a".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert_eq!(err.to_string(), "File is read-only: a");

        let original = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let err: io::Error = Zip2Error::Io(original).into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
