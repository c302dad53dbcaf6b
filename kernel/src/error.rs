//! Error type returned by file system operations.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("file exists")]
    Exists,
    #[error("no space left on device")]
    NoSpace,
    #[error("device or resource busy")]
    Busy,
    #[error("not a directory")]
    NotDirectory,
    #[error("is a directory")]
    IsDirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("block device required")]
    NotBlockDevice,
    #[error("cross-device link")]
    CrossDevice,
    #[error("input/output error")]
    Io,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("bad magic number in super block")]
    BadMagic,
    #[error("no such device")]
    NoDevice,
    #[error("broken pipe")]
    BrokenPipe,
    #[error("too many links")]
    TooManyLinks,
    #[error("bad configuration: {0}")]
    BadConfig(&'static str),
}

impl FsError {
    /// The classic errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotPermitted => 1,
            FsError::NotFound => 2,
            FsError::Io => 5,
            FsError::NoDevice => 6,
            FsError::PermissionDenied => 13,
            FsError::NotBlockDevice => 15,
            FsError::Busy => 16,
            FsError::Exists => 17,
            FsError::CrossDevice => 18,
            FsError::NotDirectory => 20,
            FsError::IsDirectory => 21,
            FsError::InvalidArgument | FsError::BadMagic | FsError::BadConfig(_) => 22,
            FsError::NoSpace => 28,
            FsError::TooManyLinks => 31,
            FsError::BrokenPipe => 32,
            FsError::NotEmpty => 39,
        }
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
