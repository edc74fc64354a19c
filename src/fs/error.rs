use thiserror::Error;

/// which fixed-capacity resource ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// no clear bit left in the block bitmap
    Blocks,
    /// every inode slot is in use
    Inodes,
    /// content needs more blocks than an inode has direct pointers
    DirectPointers,
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capacity::Blocks => write!(f, "no free data blocks"),
            Capacity::Inodes => write!(f, "inode table is full"),
            Capacity::DirectPointers => write!(f, "content exceeds the direct pointers"),
        }
    }
}

/// Filesystem error type
#[derive(Error, Debug)]
pub enum FsError {
    #[error("{what} {index} out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: u64,
        limit: u64,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid magic number {0:#x}, not a vdiskfs image")]
    InvalidMagic(u32),
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("file exists: {0}")]
    AlreadyExists(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(Capacity),
    #[error("file name too long: {0}")]
    NameTooLong(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("filesystem is corrupt: {0}")]
    Corrupted(String),
    #[error("metadata encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("metadata decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub type Result<T> = std::result::Result<T, FsError>;
