use serde::{Deserialize, Serialize};

/// an enum to describe the type of a file
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    #[default]
    RegularFile,
    /// a directory
    Directory,
}

impl FileKind {
    pub fn is_dir(self) -> bool {
        self == FileKind::Directory
    }

    /// suffix appended to a name when listing, like `ls -F`
    pub fn suffix(self) -> &'static str {
        match self {
            FileKind::RegularFile => "",
            FileKind::Directory => "/",
        }
    }
}
