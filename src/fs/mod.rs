//! our virtual disk filesystem
pub mod block_bitmap;
pub mod block_device;
pub mod error;
pub mod filekind;
pub mod fs_layout;
pub mod inode;
pub mod path;
pub mod superblock;
pub mod walk;
mod check;
mod directory;
mod file_io;
mod fs_api_impl;
pub use block_bitmap::*;
pub use block_device::*;
pub use directory::*;
pub use error::*;
pub use file_io::*;
pub use filekind::*;
pub use fs_api_impl::*;
pub use fs_layout::*;
pub use inode::*;
pub use path::*;
pub use superblock::*;
pub use walk::*;

/// "GRSF"
const FS_MAGIC: u32 = 0x4752_5346;
pub const ROOT_INODE: u32 = 0;

pub const BLOCK_SIZE: u32 = 1024;
pub const TOTAL_BLOCKS: u32 = 8192;
pub const MAX_INODES: u32 = 1024;
/// bytes reserved for a name, the last one is always NUL
pub const MAX_FILENAME: usize = 60;
pub const DIRECT_POINTERS: usize = 20;

/// the name field starts at this offset inside every inode record
pub const INODE_NAME_OFFSET: usize = 128;
pub const INODE_SIZE: usize = INODE_NAME_OFFSET + MAX_FILENAME;
pub const DIR_ENTRY_SIZE: usize = MAX_FILENAME + std::mem::size_of::<u32>();
