//! This module contains functions to calculate the size of differennt fs components

use crate::fs::INODE_SIZE;

/// calculate needed bitmap size in bytes
/// # Arguments
/// - `element_count`: the number of tracked elements
/// # Return
/// the size of the bitmap
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::bitmap_size;
/// let bitmap_size = bitmap_size(100);
/// assert_eq!(bitmap_size, 13);
/// ```
pub const fn bitmap_size(element_count: u32) -> u64 {
    element_count.div_ceil(8) as u64
}

/// calculate how many blocks are needed to hold `bytes`
pub const fn blocks_for(bytes: u64, block_size: u32) -> u64 {
    bytes.div_ceil(block_size as u64)
}

/// calculate needed Inode Table size in bytes
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::inode_table_size;
/// use vdiskfs::INODE_SIZE;
/// assert_eq!(inode_table_size(1024), 1024 * INODE_SIZE as u64);
/// ```
pub const fn inode_table_size(inode_count: u32) -> u64 {
    inode_count as u64 * INODE_SIZE as u64
}

/// calculate how many blocks the Inode Table spans
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::inode_table_blocks;
/// // 1024 records of 188 bytes fill exactly 188 blocks of 1 KiB
/// assert_eq!(inode_table_blocks(1024, 1024), 188);
/// assert_eq!(inode_table_blocks(10, 512), 4);
/// ```
pub const fn inode_table_blocks(inode_count: u32, block_size: u32) -> u32 {
    blocks_for(inode_table_size(inode_count), block_size) as u32
}

/// calculate how many blocks the block bitmap spans
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::bitmap_blocks;
/// assert_eq!(bitmap_blocks(8192, 1024), 1);
/// assert_eq!(bitmap_blocks(8193, 1024), 2);
/// ```
pub const fn bitmap_blocks(total_blocks: u32, block_size: u32) -> u32 {
    blocks_for(bitmap_size(total_blocks), block_size) as u32
}

/// calculate the first block usable for file content,
/// everything before it is superblock, inode table and bitmap
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::data_block_start;
/// // superblock + 188 inode table blocks + 1 bitmap block
/// assert_eq!(data_block_start(1024, 8192, 1024), 190);
/// ```
pub const fn data_block_start(block_size: u32, total_blocks: u32, inode_count: u32) -> u32 {
    1 + inode_table_blocks(inode_count, block_size) + bitmap_blocks(total_blocks, block_size)
}

/// calculate the size of a whole image
pub const fn image_size(block_size: u32, total_blocks: u32) -> u64 {
    block_size as u64 * total_blocks as u64
}
