use std::fmt;

use byte_unit::Byte;
use serde::{Deserialize, Serialize};

use crate::utils::{
    digest,
    fs_size_calculator,
    traits::{DigestInSelf, SerializeAndDigest},
};

use super::{
    FsError, Result, BLOCK_SIZE, DIR_ENTRY_SIZE, FS_MAGIC, MAX_INODES, TOTAL_BLOCKS,
};

/// the tunable part of the layout, everything else is derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: u32,
    pub total_blocks: u32,
    pub total_inodes: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            total_blocks: TOTAL_BLOCKS,
            total_inodes: MAX_INODES,
        }
    }
}

impl Geometry {
    pub fn validate(&self) -> Result<()> {
        // directory entries never straddle a block boundary
        if self.block_size < 2 * DIR_ENTRY_SIZE as u32
            || self.block_size % DIR_ENTRY_SIZE as u32 != 0
        {
            return Err(FsError::InvalidArgument(format!(
                "block size {} must be a multiple of {DIR_ENTRY_SIZE} and at least {}",
                self.block_size,
                2 * DIR_ENTRY_SIZE
            )));
        }
        if self.total_inodes == 0 {
            return Err(FsError::InvalidArgument(
                "at least the root inode is needed".into(),
            ));
        }
        let data_start = self.data_block_start();
        if data_start as u64 >= self.total_blocks as u64 {
            return Err(FsError::InvalidArgument(format!(
                "{} blocks leave no room for data, metadata alone needs {data_start}",
                self.total_blocks
            )));
        }
        Ok(())
    }

    pub fn inode_table_blocks(&self) -> u32 {
        fs_size_calculator::inode_table_blocks(self.total_inodes, self.block_size)
    }

    pub fn bitmap_blocks(&self) -> u32 {
        fs_size_calculator::bitmap_blocks(self.total_blocks, self.block_size)
    }

    pub fn data_block_start(&self) -> u32 {
        fs_size_calculator::data_block_start(self.block_size, self.total_blocks, self.total_inodes)
    }

    pub fn image_size(&self) -> u64 {
        fs_size_calculator::image_size(self.block_size, self.total_blocks)
    }
}

/// The superblock of this filesystem, stored in block 0
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    /// first block of the inode table
    pub inode_table_block: u32,
    /// first block of the block bitmap
    pub block_bitmap_block: u32,
    /// first block usable for file content
    pub data_block_start: u32,
    /// to verify the integrity of this superblock
    pub digest: [u8; 32],
}

impl SuperBlock {
    /// superblock of a freshly formatted volume, only the root inode is in use
    pub fn new(geometry: &Geometry) -> Self {
        let inode_table_block = 1;
        let block_bitmap_block = inode_table_block + geometry.inode_table_blocks();
        let data_block_start = block_bitmap_block + geometry.bitmap_blocks();
        Self {
            magic: FS_MAGIC,
            block_size: geometry.block_size,
            total_blocks: geometry.total_blocks,
            free_blocks: geometry.total_blocks - data_block_start,
            total_inodes: geometry.total_inodes,
            free_inodes: geometry.total_inodes - 1,
            inode_table_block,
            block_bitmap_block,
            data_block_start,
            digest: [0u8; 32],
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.block_size,
            total_blocks: self.total_blocks,
            total_inodes: self.total_inodes,
        }
    }

    pub fn inode_table_blocks(&self) -> u32 {
        self.block_bitmap_block - self.inode_table_block
    }

    pub fn bitmap_blocks(&self) -> u32 {
        self.data_block_start - self.block_bitmap_block
    }

    /// serialize into exactly one zero-padded block
    pub fn encode_block(&mut self) -> Result<Vec<u8>> {
        let mut block = SerializeAndDigest::serialize(self)?;
        if block.len() > self.block_size as usize {
            return Err(FsError::InvalidArgument(format!(
                "superblock needs {} bytes, block size is {}",
                block.len(),
                self.block_size
            )));
        }
        block.resize(self.block_size as usize, 0);
        Ok(block)
    }

    /// block size recorded in the first bytes of block 0
    ///
    /// only the magic number is checked, this lets an image be mapped before
    /// the full superblock is decoded
    pub fn peek_block_size(header: &[u8]) -> Result<u32> {
        let field = |at: usize| {
            header
                .get(at..at + 4)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u32::from_le_bytes)
        };
        let magic = field(0).unwrap_or_default();
        if magic != FS_MAGIC {
            return Err(FsError::InvalidMagic(magic));
        }
        field(4).ok_or_else(|| {
            FsError::InvalidArgument(format!("header of {} bytes is too short", header.len()))
        })
    }

    /// parse block 0, the magic number is checked before anything else
    pub fn decode_block(block: &[u8]) -> Result<Self> {
        let magic = block
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_le_bytes)
            .unwrap_or_default();
        if magic != FS_MAGIC {
            return Err(FsError::InvalidMagic(magic));
        }
        let (superblock, _) = <Self as SerializeAndDigest>::deserialize(block)?;
        superblock.verify_layout()?;
        Ok(superblock)
    }

    /// geometry fields never change after format, so the stored offsets
    /// must match the ones derived from the stored geometry
    fn verify_layout(&self) -> Result<()> {
        let geometry = self.geometry();
        geometry
            .validate()
            .map_err(|e| FsError::Corrupted(format!("superblock geometry: {e}")))?;
        let expected = SuperBlock::new(&geometry);
        if self.inode_table_block != expected.inode_table_block
            || self.block_bitmap_block != expected.block_bitmap_block
            || self.data_block_start != expected.data_block_start
        {
            return Err(FsError::Corrupted(format!(
                "region offsets {}/{}/{} don't match geometry {geometry:?}",
                self.inode_table_block, self.block_bitmap_block, self.data_block_start
            )));
        }
        if self.free_blocks > self.total_blocks || self.free_inodes > self.total_inodes {
            return Err(FsError::Corrupted(
                "free counters exceed the totals".into(),
            ));
        }
        Ok(())
    }
}

impl DigestInSelf for SuperBlock {
    fn digest(&mut self) -> Result<()> {
        self.digest = [0u8; 32];
        self.digest = digest::digest(self)?;
        Ok(())
    }

    fn verify_digest(&mut self) -> Result<bool> {
        // get digest from itself
        let digest = self.digest;
        // clear the digest from struct
        self.digest = [0u8; 32];
        // calulate the digest
        let digest2 = digest::digest(self)?;
        self.digest = digest;
        Ok(digest == digest2)
    }
}

impl SerializeAndDigest for SuperBlock {}

/// filesystem information, like `statfs`
impl fmt::Display for SuperBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let image_size = fs_size_calculator::image_size(self.block_size, self.total_blocks);
        let free_size = self.free_blocks as u64 * self.block_size as u64;
        writeln!(f, "Filesystem Information:")?;
        writeln!(f, "  Total blocks: {}", self.total_blocks)?;
        writeln!(f, "  Block size: {} bytes", self.block_size)?;
        writeln!(
            f,
            "  Free blocks: {} ({})",
            self.free_blocks,
            Byte::from_bytes(free_size as _).get_appropriate_unit(true)
        )?;
        writeln!(f, "  Total inodes: {}", self.total_inodes)?;
        writeln!(f, "  Free inodes: {}", self.free_inodes)?;
        writeln!(f, "  Inode table starts at block: {}", self.inode_table_block)?;
        writeln!(f, "  Bitmap starts at block: {}", self.block_bitmap_block)?;
        writeln!(f, "  Data blocks start at: {}", self.data_block_start)?;
        write!(
            f,
            "  Disk size: {}",
            Byte::from_bytes(image_size as _).get_appropriate_unit(true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let superblock = SuperBlock::new(&Geometry::default());
        assert_eq!(superblock.magic, FS_MAGIC);
        assert_eq!(superblock.inode_table_block, 1);
        assert_eq!(superblock.block_bitmap_block, 189);
        assert_eq!(superblock.data_block_start, 190);
        assert_eq!(superblock.free_blocks, TOTAL_BLOCKS - 190);
        assert_eq!(superblock.free_inodes, MAX_INODES - 1);
        assert_eq!(superblock.inode_table_blocks(), 188);
        assert_eq!(superblock.bitmap_blocks(), 1);
    }

    #[test]
    fn test_superblock_block_round_trip() {
        let mut superblock = SuperBlock::new(&Geometry::default());
        let block = superblock.encode_block().unwrap();
        assert_eq!(block.len(), BLOCK_SIZE as usize);

        let decoded = SuperBlock::decode_block(&block).unwrap();
        assert_eq!(decoded, superblock);
    }

    #[test]
    fn test_foreign_block_is_rejected() {
        let zeros = vec![0u8; BLOCK_SIZE as usize];
        assert!(matches!(
            SuperBlock::decode_block(&zeros),
            Err(FsError::InvalidMagic(0))
        ));
    }

    #[test]
    fn test_peek_block_size() {
        let mut superblock = SuperBlock::new(&Geometry::default());
        let block = superblock.encode_block().unwrap();
        assert_eq!(SuperBlock::peek_block_size(&block[..8]).unwrap(), BLOCK_SIZE);

        assert!(matches!(
            SuperBlock::peek_block_size(&[0u8; 8]),
            Err(FsError::InvalidMagic(0))
        ));
        assert!(matches!(
            SuperBlock::peek_block_size(&block[..6]),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tampered_superblock_fails_digest() {
        let mut superblock = SuperBlock::new(&Geometry::default());
        let mut block = superblock.encode_block().unwrap();
        // free_blocks lives right after magic, block_size and total_blocks
        block[12] ^= 0x01;
        assert!(matches!(
            SuperBlock::decode_block(&block),
            Err(FsError::Corrupted(_))
        ));
    }

    #[test]
    fn test_geometry_validation() {
        assert!(Geometry::default().validate().is_ok());
        let odd_block = Geometry {
            block_size: 1000,
            ..Geometry::default()
        };
        assert!(matches!(
            odd_block.validate(),
            Err(FsError::InvalidArgument(_))
        ));
        let no_data = Geometry {
            block_size: 512,
            total_blocks: 4,
            total_inodes: 16,
        };
        assert!(matches!(
            no_data.validate(),
            Err(FsError::InvalidArgument(_))
        ));
        let no_inodes = Geometry {
            total_inodes: 0,
            ..Geometry::default()
        };
        assert!(no_inodes.validate().is_err());
    }
}
