use bitvec::prelude::*;

use super::{FsError, Result};

/// one bit per device block, `1` means allocated
#[derive(Debug, Clone, PartialEq)]
pub struct BlockBitmap {
    bits: BitVec<u8, Lsb0>,
    /// blocks before this index hold metadata and are never handed out
    data_block_start: u32,
}

impl BlockBitmap {
    /// bitmap of a freshly formatted volume, only metadata blocks are set
    pub fn new(total_blocks: u32, data_block_start: u32) -> Self {
        let mut bits = bitvec![u8, Lsb0; 0; total_blocks as usize];
        bits[..data_block_start as usize].fill(true);
        Self {
            bits,
            data_block_start,
        }
    }
}

/// for serialize and deserialize
impl BlockBitmap {
    /// raw bytes zero padded to whole blocks
    pub fn to_bytes(&self, block_size: u32) -> Vec<u8> {
        let raw = self.bits.as_raw_slice();
        let mut bytes = vec![0u8; raw.len().div_ceil(block_size as usize) * block_size as usize];
        bytes[..raw.len()].copy_from_slice(raw);
        bytes
    }

    pub fn from_bytes(bytes: &[u8], total_blocks: u32, data_block_start: u32) -> Result<Self> {
        let needed = (total_blocks as usize).div_ceil(8);
        if bytes.len() < needed {
            return Err(FsError::Corrupted(format!(
                "bitmap needs {needed} bytes, got {}",
                bytes.len()
            )));
        }
        let mut bits = BitVec::<u8, Lsb0>::from_slice(&bytes[..needed]);
        bits.truncate(total_blocks as usize);
        if bits[..data_block_start as usize].not_all() {
            return Err(FsError::Corrupted(
                "metadata blocks are not marked allocated".into(),
            ));
        }
        Ok(Self {
            bits,
            data_block_start,
        })
    }
}

/// for data block allocation
impl BlockBitmap {
    pub fn len(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// check if block is allocated, out of range blocks are not
    pub fn is_allocated(&self, index: u32) -> bool {
        self.bits.get(index as usize).as_deref() == Some(&true)
    }

    /// first-fit scan starting at the first data block
    pub fn first_free(&self) -> Option<u32> {
        self.bits[self.data_block_start as usize..]
            .first_zero()
            .map(|p| p as u32 + self.data_block_start)
    }

    /// mark a data block as allocated
    pub fn occupy(&mut self, index: u32) -> Result<()> {
        self.check_data_block(index)?;
        self.bits.set(index as usize, true);
        Ok(())
    }

    /// mark a data block as free, metadata blocks are refused
    pub fn release(&mut self, index: u32) -> Result<()> {
        self.check_data_block(index)?;
        self.bits.set(index as usize, false);
        Ok(())
    }

    pub fn allocated_count(&self) -> u32 {
        self.bits.count_ones() as u32
    }

    pub fn free_count(&self) -> u32 {
        self.bits.count_zeros() as u32
    }

    fn check_data_block(&self, index: u32) -> Result<()> {
        if index < self.data_block_start || index >= self.len() {
            return Err(FsError::OutOfRange {
                what: "data block",
                index: index as u64,
                limit: self.len() as u64,
            });
        }
        Ok(())
    }
}
