//! what does our filesystem look like in the memory

use log::{debug, info, warn};

use super::{
    BlockBitmap, BlockDevice, FileKind, FsError, Geometry, Inode, InodeTable, Result, SuperBlock,
    ROOT_INODE,
};

/// a mounted volume
///
/// it has the following on-disk layout:
/// - superblock
/// - inode table
/// - block bitmap
/// - data blocks
///
/// The superblock, inode table and bitmap are cached here and written back
/// by [sync](VirtFs::sync). Every mutating operation takes `&mut self`, so a
/// session serves one logical operation at a time; a host that answers
/// concurrent requests has to wrap it in a `Mutex` held for the whole
/// operation.
#[derive(Debug)]
pub struct VirtFs<D: BlockDevice> {
    device: D,
    superblock: SuperBlock,
    inodes: InodeTable,
    bitmap: BlockBitmap,
}

impl<D: BlockDevice> VirtFs<D> {
    /// write an empty filesystem onto `device`
    ///
    /// the superblock is written last, so an interrupted format never
    /// leaves a valid magic number behind
    pub fn format(mut device: D, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        if device.block_size() != geometry.block_size {
            return Err(FsError::InvalidArgument(format!(
                "device block size {} doesn't match requested {}",
                device.block_size(),
                geometry.block_size
            )));
        }
        if device.num_blocks() < geometry.total_blocks {
            return Err(FsError::InvalidArgument(format!(
                "device holds {} blocks, {} requested",
                device.num_blocks(),
                geometry.total_blocks
            )));
        }

        // invalidate any previous superblock first
        device.write_block(0, &vec![0u8; geometry.block_size as usize])?;

        let superblock = SuperBlock::new(&geometry);
        let inodes = InodeTable::new(geometry.total_inodes);
        let bitmap = BlockBitmap::new(geometry.total_blocks, superblock.data_block_start);
        let mut fs = VirtFs {
            device,
            superblock,
            inodes,
            bitmap,
        };
        fs.write_inode_table()?;
        fs.write_bitmap()?;
        fs.write_superblock()?;
        fs.device.flush()?;

        info!(
            "formatted {} blocks of {} bytes, {} inodes, data starts at block {}",
            fs.superblock.total_blocks,
            fs.superblock.block_size,
            fs.superblock.total_inodes,
            fs.superblock.data_block_start
        );
        Ok(fs)
    }

    /// mount an existing filesystem
    pub fn load(device: D) -> Result<Self> {
        let mut block = vec![0u8; device.block_size() as usize];
        device.read_block(0, &mut block)?;
        let superblock = SuperBlock::decode_block(&block)?;
        if superblock.block_size != device.block_size()
            || superblock.total_blocks > device.num_blocks()
        {
            return Err(FsError::InvalidArgument(format!(
                "image geometry {:?} doesn't fit a device of {} blocks of {} bytes",
                superblock.geometry(),
                device.num_blocks(),
                device.block_size()
            )));
        }

        let table_bytes = read_region(
            &device,
            superblock.inode_table_block,
            superblock.inode_table_blocks(),
        )?;
        let inodes = InodeTable::from_bytes(&table_bytes, superblock.total_inodes)?;
        let bitmap_bytes = read_region(
            &device,
            superblock.block_bitmap_block,
            superblock.bitmap_blocks(),
        )?;
        let bitmap = BlockBitmap::from_bytes(
            &bitmap_bytes,
            superblock.total_blocks,
            superblock.data_block_start,
        )?;

        let mut fs = VirtFs {
            device,
            superblock,
            inodes,
            bitmap,
        };
        fs.verify_root()?;
        fs.repair_counters();
        info!(
            "loaded filesystem: {} of {} blocks free, {} of {} inodes free",
            fs.superblock.free_blocks,
            fs.superblock.total_blocks,
            fs.superblock.free_inodes,
            fs.superblock.total_inodes
        );
        Ok(fs)
    }

    /// write superblock, inode table and bitmap back, then flush
    ///
    /// not atomic, an I/O error leaves the regions written so far on disk
    pub fn sync(&mut self) -> Result<()> {
        self.write_superblock()?;
        self.write_inode_table()?;
        self.write_bitmap()?;
        self.device.flush()
    }

    fn verify_root(&self) -> Result<()> {
        let root = self.inodes.get(ROOT_INODE)?;
        if !root.used || !root.is_dir() || root.parent != ROOT_INODE {
            return Err(FsError::Corrupted(format!(
                "root inode is not a used directory owning itself: {root:?}"
            )));
        }
        Ok(())
    }

    /// the bitmap and the inode table are the source of truth for the counters
    fn repair_counters(&mut self) {
        let free_blocks = self.bitmap.free_count();
        if free_blocks != self.superblock.free_blocks {
            warn!(
                "superblock claims {} free blocks, bitmap has {free_blocks}, repairing",
                self.superblock.free_blocks
            );
            self.superblock.free_blocks = free_blocks;
        }
        let free_inodes = self.inodes.free_count();
        if free_inodes != self.superblock.free_inodes {
            warn!(
                "superblock claims {} free inodes, inode table has {free_inodes}, repairing",
                self.superblock.free_inodes
            );
            self.superblock.free_inodes = free_inodes;
        }
    }

    fn write_superblock(&mut self) -> Result<()> {
        let block = self.superblock.encode_block()?;
        self.device.write_block(0, &block)
    }

    fn write_inode_table(&mut self) -> Result<()> {
        let bytes = self.inodes.to_bytes(self.superblock.block_size)?;
        write_region(&mut self.device, self.superblock.inode_table_block, &bytes)
    }

    fn write_bitmap(&mut self) -> Result<()> {
        let bytes = self.bitmap.to_bytes(self.superblock.block_size);
        write_region(&mut self.device, self.superblock.block_bitmap_block, &bytes)
    }
}

/// get [SuperBlock], [InodeTable], [BlockBitmap] and the device of this filesystem
impl<D: BlockDevice> VirtFs<D> {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    #[inline]
    pub(crate) fn inodes_mut(&mut self) -> &mut InodeTable {
        &mut self.inodes
    }

    #[inline]
    pub fn bitmap(&self) -> &BlockBitmap {
        &self.bitmap
    }

    #[inline]
    pub fn inode(&self, id: u32) -> Result<&Inode> {
        self.inodes.get(id)
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// unmount, handing the device back
    pub fn into_device(self) -> D {
        self.device
    }
}

/// data block allocation
impl<D: BlockDevice> VirtFs<D> {
    /// claim the first free data block, `None` when the volume is full
    pub fn allocate_block(&mut self) -> Result<Option<u32>> {
        let Some(index) = self.bitmap.first_free() else {
            return Ok(None);
        };
        self.bitmap.occupy(index)?;
        self.superblock.free_blocks = self.superblock.free_blocks.saturating_sub(1);
        debug!("allocated block {index}");
        self.sync()?;
        Ok(Some(index))
    }

    /// give a data block back, the caller syncs
    pub fn release_block(&mut self, index: u32) -> Result<()> {
        let was_allocated = self.bitmap.is_allocated(index);
        self.bitmap.release(index)?;
        if was_allocated {
            self.superblock.free_blocks += 1;
            debug!("released block {index}");
        } else {
            warn!("block {index} released twice");
        }
        Ok(())
    }

    /// read a block a direct pointer refers to
    pub(crate) fn read_data_block(&self, index: u32, buf: &mut [u8]) -> Result<()> {
        self.check_data_pointer(index)?;
        self.device.read_block(index, buf)
    }

    pub(crate) fn write_data_block(&mut self, index: u32, buf: &[u8]) -> Result<()> {
        self.check_data_pointer(index)?;
        self.device.write_block(index, buf)
    }

    /// a direct pointer must never reach into metadata
    fn check_data_pointer(&self, index: u32) -> Result<()> {
        if index < self.superblock.data_block_start || index >= self.superblock.total_blocks {
            return Err(FsError::Corrupted(format!(
                "direct pointer {index} is outside the data region"
            )));
        }
        Ok(())
    }
}

/// [Inode] allocation
impl<D: BlockDevice> VirtFs<D> {
    /// claim the first unused inode as an empty regular file
    pub fn allocate_inode(&mut self) -> Result<Option<u32>> {
        let Some(id) = self.inodes.first_free() else {
            return Ok(None);
        };
        let inode = self.inodes.get_mut(id)?;
        *inode = Inode {
            used: true,
            kind: FileKind::RegularFile,
            ..Inode::empty(id)
        };
        self.superblock.free_inodes = self.superblock.free_inodes.saturating_sub(1);
        debug!("allocated inode {id}");
        self.sync()?;
        Ok(Some(id))
    }

    /// release an inode and every block it holds
    ///
    /// freeing an unused inode is a no-op
    pub fn free_inode(&mut self, id: u32) -> Result<()> {
        let limit = self.inodes.len();
        if id == ROOT_INODE || id >= limit {
            return Err(FsError::OutOfRange {
                what: "inode",
                index: id as u64,
                limit: limit as u64,
            });
        }
        let inode = self.inodes.get(id)?;
        if !inode.used {
            return Ok(());
        }
        let blocks = inode.direct_blocks();
        // a bad pointer keeps the inode, so none of its blocks lose their owner
        if let Some(e) = blocks.iter().find_map(|&b| self.check_data_pointer(b).err()) {
            warn!("inode {id} not freed, it still holds blocks {blocks:?}: {e}");
            return Err(e);
        }
        for block in blocks {
            self.release_block(block)?;
        }
        self.inodes.get_mut(id)?.clear();
        self.superblock.free_inodes += 1;
        debug!("freed inode {id}");
        self.sync()
    }
}

fn read_region<D: BlockDevice>(device: &D, start: u32, count: u32) -> Result<Vec<u8>> {
    let block_size = device.block_size() as usize;
    let mut bytes = vec![0u8; count as usize * block_size];
    for (i, chunk) in bytes.chunks_exact_mut(block_size).enumerate() {
        device.read_block(start + i as u32, chunk)?;
    }
    Ok(bytes)
}

fn write_region<D: BlockDevice>(device: &mut D, start: u32, bytes: &[u8]) -> Result<()> {
    let block_size = device.block_size() as usize;
    for (i, chunk) in bytes.chunks_exact(block_size).enumerate() {
        device.write_block(start + i as u32, chunk)?;
    }
    Ok(())
}
