use log::{debug, warn};

use super::{BlockDevice, Capacity, FsError, Inode, Result, VirtFs, DIRECT_POINTERS};

/// what a read produced
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadOutcome {
    pub data: Vec<u8>,
    /// the content ended early on a missing pointer or a failed block read
    pub truncated: bool,
}

/// file content is mapped onto the direct pointers of an inode
impl<D: BlockDevice> VirtFs<D> {
    /// replace the content of a regular file
    ///
    /// capacity is checked before anything is released, so a failing write
    /// leaves the old content in place
    pub fn write_inode_data(&mut self, id: u32, data: &[u8]) -> Result<usize> {
        let block_size = self.superblock().block_size;
        let inode = self.inodes().get_used(id)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory(inode.name.to_string()));
        }
        let needed = Inode::blocks_needed(data.len(), block_size);
        if needed > DIRECT_POINTERS {
            return Err(FsError::CapacityExceeded(Capacity::DirectPointers));
        }
        let held = inode.direct_blocks().len();
        if needed > self.superblock().free_blocks as usize + held {
            return Err(FsError::CapacityExceeded(Capacity::Blocks));
        }

        let released = self.inodes_mut().get_mut(id)?.truncate();
        for block in released {
            self.release_block(block)?;
        }
        let mut buf = vec![0u8; block_size as usize];
        for (i, chunk) in data.chunks(block_size as usize).enumerate() {
            let block = self
                .allocate_block()?
                .ok_or(FsError::CapacityExceeded(Capacity::Blocks))?;
            self.inodes_mut().get_mut(id)?.add_block(block, i)?;
            buf[..chunk.len()].copy_from_slice(chunk);
            buf[chunk.len()..].fill(0);
            self.write_data_block(block, &buf)?;
        }
        self.inodes_mut().get_mut(id)?.size = data.len() as u32;
        debug!("wrote {} bytes to inode {id} in {needed} blocks", data.len());
        self.sync()?;
        Ok(data.len())
    }

    /// read at most `max_len` bytes of a regular file
    ///
    /// a zero pointer or an unreadable block ends the read early instead of
    /// failing it, [ReadOutcome::truncated] reports that
    pub fn read_inode_data(&self, id: u32, max_len: usize) -> Result<ReadOutcome> {
        let inode = self.inodes().get_used(id)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory(inode.name.to_string()));
        }
        let block_size = self.superblock().block_size as usize;
        let to_read = (inode.size as usize).min(max_len);
        let mut outcome = ReadOutcome {
            data: Vec::with_capacity(to_read),
            truncated: false,
        };
        let mut buf = vec![0u8; block_size];
        for &block in inode.direct.iter() {
            let need = to_read - outcome.data.len();
            if need == 0 {
                break;
            }
            if block == 0 {
                break;
            }
            if let Err(e) = self.read_data_block(block, &mut buf) {
                warn!("reading block {block} of inode {id} failed: {e}");
                break;
            }
            outcome.data.extend_from_slice(&buf[..need.min(block_size)]);
        }
        if outcome.data.len() < to_read {
            warn!(
                "inode {id} claims {} bytes, only {} readable",
                inode.size,
                outcome.data.len()
            );
            outcome.truncated = true;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_test_environment::init_small_fs;

    #[test]
    fn test_write_then_read() {
        let mut fs = init_small_fs();
        let id = fs.allocate_inode().unwrap().unwrap();
        assert_eq!(fs.write_inode_data(id, b"hello").unwrap(), 5);
        let outcome = fs.read_inode_data(id, usize::MAX).unwrap();
        assert_eq!(outcome.data, b"hello");
        assert!(!outcome.truncated);
        assert_eq!(fs.read_inode_data(id, 2).unwrap().data, b"he");
    }

    #[test]
    fn test_rewrite_releases_old_blocks() {
        let mut fs = init_small_fs();
        let id = fs.allocate_inode().unwrap().unwrap();
        let free = fs.superblock().free_blocks;
        let content: Vec<u8> = (0..1300).map(|i| i as u8).collect();
        fs.write_inode_data(id, &content).unwrap();
        assert_eq!(fs.superblock().free_blocks, free - 3);
        assert_eq!(fs.read_inode_data(id, usize::MAX).unwrap().data, content);

        fs.write_inode_data(id, b"short").unwrap();
        assert_eq!(fs.superblock().free_blocks, free - 1);
        assert_eq!(fs.inode(id).unwrap().size, 5);

        fs.write_inode_data(id, b"").unwrap();
        assert_eq!(fs.superblock().free_blocks, free);
        assert!(fs.inode(id).unwrap().direct_blocks().is_empty());
    }

    #[test]
    fn test_capacity_boundary() {
        let mut fs = init_small_fs();
        let id = fs.allocate_inode().unwrap().unwrap();
        let max = Inode::max_size(fs.superblock().block_size);
        let content = vec![7u8; max];
        assert_eq!(fs.write_inode_data(id, &content).unwrap(), max);

        let too_big = vec![1u8; max + 1];
        assert!(matches!(
            fs.write_inode_data(id, &too_big),
            Err(FsError::CapacityExceeded(Capacity::DirectPointers))
        ));
        // untouched
        let outcome = fs.read_inode_data(id, usize::MAX).unwrap();
        assert_eq!(outcome.data, content);
    }

    #[test]
    fn test_volume_full_keeps_old_content() {
        let mut fs = init_small_fs();
        let a = fs.allocate_inode().unwrap().unwrap();
        let b = fs.allocate_inode().unwrap().unwrap();
        let block_size = fs.superblock().block_size as usize;
        // 56 free blocks: fill 20 + 20, leaving 16
        fs.write_inode_data(a, &vec![1u8; 20 * block_size]).unwrap();
        fs.write_inode_data(b, &vec![2u8; 20 * block_size]).unwrap();
        let c = fs.allocate_inode().unwrap().unwrap();
        fs.write_inode_data(c, b"keep").unwrap();

        assert!(matches!(
            fs.write_inode_data(c, &vec![3u8; 20 * block_size]),
            Err(FsError::CapacityExceeded(Capacity::Blocks))
        ));
        assert_eq!(fs.read_inode_data(c, usize::MAX).unwrap().data, b"keep");
    }

    #[test]
    fn test_missing_pointer_truncates_read() {
        let mut fs = init_small_fs();
        let id = fs.allocate_inode().unwrap().unwrap();
        let block_size = fs.superblock().block_size as usize;
        fs.write_inode_data(id, &vec![9u8; 2 * block_size]).unwrap();
        fs.inodes_mut().get_mut(id).unwrap().direct[1] = 0;

        let outcome = fs.read_inode_data(id, usize::MAX).unwrap();
        assert!(outcome.truncated);
        assert_eq!(outcome.data.len(), block_size);
    }

    #[test]
    fn test_directories_are_refused() {
        let mut fs = init_small_fs();
        assert!(matches!(
            fs.write_inode_data(0, b"x"),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.read_inode_data(0, 10),
            Err(FsError::IsADirectory(_))
        ));
    }
}
