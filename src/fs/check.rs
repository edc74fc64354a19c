use std::collections::HashMap;

use log::{info, warn};

use super::{BlockDevice, FsError, Result, VirtFs, ROOT_INODE};

impl<D: BlockDevice> VirtFs<D> {
    /// verify the invariants that keep the image self-consistent
    ///
    /// every problem found is logged, the first error summarises them all
    pub fn check(&self) -> Result<()> {
        let mut problems = Vec::new();
        let sb = self.superblock();

        let root = self.inodes().get(ROOT_INODE)?;
        if !root.used || !root.is_dir() || root.parent != ROOT_INODE {
            problems.push("root is not a used directory owning itself".to_string());
        }

        // block -> inode owning it
        let mut owners: HashMap<u32, u32> = HashMap::new();
        for inode in self.inodes().iter() {
            if !inode.used {
                if inode.size != 0 || !inode.direct_blocks().is_empty() {
                    problems.push(format!("free inode {} still holds content", inode.id));
                }
                continue;
            }
            for block in inode.direct_blocks() {
                if block < sb.data_block_start || block >= sb.total_blocks {
                    problems.push(format!(
                        "inode {} points at block {block} outside the data region",
                        inode.id
                    ));
                } else if !self.bitmap().is_allocated(block) {
                    problems.push(format!(
                        "block {block} of inode {} is marked free",
                        inode.id
                    ));
                }
                if let Some(other) = owners.insert(block, inode.id) {
                    problems.push(format!(
                        "block {block} is linked by inodes {other} and {}",
                        inode.id
                    ));
                }
            }
            if inode.id == ROOT_INODE {
                continue;
            }
            if let Err(e) = self.full_path(inode.id) {
                problems.push(format!("inode {}: {e}", inode.id));
                continue;
            }
            let parent = self.inodes().get(inode.parent)?;
            if !parent.is_dir() {
                problems.push(format!(
                    "parent {} of inode {} is not a directory",
                    inode.parent, inode.id
                ));
            } else if self.lookup(inode.parent, &inode.name.as_str())? != Some(inode.id) {
                problems.push(format!(
                    "inode {} is missing from its parent directory {}",
                    inode.id, inode.parent
                ));
            }
        }

        if self.bitmap().free_count() != sb.free_blocks {
            problems.push(format!(
                "superblock counts {} free blocks, bitmap {}",
                sb.free_blocks,
                self.bitmap().free_count()
            ));
        }
        if self.inodes().free_count() != sb.free_inodes {
            problems.push(format!(
                "superblock counts {} free inodes, inode table {}",
                sb.free_inodes,
                self.inodes().free_count()
            ));
        }

        if problems.is_empty() {
            info!("consistency check passed");
            return Ok(());
        }
        for problem in &problems {
            warn!("{problem}");
        }
        Err(FsError::Corrupted(format!(
            "{} problems, first: {}",
            problems.len(),
            problems[0]
        )))
    }
}
