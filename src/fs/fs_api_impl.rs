use std::fmt;

use byte_unit::Byte;
use log::{info, warn};
use regex::Regex;

use super::{
    BlockDevice, Capacity, FileKind, FileName, FsError, ReadOutcome, Result, VirtFs, Walk,
    ROOT_INODE,
};

/// metadata of a single node, like `stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub id: u32,
    pub kind: FileKind,
    pub size: u32,
    /// data blocks linked from the inode
    pub blocks: u32,
}

/// capacity summary of a volume, like `statfs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_blocks as u64 * self.block_size as u64;
        let free = self.free_blocks as u64 * self.block_size as u64;
        write!(
            f,
            "{} free of {}, {} of {} inodes free",
            Byte::from_bytes(free as _).get_appropriate_unit(true),
            Byte::from_bytes(total as _).get_appropriate_unit(true),
            self.free_inodes,
            self.total_inodes
        )
    }
}

/// path based operations
impl<D: BlockDevice> VirtFs<D> {
    /// create an empty file or directory, returns its inode
    pub fn create_entry(&mut self, path: &str, kind: FileKind) -> Result<u32> {
        info!("create_entry() called with path: {path:?}, kind: {kind:?}");
        let resolved = self.resolve(path, true)?;
        if resolved.target.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let name = FileName::new(&resolved.name)?;
        let id = self
            .allocate_inode()?
            .ok_or(FsError::CapacityExceeded(Capacity::Inodes))?;
        {
            let inode = self.inodes_mut().get_mut(id)?;
            inode.kind = kind;
            inode.name = name;
            inode.parent = resolved.parent;
            inode.size = 0;
        }
        if let Err(e) = self.add_entry(resolved.parent, &resolved.name, id) {
            if let Err(rollback) = self.free_inode(id) {
                warn!("rolling back inode {id} failed: {rollback}");
            }
            return Err(e);
        }
        self.sync()?;
        Ok(id)
    }

    pub fn create_file(&mut self, path: &str) -> Result<u32> {
        self.create_entry(path, FileKind::RegularFile)
    }

    pub fn create_dir(&mut self, path: &str) -> Result<u32> {
        self.create_entry(path, FileKind::Directory)
    }

    /// move a node to a new, currently unused path
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        info!("rename() called with {old_path:?} -> {new_path:?}");
        let source = self.resolve(old_path, true)?;
        let id = source
            .target
            .ok_or_else(|| FsError::NotFound(old_path.to_string()))?;
        if id == ROOT_INODE {
            return Err(FsError::InvalidArgument("the root can't be renamed".into()));
        }
        let dest = self.resolve(new_path, true)?;
        if dest.target.is_some() {
            return Err(FsError::AlreadyExists(new_path.to_string()));
        }
        let name = FileName::new(&dest.name)?;
        if self.inodes().get_used(id)?.is_dir() && self.is_ancestor(id, dest.parent)? {
            return Err(FsError::InvalidArgument(format!(
                "can't move {old_path:?} into its own subtree"
            )));
        }

        self.remove_entry(source.parent, &source.name)?;
        if let Err(e) = self.add_entry(dest.parent, &dest.name, id) {
            if let Err(restore) = self.add_entry(source.parent, &source.name, id) {
                warn!("restoring {old_path:?} after a failed rename failed: {restore}");
            }
            return Err(e);
        }
        {
            let inode = self.inodes_mut().get_mut(id)?;
            inode.parent = dest.parent;
            inode.name = name;
        }
        self.sync()
    }

    /// remove a file or an empty directory
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        info!("unlink() called with path: {path:?}");
        let resolved = self.resolve(path, true)?;
        let id = resolved
            .target
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if id == ROOT_INODE {
            return Err(FsError::InvalidArgument("the root can't be removed".into()));
        }
        if !self.read_entries(id)?.is_empty() {
            return Err(FsError::NotEmpty(path.to_string()));
        }
        self.remove_entry(resolved.parent, &resolved.name)?;
        self.free_inode(id)?;
        self.sync()
    }

    /// remove a node and everything below it, returns how many inodes were freed
    pub fn delete_recursive(&mut self, path: &str) -> Result<usize> {
        info!("delete_recursive() called with path: {path:?}");
        let resolved = self.resolve(path, true)?;
        let id = resolved
            .target
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if id == ROOT_INODE {
            return Err(FsError::InvalidArgument("the root can't be removed".into()));
        }
        if !self.inodes().get(id)?.used {
            warn!("{path:?} points at unused inode {id}, dropping the entry");
            self.remove_entry(resolved.parent, &resolved.name)?;
            self.sync()?;
            return Ok(0);
        }
        // collect first, a cyclic tree fails before anything is touched
        let subtree = Walk::new(self, id)
            .map(|entry| entry.map(|e| e.id))
            .collect::<Result<Vec<_>>>()?;

        self.remove_entry(resolved.parent, &resolved.name)?;
        // pre-order reversed frees children before their parents
        for &node in subtree.iter().rev() {
            self.free_inode(node)?;
        }
        self.sync()?;
        Ok(subtree.len())
    }

    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<usize> {
        info!("write_file() called with path: {path:?}, {} bytes", data.len());
        let id = self.resolve_existing(path)?;
        self.write_inode_data(id, data)
    }

    pub fn read_file(&self, path: &str, max_len: usize) -> Result<ReadOutcome> {
        let id = self.resolve_existing(path)?;
        self.read_inode_data(id, max_len)
    }

    pub fn stat(&self, path: &str) -> Result<Stat> {
        let id = self.resolve_existing(path)?;
        let inode = self.inodes().get_used(id)?;
        Ok(Stat {
            id,
            kind: inode.kind,
            size: inode.size,
            blocks: inode.direct_blocks().len() as u32,
        })
    }

    pub fn usage(&self) -> Usage {
        let sb = self.superblock();
        Usage {
            block_size: sb.block_size,
            total_blocks: sb.total_blocks,
            free_blocks: sb.free_blocks,
            total_inodes: sb.total_inodes,
            free_inodes: sb.free_inodes,
        }
    }

    /// full paths of every node below `path` whose name matches `pattern`
    pub fn find(&self, path: &str, pattern: &Regex) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for entry in self.list_recursive(path)? {
            let entry = entry?;
            if pattern.is_match(&entry.name) {
                found.push(self.full_path(entry.id)?);
            }
        }
        Ok(found)
    }

    /// whether `ancestor` lies on the parent chain of `id`, `id` included
    fn is_ancestor(&self, ancestor: u32, id: u32) -> Result<bool> {
        let mut current = id;
        for _ in 0..=self.inodes().len() {
            if current == ancestor {
                return Ok(true);
            }
            if current == ROOT_INODE {
                return Ok(false);
            }
            current = self.inodes().get_used(current)?.parent;
        }
        Err(FsError::Corrupted(format!(
            "parent chain of inode {id} never reaches the root"
        )))
    }
}
