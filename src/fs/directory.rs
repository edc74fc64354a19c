use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    BlockDevice, Capacity, FileName, FsError, Inode, Result, VirtFs, DIRECT_POINTERS,
    DIR_ENTRY_SIZE,
};

/// one `name -> inode` record of a directory's content
///
/// inode 0 is never a child, an entry pointing at it is an empty slot
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: FileName,
    pub inode: u32,
}

impl DirEntry {
    pub fn new(name: &str, inode: u32) -> Result<Self> {
        Ok(Self {
            name: FileName::new(name)?,
            inode,
        })
    }

    pub fn is_empty_slot(&self) -> bool {
        self.inode == 0
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        let config = bincode::config::legacy();
        buf.extend(bincode::serde::encode_to_vec(self, config)?);
        Ok(())
    }

    fn decode(record: &[u8]) -> Result<Self> {
        let config = bincode::config::legacy();
        let (entry, _) = bincode::serde::decode_from_slice(record, config)?;
        Ok(entry)
    }
}

/// directory content is stored through the same direct pointers as file data
impl<D: BlockDevice> VirtFs<D> {
    /// every live entry of a directory, in stored order
    ///
    /// a regular file has no entries
    pub fn read_entries(&self, dir_id: u32) -> Result<Vec<DirEntry>> {
        let dir = self.inodes().get(dir_id)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let block_size = self.superblock().block_size as usize;
        let mut remaining = dir.size as usize;
        let mut entries = Vec::with_capacity(remaining / DIR_ENTRY_SIZE);
        let mut buf = vec![0u8; block_size];
        for &block in dir.direct.iter() {
            if remaining == 0 {
                break;
            }
            if block == 0 {
                continue;
            }
            self.read_data_block(block, &mut buf)?;
            for record in buf.chunks_exact(DIR_ENTRY_SIZE) {
                if remaining == 0 {
                    break;
                }
                remaining = remaining.saturating_sub(DIR_ENTRY_SIZE);
                let entry = DirEntry::decode(record)?;
                if !entry.is_empty_slot() {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    /// replace the whole content of a directory with `entries`, packed
    pub fn write_entries(&mut self, dir_id: u32, entries: &[DirEntry]) -> Result<()> {
        let dir = self.inodes().get(dir_id)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory(dir.name.to_string()));
        }
        let block_size = self.superblock().block_size;
        let total_bytes = entries.len() * DIR_ENTRY_SIZE;
        let needed = Inode::blocks_needed(total_bytes, block_size);
        if needed > DIRECT_POINTERS {
            return Err(FsError::CapacityExceeded(Capacity::DirectPointers));
        }

        for i in 0..needed {
            if self.inodes().get(dir_id)?.direct[i] != 0 {
                continue;
            }
            let block = self
                .allocate_block()?
                .ok_or(FsError::CapacityExceeded(Capacity::Blocks))?;
            self.inodes_mut().get_mut(dir_id)?.add_block(block, i)?;
        }
        for i in needed..DIRECT_POINTERS {
            let block = self.inodes().get(dir_id)?.direct[i];
            if block != 0 {
                self.release_block(block)?;
                self.inodes_mut().get_mut(dir_id)?.direct[i] = 0;
            }
        }

        let mut bytes = Vec::with_capacity(needed * block_size as usize);
        for entry in entries {
            entry.encode_into(&mut bytes)?;
        }
        bytes.resize(needed * block_size as usize, 0);
        let direct = self.inodes().get(dir_id)?.direct;
        for (chunk, &block) in bytes.chunks_exact(block_size as usize).zip(direct.iter()) {
            self.write_data_block(block, chunk)?;
        }

        self.inodes_mut().get_mut(dir_id)?.size = total_bytes as u32;
        debug!(
            "directory {dir_id} rewritten: {} entries in {needed} blocks",
            entries.len()
        );
        self.sync()
    }

    /// the inode a name refers to inside a directory
    pub fn lookup(&self, dir_id: u32, name: &str) -> Result<Option<u32>> {
        Ok(self
            .read_entries(dir_id)?
            .into_iter()
            .find(|entry| entry.name.matches(name))
            .map(|entry| entry.inode))
    }

    /// point `name` at `inode`, replacing the target if the name exists
    pub fn add_entry(&mut self, dir_id: u32, name: &str, inode: u32) -> Result<()> {
        let new_entry = DirEntry::new(name, inode)?;
        let mut entries = self.read_entries(dir_id)?;
        match entries.iter_mut().find(|entry| entry.name.matches(name)) {
            Some(entry) => entry.inode = inode,
            None => entries.push(new_entry),
        }
        self.write_entries(dir_id, &entries)
    }

    pub fn remove_entry(&mut self, dir_id: u32, name: &str) -> Result<()> {
        let mut entries = self.read_entries(dir_id)?;
        let position = entries
            .iter()
            .position(|entry| entry.name.matches(name))
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        entries.remove(position);
        self.write_entries(dir_id, &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileKind, MemDisk, ROOT_INODE};
    use crate::utils::init_test_environment::init_small_fs;

    fn new_dir(fs: &mut VirtFs<MemDisk>) -> u32 {
        let id = fs.allocate_inode().unwrap().unwrap();
        fs.inodes_mut().get_mut(id).unwrap().kind = FileKind::Directory;
        id
    }

    #[test]
    fn test_entry_is_64_bytes() {
        let entry = DirEntry::new("readme.txt", 3).unwrap();
        let mut buf = Vec::new();
        entry.encode_into(&mut buf).unwrap();
        assert_eq!(buf.len(), DIR_ENTRY_SIZE);
        assert_eq!(&buf[..11], b"readme.txt\0");
        assert_eq!(&buf[60..], &3u32.to_le_bytes());
        assert_eq!(DirEntry::decode(&buf).unwrap(), entry);
    }

    #[test]
    fn test_add_lookup_remove() {
        let mut fs = init_small_fs();
        fs.add_entry(ROOT_INODE, "a", 1).unwrap();
        fs.add_entry(ROOT_INODE, "b", 2).unwrap();
        assert_eq!(fs.lookup(ROOT_INODE, "a").unwrap(), Some(1));
        assert_eq!(fs.lookup(ROOT_INODE, "b").unwrap(), Some(2));
        assert_eq!(fs.lookup(ROOT_INODE, "c").unwrap(), None);
        assert_eq!(fs.inode(ROOT_INODE).unwrap().size, 2 * DIR_ENTRY_SIZE as u32);

        // an existing name gets its target replaced
        fs.add_entry(ROOT_INODE, "a", 5).unwrap();
        assert_eq!(fs.lookup(ROOT_INODE, "a").unwrap(), Some(5));
        assert_eq!(fs.read_entries(ROOT_INODE).unwrap().len(), 2);

        fs.remove_entry(ROOT_INODE, "a").unwrap();
        assert_eq!(fs.lookup(ROOT_INODE, "a").unwrap(), None);
        assert!(matches!(
            fs.remove_entry(ROOT_INODE, "a"),
            Err(FsError::NotFound(_))
        ));
        let names: Vec<_> = fs
            .read_entries(ROOT_INODE)
            .unwrap()
            .iter()
            .map(|e| e.name.to_string())
            .collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_blocks_follow_entry_count() {
        let mut fs = init_small_fs();
        let dir = new_dir(&mut fs);
        let free = fs.superblock().free_blocks;
        // 512 byte blocks hold 8 entries
        for i in 0..9 {
            fs.add_entry(dir, &format!("f{i}"), i + 1).unwrap();
        }
        assert_eq!(fs.inode(dir).unwrap().direct_blocks().len(), 2);
        assert_eq!(fs.superblock().free_blocks, free - 2);

        fs.remove_entry(dir, "f0").unwrap();
        assert_eq!(fs.inode(dir).unwrap().direct_blocks().len(), 1);
        assert_eq!(fs.superblock().free_blocks, free - 1);
        assert_eq!(fs.read_entries(dir).unwrap().len(), 8);
        assert_eq!(fs.lookup(dir, "f8").unwrap(), Some(9));

        fs.write_entries(dir, &[]).unwrap();
        assert!(fs.inode(dir).unwrap().direct_blocks().is_empty());
        assert_eq!(fs.superblock().free_blocks, free);
    }

    #[test]
    fn test_directory_capacity() {
        let mut fs = init_small_fs();
        let dir = new_dir(&mut fs);
        let entries: Vec<_> = (0..DIRECT_POINTERS as u32 * 8)
            .map(|i| DirEntry::new(&format!("f{i}"), i + 1).unwrap())
            .collect();
        fs.write_entries(dir, &entries).unwrap();

        let mut too_many = entries.clone();
        too_many.push(DirEntry::new("overflow", 1).unwrap());
        assert!(matches!(
            fs.write_entries(dir, &too_many),
            Err(FsError::CapacityExceeded(Capacity::DirectPointers))
        ));
        assert_eq!(fs.read_entries(dir).unwrap().len(), entries.len());
    }

    #[test]
    fn test_empty_slots_are_skipped() {
        let mut fs = init_small_fs();
        let entries = [
            DirEntry::new("a", 1).unwrap(),
            DirEntry::new("hole", 0).unwrap(),
            DirEntry::new("b", 2).unwrap(),
        ];
        fs.write_entries(ROOT_INODE, &entries).unwrap();
        let read = fs.read_entries(ROOT_INODE).unwrap();
        assert_eq!(read, vec![entries[0], entries[2]]);
    }

    #[test]
    fn test_regular_file_has_no_entries() {
        let mut fs = init_small_fs();
        let file = fs.allocate_inode().unwrap().unwrap();
        assert!(fs.read_entries(file).unwrap().is_empty());
        assert!(matches!(
            fs.write_entries(file, &[]),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_overlong_name_is_never_found() {
        let mut fs = init_small_fs();
        let long = "x".repeat(80);
        assert!(matches!(
            fs.add_entry(ROOT_INODE, &long, 1),
            Err(FsError::NameTooLong(_))
        ));
        assert_eq!(fs.lookup(ROOT_INODE, &long).unwrap(), None);
    }
}
