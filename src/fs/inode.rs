use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use super::{
    filekind::FileKind, Capacity, FsError, Result, DIRECT_POINTERS, INODE_NAME_OFFSET,
    INODE_SIZE, MAX_FILENAME, ROOT_INODE,
};

/// a NUL padded name, at most `MAX_FILENAME - 1` bytes long
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FileName(#[serde(with = "BigArray")] [u8; MAX_FILENAME]);

impl Default for FileName {
    fn default() -> Self {
        FileName([0u8; MAX_FILENAME])
    }
}

impl FileName {
    /// validate a single path component
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\0']) {
            return Err(FsError::InvalidArgument(format!(
                "{name:?} is not a valid file name"
            )));
        }
        if name.len() >= MAX_FILENAME {
            return Err(FsError::NameTooLong(name.to_string()));
        }
        let mut raw = [0u8; MAX_FILENAME];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(FileName(raw))
    }

    /// the root directory is called "/"
    pub(crate) fn root() -> Self {
        let mut raw = [0u8; MAX_FILENAME];
        raw[0] = b'/';
        FileName(raw)
    }

    /// build from a raw on-disk field, the last byte is always treated as NUL
    pub(crate) fn from_raw(field: &[u8]) -> Self {
        let mut raw = [0u8; MAX_FILENAME];
        let len = field.len().min(MAX_FILENAME - 1);
        raw[..len].copy_from_slice(&field[..len]);
        FileName(raw)
    }

    pub fn raw(&self) -> &[u8; MAX_FILENAME] {
        &self.0
    }

    /// name bytes up to the first NUL
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|b| *b == 0).unwrap_or(MAX_FILENAME);
        &self.0[..len]
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// compare with a path component, never looks past the bounded field
    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes() == name.as_bytes()
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// one record of the inode table
///
/// the name is kept out of the serialized prefix, it always starts at
/// [INODE_NAME_OFFSET] inside the record
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Inode {
    /// its own index in the inode table
    pub id: u32,
    /// byte size, for directories the length of the serialized entries
    pub size: u32,
    /// direct data block pointers, 0 marks an unused slot
    pub direct: [u32; DIRECT_POINTERS],
    pub parent: u32,
    pub kind: FileKind,
    pub used: bool,
    #[serde(skip)]
    pub name: FileName,
}

impl Inode {
    /// a free inode slot
    pub fn empty(id: u32) -> Self {
        Inode {
            id,
            ..Inode::default()
        }
    }

    /// the root directory, its own parent
    pub fn root() -> Self {
        Inode {
            id: ROOT_INODE,
            parent: ROOT_INODE,
            kind: FileKind::Directory,
            used: true,
            name: FileName::root(),
            ..Inode::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// forget everything but the id, the slot becomes free
    pub fn clear(&mut self) {
        *self = Inode::empty(self.id);
    }
}

/// This block is about data block pointers
impl Inode {
    pub fn direct_blocks(&self) -> Vec<u32> {
        self.direct.iter().copied().filter(|b| *b != 0).collect()
    }

    /// unlink every data block and reset the size,
    /// returns the blocks the caller has to release
    pub fn truncate(&mut self) -> Vec<u32> {
        let blocks = self.direct_blocks();
        self.size = 0;
        self.direct = [0u32; DIRECT_POINTERS];
        blocks
    }

    pub fn add_block(&mut self, block: u32, index: usize) -> Result<()> {
        let slot = self
            .direct
            .get_mut(index)
            .ok_or(FsError::CapacityExceeded(Capacity::DirectPointers))?;
        *slot = block;
        Ok(())
    }

    /// how many direct blocks `len` bytes of content occupy
    pub fn blocks_needed(len: usize, block_size: u32) -> usize {
        len.div_ceil(block_size as usize)
    }

    /// the largest content an inode can address
    pub fn max_size(block_size: u32) -> usize {
        DIRECT_POINTERS * block_size as usize
    }
}

/// This block is about the on-disk record
impl Inode {
    /// serialize into a record slot of [INODE_SIZE] bytes
    pub fn encode_into(&self, slot: &mut [u8]) -> Result<()> {
        let config = bincode::config::legacy();
        let prefix = bincode::serde::encode_to_vec(self, config)?;
        if slot.len() != INODE_SIZE || prefix.len() > INODE_NAME_OFFSET {
            return Err(FsError::InvalidArgument(format!(
                "inode record of {} bytes doesn't fit a {} byte slot",
                prefix.len(),
                slot.len()
            )));
        }
        slot.fill(0);
        slot[..prefix.len()].copy_from_slice(&prefix);
        slot[INODE_NAME_OFFSET..].copy_from_slice(self.name.raw());
        Ok(())
    }

    pub fn decode_from(slot: &[u8]) -> Result<Self> {
        if slot.len() != INODE_SIZE {
            return Err(FsError::InvalidArgument(format!(
                "inode record slot of {} bytes",
                slot.len()
            )));
        }
        let config = bincode::config::legacy();
        let (mut inode, _): (Inode, usize) =
            bincode::serde::decode_from_slice(&slot[..INODE_NAME_OFFSET], config)?;
        inode.name = FileName::from_raw(&slot[INODE_NAME_OFFSET..]);
        Ok(inode)
    }
}

/// the fixed-size arena every inode id indexes into
#[derive(Debug, Clone, PartialEq)]
pub struct InodeTable {
    inodes: Vec<Inode>,
}

impl InodeTable {
    /// a table of free slots with the root directory in slot 0
    pub fn new(count: u32) -> Self {
        let mut inodes: Vec<Inode> = (0..count).map(Inode::empty).collect();
        if let Some(root) = inodes.first_mut() {
            *root = Inode::root();
        }
        Self { inodes }
    }

    pub fn len(&self) -> u32 {
        self.inodes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn get(&self, id: u32) -> Result<&Inode> {
        let limit = self.len();
        self.inodes.get(id as usize).ok_or(FsError::OutOfRange {
            what: "inode",
            index: id as u64,
            limit: limit as u64,
        })
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut Inode> {
        let limit = self.len();
        self.inodes.get_mut(id as usize).ok_or(FsError::OutOfRange {
            what: "inode",
            index: id as u64,
            limit: limit as u64,
        })
    }

    /// like [get](Self::get), but a free slot is an error too
    pub fn get_used(&self, id: u32) -> Result<&Inode> {
        let inode = self.get(id)?;
        if !inode.used {
            return Err(FsError::Corrupted(format!(
                "inode {id} is referenced but not in use"
            )));
        }
        Ok(inode)
    }

    /// first free slot, the root slot is never handed out
    pub fn first_free(&self) -> Option<u32> {
        self.inodes
            .iter()
            .skip(1)
            .position(|inode| !inode.used)
            .map(|p| p as u32 + 1)
    }

    pub fn free_count(&self) -> u32 {
        self.inodes.iter().filter(|inode| !inode.used).count() as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inode> {
        self.inodes.iter()
    }
}

/// for serialize and deserialize
impl InodeTable {
    /// records packed back to back, zero padded to whole blocks
    pub fn to_bytes(&self, block_size: u32) -> Result<Vec<u8>> {
        let len = self.inodes.len() * INODE_SIZE;
        let mut bytes = vec![0u8; len.div_ceil(block_size as usize) * block_size as usize];
        for (inode, slot) in self.inodes.iter().zip(bytes.chunks_exact_mut(INODE_SIZE)) {
            inode.encode_into(slot)?;
        }
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8], count: u32) -> Result<Self> {
        let needed = count as usize * INODE_SIZE;
        if bytes.len() < needed {
            return Err(FsError::Corrupted(format!(
                "inode table needs {needed} bytes, got {}",
                bytes.len()
            )));
        }
        let inodes = bytes[..needed]
            .chunks_exact(INODE_SIZE)
            .enumerate()
            .map(|(index, slot)| {
                let inode = Inode::decode_from(slot)?;
                if inode.id as usize != index {
                    return Err(FsError::Corrupted(format!(
                        "inode slot {index} claims id {}",
                        inode.id
                    )));
                }
                Ok(inode)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { inodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_validation() {
        assert!(FileName::new("readme.txt").is_ok());
        assert!(matches!(
            FileName::new(""),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            FileName::new("a/b"),
            Err(FsError::InvalidArgument(_))
        ));
        let longest = "x".repeat(MAX_FILENAME - 1);
        assert!(FileName::new(&longest).is_ok());
        let too_long = "x".repeat(MAX_FILENAME);
        assert!(matches!(
            FileName::new(&too_long),
            Err(FsError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_file_name_matches() {
        let name = FileName::new("notes.txt").unwrap();
        assert!(name.matches("notes.txt"));
        assert!(!name.matches("notes.tx"));
        assert!(!name.matches("notes.txt2"));
        assert_eq!(name.to_string(), "notes.txt");
        assert_eq!(FileName::root().as_bytes(), b"/");
    }

    #[test]
    fn test_inode_record_layout() {
        let mut inode = Inode::empty(7);
        inode.used = true;
        inode.kind = FileKind::Directory;
        inode.size = 128;
        inode.parent = 3;
        inode.direct[0] = 200;
        inode.direct[DIRECT_POINTERS - 1] = 201;
        inode.name = FileName::new("docs").unwrap();

        let mut slot = vec![0xFFu8; INODE_SIZE];
        inode.encode_into(&mut slot).unwrap();
        // id comes first, little endian
        assert_eq!(&slot[..4], &7u32.to_le_bytes());
        assert_eq!(&slot[INODE_NAME_OFFSET..INODE_NAME_OFFSET + 5], b"docs\0");

        let decoded = Inode::decode_from(&slot).unwrap();
        assert_eq!(decoded, inode);
        assert_eq!(decoded.direct_blocks(), vec![200, 201]);
    }

    #[test]
    fn test_truncate_returns_linked_blocks() {
        let mut inode = Inode::empty(1);
        inode.add_block(10, 0).unwrap();
        inode.add_block(12, 2).unwrap();
        inode.size = 3000;
        assert!(matches!(
            inode.add_block(13, DIRECT_POINTERS),
            Err(FsError::CapacityExceeded(Capacity::DirectPointers))
        ));

        assert_eq!(inode.truncate(), vec![10, 12]);
        assert_eq!(inode.size, 0);
        assert!(inode.direct.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_table_allocation_scan() {
        let mut table = InodeTable::new(4);
        assert!(table.get(0).unwrap().used);
        assert_eq!(table.first_free(), Some(1));
        assert_eq!(table.free_count(), 3);

        table.get_mut(1).unwrap().used = true;
        table.get_mut(2).unwrap().used = true;
        assert_eq!(table.first_free(), Some(3));
        table.get_mut(3).unwrap().used = true;
        assert_eq!(table.first_free(), None);

        assert!(matches!(
            table.get(4),
            Err(FsError::OutOfRange { index: 4, limit: 4, .. })
        ));
    }

    #[test]
    fn test_table_bytes_round_trip() {
        let mut table = InodeTable::new(10);
        let inode = table.get_mut(4).unwrap();
        inode.used = true;
        inode.name = FileName::new("a.txt").unwrap();
        inode.direct[0] = 99;
        inode.size = 5;

        let bytes = table.to_bytes(512).unwrap();
        assert_eq!(bytes.len(), 4 * 512);
        let decoded = InodeTable::from_bytes(&bytes, 10).unwrap();
        assert_eq!(decoded, table);
        assert_eq!(decoded.get(0).unwrap().name.as_bytes(), b"/");
    }
}
