use std::fmt;

use log::warn;

use super::{BlockDevice, FileKind, FsError, Result, VirtFs, ROOT_INODE};

/// one node reported by [Walk]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub id: u32,
    pub name: String,
    /// 0 for the node the walk started at
    pub depth: usize,
    pub kind: FileKind,
}

/// indented like `tree`, directories get a trailing slash
impl fmt::Display for WalkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.id == ROOT_INODE {
            ""
        } else {
            self.kind.suffix()
        };
        write!(f, "{:indent$}{}{suffix}", "", self.name, indent = self.depth * 2)
    }
}

/// lazy depth-first pre-order traversal of a subtree
///
/// children are visited in stored directory order. The walk gives up with
/// [FsError::Corrupted] after visiting more nodes than the inode table holds,
/// which only happens if directories form a cycle.
pub struct Walk<'a, D: BlockDevice> {
    fs: &'a VirtFs<D>,
    start: u32,
    stack: Vec<(u32, usize)>,
    visited: u32,
}

impl<'a, D: BlockDevice> Walk<'a, D> {
    pub(crate) fn new(fs: &'a VirtFs<D>, start: u32) -> Self {
        Self {
            fs,
            start,
            stack: vec![(start, 0)],
            visited: 0,
        }
    }

    /// start over from the first node
    pub fn restart(&mut self) {
        self.stack.clear();
        self.stack.push((self.start, 0));
        self.visited = 0;
    }

    fn visit(&mut self, id: u32, depth: usize) -> Result<WalkEntry> {
        let fs = self.fs;
        self.visited += 1;
        if self.visited > fs.inodes().len() {
            return Err(FsError::Corrupted(format!(
                "directory tree below inode {} is cyclic",
                self.start
            )));
        }
        let inode = fs.inodes().get_used(id)?;
        if inode.is_dir() {
            let children = fs.read_entries(id)?;
            for child in children.iter().rev() {
                let live = fs
                    .inodes()
                    .get(child.inode)
                    .map(|inode| inode.used)
                    .unwrap_or(false);
                if live {
                    self.stack.push((child.inode, depth + 1));
                } else {
                    warn!(
                        "entry {} in directory {id} points at dead inode {}",
                        child.name, child.inode
                    );
                }
            }
        }
        Ok(WalkEntry {
            id,
            name: inode.name.to_string(),
            depth,
            kind: inode.kind,
        })
    }
}

impl<D: BlockDevice> Iterator for Walk<'_, D> {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let entry = self.visit(id, depth);
        if entry.is_err() {
            // nothing sensible can follow a broken node
            self.stack.clear();
        }
        Some(entry)
    }
}

impl<D: BlockDevice> VirtFs<D> {
    /// every node below `path`, the node itself first at depth 0
    pub fn list_recursive(&self, path: &str) -> Result<Walk<'_, D>> {
        let start = self.resolve_existing(path)?;
        Ok(Walk::new(self, start))
    }

    /// absolute path of an inode, rebuilt from parent links
    pub fn full_path(&self, id: u32) -> Result<String> {
        let mut names = Vec::new();
        let mut current = id;
        while current != ROOT_INODE {
            if names.len() as u32 >= self.inodes().len() {
                return Err(FsError::Corrupted(format!(
                    "parent chain of inode {id} never reaches the root"
                )));
            }
            let inode = self.inodes().get_used(current)?;
            names.push(inode.name.to_string());
            current = inode.parent;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}
