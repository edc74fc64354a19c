use super::{BlockDevice, FsError, Result, VirtFs, ROOT_INODE};

/// split a slash separated path into its non-empty components
/// # Example
/// ```
/// use vdiskfs::tokenize;
/// assert_eq!(tokenize("/docs//readme.txt/"), vec!["docs", "readme.txt"]);
/// assert!(tokenize("/").is_empty());
/// ```
pub fn tokenize(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// where a path lands in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// directory holding the last component
    pub parent: u32,
    /// last component, "/" for the root
    pub name: String,
    /// inode the last component names, if it was looked up and exists
    pub target: Option<u32>,
}

impl Resolved {
    pub fn is_root(&self) -> bool {
        self.target == Some(ROOT_INODE) && self.parent == ROOT_INODE && self.name == "/"
    }
}

impl<D: BlockDevice> VirtFs<D> {
    /// walk `path` from the root
    ///
    /// every component but the last has to be an existing directory; the last
    /// one is only looked up when `want_target` is set and may be missing
    pub fn resolve(&self, path: &str, want_target: bool) -> Result<Resolved> {
        let components = tokenize(path);
        let Some((last, dirs)) = components.split_last() else {
            return Ok(Resolved {
                parent: ROOT_INODE,
                name: "/".into(),
                target: Some(ROOT_INODE),
            });
        };

        let mut current = ROOT_INODE;
        for component in dirs {
            let child = self
                .lookup(current, component)?
                .ok_or_else(|| FsError::NotFound(path.to_string()))?;
            let inode = self.inodes().get(child)?;
            if !inode.used || !inode.is_dir() {
                return Err(FsError::NotFound(path.to_string()));
            }
            current = child;
        }

        let target = if want_target {
            self.lookup(current, last)?
        } else {
            None
        };
        Ok(Resolved {
            parent: current,
            name: last.to_string(),
            target,
        })
    }

    /// the inode `path` names, `NotFound` if any component is missing
    pub fn resolve_existing(&self, path: &str) -> Result<u32> {
        self.resolve(path, true)?
            .target
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileKind;
    use crate::utils::init_test_environment::init_small_fs;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(tokenize("///a///"), vec!["a"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_resolve_root() {
        let fs = init_small_fs();
        for path in ["/", "", "//"] {
            let resolved = fs.resolve(path, true).unwrap();
            assert!(resolved.is_root(), "{path:?}");
        }
    }

    #[test]
    fn test_resolve_nested() {
        let mut fs = init_small_fs();
        let docs = fs.allocate_inode().unwrap().unwrap();
        fs.inodes_mut().get_mut(docs).unwrap().kind = FileKind::Directory;
        fs.add_entry(ROOT_INODE, "docs", docs).unwrap();
        let file = fs.allocate_inode().unwrap().unwrap();
        fs.add_entry(docs, "readme.txt", file).unwrap();

        let resolved = fs.resolve("/docs/readme.txt", true).unwrap();
        assert_eq!(
            resolved,
            Resolved {
                parent: docs,
                name: "readme.txt".into(),
                target: Some(file),
            }
        );
        // missing last component is fine
        let resolved = fs.resolve("/docs/new.txt", true).unwrap();
        assert_eq!(resolved.target, None);
        assert_eq!(resolved.parent, docs);
        // not looked up
        assert_eq!(fs.resolve("/docs/readme.txt", false).unwrap().target, None);

        // missing or non-directory intermediates
        assert!(matches!(
            fs.resolve("/nope/readme.txt", true),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            fs.resolve("/docs/readme.txt/deeper", true),
            Err(FsError::NotFound(_))
        ));
        assert_eq!(fs.resolve_existing("docs").unwrap(), docs);
    }

    #[test]
    fn test_resolve_through_freed_directory() {
        let mut fs = init_small_fs();
        let docs = fs.allocate_inode().unwrap().unwrap();
        fs.inodes_mut().get_mut(docs).unwrap().kind = FileKind::Directory;
        fs.add_entry(ROOT_INODE, "docs", docs).unwrap();
        fs.free_inode(docs).unwrap();

        assert!(matches!(
            fs.resolve("/docs/readme.txt", true),
            Err(FsError::NotFound(_))
        ));
        // the dangling entry itself still resolves as a last component
        assert_eq!(fs.resolve("/docs", true).unwrap().target, Some(docs));
    }
}
