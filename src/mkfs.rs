//! create our filesystem
use std::path::Path;

use anyhow::{anyhow, Context};
use byte_unit::{Byte, ByteUnit};
use log::info;

use crate::fs::{Geometry, ImageFile, VirtFs};

/// create a new image file and format it
/// # Params
/// - `image_file_path`: the path of the image file, it must not exist yet
/// - `geometry`: block size, block count and inode count of the filesystem
///
/// # Return
/// the mounted filesystem on success
pub fn mkfs<P>(image_file_path: P, geometry: Geometry) -> anyhow::Result<VirtFs<ImageFile>>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    // check the geometry before touching the disk
    geometry.validate().map_err(|e| {
        anyhow!(
            "{e}; metadata for {} inodes with {} blocks needs {} blocks",
            geometry.total_inodes,
            Byte::from_bytes(geometry.block_size as _).get_adjusted_unit(ByteUnit::B),
            geometry.data_block_start() + 1
        )
    })?;

    let device = ImageFile::create(image_file_path, geometry.block_size, geometry.total_blocks)
        .with_context(|| format!("creating image {}", image_file_path.display()))?;
    let fs = VirtFs::format(device, geometry)?;
    info!(
        "created {} image at {}",
        Byte::from_bytes(geometry.image_size() as _).get_appropriate_unit(true),
        image_file_path.display()
    );
    Ok(fs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::ROOT_INODE, mount::open_image, FileKind};

    #[test]
    fn test_mkfs() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_file = dir.path().join("new_fs.img");
        let geometry = Geometry {
            block_size: 512,
            total_blocks: 256,
            total_inodes: 32,
        };

        let fs = mkfs(&tmp_file, geometry).unwrap();
        drop(fs);
        assert_eq!(
            std::fs::metadata(&tmp_file).unwrap().len(),
            geometry.image_size()
        );

        let fs = open_image(&tmp_file).unwrap();
        // test if root inode "/" is created correctly
        let inode = fs.inode(ROOT_INODE).unwrap();
        assert_eq!(inode.kind, FileKind::Directory);
        assert_eq!(inode.name.as_bytes(), b"/");

        // test if superblock is created correctly
        let superblock = fs.superblock();
        assert_eq!(superblock.geometry(), geometry);
        assert_eq!(superblock.free_inodes, 31);
        assert_eq!(
            superblock.free_blocks,
            256 - geometry.data_block_start()
        );
    }

    #[test]
    fn test_mkfs_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_file = dir.path().join("taken.img");
        std::fs::write(&tmp_file, b"precious").unwrap();
        assert!(mkfs(&tmp_file, Geometry::default()).is_err());
        assert_eq!(std::fs::read(&tmp_file).unwrap(), b"precious");
    }

    #[test]
    fn test_mkfs_rejects_tiny_volume() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_file = dir.path().join("tiny.img");
        let geometry = Geometry {
            block_size: 512,
            total_blocks: 4,
            total_inodes: 64,
        };
        assert!(mkfs(&tmp_file, geometry).is_err());
        assert!(!tmp_file.exists());
    }
}
