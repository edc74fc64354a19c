use crate::fs::{Geometry, MemDisk, VirtFs};

/// a small geometry keeping capacity tests cheap: 8 entries per
/// directory block, 64 blocks, 16 inodes
pub fn small_geometry() -> Geometry {
    Geometry {
        block_size: 512,
        total_blocks: 64,
        total_inodes: 16,
    }
}

/// a freshly formatted in-memory volume
pub fn init_test_fs(geometry: Geometry) -> VirtFs<MemDisk> {
    let disk = MemDisk::new(geometry.block_size, geometry.total_blocks);
    VirtFs::format(disk, geometry).expect("Failed to format test volume")
}

pub fn init_small_fs() -> VirtFs<MemDisk> {
    init_test_fs(small_geometry())
}
