//! open an existing image and load the filesystem on it
use std::{fs::File, io::Read, path::Path};

use anyhow::Context;

use crate::fs::{ImageFile, SuperBlock, VirtFs};

/// magic number and block size open the superblock
const HEADER_LEN: usize = 8;

/// peek the block size from the superblock header, the full superblock is
/// verified later by [VirtFs::load]
fn probe_block_size(image_path: &Path) -> anyhow::Result<u32> {
    let mut header = [0u8; HEADER_LEN];
    File::open(image_path)?
        .read_exact(&mut header)
        .context("image is too short to hold a superblock")?;
    Ok(SuperBlock::peek_block_size(&header)?)
}

/// map an image file and load the filesystem stored in it
pub fn open_image<P>(image_path: P) -> anyhow::Result<VirtFs<ImageFile>>
where
    P: AsRef<Path>,
{
    let image_path = image_path.as_ref();
    let block_size = probe_block_size(image_path)
        .with_context(|| format!("reading {}", image_path.display()))?;
    let device = ImageFile::open(image_path, block_size)
        .with_context(|| format!("mapping {}", image_path.display()))?;
    let fs = VirtFs::load(device)
        .with_context(|| format!("loading filesystem from {}", image_path.display()))?;
    Ok(fs)
}
