//! fixed-size block access to the backing store of a filesystem image
use std::{fs::OpenOptions, io, ops::Range, path::Path};

use log::debug;
use memmap2::MmapMut;

use super::{FsError, Result};

/// Block level access used by every other part of the filesystem.
///
/// Implementations only check bounds, they never cache: every call goes straight to the
/// backing store.
pub trait BlockDevice {
    /// size of one block in bytes
    fn block_size(&self) -> u32;

    /// number of addressable blocks
    fn num_blocks(&self) -> u32;

    /// read block `index` into `buf`, `buf.len()` must equal [block_size](Self::block_size)
    fn read_block(&self, index: u32, buf: &mut [u8]) -> Result<()>;

    /// write `buf` to block `index`, `buf.len()` must equal [block_size](Self::block_size)
    fn write_block(&mut self, index: u32, buf: &[u8]) -> Result<()>;

    /// make every previous write durable
    fn flush(&mut self) -> Result<()>;
}

/// byte range of block `index` inside a backing store of `backing_len` bytes
fn block_span(
    index: u32,
    buf_len: usize,
    block_size: u32,
    num_blocks: u32,
    backing_len: usize,
) -> Result<Range<usize>> {
    if index >= num_blocks {
        return Err(FsError::OutOfRange {
            what: "block",
            index: index as u64,
            limit: num_blocks as u64,
        });
    }
    if buf_len != block_size as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("buffer of {buf_len} bytes for a {block_size} byte block"),
        )
        .into());
    }
    let start = index as usize * block_size as usize;
    let end = start + block_size as usize;
    if end > backing_len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("block {index} ends past the backing store ({backing_len} bytes)"),
        )
        .into());
    }
    Ok(start..end)
}

/// an image file mapped into memory
#[derive(Debug)]
pub struct ImageFile {
    mmap: MmapMut,
    block_size: u32,
    num_blocks: u32,
}

impl ImageFile {
    /// map an existing image file
    /// # Params
    /// - `image_path`: the path of the image file,\
    /// something like `Block Device`,like **/dev/sda1**
    /// - `block_size`: block size the image was formatted with
    pub fn open<P>(image_path: P, block_size: u32) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        // open the "device" for read and write
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_path.as_ref())?;
        let len = file.metadata()?.len();
        if block_size == 0 || len == 0 || len % block_size as u64 != 0 {
            return Err(FsError::InvalidArgument(format!(
                "image of {len} bytes can't be split into {block_size} byte blocks"
            )));
        }
        let num_blocks = u32::try_from(len / block_size as u64).map_err(|_| {
            FsError::InvalidArgument(format!(
                "image of {len} bytes has more than {} blocks",
                u32::MAX
            ))
        })?;
        // Safety
        // the mapping is only valid while no other process truncates the image,
        // we never hand out references that outlive `self`
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(
            "mapped {:?}: {num_blocks} blocks of {block_size} bytes",
            image_path.as_ref()
        );
        Ok(Self {
            mmap,
            block_size,
            num_blocks,
        })
    }

    /// create a zero-filled image file of `num_blocks` blocks and map it,
    /// an existing file is never overwritten
    pub fn create<P>(image_path: P, block_size: u32, num_blocks: u32) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(image_path.as_ref())?;
        // all regions are zero after `set_len`
        file.set_len(block_size as u64 * num_blocks as u64)?;
        drop(file);
        Self::open(image_path, block_size)
    }
}

impl BlockDevice for ImageFile {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn read_block(&self, index: u32, buf: &mut [u8]) -> Result<()> {
        let span = block_span(
            index,
            buf.len(),
            self.block_size,
            self.num_blocks(),
            self.mmap.len(),
        )?;
        buf.copy_from_slice(&self.mmap[span]);
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &[u8]) -> Result<()> {
        let span = block_span(
            index,
            buf.len(),
            self.block_size,
            self.num_blocks(),
            self.mmap.len(),
        )?;
        self.mmap[span].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.mmap.flush()?)
    }
}

/// a block device living entirely in memory
#[derive(Debug, Clone)]
pub struct MemDisk {
    data: Vec<u8>,
    block_size: u32,
    num_blocks: u32,
}

impl MemDisk {
    pub fn new(block_size: u32, num_blocks: u32) -> Self {
        Self {
            data: vec![0u8; block_size as usize * num_blocks as usize],
            block_size,
            num_blocks,
        }
    }

    /// raw bytes of the whole disk
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl BlockDevice for MemDisk {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn read_block(&self, index: u32, buf: &mut [u8]) -> Result<()> {
        let span = block_span(
            index,
            buf.len(),
            self.block_size,
            self.num_blocks(),
            self.data.len(),
        )?;
        buf.copy_from_slice(&self.data[span]);
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &[u8]) -> Result<()> {
        let span = block_span(
            index,
            buf.len(),
            self.block_size,
            self.num_blocks(),
            self.data.len(),
        )?;
        self.data[span].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
