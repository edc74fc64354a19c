use std::path::PathBuf;

use clap::Parser;

use crate::fs::{BLOCK_SIZE, MAX_INODES, TOTAL_BLOCKS};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum VdiskCli {
    /// create a new file system image
    Mkfs(MkfsArgs),
    /// show superblock information
    Info(ImageArgs),
    /// verify the consistency of an image
    Check(ImageArgs),
    /// create a directory
    Mkdir(PathArgs),
    /// create an empty file
    Touch(PathArgs),
    /// replace the content of a file
    Write(WriteArgs),
    /// print the content of a file
    Read(ReadArgs),
    /// move a file or directory
    Rename(RenameArgs),
    /// remove a file or an empty directory
    Rm(RmArgs),
    /// list a directory tree
    Ls(LsArgs),
    /// search names with a regular expression
    Find(FindArgs),
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    /// the block count of the file system
    #[clap(short, long, default_value_t = TOTAL_BLOCKS)]
    pub total_blocks: u32,
    /// the inode count of the file system
    #[clap(short, long, default_value_t = MAX_INODES)]
    pub inode_count: u32,
    /// the block size of the file system
    #[clap(short, long, default_value_t = BLOCK_SIZE)]
    pub block_size: u32,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct PathArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    /// absolute path inside the file system
    pub path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct WriteArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    /// absolute path inside the file system
    pub path: String,
    /// content to write, read from stdin when absent
    #[clap(short, long)]
    pub data: Option<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ReadArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    /// absolute path inside the file system
    pub path: String,
    /// read at most this many bytes
    #[clap(short = 'n', long)]
    pub max_len: Option<usize>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct RenameArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    pub old_path: String,
    pub new_path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct RmArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    pub path: String,
    /// remove directories and their contents
    #[clap(short, long)]
    pub recursive: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct LsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    #[clap(default_value = "/")]
    pub path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct FindArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: PathBuf,
    /// extended regular expression matched against each name
    pub pattern: String,
    /// where to start searching
    #[clap(default_value = "/")]
    pub path: String,
}
