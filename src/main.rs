use std::io::{Read, Write};

use clap::Parser;
use regex::Regex;
use vdiskfs::{cli_interface::VdiskCli, mkfs::mkfs, mount::open_image, Geometry};

/// a CLI interface to users to create an image,
/// or to inspect and change the file tree stored in one.
///
/// Every subcommand loads the image, runs one operation and syncs it back.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = VdiskCli::parse();
    match args {
        VdiskCli::Mkfs(args) => {
            let geometry = Geometry {
                block_size: args.block_size,
                total_blocks: args.total_blocks,
                total_inodes: args.inode_count,
            };
            let fs = mkfs(args.image_file_path, geometry)?;
            println!("{}", fs.superblock());
        }
        VdiskCli::Info(args) => {
            let fs = open_image(args.image_file_path)?;
            println!("{}", fs.superblock());
            println!("  Usage: {}", fs.usage());
        }
        VdiskCli::Check(args) => {
            let fs = open_image(args.image_file_path)?;
            fs.check()?;
            println!("clean");
        }
        VdiskCli::Mkdir(args) => {
            let mut fs = open_image(args.image_file_path)?;
            fs.create_dir(&args.path)?;
        }
        VdiskCli::Touch(args) => {
            let mut fs = open_image(args.image_file_path)?;
            fs.create_file(&args.path)?;
        }
        VdiskCli::Write(args) => {
            let mut fs = open_image(args.image_file_path)?;
            let data = match args.data {
                Some(data) => data.into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let written = fs.write_file(&args.path, &data)?;
            println!("{written} bytes written");
        }
        VdiskCli::Read(args) => {
            let fs = open_image(args.image_file_path)?;
            let outcome = fs.read_file(&args.path, args.max_len.unwrap_or(usize::MAX))?;
            std::io::stdout().write_all(&outcome.data)?;
            if outcome.truncated {
                eprintln!("warning: {} is truncated", args.path);
            }
        }
        VdiskCli::Rename(args) => {
            let mut fs = open_image(args.image_file_path)?;
            fs.rename(&args.old_path, &args.new_path)?;
        }
        VdiskCli::Rm(args) => {
            let mut fs = open_image(args.image_file_path)?;
            if args.recursive {
                let removed = fs.delete_recursive(&args.path)?;
                println!("{removed} entries removed");
            } else {
                fs.unlink(&args.path)?;
            }
        }
        VdiskCli::Ls(args) => {
            let fs = open_image(args.image_file_path)?;
            for entry in fs.list_recursive(&args.path)? {
                println!("{}", entry?);
            }
        }
        VdiskCli::Find(args) => {
            let fs = open_image(args.image_file_path)?;
            let pattern = Regex::new(&args.pattern)?;
            for path in fs.find(&args.path, &pattern)? {
                println!("{path}");
            }
        }
    }
    Ok(())
}
