use std::io::Write;

use itertools::Itertools;
use sha2::{Digest, Sha256};

use crate::twofs::errno::Errno;
use crate::twofs::fs::{AddressSize, Effect, FileModeType, Filesystem, BLOCK_SIZE};
use crate::twofs::path::TwoFsPath;
use crate::twofs::twofs::TwoFsFilesystem;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

const DUMP_WIDTH: usize = 32;

/// Print the failure and turn it into the errno number used as exit status.
fn report(command: &str, pathname: &str, errno: Errno) -> i32 {
  eprintln!("{command}: {pathname}: {errno}");
  errno.code()
}

fn report_effect(command: &str, pathname: &str, effect: Effect) -> i32 {
  if effect == Effect::Ignored {
    println!("{command}: {pathname}: accepted, but not supported by twofs (nothing changed)");
  }
  EXIT_SUCCESS
}

/// Join a listing entry to its parent directory path.
fn child_pathname(pathname: &str, child_name: &str) -> String {
  format!("{}/{child_name}", pathname.trim_end_matches('/'))
}

// FS reading stuff

pub fn ls(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  let dir = match fs.read_dir(pathname) {
    Ok(dir) => dir,
    Err(errno) => return report("ls", pathname, errno),
  };

  for entry in dir.entries.iter().filter(|entry| entry.name != "." && entry.name != "..") {
    match entry.file_type {
      FileModeType::Dir => println!("d {:>10}  {}", "-", entry.name),
      FileModeType::File => {
        // Listings carry base names only, which the bare-name lookup resolves
        let size = fs
          .stat(&child_pathname(pathname, &entry.name))
          .map(|stat| stat.size.to_string())
          .unwrap_or_else(|_| String::from("?"));
        println!("- {size:>10}  {}", entry.name);
      },
    }
  }

  EXIT_SUCCESS
}

pub fn stat(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  match fs.stat(pathname) {
    Ok(stat) => {
      let kind = if stat.is_dir() { "directory" } else { "regular file" };
      println!("  File: {pathname}");
      println!("  Type: {kind}");
      println!("  Size: {}", stat.size);
      println!("  Mode: {:o} ({:04o})", stat.mode.get_raw(), stat.mode.permissions());
      println!(" Links: {}", stat.links_count);
      EXIT_SUCCESS
    },
    Err(errno) => report("stat", pathname, errno),
  }
}

pub fn cat(fs: &mut TwoFsFilesystem, pathname: &str, offset: u64, count: Option<usize>) -> i32 {
  let count = match count {
    Some(count) => count,
    None => match fs.stat(pathname) {
      Ok(stat) => stat.size.saturating_sub(offset) as usize,
      Err(errno) => return report("cat", pathname, errno),
    },
  };

  match fs.read_file(pathname, count, offset) {
    Ok(data) => {
      let mut stdout = std::io::stdout();
      if stdout.write_all(&data).and_then(|_| stdout.flush()).is_err() {
        return EXIT_FAILURE;
      }
      EXIT_SUCCESS
    },
    Err(errno) => report("cat", pathname, errno),
  }
}

pub fn sum(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  let data = match fs
    .stat(pathname)
    .and_then(|stat| fs.read_file(pathname, stat.size as usize, 0))
  {
    Ok(data) => data,
    Err(errno) => return report("sum", pathname, errno),
  };

  println!("{}  {pathname}", hex::encode(Sha256::digest(&data)));
  EXIT_SUCCESS
}

pub fn df(fs: &mut TwoFsFilesystem) -> i32 {
  let device = fs.device();
  match device.len().and_then(|length| Ok((length, device.free_blocks()?))) {
    Ok((length, free_blocks)) => {
      println!("disk:   {}", device.realpath().display());
      println!("blocks: {}", length / BLOCK_SIZE);
      println!("free:   {free_blocks} ({} bytes)", free_blocks * BLOCK_SIZE);
      EXIT_SUCCESS
    },
    Err(errno) => report("df", &device.realpath().display().to_string(), errno),
  }
}

/// Hex dump of one raw block, `DUMP_WIDTH` bytes per line.
pub fn dump(fs: &mut TwoFsFilesystem, address: AddressSize) -> i32 {
  let block = match fs.device().read_block(address) {
    Ok(block) => block,
    Err(errno) => return report("dump", &format!("{address:#x}"), errno),
  };

  for (line, chunk) in block.chunks(DUMP_WIDTH).enumerate() {
    let printable: String = chunk
      .iter()
      .map(|&byte| if byte.is_ascii_graphic() { byte as char } else { '.' })
      .collect();
    let hex_groups = hex::encode(chunk)
      .as_bytes()
      .chunks(8)
      .map(|group| String::from_utf8_lossy(group).into_owned())
      .join(" ");
    println!("{:08x}  {hex_groups}  {printable}", address as usize + line * DUMP_WIDTH);
  }

  EXIT_SUCCESS
}

// FS writing stuff

pub fn mkdir(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  match fs.create_dir(pathname) {
    Ok(effect) => report_effect("mkdir", pathname, effect),
    Err(errno) => report("mkdir", pathname, errno),
  }
}

pub fn touch(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  // Existing files are left alone, like touch(1) without timestamps. Only a
  // full NAME.EXT names one file; a bare name would match any extension.
  if let Ok(TwoFsPath::Qualified { .. }) = TwoFsPath::parse(pathname) {
    if fs.stat(pathname).is_ok() {
      return EXIT_SUCCESS;
    }
  }
  match fs.create_file(pathname) {
    Ok(effect) => report_effect("touch", pathname, effect),
    Err(errno) => report("touch", pathname, errno),
  }
}

pub fn write(fs: &mut TwoFsFilesystem, pathname: &str, data: &[u8], offset: u64) -> i32 {
  match fs.write_file(pathname, data, offset) {
    Ok(written) => {
      println!("{written} bytes written");
      EXIT_SUCCESS
    },
    Err(errno) => report("write", pathname, errno),
  }
}

pub fn append(fs: &mut TwoFsFilesystem, pathname: &str, data: &[u8]) -> i32 {
  match fs.stat(pathname) {
    Ok(stat) if stat.is_dir() => report("append", pathname, Errno::EISDIR("append: is a directory")),
    Ok(stat) => write(fs, pathname, data, stat.size),
    Err(errno) => report("append", pathname, errno),
  }
}

pub fn rm(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  match fs.remove_file(pathname) {
    Ok(effect) => report_effect("rm", pathname, effect),
    Err(errno) => report("rm", pathname, errno),
  }
}

pub fn rmdir(fs: &mut TwoFsFilesystem, pathname: &str) -> i32 {
  match fs.remove_dir(pathname) {
    Ok(effect) => report_effect("rmdir", pathname, effect),
    Err(errno) => report("rmdir", pathname, errno),
  }
}

pub fn truncate(fs: &mut TwoFsFilesystem, pathname: &str, size: u64) -> i32 {
  match fs.truncate(pathname, size) {
    Ok(effect) => report_effect("truncate", pathname, effect),
    Err(errno) => report("truncate", pathname, errno),
  }
}


// vim:ts=2 sw=2
