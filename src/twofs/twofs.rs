use std::path::Path;

use log::{debug, info, warn};

use super::block::BlockDevice;
use super::chain::{nodes_for, ChainCursor};
use super::errno::Errno;
use super::fs::{
  AddressSize, Effect, FileModeType, FileStat, Filesystem, VDirectory, BLOCK_SIZE, MIN_BLOCKS,
  ROOT_ADDRESS,
};
use super::layout::{DataBlock, DirectoryBlock, RootDirectory};
use super::path::{check_extension, check_name, TwoFsPath};
use crate::util::mkdisk;

/// A two-level filesystem living in a single backing file.
///
/// Layout: the root directory in block 0, directory and data blocks handed out
/// by a bump allocator, and the allocator's cursor in the last block.
///
/// Nothing is cached between calls and nothing is locked on disk: exclusive
/// access comes from `&mut self`, and two processes sharing one image will
/// corrupt it.
#[derive(Debug)]
pub struct TwoFsFilesystem {
  device: BlockDevice,
}

/// A file entry resolved to its slot in its directory block.
struct Located {
  directory_address: AddressSize,
  directory: DirectoryBlock,
  index: usize,
}

impl Located {
  fn size(&self) -> u64 {
    self.directory.files[self.index].size
  }

  fn start_block(&self) -> AddressSize {
    self.directory.files[self.index].start_block
  }
}

impl TwoFsFilesystem {
  /// Format `device_realpath` as an empty filesystem of `size` bytes,
  /// creating the file if needed.
  pub fn mkfs(device_realpath: impl AsRef<Path>, size: AddressSize) -> Result<Self, Errno> {
    if size % BLOCK_SIZE != 0 || size < MIN_BLOCKS * BLOCK_SIZE {
      return Err(Errno::EINVAL("twofs.mkfs: size must be a whole number of blocks (at least 3)"));
    }

    // Truncate first so that stale blocks from an older image read back as zeroes
    mkdisk(device_realpath.as_ref(), 0)?;
    mkdisk(device_realpath.as_ref(), size)?;

    let device = BlockDevice::new(device_realpath);
    device.write_block(ROOT_ADDRESS, &RootDirectory::default().encode())?;
    device.write_cursor(ROOT_ADDRESS)?;

    info!("twofs: formatted {} ({} blocks)", device.realpath().display(), size / BLOCK_SIZE);
    Ok(Self { device })
  }

  /// Attach to an already formatted backing file.
  pub fn from(device_realpath: impl AsRef<Path>) -> Result<Self, Errno> {
    let device = BlockDevice::new(device_realpath);
    let length = device.len()?;

    if length % BLOCK_SIZE != 0 || length < MIN_BLOCKS * BLOCK_SIZE {
      return Err(Errno::EINVAL("twofs: backing file is not a formatted image"));
    }
    RootDirectory::decode(&device.read_block(ROOT_ADDRESS)?)?;

    Ok(Self { device })
  }

  pub fn device(&self) -> &BlockDevice {
    &self.device
  }

  fn read_root(&self) -> Result<RootDirectory, Errno> {
    RootDirectory::decode(&self.device.read_block(ROOT_ADDRESS)?)
  }

  fn write_root(&self, root: &RootDirectory) -> Result<(), Errno> {
    self.device.write_block(ROOT_ADDRESS, &root.encode())
  }

  fn write_directory(&self, address: AddressSize, directory: &DirectoryBlock) -> Result<(), Errno> {
    self.device.write_block(address, &directory.encode())
  }

  /// Slot of `name` in the root directory table.
  pub fn directory_index(&self, name: &str) -> Result<usize, Errno> {
    self
      .read_root()?
      .find(name)
      .ok_or(Errno::ENOENT("twofs: no such directory"))
  }

  /// Directory block of `name`, with the address it lives at.
  pub fn load_directory(&self, name: &str) -> Result<(AddressSize, DirectoryBlock), Errno> {
    let root = self.read_root()?;
    let index = root.find(name).ok_or(Errno::ENOENT("twofs: no such directory"))?;
    let address = root.directories[index].start_block;

    Ok((address, DirectoryBlock::decode(&self.device.read_block(address)?)?))
  }

  fn locate(&self, directory: &str, filename: &str, extension: Option<&str>) -> Result<Located, Errno> {
    let (directory_address, directory) = self.load_directory(directory)?;
    let index = directory
      .find(filename, extension)
      .ok_or(Errno::ENOENT("twofs: no such file"))?;

    Ok(Located {
      directory_address,
      directory,
      index,
    })
  }

  /// Stored size of a file. Without an extension the first entry with a
  /// matching base name answers.
  pub fn file_size(&self, directory: &str, filename: &str, extension: Option<&str>) -> Result<u64, Errno> {
    Ok(self.locate(directory, filename, extension)?.size())
  }

  /// Lookups treat a malformed path as a name that does not exist.
  fn parse_lookup(pathname: &str) -> Result<TwoFsPath, Errno> {
    let path = TwoFsPath::parse(pathname).map_err(|_| Errno::ENOENT("twofs: malformed path"))?;
    debug!("twofs: lookup {pathname} ({} components)", path.components());
    Ok(path)
  }

  /// Resolve a read/write target to its file entry.
  fn resolve_data_target(&self, pathname: &str) -> Result<Located, Errno> {
    match Self::parse_lookup(pathname)? {
      TwoFsPath::Root => Err(Errno::EISDIR("twofs: root is a directory")),
      TwoFsPath::Directory { directory } => match self.directory_index(&directory) {
        Ok(_) => Err(Errno::EISDIR("twofs: is a directory")),
        Err(errno) => Err(errno),
      },
      TwoFsPath::Qualified { directory, filename, extension } => {
        self.locate(&directory, &filename, Some(extension.as_str()))
      },
      TwoFsPath::Bare { .. } => Err(Errno::ENOENT("twofs: file reference needs an extension")),
    }
  }
}

impl Filesystem for TwoFsFilesystem {
  fn stat(&mut self, pathname: &str)
    -> Result<FileStat, Errno> {
    match Self::parse_lookup(pathname)? {
      TwoFsPath::Root => Ok(FileStat::directory()),
      TwoFsPath::Directory { directory } => {
        self.directory_index(&directory)?;
        Ok(FileStat::directory())
      },
      TwoFsPath::Bare { directory, filename } => {
        Ok(FileStat::regular(self.file_size(&directory, &filename, None)?))
      },
      TwoFsPath::Qualified { directory, filename, extension } => {
        Ok(FileStat::regular(self.file_size(&directory, &filename, Some(extension.as_str()))?))
      },
    }
  }

  fn read_dir(&mut self, pathname: &str)
    -> Result<VDirectory, Errno> {
    let mut listing = VDirectory::new();

    match Self::parse_lookup(pathname)? {
      TwoFsPath::Root => {
        for entry in self.read_root()?.directories {
          listing.push(&entry.name, FileModeType::Dir);
        }
      },
      TwoFsPath::Directory { directory } => {
        let (_, directory) = self.load_directory(&directory)?;
        // Base names only: the extension is not part of the listing
        for entry in directory.files {
          listing.push(&entry.name, FileModeType::File);
        }
      },
      _ => return Err(Errno::ENOENT("twofs.read_dir: not a directory path")),
    }

    debug!("twofs: {pathname} lists {:?}", listing.names());
    Ok(listing)
  }

  fn create_dir(&mut self, pathname: &str)
    -> Result<Effect, Errno> {
    let directory = match TwoFsPath::parse(pathname)? {
      TwoFsPath::Directory { directory } => directory,
      _ => return Err(Errno::EINVAL("twofs.create_dir: directories live directly under the root")),
    };

    check_name(&directory)?;
    if directory.contains('.') {
      return Err(Errno::EINVAL("twofs.create_dir: directory names take no extension"));
    }

    let mut root = self.read_root()?;
    if root.find(&directory).is_some() {
      return Err(Errno::EEXIST("twofs.create_dir: directory already exists"));
    }
    if root.is_full() {
      warn!("twofs: root directory table is full, can't create {directory}");
      return Err(Errno::EDIRSLOTS("twofs.create_dir: root directory table is full"));
    }

    let address = self.device.allocate_block()?;
    self.write_directory(address, &DirectoryBlock::default())?;
    root.push(&directory, address)?;
    self.write_root(&root)?;

    info!("twofs: mkdir /{directory} at {address:#x}");
    Ok(Effect::Applied)
  }

  fn create_file(&mut self, pathname: &str)
    -> Result<Effect, Errno> {
    // Files without an extension can't be created
    let (directory, filename, extension) = match TwoFsPath::parse(pathname)? {
      TwoFsPath::Qualified { directory, filename, extension } => (directory, filename, extension),
      _ => return Err(Errno::EINVAL("twofs.create_file: expected /DIR/NAME.EXT")),
    };

    check_name(&filename)?;
    check_extension(&extension)?;

    let (directory_address, mut entries) = self.load_directory(&directory)?;
    if entries.find(&filename, Some(extension.as_str())).is_some() {
      return Err(Errno::EEXIST("twofs.create_file: file already exists"));
    }
    if entries.is_full() {
      warn!("twofs: /{directory} is full, can't create {filename}.{extension}");
      return Err(Errno::EFILESLOTS("twofs.create_file: directory file table is full"));
    }

    let address = self.device.allocate_block()?;
    self.device.write_block(address, &DataBlock::default().encode())?;
    entries.push(&filename, &extension, address)?;
    self.write_directory(directory_address, &entries)?;

    info!("twofs: mknod /{directory}/{filename}.{extension} at {address:#x}");
    Ok(Effect::Applied)
  }

  fn read_file(&mut self, pathname: &str, count: usize, offset: u64)
    -> Result<Vec<u8>, Errno> {
    let located = self.resolve_data_target(pathname)?;
    let size = located.size();

    if count == 0 {
      return Ok(Vec::new());
    }
    if offset > size {
      return Err(Errno::EINVAL("twofs.read_file: offset past end of file"));
    }

    let count = count.min((size - offset) as usize);
    let mut buffer = vec![0u8; count];
    if count == 0 {
      return Ok(buffer);
    }

    let mut cursor = ChainCursor::open(&mut self.device, located.start_block())?;
    cursor.seek(offset)?;
    cursor.read(&mut buffer)?;

    debug!("twofs: read {count} bytes of {pathname} at {offset}");
    Ok(buffer)
  }

  fn write_file(&mut self, pathname: &str, data: &[u8], offset: u64)
    -> Result<usize, Errno> {
    let mut located = self.resolve_data_target(pathname)?;
    let size = located.size();

    if data.is_empty() {
      return Ok(0);
    }
    if offset > size {
      return Err(Errno::EFBIG("twofs.write_file: offset past end of file"));
    }

    let new_size = size.max(offset + data.len() as u64);
    let needed = nodes_for(new_size) - nodes_for(size);
    if needed > 0 && needed > self.device.free_blocks()? as u64 {
      warn!("twofs: {pathname} needs {needed} more blocks, disk is full");
      return Err(Errno::EDQUOT("twofs.write_file: not enough free blocks"));
    }

    // Size goes to disk before the data does. A crash in between leaves a
    // file whose declared size exceeds its written content.
    if new_size > size {
      located.directory.files[located.index].size = new_size;
      self.write_directory(located.directory_address, &located.directory)?;
    }

    let mut cursor = ChainCursor::open(&mut self.device, located.start_block())?;
    cursor.seek(offset)?;
    let written = cursor.write(data)?;
    let last_node = cursor.address();
    cursor.finish()?;

    debug!("twofs: wrote {written} bytes to {pathname} at {offset}, size now {new_size}, last node {last_node:#x}");
    Ok(written)
  }

  fn remove_dir(&mut self, pathname: &str)
    -> Result<Effect, Errno> {
    warn!("twofs: rmdir {pathname} accepted, removal is not supported");
    Ok(Effect::Ignored)
  }

  fn remove_file(&mut self, pathname: &str)
    -> Result<Effect, Errno> {
    warn!("twofs: unlink {pathname} accepted, removal is not supported");
    Ok(Effect::Ignored)
  }

  fn truncate(&mut self, pathname: &str, size: u64)
    -> Result<Effect, Errno> {
    warn!("twofs: truncate {pathname} to {size} accepted, truncation is not supported");
    Ok(Effect::Ignored)
  }

  fn open(&mut self, _pathname: &str)
    -> Result<Effect, Errno> {
    Ok(Effect::Ignored)
  }

  fn flush(&mut self, _pathname: &str)
    -> Result<Effect, Errno> {
    Ok(Effect::Ignored)
  }

  fn name(&self) -> &'static str {
    "twofs"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::twofs::fs::{BLOCK_BYTES, MAX_DATA_IN_BLOCK, MAX_DIRS, MAX_FILES};
  use crate::util::mktemp;

  /// Formatted image removed again when the test ends.
  struct TempDisk {
    realpath: String,
    fs: TwoFsFilesystem,
  }

  impl TempDisk {
    fn new(blocks: AddressSize) -> Self {
      let realpath = mktemp();
      let fs = TwoFsFilesystem::mkfs(&realpath, blocks * BLOCK_SIZE).unwrap();
      Self { realpath, fs }
    }
  }

  impl Drop for TempDisk {
    fn drop(&mut self) {
      let _ = std::fs::remove_file(&self.realpath);
    }
  }

  fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
  }

  #[test]
  fn end_to_end_hello() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;

    assert_eq!(fs.create_dir("/docs").unwrap(), Effect::Applied);
    assert_eq!(fs.create_file("/docs/a.txt").unwrap(), Effect::Applied);
    assert_eq!(fs.stat("/docs/a.txt").unwrap(), FileStat::regular(0));

    assert_eq!(fs.write_file("/docs/a.txt", b"hello", 0).unwrap(), 5);
    assert_eq!(fs.stat("/docs/a.txt").unwrap().size, 5);
    assert_eq!(fs.read_file("/docs/a.txt", 5, 0).unwrap(), b"hello");
  }

  #[test]
  fn mkdir_then_stat_and_list() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;

    for name in ["a", "docs", "abcdefgh", "MiXeD"] {
      fs.create_dir(&format!("/{name}")).unwrap();
      assert!(fs.stat(&format!("/{name}")).unwrap().is_dir());

      let listing = fs.read_dir("/").unwrap();
      assert_eq!(listing.names().iter().filter(|entry| **entry == name).count(), 1);
    }

    assert_eq!(fs.read_dir("/").unwrap().names(), vec![".", "..", "a", "docs", "abcdefgh", "MiXeD"]);
    assert!(matches!(fs.stat("/mixed"), Err(Errno::ENOENT(_))));
  }

  #[test]
  fn stat_root_and_missing() {
    let mut disk = TempDisk::new(16);
    let fs = &mut disk.fs;

    assert!(fs.stat("/").unwrap().is_dir());
    assert!(matches!(fs.stat("/nope"), Err(Errno::ENOENT(_))));
    assert!(matches!(fs.stat("/nope/a.txt"), Err(Errno::ENOENT(_))));
    assert!(matches!(fs.stat("/a/b/c.txt"), Err(Errno::ENOENT(_))));
    assert!(matches!(fs.stat("relative"), Err(Errno::ENOENT(_))));
  }

  #[test]
  fn stat_bare_name_matches_first_file() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;

    fs.create_dir("/src").unwrap();
    fs.create_file("/src/main.rs").unwrap();
    fs.create_file("/src/main.c").unwrap();
    fs.write_file("/src/main.c", b"int", 0).unwrap();

    assert_eq!(fs.stat("/src/main").unwrap(), FileStat::regular(0));
    assert_eq!(fs.stat("/src/main.c").unwrap().size, 3);
    assert!(matches!(fs.stat("/src/main.py"), Err(Errno::ENOENT(_))));
  }

  #[test]
  fn listing_shows_base_names_and_is_stable() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;

    fs.create_dir("/docs").unwrap();
    fs.create_file("/docs/b.md").unwrap();
    fs.create_file("/docs/a.txt").unwrap();

    let first = fs.read_dir("/docs").unwrap();
    assert_eq!(first.names(), vec![".", "..", "b", "a"]);
    assert_eq!(fs.read_dir("/docs").unwrap(), first);
    assert_eq!(fs.read_dir("/docs").unwrap(), first);

    assert!(matches!(fs.read_dir("/docs/a.txt"), Err(Errno::ENOENT(_))));
    assert!(matches!(fs.read_dir("/missing"), Err(Errno::ENOENT(_))));
  }

  #[test]
  fn create_dir_errors() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;

    assert!(matches!(fs.create_dir("/toolongname"), Err(Errno::ENAMETOOLONG(_))));
    assert!(matches!(fs.create_dir("/docs/sub"), Err(Errno::EINVAL(_))));
    assert!(matches!(fs.create_dir("/"), Err(Errno::EINVAL(_))));
    assert!(matches!(fs.create_dir("/a.b"), Err(Errno::EINVAL(_))));

    fs.create_dir("/docs").unwrap();
    assert!(matches!(fs.create_dir("/docs"), Err(Errno::EEXIST(_))));
  }

  #[test]
  fn create_file_errors() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/docs").unwrap();

    assert!(matches!(fs.create_file("/docs/noext"), Err(Errno::EINVAL(_))));
    assert!(matches!(fs.create_file("/docs"), Err(Errno::EINVAL(_))));
    assert!(matches!(fs.create_file("/docs/waytoolong.txt"), Err(Errno::ENAMETOOLONG(_))));
    assert!(matches!(fs.create_file("/docs/a.json"), Err(Errno::ENAMETOOLONG(_))));
    assert!(matches!(fs.create_file("/missing/a.txt"), Err(Errno::ENOENT(_))));

    fs.create_file("/docs/a.txt").unwrap();
    assert!(matches!(fs.create_file("/docs/a.txt"), Err(Errno::EEXIST(_))));
    // Same base name, different extension is a different file
    assert_eq!(fs.create_file("/docs/a.md").unwrap(), Effect::Applied);
  }

  #[test]
  fn embedded_nul_cannot_shadow_existing_names() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;

    fs.create_dir("/a").unwrap();
    assert!(matches!(fs.create_dir("/a\0x"), Err(Errno::EINVAL(_))));
    assert_eq!(fs.read_dir("/").unwrap().names(), vec![".", "..", "a"]);

    fs.create_file("/a/f.txt").unwrap();
    assert!(matches!(fs.create_file("/a/f\0z.txt"), Err(Errno::EINVAL(_))));
    assert!(matches!(fs.create_file("/a/g.t\0"), Err(Errno::EINVAL(_))));
    assert_eq!(fs.read_dir("/a").unwrap().names(), vec![".", "..", "f"]);
  }

  #[test]
  fn directory_slots_run_out() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;

    for i in 0..MAX_DIRS {
      fs.create_dir(&format!("/d{i}")).unwrap();
    }
    assert!(matches!(fs.create_dir("/onemore"), Err(Errno::EDIRSLOTS(_))));
    assert_eq!(fs.read_dir("/").unwrap().entries.len(), MAX_DIRS + 2);
  }

  #[test]
  fn file_slots_run_out() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/docs").unwrap();

    for i in 0..MAX_FILES {
      fs.create_file(&format!("/docs/f{i}.txt")).unwrap();
    }
    assert!(matches!(fs.create_file("/docs/extra.txt"), Err(Errno::EFILESLOTS(_))));
  }

  #[test]
  fn allocator_exhaustion_fails_creation_cleanly() {
    // root + 2 allocatable + cursor
    let mut disk = TempDisk::new(4);
    let fs = &mut disk.fs;

    fs.create_dir("/docs").unwrap();
    fs.create_file("/docs/a.txt").unwrap();
    assert!(matches!(fs.create_file("/docs/b.txt"), Err(Errno::EDQUOT(_))));
    assert!(matches!(fs.create_dir("/more"), Err(Errno::EDQUOT(_))));

    assert_eq!(fs.read_dir("/docs").unwrap().names(), vec![".", "..", "a"]);
    assert_eq!(fs.read_dir("/").unwrap().names(), vec![".", "..", "docs"]);
  }

  #[test]
  fn empty_read_of_new_file() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;
    fs.create_dir("/x").unwrap();

    for (name, extension) in [("a", "b"), ("abcdefgh", "xyz"), ("1", "c")] {
      let pathname = format!("/x/{name}.{extension}");
      fs.create_file(&pathname).unwrap();
      assert_eq!(fs.read_file(&pathname, 0, 0).unwrap(), Vec::<u8>::new());
      assert_eq!(fs.read_file(&pathname, 10, 0).unwrap(), Vec::<u8>::new());
    }
  }

  #[test]
  fn round_trip_within_one_block() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();

    for len in [1, 2, 100, MAX_DATA_IN_BLOCK - 1, MAX_DATA_IN_BLOCK] {
      let pathname = format!("/d/f{len}.bin");
      let data = pattern(len);
      fs.create_file(&pathname).unwrap();

      assert_eq!(fs.write_file(&pathname, &data, 0).unwrap(), len);
      assert_eq!(fs.read_file(&pathname, len, 0).unwrap(), data);
    }
  }

  #[test]
  fn round_trip_across_three_blocks() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/big.bin").unwrap();

    let data = pattern(MAX_DATA_IN_BLOCK * 3 + 17);
    assert_eq!(fs.write_file("/d/big.bin", &data, 0).unwrap(), data.len());
    assert_eq!(fs.stat("/d/big.bin").unwrap().size, data.len() as u64);
    assert_eq!(fs.read_file("/d/big.bin", data.len(), 0).unwrap(), data);
  }

  #[test]
  fn read_in_two_halves() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/big.bin").unwrap();

    let data = pattern(MAX_DATA_IN_BLOCK + 301);
    fs.write_file("/d/big.bin", &data, 0).unwrap();

    let half = data.len() / 2;
    let mut joined = fs.read_file("/d/big.bin", half, 0).unwrap();
    joined.extend(fs.read_file("/d/big.bin", data.len() - half, half as u64).unwrap());
    assert_eq!(joined, data);
  }

  #[test]
  fn read_clamps_to_end_of_file() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/a.txt").unwrap();
    fs.write_file("/d/a.txt", b"hello world", 0).unwrap();

    assert_eq!(fs.read_file("/d/a.txt", 4096, 0).unwrap(), b"hello world");
    assert_eq!(fs.read_file("/d/a.txt", 4096, 6).unwrap(), b"world");
    assert_eq!(fs.read_file("/d/a.txt", 4096, 11).unwrap(), Vec::<u8>::new());
    assert!(matches!(fs.read_file("/d/a.txt", 1, 12), Err(Errno::EINVAL(_))));
  }

  #[test]
  fn append_at_end_extends_exactly() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/log.txt").unwrap();

    fs.write_file("/d/log.txt", b"abc", 0).unwrap();
    assert_eq!(fs.write_file("/d/log.txt", b"defg", 3).unwrap(), 4);
    assert_eq!(fs.stat("/d/log.txt").unwrap().size, 7);
    assert_eq!(fs.read_file("/d/log.txt", 7, 0).unwrap(), b"abcdefg");

    assert!(matches!(fs.write_file("/d/log.txt", b"x", 8), Err(Errno::EFBIG(_))));
    assert_eq!(fs.stat("/d/log.txt").unwrap().size, 7);
  }

  #[test]
  fn append_across_block_boundary() {
    let mut disk = TempDisk::new(64);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/log.txt").unwrap();

    let first = pattern(MAX_DATA_IN_BLOCK);
    fs.write_file("/d/log.txt", &first, 0).unwrap();
    fs.write_file("/d/log.txt", b"more", MAX_DATA_IN_BLOCK as u64).unwrap();

    let mut expected = first.clone();
    expected.extend_from_slice(b"more");
    assert_eq!(fs.stat("/d/log.txt").unwrap().size, expected.len() as u64);
    assert_eq!(fs.read_file("/d/log.txt", expected.len(), 0).unwrap(), expected);
  }

  #[test]
  fn overwrite_inside_file_keeps_size() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/a.txt").unwrap();
    fs.write_file("/d/a.txt", b"hello world", 0).unwrap();

    fs.write_file("/d/a.txt", b"HELLO", 0).unwrap();
    assert_eq!(fs.stat("/d/a.txt").unwrap().size, 11);
    assert_eq!(fs.read_file("/d/a.txt", 11, 0).unwrap(), b"HELLO world");
  }

  #[test]
  fn write_that_does_not_fit_changes_nothing() {
    // root + dir + head node + 1 spare + cursor
    let mut disk = TempDisk::new(5);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/a.bin").unwrap();

    let data = pattern(MAX_DATA_IN_BLOCK * 2 + 1);
    assert!(matches!(fs.write_file("/d/a.bin", &data, 0), Err(Errno::EDQUOT(_))));
    assert_eq!(fs.stat("/d/a.bin").unwrap().size, 0);

    // Two nodes still fit
    let data = pattern(MAX_DATA_IN_BLOCK * 2);
    assert_eq!(fs.write_file("/d/a.bin", &data, 0).unwrap(), data.len());
    assert_eq!(fs.read_file("/d/a.bin", data.len(), 0).unwrap(), data);
  }

  #[test]
  fn data_ops_on_directories() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();

    assert!(matches!(fs.read_file("/d", 1, 0), Err(Errno::EISDIR(_))));
    assert!(matches!(fs.write_file("/d", b"x", 0), Err(Errno::EISDIR(_))));
    assert!(matches!(fs.read_file("/", 1, 0), Err(Errno::EISDIR(_))));
    assert!(matches!(fs.read_file("/e", 1, 0), Err(Errno::ENOENT(_))));
    assert!(matches!(fs.read_file("/d/a", 1, 0), Err(Errno::ENOENT(_))));
  }

  #[test]
  fn removal_and_truncation_are_ignored() {
    let mut disk = TempDisk::new(32);
    let fs = &mut disk.fs;
    fs.create_dir("/d").unwrap();
    fs.create_file("/d/a.txt").unwrap();
    fs.write_file("/d/a.txt", b"keep", 0).unwrap();

    assert_eq!(fs.remove_file("/d/a.txt").unwrap(), Effect::Ignored);
    assert_eq!(fs.truncate("/d/a.txt", 0).unwrap(), Effect::Ignored);
    assert_eq!(fs.remove_dir("/d").unwrap(), Effect::Ignored);
    assert_eq!(fs.open("/d/a.txt").unwrap(), Effect::Ignored);
    assert_eq!(fs.flush("/d/a.txt").unwrap(), Effect::Ignored);
    assert_eq!(fs.remove_file("/never/existed.txt").unwrap(), Effect::Ignored);

    assert_eq!(fs.read_file("/d/a.txt", 4, 0).unwrap(), b"keep");
    assert_eq!(fs.read_dir("/").unwrap().names(), vec![".", "..", "d"]);
  }

  #[test]
  fn state_survives_reattach() {
    let mut disk = TempDisk::new(32);
    disk.fs.create_dir("/docs").unwrap();
    disk.fs.create_file("/docs/a.txt").unwrap();
    disk.fs.write_file("/docs/a.txt", b"persisted", 0).unwrap();

    let mut reattached = TwoFsFilesystem::from(&disk.realpath).unwrap();
    assert_eq!(reattached.read_file("/docs/a.txt", 9, 0).unwrap(), b"persisted");
    reattached.create_file("/docs/b.txt").unwrap();
    assert_eq!(disk.fs.read_dir("/docs").unwrap().names(), vec![".", "..", "a", "b"]);
  }

  #[test]
  fn attach_rejects_bad_images() {
    let realpath = mktemp();
    assert!(matches!(TwoFsFilesystem::from(&realpath), Err(Errno::ENOENT(_))));

    std::fs::write(&realpath, vec![0u8; 700]).unwrap();
    assert!(matches!(TwoFsFilesystem::from(&realpath), Err(Errno::EINVAL(_))));
    std::fs::remove_file(&realpath).unwrap();

    assert!(matches!(TwoFsFilesystem::mkfs(&realpath, 1000), Err(Errno::EINVAL(_))));
    assert!(matches!(TwoFsFilesystem::mkfs(&realpath, BLOCK_SIZE * 2), Err(Errno::EINVAL(_))));
  }

  #[test]
  fn mkfs_wipes_previous_image() {
    let mut disk = TempDisk::new(16);
    disk.fs.create_dir("/old").unwrap();

    let mut fresh = TwoFsFilesystem::mkfs(&disk.realpath, 16 * BLOCK_SIZE).unwrap();
    assert_eq!(fresh.read_dir("/").unwrap().names(), vec![".", ".."]);
    assert_eq!(fresh.device().read_cursor().unwrap(), ROOT_ADDRESS);
    assert_eq!(fresh.device().read_block(BLOCK_SIZE).unwrap(), [0u8; BLOCK_BYTES]);
  }
}

// vim:ts=2 sw=2
