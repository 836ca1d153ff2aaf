use core::fmt::Debug;

use super::errno::Errno;

/// Byte offset into the backing file. Signed, matching the on-disk `i64` links.
pub type AddressSize = i64;

pub const BLOCK_SIZE: AddressSize = 512;
pub const BLOCK_BYTES: usize = BLOCK_SIZE as usize;

/// 8.3 names
pub const MAX_FILENAME: usize = 8;
pub const MAX_EXTENSION: usize = 3;

/// Names are stored NUL-terminated, so each field is one byte wider than the name.
pub const NAME_FIELD_SIZE: usize = MAX_FILENAME + 1;
pub const EXTENSION_FIELD_SIZE: usize = MAX_EXTENSION + 1;

pub const COUNT_FIELD_SIZE: usize = std::mem::size_of::<i32>();
pub const ADDRESS_FIELD_SIZE: usize = std::mem::size_of::<AddressSize>();
pub const SIZE_FIELD_SIZE: usize = std::mem::size_of::<u64>();

pub const ROOT_ENTRY_SIZE: usize = NAME_FIELD_SIZE + ADDRESS_FIELD_SIZE;
pub const FILE_ENTRY_SIZE: usize =
  NAME_FIELD_SIZE + EXTENSION_FIELD_SIZE + SIZE_FIELD_SIZE + ADDRESS_FIELD_SIZE;

/// How many directories fit in the root block
pub const MAX_DIRS: usize = (BLOCK_BYTES - COUNT_FIELD_SIZE) / ROOT_ENTRY_SIZE;
/// How many files fit in one directory block
pub const MAX_FILES: usize = (BLOCK_BYTES - COUNT_FIELD_SIZE) / FILE_ENTRY_SIZE;
/// Payload of one chain node; the trailing field links to the next node.
pub const MAX_DATA_IN_BLOCK: usize = BLOCK_BYTES - ADDRESS_FIELD_SIZE;

pub const ROOT_ADDRESS: AddressSize = 0;

/// `next_block` sentinel: the chain ends here. Address 0 is the root block,
/// so it can never be a data block.
pub const NO_ADDRESS: AddressSize = 0;

/// A filesystem needs the root block, at least one allocatable block and the cursor block.
pub const MIN_BLOCKS: AddressSize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileModeType {
  File,
  Dir,
}

/// Fixed modes: `S_IFDIR | 0755` for directories and `S_IFREG | 0666` for files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

impl FileMode {
  const S_IFDIR: u32 = 0o040000;
  const S_IFREG: u32 = 0o100000;

  pub fn directory() -> Self {
    Self(Self::S_IFDIR | 0o755)
  }

  pub fn regular() -> Self {
    Self(Self::S_IFREG | 0o666)
  }

  pub fn r#type(&self) -> FileModeType {
    if self.0 & Self::S_IFDIR != 0 {
      FileModeType::Dir
    } else {
      FileModeType::File
    }
  }

  pub fn permissions(&self) -> u32 {
    self.0 & 0o777
  }

  pub fn get_raw(&self) -> u32 {
    self.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
  pub mode: FileMode,
  pub size: u64,
  pub links_count: u32,
}

impl FileStat {
  pub fn directory() -> Self {
    Self {
      mode: FileMode::directory(),
      size: 0,
      links_count: 2,
    }
  }

  pub fn regular(size: u64) -> Self {
    Self {
      mode: FileMode::regular(),
      size,
      links_count: 2,
    }
  }

  pub fn is_dir(&self) -> bool {
    self.mode.r#type() == FileModeType::Dir
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VDirectoryEntry {
  pub name: String,
  pub file_type: FileModeType,
}

impl VDirectoryEntry {
  pub fn new(name: &str, file_type: FileModeType) -> Self {
    Self {
      name: name.to_owned(),
      file_type,
    }
  }
}

/// Directory listing in on-disk order, `.` and `..` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VDirectory {
  pub entries: Vec<VDirectoryEntry>,
}

impl VDirectory {
  pub fn new() -> Self {
    Self {
      entries: vec![
        VDirectoryEntry::new(".", FileModeType::Dir),
        VDirectoryEntry::new("..", FileModeType::Dir),
      ],
    }
  }

  pub fn push(&mut self, name: &str, file_type: FileModeType) {
    self.entries.push(VDirectoryEntry::new(name, file_type));
  }

  pub fn names(&self) -> Vec<&str> {
    self.entries.iter().map(|entry| entry.name.as_str()).collect()
  }
}

/// What a mutating request did to the image.
///
/// Removal, truncation, open and flush are accepted but never persist anything;
/// they report [`Effect::Ignored`] so callers can tell "accepted" from "took effect".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
  Applied,
  Ignored,
}

/// The operation set a mounting front-end drives.
///
/// Every operation takes `&mut self`: one caller at a time owns the backing file
/// for the whole request.
pub trait Filesystem {
  fn stat(&mut self, pathname: &str)
    -> Result<FileStat, Errno>;

  fn read_dir(&mut self, pathname: &str)
    -> Result<VDirectory, Errno>;

  fn create_dir(&mut self, pathname: &str)
    -> Result<Effect, Errno>;

  fn create_file(&mut self, pathname: &str)
    -> Result<Effect, Errno>;

  /// Read up to `count` bytes starting at `offset`.
  fn read_file(&mut self, pathname: &str, count: usize, offset: u64)
    -> Result<Vec<u8>, Errno>;

  /// Write all of `data` at `offset`, returning the number of bytes written.
  fn write_file(&mut self, pathname: &str, data: &[u8], offset: u64)
    -> Result<usize, Errno>;

  fn remove_dir(&mut self, pathname: &str)
    -> Result<Effect, Errno>;

  fn remove_file(&mut self, pathname: &str)
    -> Result<Effect, Errno>;

  fn truncate(&mut self, pathname: &str, size: u64)
    -> Result<Effect, Errno>;

  fn open(&mut self, pathname: &str)
    -> Result<Effect, Errno>;

  fn flush(&mut self, pathname: &str)
    -> Result<Effect, Errno>;

  fn name(&self) -> &'static str;
}

impl Debug for dyn Filesystem {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "Filesystem {{ {} }}", self.name())
  }
}


// vim:ts=2 sw=2
