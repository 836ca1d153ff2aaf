use super::block::RawBlock;
use super::errno::Errno;
use super::fs::{
  AddressSize, ADDRESS_FIELD_SIZE, BLOCK_BYTES, EXTENSION_FIELD_SIZE,
  MAX_DATA_IN_BLOCK, MAX_DIRS, MAX_FILES, NAME_FIELD_SIZE, NO_ADDRESS, SIZE_FIELD_SIZE,
};

// Root block:      i32 count | MAX_DIRS  x (name[9], i64 start)              | padding
// Directory block: i32 count | MAX_FILES x (name[9], ext[4], u64 size, i64 start) | padding
// Data block:      data[MAX_DATA_IN_BLOCK] | i64 next
//
// Records are packed, integers little-endian, names NUL-terminated.

fn take<const N: usize>(bytes: &mut Vec<u8>) -> Result<[u8; N], Errno> {
  if bytes.len() < N {
    return Err(Errno::EIO("layout: truncated block"));
  }
  let mut field = [0u8; N];
  field.copy_from_slice(bytes.drain(0..N).as_slice());
  Ok(field)
}

/// Copy at most `N - 1` bytes of `name` and NUL-terminate.
fn encode_name<const N: usize>(name: &str) -> [u8; N] {
  let mut field = [0u8; N];
  let bytes = name.as_bytes();
  let count = bytes.len().min(N - 1);
  field[..count].copy_from_slice(&bytes[..count]);
  field
}

fn decode_name(field: &[u8]) -> String {
  let end = field.iter().position(|&byte| byte == 0).unwrap_or(field.len());
  String::from_utf8_lossy(&field[..end]).into_owned()
}

fn decode_count(bytes: &mut Vec<u8>, max: usize) -> Result<usize, Errno> {
  let count = i32::from_le_bytes(take(bytes)?);
  match usize::try_from(count) {
    Ok(count) if count <= max => Ok(count),
    _ => Err(Errno::EIO("layout: entry count out of range")),
  }
}

fn into_raw(mut bytes: Vec<u8>) -> RawBlock {
  bytes.resize(BLOCK_BYTES, 0);
  let mut raw = [0u8; BLOCK_BYTES];
  raw.copy_from_slice(&bytes[..BLOCK_BYTES]);
  raw
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
  pub name: String,
  pub start_block: AddressSize,
}

/// Block 0: directory name -> directory block address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootDirectory {
  pub directories: Vec<RootEntry>,
}

impl RootDirectory {
  pub fn decode(raw: &RawBlock) -> Result<Self, Errno> {
    let mut bytes = raw.to_vec();
    let count = decode_count(&mut bytes, MAX_DIRS)?;

    let mut directories = Vec::with_capacity(count);
    for _ in 0..count {
      let name = decode_name(&take::<NAME_FIELD_SIZE>(&mut bytes)?);
      let start_block = AddressSize::from_le_bytes(take(&mut bytes)?);
      directories.push(RootEntry { name, start_block });
    }

    Ok(Self { directories })
  }

  pub fn encode(&self) -> RawBlock {
    let mut bytes = Vec::with_capacity(BLOCK_BYTES);
    bytes.extend_from_slice(&(self.directories.len() as i32).to_le_bytes());
    for entry in &self.directories {
      bytes.extend_from_slice(&encode_name::<NAME_FIELD_SIZE>(&entry.name));
      bytes.extend_from_slice(&entry.start_block.to_le_bytes());
    }
    into_raw(bytes)
  }

  /// Slot index of the directory called `name`.
  pub fn find(&self, name: &str) -> Option<usize> {
    self.directories.iter().position(|entry| entry.name == name)
  }

  pub fn is_full(&self) -> bool {
    self.directories.len() >= MAX_DIRS
  }

  pub fn push(&mut self, name: &str, start_block: AddressSize) -> Result<(), Errno> {
    if self.is_full() {
      return Err(Errno::EDIRSLOTS("layout: root directory table is full"));
    }
    self.directories.push(RootEntry {
      name: name.to_owned(),
      start_block,
    });
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
  pub name: String,
  pub extension: String,
  pub size: u64,
  pub start_block: AddressSize,
}

/// One per subdirectory: (name, extension) -> size and first data block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryBlock {
  pub files: Vec<FileEntry>,
}

impl DirectoryBlock {
  pub fn decode(raw: &RawBlock) -> Result<Self, Errno> {
    let mut bytes = raw.to_vec();
    let count = decode_count(&mut bytes, MAX_FILES)?;

    let mut files = Vec::with_capacity(count);
    for _ in 0..count {
      let name = decode_name(&take::<NAME_FIELD_SIZE>(&mut bytes)?);
      let extension = decode_name(&take::<EXTENSION_FIELD_SIZE>(&mut bytes)?);
      let size = u64::from_le_bytes(take::<SIZE_FIELD_SIZE>(&mut bytes)?);
      let start_block = AddressSize::from_le_bytes(take(&mut bytes)?);
      files.push(FileEntry { name, extension, size, start_block });
    }

    Ok(Self { files })
  }

  pub fn encode(&self) -> RawBlock {
    let mut bytes = Vec::with_capacity(BLOCK_BYTES);
    bytes.extend_from_slice(&(self.files.len() as i32).to_le_bytes());
    for entry in &self.files {
      bytes.extend_from_slice(&encode_name::<NAME_FIELD_SIZE>(&entry.name));
      bytes.extend_from_slice(&encode_name::<EXTENSION_FIELD_SIZE>(&entry.extension));
      bytes.extend_from_slice(&entry.size.to_le_bytes());
      bytes.extend_from_slice(&entry.start_block.to_le_bytes());
    }
    into_raw(bytes)
  }

  /// With `extension == None` the first entry with a matching base name wins;
  /// listings only hand back bare names, so lookups have to accept them.
  pub fn find(&self, name: &str, extension: Option<&str>) -> Option<usize> {
    self.files.iter().position(|entry| {
      entry.name == name && extension.map_or(true, |extension| entry.extension == extension)
    })
  }

  pub fn is_full(&self) -> bool {
    self.files.len() >= MAX_FILES
  }

  pub fn push(&mut self, name: &str, extension: &str, start_block: AddressSize) -> Result<(), Errno> {
    if self.is_full() {
      return Err(Errno::EFILESLOTS("layout: directory file table is full"));
    }
    self.files.push(FileEntry {
      name: name.to_owned(),
      extension: extension.to_owned(),
      size: 0,
      start_block,
    });
    Ok(())
  }
}

/// Chain node holding file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
  pub data: [u8; MAX_DATA_IN_BLOCK],
  pub next_block: AddressSize,
}

impl Default for DataBlock {
  fn default() -> Self {
    Self {
      data: [0u8; MAX_DATA_IN_BLOCK],
      next_block: NO_ADDRESS,
    }
  }
}

impl DataBlock {
  pub fn decode(raw: &RawBlock) -> Self {
    let mut data = [0u8; MAX_DATA_IN_BLOCK];
    data.copy_from_slice(&raw[..MAX_DATA_IN_BLOCK]);

    let mut next_block = [0u8; ADDRESS_FIELD_SIZE];
    next_block.copy_from_slice(&raw[MAX_DATA_IN_BLOCK..]);

    Self {
      data,
      next_block: AddressSize::from_le_bytes(next_block),
    }
  }

  pub fn encode(&self) -> RawBlock {
    let mut raw = [0u8; BLOCK_BYTES];
    raw[..MAX_DATA_IN_BLOCK].copy_from_slice(&self.data);
    raw[MAX_DATA_IN_BLOCK..].copy_from_slice(&self.next_block.to_le_bytes());
    raw
  }

  pub fn has_next(&self) -> bool {
    self.next_block != NO_ADDRESS
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::twofs::fs::{FILE_ENTRY_SIZE, ROOT_ENTRY_SIZE};

  #[test]
  fn root_directory_layout() {
    let mut root = RootDirectory::default();
    root.push("docs", 512).unwrap();
    root.push("music", 1024).unwrap();

    let raw = root.encode();
    assert_eq!(&raw[0..4], &2i32.to_le_bytes());
    assert_eq!(&raw[4..9], b"docs\0");
    assert_eq!(&raw[13..21], &512i64.to_le_bytes());
    assert_eq!(&raw[4 + ROOT_ENTRY_SIZE..4 + ROOT_ENTRY_SIZE + 6], b"music\0");

    assert_eq!(RootDirectory::decode(&raw).unwrap(), root);
    assert_eq!(root.find("music"), Some(1));
    assert_eq!(root.find("Music"), None);
  }

  #[test]
  fn root_directory_capacity() {
    let mut root = RootDirectory::default();
    for i in 0..MAX_DIRS {
      root.push(&format!("d{i}"), 512 * (i as AddressSize + 1)).unwrap();
    }
    assert!(root.is_full());
    assert!(matches!(root.push("extra", 0), Err(Errno::EDIRSLOTS(_))));

    let decoded = RootDirectory::decode(&root.encode()).unwrap();
    assert_eq!(decoded.directories.len(), MAX_DIRS);
  }

  #[test]
  fn directory_block_layout() {
    let mut dir = DirectoryBlock::default();
    dir.push("a", "txt", 1536).unwrap();
    dir.files[0].size = 5;
    dir.push("notes", "md", 2048).unwrap();

    let raw = dir.encode();
    assert_eq!(&raw[4..6], b"a\0");
    assert_eq!(&raw[13..17], b"txt\0");
    assert_eq!(&raw[17..25], &5u64.to_le_bytes());
    assert_eq!(&raw[25..33], &1536i64.to_le_bytes());
    assert_eq!(&raw[4 + FILE_ENTRY_SIZE..4 + FILE_ENTRY_SIZE + 6], b"notes\0");

    assert_eq!(DirectoryBlock::decode(&raw).unwrap(), dir);
  }

  #[test]
  fn directory_lookup_with_and_without_extension() {
    let mut dir = DirectoryBlock::default();
    dir.push("a", "txt", 512).unwrap();
    dir.push("a", "c", 1024).unwrap();

    assert_eq!(dir.find("a", Some("c")), Some(1));
    assert_eq!(dir.find("a", None), Some(0));
    assert_eq!(dir.find("a", Some("rs")), None);
    assert_eq!(dir.find("b", None), None);
  }

  #[test]
  fn names_are_truncated_to_field() {
    let field = encode_name::<NAME_FIELD_SIZE>("abcdefghijk");
    assert_eq!(&field, b"abcdefgh\0");
    assert_eq!(decode_name(&field), "abcdefgh");
  }

  #[test]
  fn corrupt_count_rejected() {
    let mut raw = [0u8; BLOCK_BYTES];
    raw[..4].copy_from_slice(&(MAX_FILES as i32 + 1).to_le_bytes());
    assert!(matches!(DirectoryBlock::decode(&raw), Err(Errno::EIO(_))));

    raw[..4].copy_from_slice(&(-1i32).to_le_bytes());
    assert!(matches!(RootDirectory::decode(&raw), Err(Errno::EIO(_))));
  }

  #[test]
  fn data_block_link_sits_at_the_end() {
    let mut block = DataBlock::default();
    block.data[0] = b'h';
    block.next_block = 4096;

    let raw = block.encode();
    assert_eq!(raw[0], b'h');
    assert_eq!(&raw[MAX_DATA_IN_BLOCK..], &4096i64.to_le_bytes());
    assert_eq!(DataBlock::decode(&raw), block);
    assert!(!DataBlock::default().has_next());
  }
}

// vim:ts=2 sw=2
