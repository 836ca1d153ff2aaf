use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use log::debug;

use super::errno::Errno;
use super::fs::{AddressSize, BLOCK_BYTES, BLOCK_SIZE, ADDRESS_FIELD_SIZE};

pub type RawBlock = [u8; BLOCK_BYTES];

/*
 * LEGEND:
 * cursor        - the trailing block of the backing file; its first eight
 *                 bytes hold the address of the most recently allocated block
 * max_allowable - `file_length - BLOCK_SIZE`, the first address that can
 *                 never be handed out (it is the cursor block itself)
 * */

/// The backing file seen as an array of blocks addressed by byte offset.
///
/// Holds only the path: every call opens the file, does its I/O and drops the
/// handle, so the file is the sole source of truth between calls.
#[derive(Debug, Clone)]
pub struct BlockDevice {
  realpath: PathBuf,
}

impl BlockDevice {
  pub fn new(realpath: impl AsRef<Path>) -> Self {
    Self {
      realpath: realpath.as_ref().to_owned(),
    }
  }

  pub fn realpath(&self) -> &Path {
    &self.realpath
  }

  fn open(&self) -> Result<File, Errno> {
    OpenOptions::new()
      .read(true)
      .write(true)
      .open(&self.realpath)
      .map_err(|_| Errno::ENOENT("block: can't open backing file"))
  }

  fn check_address(address: AddressSize) -> Result<u64, Errno> {
    if address < 0 || address % BLOCK_SIZE != 0 {
      return Err(Errno::EINVAL("block: address is not block-aligned"));
    }
    Ok(address as u64)
  }

  /// Length of the backing file in bytes.
  pub fn len(&self) -> Result<AddressSize, Errno> {
    let realfile = self.open()?;
    let length = realfile
      .metadata()
      .map_err(|_| Errno::EIO("block: can't stat backing file"))?
      .len();

    AddressSize::try_from(length).map_err(|_| Errno::EIO("block: backing file too large"))
  }

  pub fn read_block(&self, address: AddressSize) -> Result<RawBlock, Errno> {
    let position = Self::check_address(address)?;
    let mut realfile = self.open()?;
    let mut block = [0u8; BLOCK_BYTES];

    realfile
      .seek(SeekFrom::Start(position))
      .map_err(|_| Errno::EIO("block: seek failed"))?;
    realfile
      .read_exact(&mut block)
      .map_err(|_| Errno::EIO("block: short read"))?;

    debug!("block: read {address:#x}");
    Ok(block)
  }

  pub fn write_block(&self, address: AddressSize, block: &RawBlock) -> Result<(), Errno> {
    let position = Self::check_address(address)?;
    let mut realfile = self.open()?;

    realfile
      .seek(SeekFrom::Start(position))
      .map_err(|_| Errno::EIO("block: seek failed"))?;
    realfile
      .write_all(block)
      .map_err(|_| Errno::EIO("block: short write"))?;

    debug!("block: wrote {address:#x}");
    Ok(())
  }
}

// Free-space allocator: a bump cursor persisted in the last block.
impl BlockDevice {
  fn cursor_address(&self) -> Result<AddressSize, Errno> {
    let length = self.len()?;
    if length < 2 * BLOCK_SIZE || length % BLOCK_SIZE != 0 {
      return Err(Errno::EIO("alloc: backing file is not a whole number of blocks"));
    }
    Ok(length - BLOCK_SIZE)
  }

  /// Address of the most recently allocated block.
  pub fn read_cursor(&self) -> Result<AddressSize, Errno> {
    let block = self.read_block(self.cursor_address()?)?;
    let mut cursor = [0u8; ADDRESS_FIELD_SIZE];
    cursor.copy_from_slice(&block[..ADDRESS_FIELD_SIZE]);

    Ok(AddressSize::from_le_bytes(cursor))
  }

  pub fn write_cursor(&self, last_allocated: AddressSize) -> Result<(), Errno> {
    let mut block = [0u8; BLOCK_BYTES];
    block[..ADDRESS_FIELD_SIZE].copy_from_slice(&last_allocated.to_le_bytes());

    self.write_block(self.cursor_address()?, &block)
  }

  /// Hand out the block after the cursor. Addresses are never reused.
  pub fn allocate_block(&mut self) -> Result<AddressSize, Errno> {
    let max_allowable = self.cursor_address()?;
    let last_allocated = self.read_cursor()?;
    let next = last_allocated + BLOCK_SIZE;

    if next >= max_allowable {
      debug!("alloc: full (cursor {last_allocated:#x}, boundary {max_allowable:#x})");
      return Err(Errno::EDQUOT("alloc: no free blocks left"));
    }

    self.write_cursor(next)?;
    debug!("alloc: handed out {next:#x}");

    Ok(next)
  }

  /// How many more calls to [`BlockDevice::allocate_block`] would succeed.
  pub fn free_blocks(&self) -> Result<AddressSize, Errno> {
    let max_allowable = self.cursor_address()?;
    let room = max_allowable - self.read_cursor()?;

    if room <= 0 {
      Ok(0)
    } else {
      Ok((room - 1) / BLOCK_SIZE)
    }
  }
}


// vim:ts=2 sw=2
