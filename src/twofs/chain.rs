use log::debug;

use super::block::BlockDevice;
use super::errno::Errno;
use super::fs::{AddressSize, MAX_DATA_IN_BLOCK};
use super::layout::DataBlock;

/// Number of chain nodes a file of `size` bytes occupies.
///
/// A node is only linked once a byte lands past the end of the previous one,
/// so an empty file still owns its first node and a file that exactly fills
/// `n` nodes owns `n`, not `n + 1`.
pub fn nodes_for(size: u64) -> u64 {
  let capacity = MAX_DATA_IN_BLOCK as u64;
  ((size + capacity - 1) / capacity).max(1)
}

/// Cursor over a file's data chain.
///
/// `index` is the position inside the current node's data and may equal
/// `MAX_DATA_IN_BLOCK`: the cursor then sits at the end of the node and steps
/// to the next one lazily, on the next byte transferred. Stepping eagerly would
/// follow a link that a write at end-of-file has not allocated yet.
pub struct ChainCursor<'d> {
  device: &'d mut BlockDevice,
  address: AddressSize,
  block: DataBlock,
  index: usize,
  dirty: bool,
}

impl<'d> ChainCursor<'d> {
  pub fn open(device: &'d mut BlockDevice, start_block: AddressSize) -> Result<Self, Errno> {
    let block = DataBlock::decode(&device.read_block(start_block)?);

    Ok(Self {
      device,
      address: start_block,
      block,
      index: 0,
      dirty: false,
    })
  }

  /// Address of the node the cursor currently sits in.
  pub fn address(&self) -> AddressSize {
    self.address
  }

  fn load(&mut self, address: AddressSize) -> Result<(), Errno> {
    self.block = DataBlock::decode(&self.device.read_block(address)?);
    self.address = address;
    self.index = 0;
    self.dirty = false;
    Ok(())
  }

  fn store(&mut self) -> Result<(), Errno> {
    self.device.write_block(self.address, &self.block.encode())?;
    self.dirty = false;
    Ok(())
  }

  /// Skip whole nodes until `offset` falls inside (or at the end of) the current node.
  pub fn seek(&mut self, offset: u64) -> Result<(), Errno> {
    let mut remaining = offset;

    while remaining > MAX_DATA_IN_BLOCK as u64 {
      if !self.block.has_next() {
        return Err(Errno::EIO("chain: offset runs past the last node"));
      }
      let next = self.block.next_block;
      self.load(next)?;
      remaining -= MAX_DATA_IN_BLOCK as u64;
    }

    self.index = remaining as usize;
    Ok(())
  }

  /// Step to the following node for reading. The link must already exist.
  fn step(&mut self) -> Result<(), Errno> {
    if !self.block.has_next() {
      return Err(Errno::EIO("chain: read runs past the last node"));
    }
    let next = self.block.next_block;
    self.load(next)
  }

  /// Step to the following node for writing, linking a fresh block if the
  /// chain ends here. The current node is written back before moving on.
  fn step_allocating(&mut self) -> Result<(), Errno> {
    if !self.block.has_next() {
      self.block.next_block = self.device.allocate_block()?;
      self.dirty = true;
      debug!("chain: linked {:#x} -> {:#x}", self.address, self.block.next_block);
    }
    if self.dirty {
      self.store()?;
    }
    let next = self.block.next_block;
    self.load(next)
  }

  /// Fill `buffer` from the chain, crossing nodes as needed.
  pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Errno> {
    let mut copied = 0;

    while copied < buffer.len() {
      if self.index == MAX_DATA_IN_BLOCK {
        self.step()?;
      }
      let count = (MAX_DATA_IN_BLOCK - self.index).min(buffer.len() - copied);
      buffer[copied..copied + count].copy_from_slice(&self.block.data[self.index..self.index + count]);
      self.index += count;
      copied += count;
    }

    Ok(copied)
  }

  /// Copy all of `data` into the chain, growing it as needed. Call
  /// [`ChainCursor::finish`] afterwards to persist the last touched node.
  pub fn write(&mut self, data: &[u8]) -> Result<usize, Errno> {
    let mut written = 0;

    while written < data.len() {
      if self.index == MAX_DATA_IN_BLOCK {
        self.step_allocating()?;
      }
      let count = (MAX_DATA_IN_BLOCK - self.index).min(data.len() - written);
      self.block.data[self.index..self.index + count].copy_from_slice(&data[written..written + count]);
      self.index += count;
      self.dirty = true;
      written += count;
    }

    Ok(written)
  }

  pub fn finish(mut self) -> Result<(), Errno> {
    if self.dirty {
      self.store()?;
    }
    Ok(())
  }
}


// vim:ts=2 sw=2
