use std::fs::OpenOptions;
use std::path::Path;


use crate::twofs::errno::Errno;
use crate::twofs::fs::AddressSize;

/// Apply `function` until the value stops changing.
pub fn fixedpoint<T, F>(function: F, initial: T) -> T
where
  T: PartialEq + Clone,
  F: Fn(T) -> T,
{
  let mut current = initial;
  loop {
    let next = function(current.clone());
    if next == current {
      return current;
    }
    current = next;
  }
}

/// Unique, not yet existing path in the system temp directory.
#[cfg(test)]
pub fn mktemp() -> String {
  std::env::temp_dir()
    .join(format!("twofs-{}.disk", uuid::Uuid::new_v4()))
    .to_string_lossy()
    .into_owned()
}

/// Create (or resize) a zero-filled disk image of `size` bytes.
pub fn mkdisk(file_path: impl AsRef<Path>, size: AddressSize) -> Result<(), Errno> {
  let size = u64::try_from(size).map_err(|_| Errno::EINVAL("mkdisk: negative size"))?;

  OpenOptions::new()
    .write(true)
    .create(true)
    .open(file_path)
    .and_then(|realfile| realfile.set_len(size))
    .map_err(|_| Errno::EIO("mkdisk: can't create disk image"))
}


// vim:ts=2 sw=2
