use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::twofs::errno::Errno;
use crate::twofs::fs::{AddressSize, BLOCK_SIZE, MIN_BLOCKS};
use crate::twofs::twofs::TwoFsFilesystem;

pub const DEFAULT_DISK: &str = ".disk";
pub const DEFAULT_DISK_SIZE: AddressSize = 5 * 1024 * 1024;

fn default_disk_size() -> AddressSize {
  DEFAULT_DISK_SIZE
}

/// ```yaml
/// machine:
///   disk:
///     path: .disk
///     size: 5242880
/// ```
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSchema {
  pub machine: MachineSection,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSection {
  pub disk: DiskSchema,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DiskSchema {
  pub path: String,
  #[serde(default = "default_disk_size")]
  pub size: AddressSize,
}

#[derive(Debug)]
pub enum MachineError {
  Io(std::io::Error),
  Schema(serde_yaml::Error),
  BadDiskSize(AddressSize),
}

impl fmt::Display for MachineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MachineError::Io(error) => write!(f, "machine: can't read schema: {error}"),
      MachineError::Schema(error) => write!(f, "machine: invalid schema: {error}"),
      MachineError::BadDiskSize(size) => write!(
        f,
        "machine: disk size {size} is not a multiple of {BLOCK_SIZE} of at least {} bytes",
        MIN_BLOCKS * BLOCK_SIZE
      ),
    }
  }
}

impl std::error::Error for MachineError {}

impl From<std::io::Error> for MachineError {
  fn from(error: std::io::Error) -> Self {
    MachineError::Io(error)
  }
}

impl From<serde_yaml::Error> for MachineError {
  fn from(error: serde_yaml::Error) -> Self {
    MachineError::Schema(error)
  }
}

/// Where the disk image lives and how big a fresh one should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
  disk: PathBuf,
  disk_size: AddressSize,
}

impl Machine {
  pub fn new(machine_schema_path: &str) -> Result<Self, MachineError> {
    let machine_schema = std::fs::read_to_string(machine_schema_path)?;
    let base = Path::new(machine_schema_path).parent().unwrap_or_else(|| Path::new(""));

    Self::from_yaml(&machine_schema, base)
  }

  /// Parse a schema; relative disk paths resolve against `base`.
  pub fn from_yaml(yaml: &str, base: &Path) -> Result<Self, MachineError> {
    Self::from_schema(serde_yaml::from_str::<MachineSchema>(yaml)?, base)
  }

  fn from_schema(machine_schema: MachineSchema, base: &Path) -> Result<Self, MachineError> {
    let DiskSchema { path, size } = machine_schema.machine.disk;
    let disk = base.join(path);

    Self::with_disk(disk, size)
  }

  pub fn with_disk(disk: impl Into<PathBuf>, disk_size: AddressSize) -> Result<Self, MachineError> {
    if disk_size % BLOCK_SIZE != 0 || disk_size < MIN_BLOCKS * BLOCK_SIZE {
      return Err(MachineError::BadDiskSize(disk_size));
    }

    Ok(Self {
      disk: disk.into(),
      disk_size,
    })
  }

  pub fn disk(&self) -> &Path {
    &self.disk
  }

  pub fn disk_size(&self) -> AddressSize {
    self.disk_size
  }

  /// Attach to the disk image, formatting it first if it does not exist yet.
  pub fn boot(&self) -> Result<TwoFsFilesystem, Errno> {
    if self.disk.exists() {
      TwoFsFilesystem::from(&self.disk)
    } else {
      info!("machine: no image at {}, formatting", self.disk.display());
      TwoFsFilesystem::mkfs(&self.disk, self.disk_size)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::twofs::fs::Filesystem;
  use crate::util::mktemp;

  #[test]
  fn schema_parses() {
    let yaml = "machine:\n  disk:\n    path: images/test.disk\n    size: 1048576\n";
    let machine = Machine::from_yaml(yaml, Path::new("/srv/twofs")).unwrap();

    assert_eq!(machine.disk(), Path::new("/srv/twofs/images/test.disk"));
    assert_eq!(machine.disk_size(), 1048576);
  }

  #[test]
  fn absolute_disk_path_ignores_base() {
    let yaml = "machine:\n  disk:\n    path: /tmp/abs.disk\n";
    let machine = Machine::from_yaml(yaml, Path::new("/srv/twofs")).unwrap();

    assert_eq!(machine.disk(), Path::new("/tmp/abs.disk"));
    assert_eq!(machine.disk_size(), DEFAULT_DISK_SIZE);
  }

  #[test]
  fn bad_size_rejected() {
    let yaml = "machine:\n  disk:\n    path: x.disk\n    size: 1000\n";
    assert!(matches!(
      Machine::from_yaml(yaml, Path::new("")),
      Err(MachineError::BadDiskSize(1000))
    ));
  }

  #[test]
  fn missing_disk_section_rejected() {
    assert!(matches!(
      Machine::from_yaml("machine: {}\n", Path::new("")),
      Err(MachineError::Schema(_))
    ));
  }

  #[test]
  fn schema_file_on_disk() {
    let schema_path = mktemp();
    std::fs::write(&schema_path, "machine:\n  disk:\n    path: sda.disk\n    size: 8192\n").unwrap();

    let machine = Machine::new(&schema_path).unwrap();
    assert_eq!(machine.disk(), Path::new(&schema_path).parent().unwrap().join("sda.disk"));

    std::fs::remove_file(&schema_path).unwrap();
  }

  #[test]
  fn schema_file_errors() {
    assert!(matches!(Machine::new("/nonexistent/twofs/machine.yaml"), Err(MachineError::Io(_))));

    let schema_path = mktemp();
    std::fs::write(&schema_path, "machine:\n  disk: [not, a, map]\n").unwrap();
    assert!(matches!(Machine::new(&schema_path), Err(MachineError::Schema(_))));
    std::fs::remove_file(&schema_path).unwrap();
  }

  #[test]
  fn boot_formats_then_attaches() {
    let machine = Machine::with_disk(mktemp(), 16 * BLOCK_SIZE).unwrap();

    let mut fs = machine.boot().unwrap();
    fs.create_dir("/docs").unwrap();

    let mut fs = machine.boot().unwrap();
    assert_eq!(fs.read_dir("/").unwrap().names(), vec![".", "..", "docs"]);

    std::fs::remove_file(machine.disk()).unwrap();
  }
}

// vim:ts=2 sw=2
