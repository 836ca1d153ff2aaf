use fancy_regex::Regex;

use crate::util::fixedpoint;

use super::errno::Errno;
use super::fs::{MAX_EXTENSION, MAX_FILENAME};

/// `/DIR`, `/DIR/NAME` or `/DIR/NAME.EXT`. The extension is everything after
/// the first dot of the last component.
const PATH_PATTERN: &str = r"^/([^/]+)(?:/([^/.]+)(?:\.([^/]*))?)?$";

/// A parsed path. The variant is the path's shape: how many components it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFsPath {
  /// `/`
  Root,
  /// `/DIR`
  Directory { directory: String },
  /// `/DIR/NAME`: a file reference without an extension, only good for lookups
  Bare { directory: String, filename: String },
  /// `/DIR/NAME.EXT`
  Qualified { directory: String, filename: String, extension: String },
}

impl TwoFsPath {
  pub fn parse(pathname: &str) -> Result<Self, Errno> {
    // Guard for empty or relative `pathname`
    match pathname.chars().next() {
      None => return Err(Errno::EINVAL("path: zero-length path")),
      Some(first) if first != '/' => return Err(Errno::EINVAL("path: path must start with '/'")),
      _ => (),
    }

    // Replace all adjacent slashes
    let mut pathname = fixedpoint(|pathname| pathname.replace("//", "/"), pathname.to_owned());

    if pathname == "/" {
      return Ok(TwoFsPath::Root);
    }

    // Remove ending slash if present
    if pathname.ends_with('/') {
      pathname.pop();
    }

    if pathname.matches('/').count() > 2 {
      return Err(Errno::EINVAL("path: only one directory level is supported"));
    }

    let regex = Regex::new(PATH_PATTERN)
      .map_err(|_| Errno::EINVAL("path: can't compile path pattern"))?;
    let captures = regex
      .captures(&pathname)
      .map_err(|_| Errno::EINVAL("path: can't match path pattern"))?
      .ok_or(Errno::EINVAL("path: malformed path"))?;

    let group = |index: usize| captures.get(index).map(|group| group.as_str().to_owned());

    let directory = group(1).ok_or(Errno::EINVAL("path: missing directory name"))?;
    let path = match (group(2), group(3)) {
      (None, _) => TwoFsPath::Directory { directory },
      (Some(filename), None) => TwoFsPath::Bare { directory, filename },
      (Some(filename), Some(extension)) if extension.is_empty() => {
        TwoFsPath::Bare { directory, filename }
      },
      (Some(filename), Some(extension)) => TwoFsPath::Qualified { directory, filename, extension },
    };

    Ok(path)
  }

  /// Number of components: 0 for the root, up to 3 for a qualified file.
  pub fn components(&self) -> usize {
    match self {
      TwoFsPath::Root => 0,
      TwoFsPath::Directory { .. } => 1,
      TwoFsPath::Bare { .. } => 2,
      TwoFsPath::Qualified { .. } => 3,
    }
  }
}

/// Stored names are NUL-terminated, so only printable ASCII survives a round trip.
fn is_storable(name: &str) -> bool {
  name.bytes().all(|byte| byte.is_ascii_graphic())
}

/// Creation-time 8.3 check. Lookups skip it: an over-long name simply never matches.
pub fn check_name(name: &str) -> Result<(), Errno> {
  if name.len() > MAX_FILENAME {
    return Err(Errno::ENAMETOOLONG("path: name longer than 8 characters"));
  }
  if !is_storable(name) {
    return Err(Errno::EINVAL("path: name must be printable ASCII"));
  }
  Ok(())
}

pub fn check_extension(extension: &str) -> Result<(), Errno> {
  if extension.len() > MAX_EXTENSION {
    return Err(Errno::ENAMETOOLONG("path: extension longer than 3 characters"));
  }
  if !is_storable(extension) {
    return Err(Errno::EINVAL("path: extension must be printable ASCII"));
  }
  Ok(())
}


// vim:ts=2 sw=2
