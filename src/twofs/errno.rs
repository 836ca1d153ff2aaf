use std::fmt;

/// Failure kinds surfaced by the filesystem operations.
///
/// Every variant carries a short context message naming the place that failed.
/// Front-ends translate variants into their own status codes via [`Errno::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
  /// No such file or directory
  ENOENT(&'static str),
  /// File exists
  EEXIST(&'static str),
  /// Name too long (8.3 limits exceeded)
  ENAMETOOLONG(&'static str),
  /// Invalid argument
  EINVAL(&'static str),
  /// File too big (write past the end of file)
  EFBIG(&'static str),
  /// Is a directory
  EISDIR(&'static str),
  /// Root directory table is full
  EDIRSLOTS(&'static str),
  /// Directory file table is full
  EFILESLOTS(&'static str),
  /// Allocator exhausted (disk quota exceeded)
  EDQUOT(&'static str),
  /// I/O Error
  EIO(&'static str),
}

impl Errno {
  /// POSIX errno number, as a mounting front-end would report it.
  pub fn code(&self) -> i32 {
    match self {
      Errno::ENOENT(_) => 2,
      Errno::EIO(_) => 5,
      Errno::EEXIST(_) => 17,
      Errno::EISDIR(_) => 21,
      Errno::EINVAL(_) => 22,
      Errno::EFBIG(_) => 27,
      Errno::EDIRSLOTS(_) | Errno::EFILESLOTS(_) => 28,
      Errno::ENAMETOOLONG(_) => 36,
      Errno::EDQUOT(_) => 122,
    }
  }

  pub fn message(&self) -> &'static str {
    match *self {
      Errno::ENOENT(message)
      | Errno::EEXIST(message)
      | Errno::ENAMETOOLONG(message)
      | Errno::EINVAL(message)
      | Errno::EFBIG(message)
      | Errno::EISDIR(message)
      | Errno::EDIRSLOTS(message)
      | Errno::EFILESLOTS(message)
      | Errno::EDQUOT(message)
      | Errno::EIO(message) => message,
    }
  }

  fn description(&self) -> &'static str {
    match self {
      Errno::ENOENT(_) => "no such file or directory",
      Errno::EEXIST(_) => "file exists",
      Errno::ENAMETOOLONG(_) => "name too long",
      Errno::EINVAL(_) => "invalid argument",
      Errno::EFBIG(_) => "file too big",
      Errno::EISDIR(_) => "is a directory",
      Errno::EDIRSLOTS(_) => "no free directory slots",
      Errno::EFILESLOTS(_) => "no free file slots",
      Errno::EDQUOT(_) => "no space left on disk",
      Errno::EIO(_) => "input/output error",
    }
  }
}

impl fmt::Display for Errno {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.description(), self.message())
  }
}

impl std::error::Error for Errno {}


// vim:ts=2 sw=2
