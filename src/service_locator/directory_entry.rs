use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

// -----------------------------------------------------------------------------
// Directory Entry Type
// -----------------------------------------------------------------------------

/// Kind of a node in the locator's directory graph.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DirectoryEntryType {
  /// A login-capable principal.
  Account,
  /// A grouping node; may parent accounts and other directories.
  Directory,
}

// -----------------------------------------------------------------------------
// Directory Entry
// -----------------------------------------------------------------------------

/// A node in the locator's directory graph, identified by `(type, id)`.
///
/// The root directory is `*` with id `0`. Ids are unique per type
/// namespace and never reused by a store.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
  /// Whether this entry is an account or a directory.
  pub entry_type: DirectoryEntryType,
  /// Store-assigned unique id.
  pub id: u32,
  /// Display name; mutable via rename.
  pub name: String,
}

impl DirectoryEntry {
  /// Constructs an account entry.
  pub fn account<T: Into<String>>(id: u32, name: T) -> Self {
    Self {
      entry_type: DirectoryEntryType::Account,
      id,
      name: name.into(),
    }
  }

  /// Constructs a directory entry.
  pub fn directory<T: Into<String>>(id: u32, name: T) -> Self {
    Self {
      entry_type: DirectoryEntryType::Directory,
      id,
      name: name.into(),
    }
  }

  /// The root `*` directory.
  pub fn star() -> Self {
    Self::directory(0, "*")
  }

  /// Returns `true` for account entries.
  #[inline]
  pub fn is_account(&self) -> bool {
    self.entry_type == DirectoryEntryType::Account
  }

  /// Returns `true` for directory entries.
  #[inline]
  pub fn is_directory(&self) -> bool {
    self.entry_type == DirectoryEntryType::Directory
  }
}

impl Display for DirectoryEntry {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{}@{}", self.name, self.id)
  }
}
