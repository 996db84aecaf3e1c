use serde::Deserialize;
use serde::Serialize;

use crate::service_locator::DirectoryEntry;

// -----------------------------------------------------------------------------
// Account Update Type
// -----------------------------------------------------------------------------

/// Kind of account mutation carried by an [`AccountUpdate`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountUpdateType {
  /// The account was created, or is part of a subscription snapshot.
  Added,
  /// The account was deleted.
  Deleted,
}

// -----------------------------------------------------------------------------
// Account Update
// -----------------------------------------------------------------------------

/// Delta streamed to account-monitoring subscribers.
///
/// Delivered at least once while a subscriber's channel is alive;
/// subscribers deduplicate on `(entry, type)` after a resubscribe.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
  /// The affected account.
  pub entry: DirectoryEntry,
  /// Whether the account appeared or disappeared.
  pub update_type: AccountUpdateType,
}

impl AccountUpdate {
  /// An `Added` update for `entry`.
  pub fn added(entry: DirectoryEntry) -> Self {
    Self {
      entry,
      update_type: AccountUpdateType::Added,
    }
  }

  /// A `Deleted` update for `entry`.
  pub fn deleted(entry: DirectoryEntry) -> Self {
    Self {
      entry,
      update_type: AccountUpdateType::Deleted,
    }
  }
}
