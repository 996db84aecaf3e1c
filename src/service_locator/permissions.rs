use bitflags::bitflags;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

bitflags! {
  /// Rights an account holds over a directory entry.
  ///
  /// Composable by OR; a check passes when the requested set is a subset
  /// of the effective set. Permissions granted on a directory apply to
  /// everything beneath it.
  #[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
  pub struct Permissions: u32 {
    /// Read the entry and its relationships.
    const READ = 1 << 0;
    /// Move the entry between parents.
    const MOVE = 1 << 1;
    /// Create, delete, and modify beneath the entry.
    const ADMINISTRATE = 1 << 2;
  }
}

impl Serialize for Permissions {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(self.bits())
  }
}

impl<'de> Deserialize<'de> for Permissions {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let bits: u32 = u32::deserialize(deserializer)?;
    Ok(Self::from_bits_truncate(bits))
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::service_locator::Permissions;

  #[test]
  fn test_subset_check() {
    let granted: Permissions = Permissions::READ | Permissions::ADMINISTRATE;

    assert!(granted.contains(Permissions::READ));
    assert!(granted.contains(Permissions::READ | Permissions::ADMINISTRATE));
    assert!(!granted.contains(Permissions::MOVE));
  }

  #[test]
  fn test_serde_bits() {
    let permissions: Permissions = Permissions::READ | Permissions::MOVE;
    let encoded = serde_json::to_string(&permissions).unwrap();

    assert_eq!(encoded, "3");
    assert_eq!(serde_json::from_str::<Permissions>(&encoded).unwrap(), permissions);
  }
}
