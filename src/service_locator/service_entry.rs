use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::service_locator::DirectoryEntry;

/// A service registered with the locator.
///
/// The id is unique within a locator instance; the properties are an
/// opaque JSON object supplied at registration (by convention carrying an
/// `addresses` list of `host:port` strings).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
  /// Name the service was registered under.
  pub name: String,
  /// Locator-assigned unique id.
  pub id: u32,
  /// Account that registered the service.
  pub account: DirectoryEntry,
  /// Registration properties.
  pub properties: Value,
}
