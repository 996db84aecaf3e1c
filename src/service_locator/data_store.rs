use async_trait::async_trait;
use hashbrown::HashMap;
use hashbrown::HashSet;
use std::time::Duration;
use std::time::SystemTime;

use crate::error::BeamError;
use crate::error::Result;
use crate::service_locator::DirectoryEntry;
use crate::service_locator::Permissions;
use crate::service_locator::session;
use crate::threading::Mutex;

// -----------------------------------------------------------------------------
// Data Store
// -----------------------------------------------------------------------------

/// Pluggable persistence behind the locator servlet.
///
/// Every mutation is atomic with respect to every other store operation;
/// the servlet broadcasts account updates while its transaction around a
/// mutation is still held, so subscribers never observe unpersisted
/// state.
#[async_trait]
pub trait ServiceLocatorDataStore: Send + Sync {
  /// Loads the entry with the given id.
  async fn load_directory_entry(&self, id: u32) -> Result<DirectoryEntry>;

  /// Loads every account in the store.
  async fn load_all_accounts(&self) -> Result<Vec<DirectoryEntry>>;

  /// Finds an account by name.
  async fn load_account(&self, name: &str) -> Result<Option<DirectoryEntry>>;

  /// Creates an account under `parent` with a salted credential.
  async fn make_account(
    &self,
    name: &str,
    password: &str,
    parent: &DirectoryEntry,
  ) -> Result<DirectoryEntry>;

  /// Creates a directory under `parent`.
  async fn make_directory(&self, name: &str, parent: &DirectoryEntry) -> Result<DirectoryEntry>;

  /// Deletes `entry`, detaching it from all parents and children and
  /// dropping its permissions and credentials.
  async fn delete_entry(&self, entry: &DirectoryEntry) -> Result<()>;

  /// Renames `entry`.
  async fn rename(&self, entry: &DirectoryEntry, name: &str) -> Result<DirectoryEntry>;

  /// Adds a parent-child edge. Fails if it would create a cycle.
  async fn associate(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()>;

  /// Removes a parent-child edge.
  async fn detach(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()>;

  /// Parents of `entry`.
  async fn load_parents(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>>;

  /// Children of `entry`.
  async fn load_children(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>>;

  /// Compares `password` against the account's stored digest.
  async fn validate_password(&self, account: &DirectoryEntry, password: &str) -> Result<bool>;

  /// Replaces the account's credential with a fresh salt and digest.
  async fn store_password(&self, account: &DirectoryEntry, password: &str) -> Result<()>;

  /// Direct permissions of `source` over `target`.
  async fn load_permissions(
    &self,
    source: &DirectoryEntry,
    target: &DirectoryEntry,
  ) -> Result<Permissions>;

  /// Replaces the permissions of `source` over `target`.
  async fn store_permissions(
    &self,
    source: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<()>;

  /// Unix time (seconds) the account was created.
  async fn load_registration_time(&self, account: &DirectoryEntry) -> Result<u64>;

  /// Unix time (seconds) of the most recent login.
  async fn load_last_login_time(&self, account: &DirectoryEntry) -> Result<u64>;

  /// Records a login at `time`.
  async fn store_last_login_time(&self, account: &DirectoryEntry, time: u64) -> Result<()>;

  /// Tests whether `account` holds `permissions` over `target`.
  ///
  /// Permissions granted on any ancestor of `target` apply to `target`.
  async fn has_permissions(
    &self,
    account: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<bool> {
    let mut effective: Permissions = self.load_permissions(account, target).await?;

    let mut visited: HashSet<u32> = HashSet::new();
    visited.insert(target.id);

    let mut frontier: Vec<DirectoryEntry> = self.load_parents(target).await?;

    while let Some(parent) = frontier.pop() {
      if !visited.insert(parent.id) {
        continue;
      }

      effective |= self.load_permissions(account, &parent).await?;
      frontier.extend(self.load_parents(&parent).await?);
    }

    Ok(effective.contains(permissions))
  }

  /// Resolves a `/`-separated path of child names starting at `root`.
  async fn resolve_path(&self, root: &DirectoryEntry, path: &str) -> Result<DirectoryEntry> {
    let mut current: DirectoryEntry = root.clone();

    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
      let children: Vec<DirectoryEntry> = self.load_children(&current).await?;

      current = children
        .into_iter()
        .find(|child| child.name == segment)
        .ok_or_else(|| BeamError::service_request(format!("no such entry: {segment}")))?;
    }

    Ok(current)
  }
}

// -----------------------------------------------------------------------------
// Local Data Store
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct Credential {
  salt: Vec<u8>,
  digest: String,
}

#[derive(Debug)]
struct StoreState {
  next_id: u32,
  entries: HashMap<u32, DirectoryEntry>,
  parents: HashMap<u32, Vec<u32>>,
  children: HashMap<u32, Vec<u32>>,
  credentials: HashMap<u32, Credential>,
  permissions: HashMap<(u32, u32), Permissions>,
  registration_times: HashMap<u32, u64>,
  login_times: HashMap<u32, u64>,
}

impl StoreState {
  fn get(&self, entry: &DirectoryEntry) -> Result<DirectoryEntry> {
    match self.entries.get(&entry.id) {
      Some(found) if found.entry_type == entry.entry_type => Ok(found.clone()),
      _ => Err(BeamError::service_request(format!("entry not found: {entry}"))),
    }
  }

  fn link(&mut self, child: u32, parent: u32) {
    let parents = self.parents.entry(child).or_default();

    if !parents.contains(&parent) {
      parents.push(parent);
      self.children.entry(parent).or_default().push(child);
    }
  }

  fn unlink(&mut self, child: u32, parent: u32) {
    if let Some(parents) = self.parents.get_mut(&child) {
      parents.retain(|id| *id != parent);
    }

    if let Some(children) = self.children.get_mut(&parent) {
      children.retain(|id| *id != child);
    }
  }

  fn is_reachable(&self, from: u32, target: u32) -> bool {
    if from == target {
      return true;
    }

    let mut visited: HashSet<u32> = HashSet::new();
    let mut frontier: Vec<u32> = vec![from];

    while let Some(id) = frontier.pop() {
      if !visited.insert(id) {
        continue;
      }

      if id == target {
        return true;
      }

      if let Some(children) = self.children.get(&id) {
        frontier.extend(children.iter().copied());
      }
    }

    false
  }

  fn mint(&mut self, entry: DirectoryEntry, parent: u32) -> DirectoryEntry {
    let id: u32 = entry.id;

    self.entries.insert(id, entry.clone());
    self.registration_times.insert(id, now_seconds());
    self.link(id, parent);

    entry
  }
}

/// In-memory reference implementation of the data store.
///
/// A single routine mutex serializes every operation; it doubles as the
/// transactional lock of the locator's consistency contract.
pub struct LocalServiceLocatorDataStore {
  state: Mutex<StoreState>,
}

impl LocalServiceLocatorDataStore {
  /// Constructs a store holding only the root `*` directory.
  pub fn new() -> Self {
    let star: DirectoryEntry = DirectoryEntry::star();

    let mut entries: HashMap<u32, DirectoryEntry> = HashMap::new();
    entries.insert(star.id, star);

    Self {
      state: Mutex::new(StoreState {
        next_id: 1,
        entries,
        parents: HashMap::new(),
        children: HashMap::new(),
        credentials: HashMap::new(),
        permissions: HashMap::new(),
        registration_times: HashMap::new(),
        login_times: HashMap::new(),
      }),
    }
  }
}

impl Default for LocalServiceLocatorDataStore {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ServiceLocatorDataStore for LocalServiceLocatorDataStore {
  async fn load_directory_entry(&self, id: u32) -> Result<DirectoryEntry> {
    let state = self.state.lock().await;

    state
      .entries
      .get(&id)
      .cloned()
      .ok_or_else(|| BeamError::service_request(format!("entry not found: @{id}")))
  }

  async fn load_all_accounts(&self) -> Result<Vec<DirectoryEntry>> {
    let state = self.state.lock().await;

    let mut accounts: Vec<DirectoryEntry> = state
      .entries
      .values()
      .filter(|entry| entry.is_account())
      .cloned()
      .collect();

    accounts.sort_by_key(|account| account.id);
    Ok(accounts)
  }

  async fn load_account(&self, name: &str) -> Result<Option<DirectoryEntry>> {
    let state = self.state.lock().await;

    Ok(
      state
        .entries
        .values()
        .find(|entry| entry.is_account() && entry.name == name)
        .cloned(),
    )
  }

  async fn make_account(
    &self,
    name: &str,
    password: &str,
    parent: &DirectoryEntry,
  ) -> Result<DirectoryEntry> {
    if name.is_empty() {
      return Err(BeamError::service_request("account name is empty"));
    }

    let mut state = self.state.lock().await;

    let parent: DirectoryEntry = state.get(parent)?;

    if !parent.is_directory() {
      return Err(BeamError::service_request("parent is not a directory"));
    }

    let duplicate: bool = state
      .entries
      .values()
      .any(|entry| entry.is_account() && entry.name == name);

    if duplicate {
      return Err(BeamError::service_request(format!("account exists: {name}")));
    }

    let id: u32 = state.next_id;
    state.next_id += 1;

    let account: DirectoryEntry = state.mint(DirectoryEntry::account(id, name), parent.id);

    let salt: Vec<u8> = session::generate_salt();
    let digest: String = session::hash_password(&salt, password);

    state.credentials.insert(id, Credential { salt, digest });

    // An account always reads itself.
    state.permissions.insert((id, id), Permissions::READ);

    Ok(account)
  }

  async fn make_directory(&self, name: &str, parent: &DirectoryEntry) -> Result<DirectoryEntry> {
    if name.is_empty() {
      return Err(BeamError::service_request("directory name is empty"));
    }

    let mut state = self.state.lock().await;

    let parent: DirectoryEntry = state.get(parent)?;

    if !parent.is_directory() {
      return Err(BeamError::service_request("parent is not a directory"));
    }

    let id: u32 = state.next_id;
    state.next_id += 1;

    Ok(state.mint(DirectoryEntry::directory(id, name), parent.id))
  }

  async fn delete_entry(&self, entry: &DirectoryEntry) -> Result<()> {
    let mut state = self.state.lock().await;

    let entry: DirectoryEntry = state.get(entry)?;

    if entry.id == 0 {
      return Err(BeamError::service_request("cannot delete the root directory"));
    }

    let parents: Vec<u32> = state.parents.remove(&entry.id).unwrap_or_default();

    for parent in parents {
      if let Some(children) = state.children.get_mut(&parent) {
        children.retain(|id| *id != entry.id);
      }
    }

    let children: Vec<u32> = state.children.remove(&entry.id).unwrap_or_default();

    for child in children {
      if let Some(parents) = state.parents.get_mut(&child) {
        parents.retain(|id| *id != entry.id);
      }
    }

    state.entries.remove(&entry.id);
    state.credentials.remove(&entry.id);
    state.registration_times.remove(&entry.id);
    state.login_times.remove(&entry.id);

    state
      .permissions
      .retain(|(source, target), _| *source != entry.id && *target != entry.id);

    Ok(())
  }

  async fn rename(&self, entry: &DirectoryEntry, name: &str) -> Result<DirectoryEntry> {
    if name.is_empty() {
      return Err(BeamError::service_request("name is empty"));
    }

    let mut state = self.state.lock().await;

    let entry: DirectoryEntry = state.get(entry)?;

    if entry.is_account() {
      let duplicate: bool = state
        .entries
        .values()
        .any(|other| other.is_account() && other.name == name && other.id != entry.id);

      if duplicate {
        return Err(BeamError::service_request(format!("account exists: {name}")));
      }
    }

    let renamed = state
      .entries
      .get_mut(&entry.id)
      .map(|stored| {
        stored.name = name.to_string();
        stored.clone()
      })
      .ok_or_else(|| BeamError::service_request(format!("entry not found: {entry}")))?;

    Ok(renamed)
  }

  async fn associate(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()> {
    let mut state = self.state.lock().await;

    let entry: DirectoryEntry = state.get(entry)?;
    let parent: DirectoryEntry = state.get(parent)?;

    if !parent.is_directory() {
      return Err(BeamError::service_request("parent is not a directory"));
    }

    if state.is_reachable(entry.id, parent.id) {
      return Err(BeamError::service_request("association would create a cycle"));
    }

    state.link(entry.id, parent.id);
    Ok(())
  }

  async fn detach(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()> {
    let mut state = self.state.lock().await;

    let entry: DirectoryEntry = state.get(entry)?;
    let parent: DirectoryEntry = state.get(parent)?;

    state.unlink(entry.id, parent.id);
    Ok(())
  }

  async fn load_parents(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>> {
    let state = self.state.lock().await;

    let entry: DirectoryEntry = state.get(entry)?;
    let ids: &[u32] = state.parents.get(&entry.id).map_or(&[], Vec::as_slice);

    Ok(
      ids
        .iter()
        .filter_map(|id| state.entries.get(id).cloned())
        .collect(),
    )
  }

  async fn load_children(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>> {
    let state = self.state.lock().await;

    let entry: DirectoryEntry = state.get(entry)?;
    let ids: &[u32] = state.children.get(&entry.id).map_or(&[], Vec::as_slice);

    Ok(
      ids
        .iter()
        .filter_map(|id| state.entries.get(id).cloned())
        .collect(),
    )
  }

  async fn validate_password(&self, account: &DirectoryEntry, password: &str) -> Result<bool> {
    let state = self.state.lock().await;

    let credential: &Credential = state
      .credentials
      .get(&account.id)
      .ok_or_else(|| BeamError::service_request(format!("no credentials: {account}")))?;

    Ok(session::hash_password(&credential.salt, password) == credential.digest)
  }

  async fn store_password(&self, account: &DirectoryEntry, password: &str) -> Result<()> {
    let mut state = self.state.lock().await;

    let account: DirectoryEntry = state.get(account)?;

    if !account.is_account() {
      return Err(BeamError::service_request("not an account"));
    }

    let salt: Vec<u8> = session::generate_salt();
    let digest: String = session::hash_password(&salt, password);

    state.credentials.insert(account.id, Credential { salt, digest });
    Ok(())
  }

  async fn load_permissions(
    &self,
    source: &DirectoryEntry,
    target: &DirectoryEntry,
  ) -> Result<Permissions> {
    let state = self.state.lock().await;

    Ok(
      state
        .permissions
        .get(&(source.id, target.id))
        .copied()
        .unwrap_or(Permissions::empty()),
    )
  }

  async fn store_permissions(
    &self,
    source: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<()> {
    let mut state = self.state.lock().await;

    state.get(source)?;
    state.get(target)?;

    if permissions.is_empty() {
      state.permissions.remove(&(source.id, target.id));
    } else {
      state.permissions.insert((source.id, target.id), permissions);
    }

    Ok(())
  }

  async fn load_registration_time(&self, account: &DirectoryEntry) -> Result<u64> {
    let state = self.state.lock().await;

    state
      .registration_times
      .get(&account.id)
      .copied()
      .ok_or_else(|| BeamError::service_request(format!("entry not found: {account}")))
  }

  async fn load_last_login_time(&self, account: &DirectoryEntry) -> Result<u64> {
    let state = self.state.lock().await;
    Ok(state.login_times.get(&account.id).copied().unwrap_or(0))
  }

  async fn store_last_login_time(&self, account: &DirectoryEntry, time: u64) -> Result<()> {
    let mut state = self.state.lock().await;

    state.get(account)?;
    state.login_times.insert(account.id, time);
    Ok(())
  }
}

/// Current OS time as seconds since the Unix epoch.
pub(crate) fn now_seconds() -> u64 {
  SystemTime::now()
    .duration_since(SystemTime::UNIX_EPOCH)
    .unwrap_or(Duration::ZERO)
    .as_secs()
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::error::ErrorKind;
  use crate::service_locator::DirectoryEntry;
  use crate::service_locator::LocalServiceLocatorDataStore;
  use crate::service_locator::Permissions;
  use crate::service_locator::ServiceLocatorDataStore;

  fn star() -> DirectoryEntry {
    DirectoryEntry::star()
  }

  #[tokio::test]
  async fn test_make_and_find_account() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    let account = store.make_account("alice", "secret", &star()).await.unwrap();

    assert!(account.is_account());
    assert_eq!(store.load_account("alice").await.unwrap(), Some(account.clone()));
    assert_eq!(store.load_account("bob").await.unwrap(), None);

    assert!(store.validate_password(&account, "secret").await.unwrap());
    assert!(!store.validate_password(&account, "wrong").await.unwrap());

    // Creation time is recorded.
    assert!(store.load_registration_time(&account).await.unwrap() > 0);
  }

  #[tokio::test]
  async fn test_duplicate_account_rejected() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    store.make_account("alice", "a", &star()).await.unwrap();

    let error = store.make_account("alice", "b", &star()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ServiceRequest);
  }

  #[tokio::test]
  async fn test_path_resolution() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    let traders = store.make_directory("traders", &star()).await.unwrap();
    let desk = store.make_directory("desk", &traders).await.unwrap();

    assert_eq!(store.resolve_path(&star(), "traders/desk").await.unwrap(), desk);
    assert!(store.resolve_path(&star(), "traders/missing").await.is_err());
  }

  #[tokio::test]
  async fn test_delete_cascades() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    let group = store.make_directory("group", &star()).await.unwrap();
    let account = store.make_account("alice", "pw", &group).await.unwrap();

    store
      .store_permissions(&account, &group, Permissions::READ)
      .await
      .unwrap();

    store.delete_entry(&group).await.unwrap();

    assert!(store.load_directory_entry(group.id).await.is_err());
    assert!(store.load_parents(&account).await.unwrap().is_empty());

    assert_eq!(
      store.load_permissions(&account, &group).await.unwrap(),
      Permissions::empty()
    );
  }

  #[tokio::test]
  async fn test_associate_rejects_cycles() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    let outer = store.make_directory("outer", &star()).await.unwrap();
    let inner = store.make_directory("inner", &outer).await.unwrap();

    let error = store.associate(&outer, &inner).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ServiceRequest);

    // Re-associating an existing edge is a no-op.
    store.associate(&inner, &outer).await.unwrap();
    assert_eq!(store.load_children(&outer).await.unwrap(), vec![inner.clone()]);
  }

  #[tokio::test]
  async fn test_permission_inheritance() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    let group = store.make_directory("group", &star()).await.unwrap();
    let nested = store.make_directory("nested", &group).await.unwrap();
    let admin = store.make_account("admin", "pw", &star()).await.unwrap();

    store
      .store_permissions(&admin, &group, Permissions::READ | Permissions::ADMINISTRATE)
      .await
      .unwrap();

    assert!(
      store
        .has_permissions(&admin, &nested, Permissions::ADMINISTRATE)
        .await
        .unwrap()
    );

    assert!(
      !store
        .has_permissions(&admin, &star(), Permissions::READ)
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn test_rename() {
    let store: LocalServiceLocatorDataStore = LocalServiceLocatorDataStore::new();

    let account = store.make_account("alice", "pw", &star()).await.unwrap();
    let renamed = store.rename(&account, "alicia").await.unwrap();

    assert_eq!(renamed.name, "alicia");
    assert_eq!(store.load_account("alice").await.unwrap(), None);
    assert!(store.load_account("alicia").await.unwrap().is_some());
  }
}
