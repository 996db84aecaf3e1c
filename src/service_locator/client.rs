use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::Mutex as SpinMutex;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use crate::error::BeamError;
use crate::error::ErrorKind;
use crate::error::Result;
use crate::queues::Publisher;
use crate::queues::Queue;
use crate::queues::QueueWriterPublisher;
use crate::queues::ScopedQueueWriter;
use crate::queues::WeakQueue;
use crate::routines;
use crate::service_locator::AccountUpdate;
use crate::service_locator::AccountUpdateType;
use crate::service_locator::DirectoryEntry;
use crate::service_locator::Permissions;
use crate::service_locator::ServiceEntry;
use crate::service_locator::messages::ACCOUNT_UPDATE_MESSAGE;
use crate::service_locator::messages::ASSOCIATE_SERVICE;
use crate::service_locator::messages::AUTHENTICATE_SESSION_SERVICE;
use crate::service_locator::messages::AssociationRequest;
use crate::service_locator::messages::AuthenticateSessionRequest;
use crate::service_locator::messages::DELETE_SERVICE;
use crate::service_locator::messages::DETACH_SERVICE;
use crate::service_locator::messages::EntryRequest;
use crate::service_locator::messages::FIND_ACCOUNT_SERVICE;
use crate::service_locator::messages::FindAccountRequest;
use crate::service_locator::messages::HAS_PERMISSIONS_SERVICE;
use crate::service_locator::messages::HasPermissionsRequest;
use crate::service_locator::messages::LOAD_ALL_ACCOUNTS_SERVICE;
use crate::service_locator::messages::LOAD_CHILDREN_SERVICE;
use crate::service_locator::messages::LOAD_ID_SERVICE;
use crate::service_locator::messages::LOAD_LAST_LOGIN_TIME_SERVICE;
use crate::service_locator::messages::LOAD_PARENTS_SERVICE;
use crate::service_locator::messages::LOAD_PATH_SERVICE;
use crate::service_locator::messages::LOAD_REGISTRATION_TIME_SERVICE;
use crate::service_locator::messages::LOCATE_SERVICE;
use crate::service_locator::messages::LOGIN_SERVICE;
use crate::service_locator::messages::LoadIdRequest;
use crate::service_locator::messages::LoadPathRequest;
use crate::service_locator::messages::LocateRequest;
use crate::service_locator::messages::LoginRequest;
use crate::service_locator::messages::LoginResponse;
use crate::service_locator::messages::MAKE_ACCOUNT_SERVICE;
use crate::service_locator::messages::MAKE_DIRECTORY_SERVICE;
use crate::service_locator::messages::MONITOR_ACCOUNTS_SERVICE;
use crate::service_locator::messages::MakeAccountRequest;
use crate::service_locator::messages::MakeDirectoryRequest;
use crate::service_locator::messages::REGISTER_SERVICE;
use crate::service_locator::messages::RENAME_SERVICE;
use crate::service_locator::messages::RegisterRequest;
use crate::service_locator::messages::RenameRequest;
use crate::service_locator::messages::STORE_PASSWORD_SERVICE;
use crate::service_locator::messages::STORE_PERMISSIONS_SERVICE;
use crate::service_locator::messages::StorePasswordRequest;
use crate::service_locator::messages::StorePermissionsRequest;
use crate::service_locator::messages::UNMONITOR_ACCOUNTS_SERVICE;
use crate::service_locator::messages::UNREGISTER_SERVICE;
use crate::service_locator::messages::UnregisterRequest;
use crate::service_locator::session;
use crate::services::IpAddress;
use crate::services::OpenState;
use crate::services::ServiceProtocolClient;
use crate::services::ServiceProtocolClientBuilder;

// -----------------------------------------------------------------------------
// Service Locator Client
// -----------------------------------------------------------------------------

/// Typed access to a service locator.
///
/// Implemented by the protocol-backed [`SessionServiceLocatorClient`];
/// reusable wrappers take the trait so tests can substitute their own.
#[async_trait]
pub trait ServiceLocatorClient: Send + Sync {
  /// The logged-in account.
  fn get_account(&self) -> Result<DirectoryEntry>;

  /// The current session id.
  fn get_session_id(&self) -> Result<String>;

  /// The current session id, encrypted under `key` for forwarding across
  /// untrusted wires.
  fn get_encrypted_session_id(&self, key: u32) -> Result<String>;

  /// Verifies credentials against the locator and returns the account.
  async fn authenticate_account(&self, username: &str, password: &str) -> Result<DirectoryEntry>;

  /// Resolves an encrypted session token to its account.
  async fn authenticate_session(&self, session_id: &str, key: u32) -> Result<DirectoryEntry>;

  /// Every service registered under `name`.
  async fn locate(&self, name: &str) -> Result<Vec<ServiceEntry>>;

  /// Registers a service tied to this session.
  async fn register(&self, name: &str, properties: Value) -> Result<ServiceEntry>;

  /// Removes a registered service.
  async fn unregister(&self, service: &ServiceEntry) -> Result<()>;

  /// Every account readable by this session.
  async fn load_all_accounts(&self) -> Result<Vec<DirectoryEntry>>;

  /// Finds an account by name.
  async fn find_account(&self, name: &str) -> Result<Option<DirectoryEntry>>;

  /// Creates an account under `parent`.
  async fn make_account(
    &self,
    name: &str,
    password: &str,
    parent: &DirectoryEntry,
  ) -> Result<DirectoryEntry>;

  /// Creates a directory under `parent`.
  async fn make_directory(&self, name: &str, parent: &DirectoryEntry) -> Result<DirectoryEntry>;

  /// Replaces an account's password.
  async fn store_password(&self, account: &DirectoryEntry, password: &str) -> Result<()>;

  /// Subscribes `queue` to account updates.
  ///
  /// The current account set arrives first as `Added` updates, followed
  /// by live deltas. The client holds only a weak reference: dropping
  /// every owning handle of `queue` ends the subscription, and when the
  /// last subscription ends one unmonitor request is sent.
  async fn monitor_accounts(&self, queue: Arc<Queue<AccountUpdate>>) -> Result<()>;

  /// Resolves a `/`-separated path of child names starting at `root`.
  async fn load_directory_entry_at(
    &self,
    root: &DirectoryEntry,
    path: &str,
  ) -> Result<DirectoryEntry>;

  /// Loads an entry by id.
  async fn load_directory_entry(&self, id: u32) -> Result<DirectoryEntry>;

  /// Parents of `entry`.
  async fn load_parents(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>>;

  /// Children of `entry`.
  async fn load_children(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>>;

  /// Deletes `entry`.
  async fn delete_entry(&self, entry: &DirectoryEntry) -> Result<()>;

  /// Adds a parent-child edge.
  async fn associate(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()>;

  /// Removes a parent-child edge.
  async fn detach(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()>;

  /// Tests `account`'s permissions over `target`.
  async fn has_permissions(
    &self,
    account: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<bool>;

  /// Replaces `source`'s permissions over `target`.
  async fn store_permissions(
    &self,
    source: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<()>;

  /// Unix time (seconds) `account` was created.
  async fn load_registration_time(&self, account: &DirectoryEntry) -> Result<u64>;

  /// Unix time (seconds) of `account`'s most recent login.
  async fn load_last_login_time(&self, account: &DirectoryEntry) -> Result<u64>;

  /// Renames `entry`.
  async fn rename(&self, entry: &DirectoryEntry, name: &str) -> Result<DirectoryEntry>;

  /// Closes the connection, breaking every subscription with
  /// [`PipeBroken`].
  ///
  /// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
  async fn close(&self);
}

// -----------------------------------------------------------------------------
// Locator Core
// -----------------------------------------------------------------------------

#[derive(Clone)]
struct Credentials {
  username: String,
  password: String,
}

#[derive(Clone)]
struct SessionState {
  account: DirectoryEntry,
  session_id: String,
}

struct AccountMonitor {
  active: bool,
  live: HashMap<u32, DirectoryEntry>,
  publisher: QueueWriterPublisher<AccountUpdate>,
}

struct LocatorCore {
  builder: ServiceProtocolClientBuilder,
  credentials: SpinMutex<Option<Credentials>>,
  session: SpinMutex<Option<SessionState>>,
  protocol: SpinMutex<Option<Arc<ServiceProtocolClient>>>,
  accounts: SpinMutex<AccountMonitor>,
  open: OpenState,
}

impl LocatorCore {
  fn protocol(&self) -> Result<Arc<ServiceProtocolClient>> {
    self
      .protocol
      .lock()
      .clone()
      .ok_or_else(BeamError::not_connected)
  }

  /// Opens a channel, wires the message and disconnect slots, and logs
  /// in with the stored credentials.
  async fn connect(this: &Arc<Self>) -> Result<()> {
    let credentials: Credentials = this
      .credentials
      .lock()
      .clone()
      .ok_or_else(|| BeamError::connect("no credentials set"))?;

    let protocol: Arc<ServiceProtocolClient> = Arc::new(this.builder.build().await?);

    let updates: Weak<Self> = Arc::downgrade(this);

    protocol.set_message_slot(&ACCOUNT_UPDATE_MESSAGE, move |update: AccountUpdate| {
      let core: Weak<Self> = updates.clone();

      async move {
        if let Some(core) = core.upgrade() {
          core.apply_account_update(update).await;
        }
      }
    });

    let disconnects: Weak<Self> = Arc::downgrade(this);

    protocol.set_disconnect_slot(move |error| {
      if let Some(core) = disconnects.upgrade() {
        Self::handle_disconnect(core, error);
      }
    });

    let request: LoginRequest = LoginRequest {
      username: credentials.username,
      password: credentials.password,
    };

    let login: LoginResponse = match protocol.send_request(&LOGIN_SERVICE, &request).await {
      Ok(login) => login,
      Err(error) => {
        protocol.close().await;
        return Err(error);
      }
    };

    tracing::debug!(account = %login.account, "logged in");

    *this.session.lock() = Some(SessionState {
      account: login.account,
      session_id: login.session_id,
    });

    *this.protocol.lock() = Some(protocol);

    Ok(())
  }

  /// Applies a streamed delta to the live set and fans it out.
  ///
  /// Updates already represented in the live set are suppressed, which
  /// deduplicates replays after a reconnect. Discovering that the last
  /// subscriber is gone triggers a single unmonitor request.
  async fn apply_account_update(&self, update: AccountUpdate) {
    let unmonitor: bool = {
      let mut accounts = self.accounts.lock();

      if !accounts.active {
        return;
      }

      let changed: bool = match update.update_type {
        AccountUpdateType::Added => accounts
          .live
          .insert(update.entry.id, update.entry.clone())
          .is_none(),
        AccountUpdateType::Deleted => accounts.live.remove(&update.entry.id).is_some(),
      };

      if !changed {
        return;
      }

      let subscribed: bool = accounts.publisher.monitor_count() > 0;
      let remaining: usize = accounts.publisher.push(update);

      if subscribed && remaining == 0 {
        accounts.active = false;
        accounts.live.clear();
        true
      } else {
        false
      }
    };

    if unmonitor {
      if let Ok(protocol) = self.protocol() {
        if let Err(error) = protocol.send_request(&UNMONITOR_ACCOUNTS_SERVICE, &()).await {
          tracing::debug!(%error, "unmonitor failed");
        }
      }
    }
  }

  fn handle_disconnect(this: Arc<Self>, error: BeamError) {
    if this.open.is_closing() {
      return;
    }

    tracing::warn!(%error, "locator connection broken; reconnecting");

    *this.protocol.lock() = None;
    *this.session.lock() = None;

    routines::spawn(async move {
      Self::reconnect_loop(&this).await;
    });
  }

  async fn reconnect_loop(this: &Arc<Self>) {
    let mut delay: Duration = Duration::from_millis(10);

    loop {
      if this.open.is_closing() {
        return;
      }

      match Self::connect(this).await {
        Ok(()) => break,
        Err(error) => {
          tracing::debug!(%error, "reconnect attempt failed");
          tokio::time::sleep(delay).await;
          delay = (delay * 2).min(Duration::from_secs(5));
        }
      }
    }

    if let Err(error) = this.resubscribe().await {
      // A break here re-enters handle_disconnect through the new
      // channel's disconnect slot.
      tracing::debug!(%error, "resubscribe failed");
    }
  }

  /// Replays the account subscription after a reconnect.
  ///
  /// The fresh snapshot is reconciled against the live set: accounts
  /// already delivered are suppressed, new ones surface as `Added`, and
  /// vanished ones as `Deleted`.
  async fn resubscribe(&self) -> Result<()> {
    if !self.accounts.lock().active {
      return Ok(());
    }

    let protocol: Arc<ServiceProtocolClient> = self.protocol()?;

    let snapshot: Vec<DirectoryEntry> = protocol
      .send_request(&MONITOR_ACCOUNTS_SERVICE, &())
      .await?;

    let mut accounts = self.accounts.lock();

    let fresh: HashMap<u32, DirectoryEntry> = snapshot
      .into_iter()
      .map(|entry| (entry.id, entry))
      .collect();

    let mut vanished: Vec<u32> = accounts
      .live
      .keys()
      .filter(|id| !fresh.contains_key(*id))
      .copied()
      .collect();

    vanished.sort_unstable();

    for id in vanished {
      if let Some(entry) = accounts.live.remove(&id) {
        accounts.publisher.push(AccountUpdate::deleted(entry));
      }
    }

    let mut appeared: Vec<&DirectoryEntry> = fresh
      .values()
      .filter(|entry| !accounts.live.contains_key(&entry.id))
      .collect();

    appeared.sort_unstable_by_key(|entry| entry.id);

    let appeared: Vec<DirectoryEntry> = appeared.into_iter().cloned().collect();

    for entry in appeared {
      accounts.live.insert(entry.id, entry.clone());
      accounts.publisher.push(AccountUpdate::added(entry));
    }

    Ok(())
  }
}

// -----------------------------------------------------------------------------
// Session Service Locator Client
// -----------------------------------------------------------------------------

/// The protocol-backed locator client.
///
/// Reconnects transparently: when the channel breaks while open, the
/// client re-opens through its builder, re-authenticates with the stored
/// credentials, and replays the account subscription with `(entry, type)`
/// deduplication against the already delivered set.
pub struct SessionServiceLocatorClient {
  core: Arc<LocatorCore>,
}

impl SessionServiceLocatorClient {
  /// Constructs a closed client over `builder`.
  pub fn new(builder: ServiceProtocolClientBuilder) -> Self {
    Self {
      core: Arc::new(LocatorCore {
        builder,
        credentials: SpinMutex::new(None),
        session: SpinMutex::new(None),
        protocol: SpinMutex::new(None),
        accounts: SpinMutex::new(AccountMonitor {
          active: false,
          live: HashMap::new(),
          publisher: QueueWriterPublisher::new(),
        }),
        open: OpenState::new(),
      }),
    }
  }

  /// Stores the credentials used by `open` and by reconnects.
  pub fn set_credentials<U, P>(&self, username: U, password: P)
  where
    U: Into<String>,
    P: Into<String>,
  {
    *self.core.credentials.lock() = Some(Credentials {
      username: username.into(),
      password: password.into(),
    });
  }

  /// Connects and logs in.
  ///
  /// # Errors
  ///
  /// Propagates the server's rejection (`ServiceRequest`) or the
  /// transport failure; the client remains closed and `open` may be
  /// retried.
  pub async fn open(&self) -> Result<()> {
    if !self.core.open.set_opening() {
      return Err(BeamError::connect("already open"));
    }

    match LocatorCore::connect(&self.core).await {
      Ok(()) => {
        self.core.open.set_open();
        Ok(())
      }
      Err(error) => {
        self.core.open.set_closing();
        self.core.open.set_closed();
        Err(error)
      }
    }
  }
}

#[async_trait]
impl ServiceLocatorClient for SessionServiceLocatorClient {
  fn get_account(&self) -> Result<DirectoryEntry> {
    self
      .core
      .session
      .lock()
      .as_ref()
      .map(|session| session.account.clone())
      .ok_or_else(BeamError::not_connected)
  }

  fn get_session_id(&self) -> Result<String> {
    self
      .core
      .session
      .lock()
      .as_ref()
      .map(|session| session.session_id.clone())
      .ok_or_else(BeamError::not_connected)
  }

  fn get_encrypted_session_id(&self, key: u32) -> Result<String> {
    session::encrypt_session_id(&self.get_session_id()?, key)
  }

  async fn authenticate_account(&self, username: &str, password: &str) -> Result<DirectoryEntry> {
    let request: LoginRequest = LoginRequest {
      username: username.to_string(),
      password: password.to_string(),
    };

    let login: LoginResponse = self
      .core
      .protocol()?
      .send_request(&LOGIN_SERVICE, &request)
      .await?;

    Ok(login.account)
  }

  async fn authenticate_session(&self, session_id: &str, key: u32) -> Result<DirectoryEntry> {
    let request: AuthenticateSessionRequest = AuthenticateSessionRequest {
      encrypted_session_id: session_id.to_string(),
      key,
    };

    self
      .core
      .protocol()?
      .send_request(&AUTHENTICATE_SESSION_SERVICE, &request)
      .await
  }

  async fn locate(&self, name: &str) -> Result<Vec<ServiceEntry>> {
    let request: LocateRequest = LocateRequest {
      name: name.to_string(),
    };

    self
      .core
      .protocol()?
      .send_request(&LOCATE_SERVICE, &request)
      .await
  }

  async fn register(&self, name: &str, properties: Value) -> Result<ServiceEntry> {
    let request: RegisterRequest = RegisterRequest {
      name: name.to_string(),
      properties,
    };

    self
      .core
      .protocol()?
      .send_request(&REGISTER_SERVICE, &request)
      .await
  }

  async fn unregister(&self, service: &ServiceEntry) -> Result<()> {
    let request: UnregisterRequest = UnregisterRequest {
      service: service.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&UNREGISTER_SERVICE, &request)
      .await
  }

  async fn load_all_accounts(&self) -> Result<Vec<DirectoryEntry>> {
    self
      .core
      .protocol()?
      .send_request(&LOAD_ALL_ACCOUNTS_SERVICE, &())
      .await
  }

  async fn find_account(&self, name: &str) -> Result<Option<DirectoryEntry>> {
    let request: FindAccountRequest = FindAccountRequest {
      name: name.to_string(),
    };

    self
      .core
      .protocol()?
      .send_request(&FIND_ACCOUNT_SERVICE, &request)
      .await
  }

  async fn make_account(
    &self,
    name: &str,
    password: &str,
    parent: &DirectoryEntry,
  ) -> Result<DirectoryEntry> {
    let request: MakeAccountRequest = MakeAccountRequest {
      name: name.to_string(),
      password: password.to_string(),
      parent: parent.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&MAKE_ACCOUNT_SERVICE, &request)
      .await
  }

  async fn make_directory(&self, name: &str, parent: &DirectoryEntry) -> Result<DirectoryEntry> {
    let request: MakeDirectoryRequest = MakeDirectoryRequest {
      name: name.to_string(),
      parent: parent.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&MAKE_DIRECTORY_SERVICE, &request)
      .await
  }

  async fn store_password(&self, account: &DirectoryEntry, password: &str) -> Result<()> {
    let request: StorePasswordRequest = StorePasswordRequest {
      account: account.clone(),
      password: password.to_string(),
    };

    self
      .core
      .protocol()?
      .send_request(&STORE_PASSWORD_SERVICE, &request)
      .await
  }

  async fn monitor_accounts(&self, queue: Arc<Queue<AccountUpdate>>) -> Result<()> {
    let writer: ScopedQueueWriter<AccountUpdate> =
      ScopedQueueWriter::new(Arc::new(WeakQueue::new(&queue)));

    // A live subscription serves duplicates from the delivered set.
    {
      let accounts = self.core.accounts.lock();

      if accounts.active {
        deliver_live(&accounts, &writer);
        accounts.publisher.monitor(writer);
        return Ok(());
      }
    }

    let protocol: Arc<ServiceProtocolClient> = self.core.protocol()?;

    // Activate before requesting so deltas racing the snapshot are
    // captured into the live set rather than dropped.
    self.core.accounts.lock().active = true;

    let snapshot: Vec<DirectoryEntry> = match protocol
      .send_request(&MONITOR_ACCOUNTS_SERVICE, &())
      .await
    {
      Ok(snapshot) => snapshot,
      Err(error) => {
        let mut accounts = self.core.accounts.lock();
        accounts.active = false;
        accounts.live.clear();
        return Err(error);
      }
    };

    let mut accounts = self.core.accounts.lock();

    for entry in snapshot {
      accounts.live.entry(entry.id).or_insert(entry);
    }

    deliver_live(&accounts, &writer);
    accounts.publisher.monitor(writer);

    Ok(())
  }

  async fn load_directory_entry_at(
    &self,
    root: &DirectoryEntry,
    path: &str,
  ) -> Result<DirectoryEntry> {
    let request: LoadPathRequest = LoadPathRequest {
      root: root.clone(),
      path: path.to_string(),
    };

    self
      .core
      .protocol()?
      .send_request(&LOAD_PATH_SERVICE, &request)
      .await
  }

  async fn load_directory_entry(&self, id: u32) -> Result<DirectoryEntry> {
    self
      .core
      .protocol()?
      .send_request(&LOAD_ID_SERVICE, &LoadIdRequest { id })
      .await
  }

  async fn load_parents(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>> {
    let request: EntryRequest = EntryRequest {
      entry: entry.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&LOAD_PARENTS_SERVICE, &request)
      .await
  }

  async fn load_children(&self, entry: &DirectoryEntry) -> Result<Vec<DirectoryEntry>> {
    let request: EntryRequest = EntryRequest {
      entry: entry.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&LOAD_CHILDREN_SERVICE, &request)
      .await
  }

  async fn delete_entry(&self, entry: &DirectoryEntry) -> Result<()> {
    let request: EntryRequest = EntryRequest {
      entry: entry.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&DELETE_SERVICE, &request)
      .await
  }

  async fn associate(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()> {
    let request: AssociationRequest = AssociationRequest {
      entry: entry.clone(),
      parent: parent.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&ASSOCIATE_SERVICE, &request)
      .await
  }

  async fn detach(&self, entry: &DirectoryEntry, parent: &DirectoryEntry) -> Result<()> {
    let request: AssociationRequest = AssociationRequest {
      entry: entry.clone(),
      parent: parent.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&DETACH_SERVICE, &request)
      .await
  }

  async fn has_permissions(
    &self,
    account: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<bool> {
    let request: HasPermissionsRequest = HasPermissionsRequest {
      account: account.clone(),
      target: target.clone(),
      permissions,
    };

    self
      .core
      .protocol()?
      .send_request(&HAS_PERMISSIONS_SERVICE, &request)
      .await
  }

  async fn store_permissions(
    &self,
    source: &DirectoryEntry,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<()> {
    let request: StorePermissionsRequest = StorePermissionsRequest {
      source: source.clone(),
      target: target.clone(),
      permissions,
    };

    self
      .core
      .protocol()?
      .send_request(&STORE_PERMISSIONS_SERVICE, &request)
      .await
  }

  async fn load_registration_time(&self, account: &DirectoryEntry) -> Result<u64> {
    let request: EntryRequest = EntryRequest {
      entry: account.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&LOAD_REGISTRATION_TIME_SERVICE, &request)
      .await
  }

  async fn load_last_login_time(&self, account: &DirectoryEntry) -> Result<u64> {
    let request: EntryRequest = EntryRequest {
      entry: account.clone(),
    };

    self
      .core
      .protocol()?
      .send_request(&LOAD_LAST_LOGIN_TIME_SERVICE, &request)
      .await
  }

  async fn rename(&self, entry: &DirectoryEntry, name: &str) -> Result<DirectoryEntry> {
    let request: RenameRequest = RenameRequest {
      entry: entry.clone(),
      name: name.to_string(),
    };

    self
      .core
      .protocol()?
      .send_request(&RENAME_SERVICE, &request)
      .await
  }

  async fn close(&self) {
    if self.core.open.set_closing() {
      return;
    }

    let protocol: Option<Arc<ServiceProtocolClient>> = self.core.protocol.lock().take();

    if let Some(protocol) = protocol {
      protocol.close().await;
    }

    {
      let mut accounts = self.core.accounts.lock();
      accounts.active = false;
      accounts.live.clear();
      accounts.publisher.break_with(BeamError::pipe_broken());
    }

    *self.core.session.lock() = None;
    self.core.open.set_closed();
  }
}

/// Replays the delivered account set into a fresh subscriber.
fn deliver_live(accounts: &AccountMonitor, writer: &ScopedQueueWriter<AccountUpdate>) {
  let mut entries: Vec<&DirectoryEntry> = accounts.live.values().collect();
  entries.sort_unstable_by_key(|entry| entry.id);

  for entry in entries {
    if writer.push(AccountUpdate::added(entry.clone())).is_err() {
      return;
    }
  }
}

// -----------------------------------------------------------------------------
// Locator Utilities
// -----------------------------------------------------------------------------

/// Loads a directory, creating it if it does not already exist.
pub async fn load_or_create_directory<C>(
  client: &C,
  name: &str,
  parent: &DirectoryEntry,
) -> Result<DirectoryEntry>
where
  C: ServiceLocatorClient + ?Sized,
{
  match client.load_directory_entry_at(parent, name).await {
    Ok(directory) => Ok(directory),
    Err(error) if error.kind() == ErrorKind::ServiceRequest => {
      client.make_directory(name, parent).await
    }
    Err(error) => Err(error),
  }
}

/// Locates the addresses of a random healthy instance of a service.
///
/// Reads the `addresses` registration property: a JSON array of
/// `host:port` strings.
pub async fn locate_service_addresses<C>(client: &C, service_name: &str) -> Result<Vec<IpAddress>>
where
  C: ServiceLocatorClient + ?Sized,
{
  let services: Vec<ServiceEntry> = client
    .locate(service_name)
    .await
    .map_err(|_| BeamError::connect(format!("no {service_name} services available")))?;

  if services.is_empty() {
    return Err(BeamError::connect(format!("no {service_name} services available")));
  }

  let pick: usize = rand::rng().random_range(0..services.len());
  let service: &ServiceEntry = &services[pick];

  let addresses = service
    .properties
    .get("addresses")
    .and_then(Value::as_array)
    .ok_or_else(|| BeamError::type_compatibility("service has no addresses property"))?;

  addresses
    .iter()
    .map(|address| {
      address
        .as_str()
        .ok_or_else(|| BeamError::type_compatibility("address is not a string"))?
        .parse()
    })
    .collect()
}
