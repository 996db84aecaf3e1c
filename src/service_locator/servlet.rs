use parking_lot::Mutex as SpinMutex;
use std::sync::Arc;
use std::sync::Weak;

use crate::error::BeamError;
use crate::error::Result;
use crate::service_locator::AccountUpdate;
use crate::service_locator::AccountUpdateType;
use crate::service_locator::DirectoryEntry;
use crate::service_locator::Permissions;
use crate::service_locator::ServiceEntry;
use crate::service_locator::ServiceLocatorDataStore;
use crate::service_locator::data_store;
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
use crate::services::BoxFuture;
use crate::services::CloseSlot;
use crate::services::ServiceSlots;
use crate::services::ServletClient;
use crate::threading::Mutex;

// -----------------------------------------------------------------------------
// Locator Session
// -----------------------------------------------------------------------------

/// Per-channel session state of a locator client.
#[derive(Debug, Default)]
pub struct LocatorSession {
  account: Option<DirectoryEntry>,
  session_id: Option<String>,
  monitoring: bool,
  registered: Vec<ServiceEntry>,
}

impl LocatorSession {
  /// The logged-in account, if any.
  #[inline]
  pub fn account(&self) -> Option<&DirectoryEntry> {
    self.account.as_ref()
  }
}

type LocatorClient = ServletClient<LocatorSession>;

// -----------------------------------------------------------------------------
// Servlet State
// -----------------------------------------------------------------------------

struct Registry {
  next_id: u32,
  services: Vec<ServiceEntry>,
}

struct ServletState {
  store: Arc<dyn ServiceLocatorDataStore>,
  /// Serializes every mutation with its account-update broadcast.
  transaction: Mutex<()>,
  sessions: SpinMutex<hashbrown::HashMap<String, DirectoryEntry>>,
  registry: SpinMutex<Registry>,
  monitors: SpinMutex<Vec<Weak<LocatorClient>>>,
}

impl ServletState {
  fn session_account(&self, client: &LocatorClient) -> Result<DirectoryEntry> {
    client
      .session()
      .lock()
      .account
      .clone()
      .ok_or_else(|| BeamError::service_request("not logged in"))
  }

  async fn authorize(
    &self,
    client: &LocatorClient,
    target: &DirectoryEntry,
    permissions: Permissions,
  ) -> Result<DirectoryEntry> {
    let account: DirectoryEntry = self.session_account(client)?;

    if self.store.has_permissions(&account, target, permissions).await? {
      Ok(account)
    } else {
      Err(BeamError::service_request("insufficient permissions"))
    }
  }

  /// Pushes `update` to every monitoring session with read access.
  ///
  /// Runs while the caller still holds the transaction lock, so a
  /// subscriber never observes a state the store has not committed.
  async fn broadcast(&self, update: AccountUpdate) {
    let monitors: Vec<Weak<LocatorClient>> = {
      let mut monitors = self.monitors.lock();
      monitors.retain(|monitor| monitor.strong_count() > 0);
      monitors.clone()
    };

    for monitor in monitors {
      let Some(client) = monitor.upgrade() else {
        continue;
      };

      let account: Option<DirectoryEntry> = {
        let session = client.session().lock();
        session.monitoring.then(|| session.account.clone()).flatten()
      };

      let Some(account) = account else {
        continue;
      };

      // Deletions go to everyone still monitoring: the entry's permission
      // rows are already gone, and the subscriber knew the account.
      let readable: bool = match update.update_type {
        AccountUpdateType::Deleted => true,
        AccountUpdateType::Added => self
          .store
          .has_permissions(&account, &update.entry, Permissions::READ)
          .await
          .unwrap_or(false),
      };

      if readable {
        if let Err(error) = client.send_message(&ACCOUNT_UPDATE_MESSAGE, &update) {
          tracing::debug!(client = client.identifier(), %error, "account update dropped");
        }
      }
    }
  }

  fn drop_monitor(&self, client: &Arc<LocatorClient>) {
    self
      .monitors
      .lock()
      .retain(|monitor| match monitor.upgrade() {
        Some(entry) => !Arc::ptr_eq(&entry, client),
        None => false,
      });
  }

  fn unregister_service(&self, service: &ServiceEntry) -> bool {
    let mut registry = self.registry.lock();
    let before: usize = registry.services.len();

    registry.services.retain(|entry| entry.id != service.id);
    registry.services.len() != before
  }

  // ---------------------------------------------------------------------------
  // Slot Implementations
  // ---------------------------------------------------------------------------

  async fn login(&self, client: &Arc<LocatorClient>, request: LoginRequest) -> Result<LoginResponse> {
    if client.session().lock().account.is_some() {
      return Err(BeamError::service_request("session already authenticated"));
    }

    let account: DirectoryEntry = self
      .store
      .load_account(&request.username)
      .await?
      .ok_or_else(|| BeamError::service_request("invalid credentials"))?;

    if !self.store.validate_password(&account, &request.password).await? {
      return Err(BeamError::service_request("invalid credentials"));
    }

    let session_id: String = session::generate_session_id();

    self
      .store
      .store_last_login_time(&account, data_store::now_seconds())
      .await?;

    self.sessions.lock().insert(session_id.clone(), account.clone());

    {
      let mut session = client.session().lock();
      session.account = Some(account.clone());
      session.session_id = Some(session_id.clone());
    }

    tracing::debug!(account = %account, "login");

    Ok(LoginResponse {
      account,
      session_id,
    })
  }

  async fn authenticate_session(
    &self,
    client: &Arc<LocatorClient>,
    request: AuthenticateSessionRequest,
  ) -> Result<DirectoryEntry> {
    self.session_account(client)?;

    let session_id: String = session::decrypt_session_id(&request.encrypted_session_id, request.key)
      .map_err(|_| BeamError::service_request("invalid session token"))?;

    self
      .sessions
      .lock()
      .get(&session_id)
      .cloned()
      .ok_or_else(|| BeamError::service_request("session not found"))
  }

  async fn locate(&self, client: &Arc<LocatorClient>, request: LocateRequest) -> Result<Vec<ServiceEntry>> {
    self.session_account(client)?;

    let registry = self.registry.lock();

    Ok(
      registry
        .services
        .iter()
        .filter(|service| service.name == request.name)
        .cloned()
        .collect(),
    )
  }

  async fn register(&self, client: &Arc<LocatorClient>, request: RegisterRequest) -> Result<ServiceEntry> {
    let account: DirectoryEntry = self.session_account(client)?;

    let service: ServiceEntry = {
      let mut registry = self.registry.lock();
      registry.next_id += 1;

      let service: ServiceEntry = ServiceEntry {
        name: request.name,
        id: registry.next_id,
        account,
        properties: request.properties,
      };

      registry.services.push(service.clone());
      service
    };

    client.session().lock().registered.push(service.clone());

    Ok(service)
  }

  async fn unregister(&self, client: &Arc<LocatorClient>, request: UnregisterRequest) -> Result<()> {
    self.session_account(client)?;

    if !self.unregister_service(&request.service) {
      return Err(BeamError::service_request("service not found"));
    }

    client
      .session()
      .lock()
      .registered
      .retain(|service| service.id != request.service.id);

    Ok(())
  }

  async fn load_all_accounts(&self, client: &Arc<LocatorClient>) -> Result<Vec<DirectoryEntry>> {
    let account: DirectoryEntry = self.session_account(client)?;
    let mut readable: Vec<DirectoryEntry> = Vec::new();

    for entry in self.store.load_all_accounts().await? {
      if self
        .store
        .has_permissions(&account, &entry, Permissions::READ)
        .await?
      {
        readable.push(entry);
      }
    }

    Ok(readable)
  }

  async fn find_account(
    &self,
    client: &Arc<LocatorClient>,
    request: FindAccountRequest,
  ) -> Result<Option<DirectoryEntry>> {
    self.session_account(client)?;
    self.store.load_account(&request.name).await
  }

  async fn make_account(
    &self,
    client: &Arc<LocatorClient>,
    request: MakeAccountRequest,
  ) -> Result<DirectoryEntry> {
    self
      .authorize(client, &request.parent, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;

    let account: DirectoryEntry = self
      .store
      .make_account(&request.name, &request.password, &request.parent)
      .await?;

    self.broadcast(AccountUpdate::added(account.clone())).await;

    Ok(account)
  }

  async fn make_directory(
    &self,
    client: &Arc<LocatorClient>,
    request: MakeDirectoryRequest,
  ) -> Result<DirectoryEntry> {
    self
      .authorize(client, &request.parent, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;
    self.store.make_directory(&request.name, &request.parent).await
  }

  async fn store_password(
    &self,
    client: &Arc<LocatorClient>,
    request: StorePasswordRequest,
  ) -> Result<()> {
    let account: DirectoryEntry = self.session_account(client)?;

    if account != request.account {
      self
        .authorize(client, &request.account, Permissions::ADMINISTRATE)
        .await?;
    }

    let _transaction = self.transaction.lock().await;
    self.store.store_password(&request.account, &request.password).await
  }

  async fn monitor_accounts(&self, client: &Arc<LocatorClient>) -> Result<Vec<DirectoryEntry>> {
    let snapshot: Vec<DirectoryEntry> = self.load_all_accounts(client).await?;

    let first: bool = {
      let mut session = client.session().lock();
      !std::mem::replace(&mut session.monitoring, true)
    };

    if first {
      self.monitors.lock().push(Arc::downgrade(client));
    }

    Ok(snapshot)
  }

  async fn unmonitor_accounts(&self, client: &Arc<LocatorClient>) -> Result<()> {
    self.session_account(client)?;

    client.session().lock().monitoring = false;
    self.drop_monitor(client);

    Ok(())
  }

  async fn load_path(&self, client: &Arc<LocatorClient>, request: LoadPathRequest) -> Result<DirectoryEntry> {
    self.session_account(client)?;

    let entry: DirectoryEntry = self.store.resolve_path(&request.root, &request.path).await?;
    self.authorize(client, &entry, Permissions::READ).await?;

    Ok(entry)
  }

  async fn load_id(&self, client: &Arc<LocatorClient>, request: LoadIdRequest) -> Result<DirectoryEntry> {
    self.session_account(client)?;

    let entry: DirectoryEntry = self.store.load_directory_entry(request.id).await?;
    self.authorize(client, &entry, Permissions::READ).await?;

    Ok(entry)
  }

  async fn load_parents(&self, client: &Arc<LocatorClient>, request: EntryRequest) -> Result<Vec<DirectoryEntry>> {
    self.authorize(client, &request.entry, Permissions::READ).await?;
    self.store.load_parents(&request.entry).await
  }

  async fn load_children(&self, client: &Arc<LocatorClient>, request: EntryRequest) -> Result<Vec<DirectoryEntry>> {
    self.authorize(client, &request.entry, Permissions::READ).await?;
    self.store.load_children(&request.entry).await
  }

  async fn delete_entry(&self, client: &Arc<LocatorClient>, request: EntryRequest) -> Result<()> {
    self
      .authorize(client, &request.entry, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;

    self.store.delete_entry(&request.entry).await?;

    if request.entry.is_account() {
      self.broadcast(AccountUpdate::deleted(request.entry)).await;
    }

    Ok(())
  }

  async fn associate(&self, client: &Arc<LocatorClient>, request: AssociationRequest) -> Result<()> {
    self
      .authorize(client, &request.parent, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;
    self.store.associate(&request.entry, &request.parent).await
  }

  async fn detach(&self, client: &Arc<LocatorClient>, request: AssociationRequest) -> Result<()> {
    self
      .authorize(client, &request.parent, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;
    self.store.detach(&request.entry, &request.parent).await
  }

  async fn has_permissions(&self, client: &Arc<LocatorClient>, request: HasPermissionsRequest) -> Result<bool> {
    self.session_account(client)?;

    self
      .store
      .has_permissions(&request.account, &request.target, request.permissions)
      .await
  }

  async fn store_permissions(
    &self,
    client: &Arc<LocatorClient>,
    request: StorePermissionsRequest,
  ) -> Result<()> {
    self
      .authorize(client, &request.target, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;

    self
      .store
      .store_permissions(&request.source, &request.target, request.permissions)
      .await
  }

  async fn load_registration_time(&self, client: &Arc<LocatorClient>, request: EntryRequest) -> Result<u64> {
    self.authorize(client, &request.entry, Permissions::READ).await?;
    self.store.load_registration_time(&request.entry).await
  }

  async fn load_last_login_time(&self, client: &Arc<LocatorClient>, request: EntryRequest) -> Result<u64> {
    self.authorize(client, &request.entry, Permissions::READ).await?;
    self.store.load_last_login_time(&request.entry).await
  }

  async fn rename(&self, client: &Arc<LocatorClient>, request: RenameRequest) -> Result<DirectoryEntry> {
    self
      .authorize(client, &request.entry, Permissions::ADMINISTRATE)
      .await?;

    let _transaction = self.transaction.lock().await;
    self.store.rename(&request.entry, &request.name).await
  }

  async fn on_client_close(&self, client: Arc<LocatorClient>) {
    let (session_id, registered, monitoring) = {
      let mut session = client.session().lock();

      (
        session.session_id.take(),
        std::mem::take(&mut session.registered),
        std::mem::replace(&mut session.monitoring, false),
      )
    };

    if let Some(session_id) = session_id {
      self.sessions.lock().remove(&session_id);
    }

    for service in registered.iter() {
      self.unregister_service(service);
    }

    if monitoring {
      self.drop_monitor(&client);
    }

    tracing::debug!(client = client.identifier(), "session closed");
  }
}

// -----------------------------------------------------------------------------
// Service Locator Servlet
// -----------------------------------------------------------------------------

/// Binds the locator's operations into a service protocol server.
///
/// ```ignore
/// let servlet = ServiceLocatorServlet::new(store);
/// let server = ServiceProtocolServer::new(
///   connection,
///   servlet.slots(),
///   Some(servlet.on_close()),
/// );
/// ```
pub struct ServiceLocatorServlet {
  state: Arc<ServletState>,
}

impl ServiceLocatorServlet {
  /// Constructs a servlet over `store`.
  pub fn new(store: Arc<dyn ServiceLocatorDataStore>) -> Self {
    Self {
      state: Arc::new(ServletState {
        store,
        transaction: Mutex::new(()),
        sessions: SpinMutex::new(hashbrown::HashMap::new()),
        registry: SpinMutex::new(Registry {
          next_id: 0,
          services: Vec::new(),
        }),
        monitors: SpinMutex::new(Vec::new()),
      }),
    }
  }

  /// Builds the slot registry for a protocol server.
  pub fn slots(&self) -> ServiceSlots<LocatorSession> {
    let mut slots: ServiceSlots<LocatorSession> = ServiceSlots::new();

    macro_rules! bind {
      ($service:expr, $method:ident) => {{
        let state = Arc::clone(&self.state);

        slots.add_service(&$service, move |client, request| {
          let state = Arc::clone(&state);
          async move { state.$method(&client, request).await }
        });
      }};
      (unit $service:expr, $method:ident) => {{
        let state = Arc::clone(&self.state);

        slots.add_service(&$service, move |client, _request: ()| {
          let state = Arc::clone(&state);
          async move { state.$method(&client).await }
        });
      }};
    }

    bind!(LOGIN_SERVICE, login);
    bind!(AUTHENTICATE_SESSION_SERVICE, authenticate_session);
    bind!(LOCATE_SERVICE, locate);
    bind!(REGISTER_SERVICE, register);
    bind!(UNREGISTER_SERVICE, unregister);
    bind!(unit LOAD_ALL_ACCOUNTS_SERVICE, load_all_accounts);
    bind!(FIND_ACCOUNT_SERVICE, find_account);
    bind!(MAKE_ACCOUNT_SERVICE, make_account);
    bind!(MAKE_DIRECTORY_SERVICE, make_directory);
    bind!(STORE_PASSWORD_SERVICE, store_password);
    bind!(unit MONITOR_ACCOUNTS_SERVICE, monitor_accounts);
    bind!(unit UNMONITOR_ACCOUNTS_SERVICE, unmonitor_accounts);
    bind!(LOAD_PATH_SERVICE, load_path);
    bind!(LOAD_ID_SERVICE, load_id);
    bind!(LOAD_PARENTS_SERVICE, load_parents);
    bind!(LOAD_CHILDREN_SERVICE, load_children);
    bind!(DELETE_SERVICE, delete_entry);
    bind!(ASSOCIATE_SERVICE, associate);
    bind!(DETACH_SERVICE, detach);
    bind!(HAS_PERMISSIONS_SERVICE, has_permissions);
    bind!(STORE_PERMISSIONS_SERVICE, store_permissions);
    bind!(LOAD_REGISTRATION_TIME_SERVICE, load_registration_time);
    bind!(LOAD_LAST_LOGIN_TIME_SERVICE, load_last_login_time);
    bind!(RENAME_SERVICE, rename);

    slots
  }

  /// Builds the close hook cleaning up a client's session.
  pub fn on_close(&self) -> CloseSlot<LocatorSession> {
    let state: Arc<ServletState> = Arc::clone(&self.state);

    Arc::new(move |client| {
      let state = Arc::clone(&state);
      Box::pin(async move { state.on_client_close(client).await }) as BoxFuture<()>
    })
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use serde_json::json;
  use std::sync::Arc;

  use crate::error::ErrorKind;
  use crate::queues::Queue;
  use crate::service_locator::AccountUpdate;
  use crate::service_locator::DirectoryEntry;
  use crate::service_locator::LocalServiceLocatorDataStore;
  use crate::service_locator::LocatorSession;
  use crate::service_locator::Permissions;
  use crate::service_locator::ServiceLocatorClient;
  use crate::service_locator::ServiceLocatorDataStore;
  use crate::service_locator::ServiceLocatorServlet;
  use crate::service_locator::SessionServiceLocatorClient;
  use crate::services::LocalServerConnection;
  use crate::services::ServerConnection;
  use crate::services::ServiceProtocolClientBuilder;
  use crate::services::ServiceProtocolServer;
  use crate::threading::Timer;
  use crate::threading::TriggerTimer;

  /// Seeds a store with an `admin` account holding full rights on `*`.
  async fn seeded_store() -> Arc<LocalServiceLocatorDataStore> {
    let store: Arc<LocalServiceLocatorDataStore> = Arc::new(LocalServiceLocatorDataStore::new());

    let star: DirectoryEntry = DirectoryEntry::star();
    let admin = store.make_account("admin", "root", &star).await.unwrap();

    store
      .store_permissions(&admin, &star, Permissions::all())
      .await
      .unwrap();

    store
  }

  async fn serve(
    store: Arc<LocalServiceLocatorDataStore>,
  ) -> (
    Arc<LocalServerConnection>,
    ServiceProtocolServer<LocatorSession>,
  ) {
    let connection = LocalServerConnection::new();
    let servlet: ServiceLocatorServlet = ServiceLocatorServlet::new(store);

    let server: ServiceProtocolServer<LocatorSession> = ServiceProtocolServer::new(
      Arc::clone(&connection) as Arc<dyn ServerConnection>,
      servlet.slots(),
      Some(servlet.on_close()),
    );

    (connection, server)
  }

  fn client(connection: &Arc<LocalServerConnection>) -> SessionServiceLocatorClient {
    let connection: Arc<LocalServerConnection> = Arc::clone(connection);

    let builder: ServiceProtocolClientBuilder = ServiceProtocolClientBuilder::new(
      move || {
        let connection = Arc::clone(&connection);
        async move { connection.connect("servlet-test") }
      },
      || Box::new(TriggerTimer::new()) as Box<dyn Timer>,
    );

    SessionServiceLocatorClient::new(builder)
  }

  #[tokio::test]
  async fn test_login_and_directory_round_trip() {
    let (connection, server) = serve(seeded_store().await).await;
    let admin = client(&connection);

    admin.set_credentials("admin", "root");
    admin.open().await.unwrap();

    assert_eq!(admin.get_account().unwrap().name, "admin");

    let star: DirectoryEntry = DirectoryEntry::star();
    let traders = admin.make_directory("traders", &star).await.unwrap();
    let made = admin.make_account("alice", "pw", &traders).await.unwrap();

    assert_eq!(
      admin.load_directory_entry_at(&star, "traders").await.unwrap(),
      traders
    );

    assert_eq!(admin.find_account("alice").await.unwrap(), Some(made.clone()));

    admin.delete_entry(&made).await.unwrap();
    assert_eq!(admin.find_account("alice").await.unwrap(), None);

    admin.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_login_rejects_bad_password() {
    let (connection, server) = serve(seeded_store().await).await;
    let intruder = client(&connection);

    intruder.set_credentials("admin", "wrong");

    let error = intruder.open().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ServiceRequest);

    server.close().await;
  }

  #[tokio::test]
  async fn test_permissions_gate_mutations() {
    let store = seeded_store().await;

    let star: DirectoryEntry = DirectoryEntry::star();
    store.make_account("bob", "pw", &star).await.unwrap();

    let (connection, server) = serve(store).await;
    let bob = client(&connection);

    bob.set_credentials("bob", "pw");
    bob.open().await.unwrap();

    let error = bob.make_directory("lair", &star).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ServiceRequest);

    bob.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_service_registry() {
    let (connection, server) = serve(seeded_store().await).await;
    let admin = client(&connection);

    admin.set_credentials("admin", "root");
    admin.open().await.unwrap();

    let registered = admin
      .register("market_data", json!({"addresses": ["localhost:20000"]}))
      .await
      .unwrap();

    let located = admin.locate("market_data").await.unwrap();
    assert_eq!(located, vec![registered.clone()]);

    admin.unregister(&registered).await.unwrap();
    assert!(admin.locate("market_data").await.unwrap().is_empty());

    admin.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_registry_cleared_on_session_close() {
    let (connection, server) = serve(seeded_store().await).await;

    let first = client(&connection);
    first.set_credentials("admin", "root");
    first.open().await.unwrap();

    first
      .register("uid", json!({"addresses": ["localhost:20001"]}))
      .await
      .unwrap();

    first.close().await;

    let second = client(&connection);
    second.set_credentials("admin", "root");
    second.open().await.unwrap();

    assert!(second.locate("uid").await.unwrap().is_empty());

    second.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_monitor_accounts_streams_mutations() {
    let (connection, server) = serve(seeded_store().await).await;
    let admin = client(&connection);

    admin.set_credentials("admin", "root");
    admin.open().await.unwrap();

    let updates: Arc<Queue<AccountUpdate>> = Arc::new(Queue::new());
    admin.monitor_accounts(Arc::clone(&updates)).await.unwrap();

    // The snapshot holds the admin account itself.
    let snapshot = updates.pop().await.unwrap();
    assert_eq!(snapshot.entry.name, "admin");

    let star: DirectoryEntry = DirectoryEntry::star();
    let alice = admin.make_account("alice", "pw", &star).await.unwrap();

    assert_eq!(updates.pop().await.unwrap(), AccountUpdate::added(alice.clone()));

    admin.delete_entry(&alice).await.unwrap();
    assert_eq!(updates.pop().await.unwrap(), AccountUpdate::deleted(alice));

    admin.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_encrypted_session_round_trip() {
    let (connection, server) = serve(seeded_store().await).await;
    let admin = client(&connection);

    admin.set_credentials("admin", "root");
    admin.open().await.unwrap();

    let token: String = admin.get_encrypted_session_id(41).unwrap();

    let account = admin.authenticate_session(&token, 41).await.unwrap();
    assert_eq!(account, admin.get_account().unwrap());

    let error = admin.authenticate_session(&token, 42).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ServiceRequest);

    admin.close().await;
    server.close().await;
  }
}
