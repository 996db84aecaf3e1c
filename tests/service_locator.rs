//! End-to-end scenarios for the service locator client against a
//! hand-wired protocol server.

use parking_lot::Mutex as SpinMutex;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use beam::error::ErrorKind;
use beam::queues::Queue;
use beam::routines;
use beam::service_locator::AccountUpdate;
use beam::service_locator::DirectoryEntry;
use beam::service_locator::LocatorSession;
use beam::service_locator::ServiceLocatorClient;
use beam::service_locator::SessionServiceLocatorClient;
use beam::service_locator::messages::ACCOUNT_UPDATE_MESSAGE;
use beam::service_locator::messages::LOGIN_SERVICE;
use beam::service_locator::messages::LoginRequest;
use beam::service_locator::messages::LoginResponse;
use beam::service_locator::messages::MONITOR_ACCOUNTS_SERVICE;
use beam::service_locator::messages::UNMONITOR_ACCOUNTS_SERVICE;
use beam::services::Connection;
use beam::services::LocalServerConnection;
use beam::services::ServiceProtocolClientBuilder;
use beam::services::ServiceProtocolServer;
use beam::services::ServiceSlots;
use beam::services::ServletClient;
use beam::threading::Timer;
use beam::threading::TriggerTimer;

type TestSlots = ServiceSlots<LocatorSession>;
type ServerSide = Arc<SpinMutex<Option<Arc<ServletClient<LocatorSession>>>>>;
type Channels = Arc<SpinMutex<Vec<Arc<dyn Connection>>>>;

fn accept_login(slots: &mut TestSlots, received: &Arc<AtomicUsize>) {
  let received: Arc<AtomicUsize> = Arc::clone(received);

  slots.add_service(&LOGIN_SERVICE, move |_client, _request: LoginRequest| {
    received.fetch_add(1, Ordering::SeqCst);

    async move {
      Ok(LoginResponse {
        account: DirectoryEntry::account(0, "account"),
        session_id: "sessionid".to_string(),
      })
    }
  });
}

fn monitor_slot(slots: &mut TestSlots, accounts: &Arc<SpinMutex<Vec<DirectoryEntry>>>, side: &ServerSide) {
  let accounts: Arc<SpinMutex<Vec<DirectoryEntry>>> = Arc::clone(accounts);
  let side: ServerSide = Arc::clone(side);

  slots.add_service(&MONITOR_ACCOUNTS_SERVICE, move |client, _request: ()| {
    *side.lock() = Some(client);
    let snapshot: Vec<DirectoryEntry> = accounts.lock().clone();

    async move { Ok(snapshot) }
  });
}

fn unmonitor_slot(slots: &mut TestSlots, calls: &Arc<Queue<()>>) {
  let calls: Arc<Queue<()>> = Arc::clone(calls);

  slots.add_service(&UNMONITOR_ACCOUNTS_SERVICE, move |_client, _request: ()| {
    let _ = calls.push(());
    async move { Ok(()) }
  });
}

fn locator_client(
  connection: &Arc<LocalServerConnection>,
  channels: &Channels,
) -> SessionServiceLocatorClient {
  let connection: Arc<LocalServerConnection> = Arc::clone(connection);
  let channels: Channels = Arc::clone(channels);

  let builder: ServiceProtocolClientBuilder = ServiceProtocolClientBuilder::new(
    move || {
      let connection = Arc::clone(&connection);
      let channels = Arc::clone(&channels);

      async move {
        let channel = connection.connect("test")?;
        channels.lock().push(Arc::clone(&channel.connection));
        Ok(channel)
      }
    },
    || Box::new(TriggerTimer::new()) as Box<dyn Timer>,
  );

  SessionServiceLocatorClient::new(builder)
}

fn test_accounts() -> Vec<DirectoryEntry> {
  vec![
    DirectoryEntry::account(123, "accountA"),
    DirectoryEntry::account(124, "accountB"),
    DirectoryEntry::account(125, "accountC"),
  ]
}

#[tokio::test]
async fn login_accepted() {
  let connection = LocalServerConnection::new();
  let received: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

  let mut slots: TestSlots = ServiceSlots::new();
  accept_login(&mut slots, &received);

  let server: ServiceProtocolServer<LocatorSession> =
    ServiceProtocolServer::new(Arc::clone(&connection) as _, slots, None);

  let channels: Channels = Arc::new(SpinMutex::new(Vec::new()));
  let client = locator_client(&connection, &channels);

  client.set_credentials("account", "password");
  client.open().await.unwrap();

  assert_eq!(received.load(Ordering::SeqCst), 1);
  assert_eq!(client.get_account().unwrap().name, "account");
  assert_eq!(client.get_session_id().unwrap(), "sessionid");

  client.close().await;
  server.close().await;
}

#[tokio::test]
async fn login_rejected() {
  let connection = LocalServerConnection::new();

  let mut slots: TestSlots = ServiceSlots::new();

  slots.add_service(&LOGIN_SERVICE, |_client, _request: LoginRequest| async {
    Err::<LoginResponse, _>(beam::error::BeamError::service_request("invalid credentials"))
  });

  let server: ServiceProtocolServer<LocatorSession> =
    ServiceProtocolServer::new(Arc::clone(&connection) as _, slots, None);

  let channels: Channels = Arc::new(SpinMutex::new(Vec::new()));
  let client = locator_client(&connection, &channels);

  client.set_credentials("account", "password");

  let error = client.open().await.unwrap_err();
  assert_eq!(error.kind(), ErrorKind::ServiceRequest);

  server.close().await;
}

#[tokio::test]
async fn monitor_accounts() {
  let connection = LocalServerConnection::new();
  let received: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
  let accounts: Arc<SpinMutex<Vec<DirectoryEntry>>> = Arc::new(SpinMutex::new(test_accounts()));
  let side: ServerSide = Arc::new(SpinMutex::new(None));
  let unmonitors: Arc<Queue<()>> = Arc::new(Queue::new());

  let mut slots: TestSlots = ServiceSlots::new();
  accept_login(&mut slots, &received);
  monitor_slot(&mut slots, &accounts, &side);
  unmonitor_slot(&mut slots, &unmonitors);

  let server: ServiceProtocolServer<LocatorSession> =
    ServiceProtocolServer::new(Arc::clone(&connection) as _, slots, None);

  let channels: Channels = Arc::new(SpinMutex::new(Vec::new()));
  let client = locator_client(&connection, &channels);

  client.set_credentials("account", "password");
  client.open().await.unwrap();

  let queue: Arc<Queue<AccountUpdate>> = Arc::new(Queue::new());
  client.monitor_accounts(Arc::clone(&queue)).await.unwrap();

  let expected: Vec<DirectoryEntry> = test_accounts();

  for account in expected.iter() {
    assert_eq!(queue.pop().await.unwrap(), AccountUpdate::added(account.clone()));
  }

  // A live delta flows through the same queue.
  let server_client = side.lock().clone().unwrap();

  server_client
    .send_message(&ACCOUNT_UPDATE_MESSAGE, &AccountUpdate::deleted(expected[0].clone()))
    .unwrap();

  assert_eq!(
    queue.pop().await.unwrap(),
    AccountUpdate::deleted(expected[0].clone())
  );

  // A duplicate subscription replays only the still-live accounts.
  let duplicate: Arc<Queue<AccountUpdate>> = Arc::new(Queue::new());
  client.monitor_accounts(Arc::clone(&duplicate)).await.unwrap();

  assert_eq!(duplicate.pop().await.unwrap(), AccountUpdate::added(expected[1].clone()));
  assert_eq!(duplicate.pop().await.unwrap(), AccountUpdate::added(expected[2].clone()));
  assert!(duplicate.try_pop().is_none());

  // Dropping every subscriber triggers exactly one unmonitor request.
  drop(queue);
  drop(duplicate);

  server_client
    .send_message(&ACCOUNT_UPDATE_MESSAGE, &AccountUpdate::deleted(expected[1].clone()))
    .unwrap();

  unmonitors.pop().await.unwrap();

  routines::yield_now().await;
  assert!(unmonitors.try_pop().is_none());

  client.close().await;
  server.close().await;
}

#[tokio::test]
async fn monitor_accounts_reconnect() {
  let connection = LocalServerConnection::new();
  let received: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
  let accounts: Arc<SpinMutex<Vec<DirectoryEntry>>> = Arc::new(SpinMutex::new(test_accounts()));
  let side: ServerSide = Arc::new(SpinMutex::new(None));

  let mut slots: TestSlots = ServiceSlots::new();
  accept_login(&mut slots, &received);
  monitor_slot(&mut slots, &accounts, &side);

  let server: ServiceProtocolServer<LocatorSession> =
    ServiceProtocolServer::new(Arc::clone(&connection) as _, slots, None);

  let channels: Channels = Arc::new(SpinMutex::new(Vec::new()));
  let client = locator_client(&connection, &channels);

  client.set_credentials("account", "password");
  client.open().await.unwrap();

  let queue: Arc<Queue<AccountUpdate>> = Arc::new(Queue::new());
  client.monitor_accounts(Arc::clone(&queue)).await.unwrap();

  for _ in 0..test_accounts().len() {
    queue.top().await.unwrap();
    queue.pop().await.unwrap();
  }

  // The server gains an account while the channel is down.
  let late: DirectoryEntry = DirectoryEntry::account(135, "accountD");
  accounts.lock().push(late.clone());

  let broken = channels.lock().last().cloned().unwrap();
  broken.close().await;

  // The client reconnects and replays the subscription; only the new
  // account surfaces.
  assert_eq!(queue.pop().await.unwrap(), AccountUpdate::added(late));

  client.close().await;

  assert_eq!(queue.top().await.unwrap_err().kind(), ErrorKind::PipeBroken);

  server.close().await;
}

#[tokio::test]
async fn queue_break_races_parked_readers() {
  let queue: Arc<Queue<u32>> = Arc::new(Queue::new());

  let mut readers = Vec::new();

  for _ in 0..2 {
    let queue = Arc::clone(&queue);

    readers.push(routines::spawn(async move {
      assert_eq!(queue.top().await.unwrap_err().kind(), ErrorKind::PipeBroken);
    }));
  }

  routines::yield_now().await;
  queue.break_pipe();

  for reader in readers.iter() {
    routines::wait(reader).await;
  }
}

#[tokio::test]
async fn recursive_mutex_handoff() {
  use beam::threading::RecursiveMutex;

  let mutex: Arc<RecursiveMutex> = Arc::new(RecursiveMutex::new());
  let progressed: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

  let holder_mutex: Arc<RecursiveMutex> = Arc::clone(&mutex);
  let contender_mutex: Arc<RecursiveMutex> = Arc::clone(&mutex);
  let contender_flag: Arc<AtomicUsize> = Arc::clone(&progressed);

  let holder = routines::spawn(async move {
    let outer = holder_mutex.lock().await;
    let inner = holder_mutex.lock().await;

    // Give the contender a chance to park.
    routines::yield_now().await;

    drop(inner);
    routines::yield_now().await;

    drop(outer);
  });

  routines::yield_now().await;

  let contender = routines::spawn(async move {
    let _guard = contender_mutex.lock().await;
    contender_flag.fetch_add(1, Ordering::SeqCst);
  });

  routines::wait(&holder).await;
  routines::wait(&contender).await;

  assert_eq!(progressed.load(Ordering::SeqCst), 1);
}
