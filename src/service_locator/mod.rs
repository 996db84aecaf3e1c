//! The service locator: accounts, directories, permissions, sessions,
//! and a registry of running service endpoints.
//!
//! The server side is a servlet bound into a
//! [`ServiceProtocolServer`](crate::services::ServiceProtocolServer);
//! clients add credential storage, account-update subscriptions, and
//! transparent reconnection.

mod account_update;
mod client;
mod data_store;
mod directory_entry;
mod permissions;
mod service_entry;
mod servlet;
mod session;

pub mod messages;

pub use self::account_update::AccountUpdate;
pub use self::account_update::AccountUpdateType;
pub use self::client::ServiceLocatorClient;
pub use self::client::SessionServiceLocatorClient;
pub use self::client::load_or_create_directory;
pub use self::client::locate_service_addresses;
pub use self::data_store::LocalServiceLocatorDataStore;
pub use self::data_store::ServiceLocatorDataStore;
pub use self::directory_entry::DirectoryEntry;
pub use self::directory_entry::DirectoryEntryType;
pub use self::permissions::Permissions;
pub use self::service_entry::ServiceEntry;
pub use self::servlet::LocatorSession;
pub use self::servlet::ServiceLocatorServlet;
pub use self::session::decrypt_session_id;
pub use self::session::encrypt_session_id;
