//! Service and message slots spoken between locator clients and servers.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::service_locator::AccountUpdate;
use crate::service_locator::DirectoryEntry;
use crate::service_locator::Permissions;
use crate::service_locator::ServiceEntry;
use crate::services::MessageSlot;
use crate::services::Service;

// -----------------------------------------------------------------------------
// Request / Response Bodies
// -----------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
  pub account: DirectoryEntry,
  pub session_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticateSessionRequest {
  pub encrypted_session_id: String,
  pub key: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocateRequest {
  pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
  pub name: String,
  pub properties: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnregisterRequest {
  pub service: ServiceEntry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindAccountRequest {
  pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MakeAccountRequest {
  pub name: String,
  pub password: String,
  pub parent: DirectoryEntry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MakeDirectoryRequest {
  pub name: String,
  pub parent: DirectoryEntry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorePasswordRequest {
  pub account: DirectoryEntry,
  pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadPathRequest {
  pub root: DirectoryEntry,
  pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadIdRequest {
  pub id: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntryRequest {
  pub entry: DirectoryEntry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationRequest {
  pub entry: DirectoryEntry,
  pub parent: DirectoryEntry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HasPermissionsRequest {
  pub account: DirectoryEntry,
  pub target: DirectoryEntry,
  pub permissions: Permissions,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorePermissionsRequest {
  pub source: DirectoryEntry,
  pub target: DirectoryEntry,
  pub permissions: Permissions,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenameRequest {
  pub entry: DirectoryEntry,
  pub name: String,
}

// -----------------------------------------------------------------------------
// Services
// -----------------------------------------------------------------------------

pub const LOGIN_SERVICE: Service<LoginRequest, LoginResponse> =
  Service::new(1, "service_locator.login");

pub const AUTHENTICATE_SESSION_SERVICE: Service<AuthenticateSessionRequest, DirectoryEntry> =
  Service::new(2, "service_locator.authenticate_session");

pub const LOCATE_SERVICE: Service<LocateRequest, Vec<ServiceEntry>> =
  Service::new(3, "service_locator.locate");

pub const REGISTER_SERVICE: Service<RegisterRequest, ServiceEntry> =
  Service::new(4, "service_locator.register");

pub const UNREGISTER_SERVICE: Service<UnregisterRequest, ()> =
  Service::new(5, "service_locator.unregister");

pub const LOAD_ALL_ACCOUNTS_SERVICE: Service<(), Vec<DirectoryEntry>> =
  Service::new(6, "service_locator.load_all_accounts");

pub const FIND_ACCOUNT_SERVICE: Service<FindAccountRequest, Option<DirectoryEntry>> =
  Service::new(7, "service_locator.find_account");

pub const MAKE_ACCOUNT_SERVICE: Service<MakeAccountRequest, DirectoryEntry> =
  Service::new(8, "service_locator.make_account");

pub const MAKE_DIRECTORY_SERVICE: Service<MakeDirectoryRequest, DirectoryEntry> =
  Service::new(9, "service_locator.make_directory");

pub const STORE_PASSWORD_SERVICE: Service<StorePasswordRequest, ()> =
  Service::new(10, "service_locator.store_password");

pub const MONITOR_ACCOUNTS_SERVICE: Service<(), Vec<DirectoryEntry>> =
  Service::new(11, "service_locator.monitor_accounts");

pub const UNMONITOR_ACCOUNTS_SERVICE: Service<(), ()> =
  Service::new(12, "service_locator.unmonitor_accounts");

pub const LOAD_PATH_SERVICE: Service<LoadPathRequest, DirectoryEntry> =
  Service::new(13, "service_locator.load_directory_entry_path");

pub const LOAD_ID_SERVICE: Service<LoadIdRequest, DirectoryEntry> =
  Service::new(14, "service_locator.load_directory_entry_id");

pub const LOAD_PARENTS_SERVICE: Service<EntryRequest, Vec<DirectoryEntry>> =
  Service::new(15, "service_locator.load_parents");

pub const LOAD_CHILDREN_SERVICE: Service<EntryRequest, Vec<DirectoryEntry>> =
  Service::new(16, "service_locator.load_children");

pub const DELETE_SERVICE: Service<EntryRequest, ()> =
  Service::new(17, "service_locator.delete");

pub const ASSOCIATE_SERVICE: Service<AssociationRequest, ()> =
  Service::new(18, "service_locator.associate");

pub const DETACH_SERVICE: Service<AssociationRequest, ()> =
  Service::new(19, "service_locator.detach");

pub const HAS_PERMISSIONS_SERVICE: Service<HasPermissionsRequest, bool> =
  Service::new(20, "service_locator.has_permissions");

pub const STORE_PERMISSIONS_SERVICE: Service<StorePermissionsRequest, ()> =
  Service::new(21, "service_locator.store_permissions");

pub const LOAD_REGISTRATION_TIME_SERVICE: Service<EntryRequest, u64> =
  Service::new(22, "service_locator.load_registration_time");

pub const LOAD_LAST_LOGIN_TIME_SERVICE: Service<EntryRequest, u64> =
  Service::new(23, "service_locator.load_last_login_time");

pub const RENAME_SERVICE: Service<RenameRequest, DirectoryEntry> =
  Service::new(24, "service_locator.rename");

// -----------------------------------------------------------------------------
// Messages
// -----------------------------------------------------------------------------

pub const ACCOUNT_UPDATE_MESSAGE: MessageSlot<AccountUpdate> =
  MessageSlot::new(1, "service_locator.account_update");
