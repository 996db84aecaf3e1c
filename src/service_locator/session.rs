use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use ring::aead::AES_256_GCM;
use ring::aead::Aad;
use ring::aead::LessSafeKey;
use ring::aead::NONCE_LEN;
use ring::aead::Nonce;
use ring::aead::UnboundKey;
use sha2::Digest;
use sha2::Sha256;

use crate::consts::PASSWORD_SALT_BYTES;
use crate::consts::SESSION_ID_BYTES;
use crate::error::BeamError;
use crate::error::Result;

// -----------------------------------------------------------------------------
// Session Ids
// -----------------------------------------------------------------------------

/// Mints an unguessable 128-bit session id.
pub(crate) fn generate_session_id() -> String {
  let mut bytes: [u8; SESSION_ID_BYTES] = [0; SESSION_ID_BYTES];
  rand::rng().fill_bytes(&mut bytes);

  BASE64.encode(bytes)
}

// -----------------------------------------------------------------------------
// Password Digests
// -----------------------------------------------------------------------------

/// Mints a fresh random salt for a stored credential.
pub(crate) fn generate_salt() -> Vec<u8> {
  let mut salt: [u8; PASSWORD_SALT_BYTES] = [0; PASSWORD_SALT_BYTES];
  rand::rng().fill_bytes(&mut salt);

  salt.to_vec()
}

/// Computes the salted digest stored for (and compared against) a
/// password.
pub(crate) fn hash_password(salt: &[u8], password: &str) -> String {
  let mut hasher: Sha256 = Sha256::new();

  hasher.update(salt);
  hasher.update(password.as_bytes());

  BASE64.encode(hasher.finalize())
}

// -----------------------------------------------------------------------------
// Session Id Encryption
// -----------------------------------------------------------------------------

/// Encrypts `session_id` under a key derived from `key`.
///
/// AES-256-GCM with a random nonce; the token is
/// `base64(nonce ‖ ciphertext ‖ tag)`. The nonce makes a captured token
/// useless for replay across sessions of the pair.
pub fn encrypt_session_id(session_id: &str, key: u32) -> Result<String> {
  let sealing: LessSafeKey = derive_key(key)?;

  let mut nonce_bytes: [u8; NONCE_LEN] = [0; NONCE_LEN];
  rand::rng().fill_bytes(&mut nonce_bytes);

  let nonce: Nonce = Nonce::assume_unique_for_key(nonce_bytes);
  let mut sealed: Vec<u8> = session_id.as_bytes().to_vec();

  sealing
    .seal_in_place_append_tag(nonce, Aad::empty(), &mut sealed)
    .map_err(|_| BeamError::serialization("session id encryption failed"))?;

  let mut token: Vec<u8> = nonce_bytes.to_vec();
  token.extend_from_slice(&sealed);

  Ok(BASE64.encode(token))
}

/// Inverts [`encrypt_session_id`] for the same `key`.
pub fn decrypt_session_id(token: &str, key: u32) -> Result<String> {
  let opening: LessSafeKey = derive_key(key)?;

  let token: Vec<u8> = BASE64
    .decode(token)
    .map_err(|error| BeamError::serialization(error))?;

  if token.len() <= NONCE_LEN {
    return Err(BeamError::serialization("session token too short"));
  }

  let (nonce_bytes, sealed) = token.split_at(NONCE_LEN);

  let nonce: Nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
    .map_err(|_| BeamError::serialization("malformed session token"))?;

  let mut sealed: Vec<u8> = sealed.to_vec();

  let opened: &[u8] = opening
    .open_in_place(nonce, Aad::empty(), &mut sealed)
    .map_err(|_| BeamError::serialization("session token rejected"))?;

  String::from_utf8(opened.to_vec()).map_err(|error| BeamError::serialization(error))
}

fn derive_key(key: u32) -> Result<LessSafeKey> {
  let mut hasher: Sha256 = Sha256::new();

  hasher.update(b"beam.session-key");
  hasher.update(key.to_le_bytes());

  let derived = hasher.finalize();

  let unbound: UnboundKey = UnboundKey::new(&AES_256_GCM, &derived)
    .map_err(|_| BeamError::serialization("session key derivation failed"))?;

  Ok(LessSafeKey::new(unbound))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::service_locator::session;

  #[test]
  fn test_session_id_uniqueness() {
    assert_ne!(session::generate_session_id(), session::generate_session_id());
  }

  #[test]
  fn test_password_digest() {
    let salt: Vec<u8> = session::generate_salt();

    let digest: String = session::hash_password(&salt, "password");

    assert_eq!(session::hash_password(&salt, "password"), digest);
    assert_ne!(session::hash_password(&salt, "Password"), digest);

    let other_salt: Vec<u8> = session::generate_salt();
    assert_ne!(session::hash_password(&other_salt, "password"), digest);
  }

  #[test]
  fn test_session_token_round_trip() {
    let id: String = session::generate_session_id();
    let token: String = session::encrypt_session_id(&id, 7).unwrap();

    assert_eq!(session::decrypt_session_id(&token, 7).unwrap(), id);
  }

  #[test]
  fn test_session_token_wrong_key() {
    let token: String = session::encrypt_session_id("sessionid", 7).unwrap();
    assert!(session::decrypt_session_id(&token, 8).is_err());
  }

  #[test]
  fn test_session_token_replay_varies() {
    let first: String = session::encrypt_session_id("sessionid", 7).unwrap();
    let second: String = session::encrypt_session_id("sessionid", 7).unwrap();

    // Random nonces: identical plaintext never produces identical tokens.
    assert_ne!(first, second);
  }
}
