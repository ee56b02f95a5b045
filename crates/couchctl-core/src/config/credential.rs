//! Where profile secrets come from
//!
//! A stored value is either plaintext or a `keyring:<key>` reference into the
//! OS keyring (only with the `secure-storage` feature). An environment
//! variable, when named and set, takes precedence over both.

use super::error::{ConfigError, Result};
use std::env;

/// Prefix marking a value as a keyring reference
const KEYRING_PREFIX: &str = "keyring:";

/// Service name for keyring entries
#[cfg(feature = "secure-storage")]
const SERVICE_NAME: &str = "couchctl";

/// Storage backend for new secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStorage {
    #[cfg(feature = "secure-storage")]
    Keyring,
    Plaintext,
}

/// Resolves and stores profile secrets
#[derive(Debug)]
pub struct CredentialStore {
    storage: CredentialStorage,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Plaintext store; secrets are written into the config file as-is
    pub fn new() -> Self {
        Self {
            storage: CredentialStorage::Plaintext,
        }
    }

    /// Keyring-backed store, falling back to plaintext when no keyring service
    /// answers
    #[cfg(feature = "secure-storage")]
    pub fn keyring() -> Self {
        let storage = match keyring::Entry::new(SERVICE_NAME, "__probe__") {
            Ok(entry) => {
                let _ = entry.get_password();
                CredentialStorage::Keyring
            }
            Err(_) => CredentialStorage::Plaintext,
        };
        Self { storage }
    }

    pub fn storage(&self) -> CredentialStorage {
        self.storage
    }

    /// Store `value` under `key` and return what should go in the config file
    pub fn store_credential(&self, key: &str, value: &str) -> Result<String> {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => {
                let entry = keyring::Entry::new(SERVICE_NAME, key)
                    .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
                entry.set_password(value).map_err(|e| {
                    ConfigError::KeyringError(format!("Failed to store '{}': {}", key, e))
                })?;
                Ok(format!("{}{}", KEYRING_PREFIX, key))
            }
            CredentialStorage::Plaintext => {
                let _ = key;
                Ok(value.to_string())
            }
        }
    }

    /// Resolve a stored value.
    ///
    /// Order: the environment variable `env_var` if set, then the keyring for
    /// `keyring:` references, then the value itself.
    pub fn get_credential(&self, value: &str, env_var: Option<&str>) -> Result<String> {
        if let Some(var) = env_var
            && let Ok(env_value) = env::var(var)
        {
            return Ok(env_value);
        }

        let Some(key) = value.strip_prefix(KEYRING_PREFIX) else {
            return Ok(value.to_string());
        };

        #[cfg(feature = "secure-storage")]
        {
            let entry = keyring::Entry::new(SERVICE_NAME, key)
                .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
            entry.get_password().map_err(|e| {
                ConfigError::KeyringError(format!("Failed to read '{}' from keyring: {}", key, e))
            })
        }
        #[cfg(not(feature = "secure-storage"))]
        {
            Err(ConfigError::CredentialError(format!(
                "'{}' references the keyring but secure-storage is not enabled",
                key
            )))
        }
    }

    /// Remove a keyring entry; missing entries and plaintext values are fine
    pub fn delete_credential(&self, value: &str) -> Result<()> {
        let Some(key) = value.strip_prefix(KEYRING_PREFIX) else {
            return Ok(());
        };

        #[cfg(feature = "secure-storage")]
        {
            let entry = keyring::Entry::new(SERVICE_NAME, key)
                .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(ConfigError::KeyringError(format!(
                    "Failed to delete '{}' from keyring: {}",
                    key, e
                ))),
            }
        }
        #[cfg(not(feature = "secure-storage"))]
        {
            let _ = key;
            Ok(())
        }
    }

    pub fn is_keyring_reference(value: &str) -> bool {
        value.starts_with(KEYRING_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_value_is_returned_as_is() {
        let store = CredentialStore::new();
        assert_eq!(store.get_credential("relax", None).unwrap(), "relax");
        assert_eq!(store.storage(), CredentialStorage::Plaintext);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_wins() {
        unsafe {
            env::set_var("COUCHCTL_TEST_CREDENTIAL", "from-env");
        }

        let store = CredentialStore::new();
        let value = store
            .get_credential("from-file", Some("COUCHCTL_TEST_CREDENTIAL"))
            .unwrap();
        assert_eq!(value, "from-env");

        unsafe {
            env::remove_var("COUCHCTL_TEST_CREDENTIAL");
        }
    }

    #[test]
    fn test_plaintext_store_keeps_value() {
        let store = CredentialStore::new();
        assert_eq!(store.store_credential("prod-password", "pw").unwrap(), "pw");
        store.delete_credential("pw").unwrap();
    }

    #[test]
    fn test_keyring_reference_detection() {
        assert!(CredentialStore::is_keyring_reference("keyring:prod-password"));
        assert!(!CredentialStore::is_keyring_reference("prod-password"));
        assert!(!CredentialStore::is_keyring_reference(""));
    }

    #[cfg(not(feature = "secure-storage"))]
    #[test]
    fn test_keyring_reference_needs_feature() {
        let err = CredentialStore::new()
            .get_credential("keyring:prod-password", None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::CredentialError(_)));
    }

    #[cfg(feature = "secure-storage")]
    #[test]
    #[ignore = "Requires keyring service to be available"]
    fn test_keyring_round_trip() {
        let store = CredentialStore::keyring();
        let reference = store.store_credential("couchctl-test", "pw").unwrap();
        assert!(reference.starts_with(KEYRING_PREFIX));
        assert_eq!(store.get_credential(&reference, None).unwrap(), "pw");
        store.delete_credential(&reference).unwrap();
    }
}
