//! ADB key pair loading.
//!
//! The key pair is read from disk for every control session and dropped
//! when the session ends. Nothing is cached, so a rotated key is picked up
//! by the next standby event without restarting the monitor.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading key material.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Key file does not exist
    #[error("ADB key not found at {}", path.display())]
    Missing { path: PathBuf },

    /// Key file exists but could not be read as UTF-8 text
    #[error("failed to read ADB key {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A private/public ADB key pair held for one control session.
pub struct Credential {
    private_key: String,
    public_key: String,
}

impl Credential {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }

    /// PEM text of the private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Contents of the `.pub` file.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Reads ADB key pairs from `<key_path>` and `<key_path>.pub`.
pub struct CredentialStore;

impl CredentialStore {
    /// Returns the path of the public half: `<key_path>.pub`.
    pub fn public_key_path(key_path: &Path) -> PathBuf {
        let mut path = OsString::from(key_path.as_os_str());
        path.push(".pub");
        PathBuf::from(path)
    }

    /// Checks that both key files exist, without reading them.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Missing` naming the first absent file.
    pub fn verify_present(key_path: &Path) -> Result<(), CredentialError> {
        let public_path = Self::public_key_path(key_path);
        for path in [key_path, public_path.as_path()] {
            if !path.is_file() {
                return Err(CredentialError::Missing {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Loads the key pair as UTF-8 text.
    ///
    /// This performs blocking I/O; async callers should use `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// - `CredentialError::Missing` if either file is absent
    /// - `CredentialError::Unreadable` if either file cannot be read as UTF-8
    pub fn load(key_path: &Path) -> Result<Credential, CredentialError> {
        let public_path = Self::public_key_path(key_path);
        let private_key = read_key(key_path)?;
        let public_key = read_key(&public_path)?;

        debug!(key = %key_path.display(), "Loaded ADB key pair");

        Ok(Credential::new(private_key, public_key))
    }
}

fn read_key(path: &Path) -> Result<String, CredentialError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CredentialError::Missing {
            path: path.to_path_buf(),
        },
        _ => CredentialError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_pair(dir: &Path, private: &str, public: &str) -> PathBuf {
        let key_path = dir.join("adbkey");
        fs::write(&key_path, private).unwrap();
        fs::write(dir.join("adbkey.pub"), public).unwrap();
        key_path
    }

    #[test]
    fn test_public_key_path() {
        assert_eq!(
            CredentialStore::public_key_path(Path::new("/tmp/k")),
            PathBuf::from("/tmp/k.pub")
        );
    }

    #[test]
    fn test_load_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_pair(dir.path(), "private", "public");

        let credential = CredentialStore::load(&key_path).unwrap();
        assert_eq!(credential.private_key(), "private");
        assert_eq!(credential.public_key(), "public");
    }

    #[test]
    fn test_load_missing_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("adbkey");
        fs::write(&key_path, "private").unwrap();

        let err = CredentialStore::load(&key_path).unwrap_err();
        match err {
            CredentialError::Missing { path } => assert_eq!(path, dir.path().join("adbkey.pub")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_reflects_rotated_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_pair(dir.path(), "first", "first.pub");
        assert_eq!(CredentialStore::load(&key_path).unwrap().private_key(), "first");

        write_pair(dir.path(), "second", "second.pub");
        assert_eq!(CredentialStore::load(&key_path).unwrap().private_key(), "second");
    }

    #[test]
    fn test_load_non_utf8_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("adbkey");
        fs::write(&key_path, [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("adbkey.pub"), "public").unwrap();

        let err = CredentialStore::load(&key_path).unwrap_err();
        assert!(matches!(err, CredentialError::Unreadable { .. }));
    }

    #[test]
    fn test_verify_present() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("adbkey");
        assert!(matches!(
            CredentialStore::verify_present(&key_path),
            Err(CredentialError::Missing { .. })
        ));

        write_pair(dir.path(), "private", "public");
        assert!(CredentialStore::verify_present(&key_path).is_ok());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let credential = Credential::new("secret", "public");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("secret"));
    }
}
