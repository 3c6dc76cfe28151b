//! RSA token signing for the ADB authentication handshake.
//!
//! The device sends a random 20-byte token. The host proves possession of a
//! previously paired key by returning a PKCS#1 v1.5 signature over that
//! token, treating it as an already computed SHA-1 digest. If the device
//! does not know the key, the host may offer its public key instead.

use std::fmt;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;

use crate::AuthError;

/// Size of the token in an `AUTH TOKEN` challenge.
pub const TOKEN_SIZE: usize = 20;

/// Signs device challenges with the host's private key.
pub struct AuthSigner {
    key: RsaPrivateKey,
    public_key: String,
}

impl AuthSigner {
    /// Builds a signer from the private key PEM and the matching `.pub` text.
    ///
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`, what `adb keygen` writes) and
    /// PKCS#1 (`BEGIN RSA PRIVATE KEY`).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidKey` if the PEM cannot be parsed.
    pub fn from_pem(private_key: &str, public_key: &str) -> Result<Self, AuthError> {
        let key = RsaPrivateKey::from_pkcs8_pem(private_key)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_pem(private_key)
                    .map_err(|pkcs1_err| AuthError::InvalidKey(format!("{pkcs8_err}; {pkcs1_err}")))
            })?;

        Ok(Self {
            key,
            public_key: public_key.trim_end().to_string(),
        })
    }

    /// Signs a device token.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the token is not [`TOKEN_SIZE`] bytes
    /// - `AuthError::Signing` if the RSA operation fails
    pub fn sign(&self, token: &[u8]) -> Result<Vec<u8>, AuthError> {
        if token.len() != TOKEN_SIZE {
            return Err(AuthError::InvalidToken {
                len: token.len(),
                expected: TOKEN_SIZE,
            });
        }

        Ok(self.key.sign(Pkcs1v15Sign::new::<Sha1>(), token)?)
    }

    /// Payload of an `AUTH RSAPUBLICKEY` message: the `.pub` text plus NUL.
    pub fn public_key_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.public_key.len() + 1);
        payload.extend_from_slice(self.public_key.as_bytes());
        payload.push(0);
        payload
    }
}

impl fmt::Debug for AuthSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSigner")
            .field("key", &"<redacted>")
            .field("public_key_len", &self.public_key.len())
            .finish()
    }
}
