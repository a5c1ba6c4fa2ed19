//! Cryptography collaborator
//!
//! The core only needs `sign(bytes, key) -> sig` and `verify(bytes, sig, key) -> bool`.
//! Keys and signatures travel as base64 strings so they can sit in JSON snapshots
//! and event payloads.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use cue_core::{Error, Result};
use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair as _, UnparsedPublicKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    /// Base64 public key. Doubles as the peer's credential id.
    pub public_key: String,
    /// Base64 PKCS#8 document.
    pub private_key: String,
}

pub trait CryptoProvider: Send + Sync {
    fn generate_key_pair(&self) -> Result<KeyPair>;

    fn sign(&self, message: &[u8], private_key: &str) -> Result<String>;

    /// Never errors: malformed keys or signatures simply fail verification.
    fn verify(&self, message: &[u8], signature: &str, public_key: &str) -> bool;
}

/// Ed25519 via `ring`.
pub struct Ed25519Crypto {
    rng: SystemRandom,
}

impl Default for Ed25519Crypto {
    fn default() -> Self {
        Self::new()
    }
}

impl Ed25519Crypto {
    pub fn new() -> Self {
        Self { rng: SystemRandom::new() }
    }

    fn key_pair(private_key: &str) -> Result<Ed25519KeyPair> {
        let pkcs8 = STANDARD
            .decode(private_key)
            .map_err(|e| Error::collaborator("crypto", format!("private key is not base64: {}", e)))?;
        Ed25519KeyPair::from_pkcs8(&pkcs8)
            .map_err(|e| Error::collaborator("crypto", format!("rejected private key: {}", e)))
    }
}

impl CryptoProvider for Ed25519Crypto {
    fn generate_key_pair(&self) -> Result<KeyPair> {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&self.rng)
            .map_err(|_| Error::collaborator("crypto", "key generation failed"))?;
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|e| Error::collaborator("crypto", format!("generated key unusable: {}", e)))?;
        Ok(KeyPair {
            public_key: STANDARD.encode(pair.public_key().as_ref()),
            private_key: STANDARD.encode(pkcs8.as_ref()),
        })
    }

    fn sign(&self, message: &[u8], private_key: &str) -> Result<String> {
        let pair = Self::key_pair(private_key)?;
        Ok(STANDARD.encode(pair.sign(message).as_ref()))
    }

    fn verify(&self, message: &[u8], signature: &str, public_key: &str) -> bool {
        let (Ok(public_key), Ok(signature)) = (STANDARD.decode(public_key), STANDARD.decode(signature)) else {
            return false;
        };
        UnparsedPublicKey::new(&signature::ED25519, public_key)
            .verify(message, &signature)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let crypto = Ed25519Crypto::new();
        let keys = crypto.generate_key_pair().unwrap();
        let sig = crypto.sign(b"hello", &keys.private_key).unwrap();
        assert!(crypto.verify(b"hello", &sig, &keys.public_key));
        assert!(!crypto.verify(b"hellO", &sig, &keys.public_key));
    }

    #[test]
    fn wrong_key_fails() {
        let crypto = Ed25519Crypto::new();
        let a = crypto.generate_key_pair().unwrap();
        let b = crypto.generate_key_pair().unwrap();
        assert_ne!(a.public_key, b.public_key);
        let sig = crypto.sign(b"msg", &a.private_key).unwrap();
        assert!(!crypto.verify(b"msg", &sig, &b.public_key));
    }

    #[test]
    fn garbage_inputs_fail_closed() {
        let crypto = Ed25519Crypto::new();
        let keys = crypto.generate_key_pair().unwrap();
        assert!(!crypto.verify(b"msg", "not base64!!", &keys.public_key));
        assert!(!crypto.verify(b"msg", "AAAA", "also not a key"));
        let err = crypto.sign(b"msg", "Zm9v").unwrap_err();
        assert!(err.is_collaborator());
    }

    #[test]
    fn public_key_is_32_bytes() {
        let keys = Ed25519Crypto::new().generate_key_pair().unwrap();
        assert_eq!(STANDARD.decode(&keys.public_key).unwrap().len(), 32);
    }
}
