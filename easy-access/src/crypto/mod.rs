//! Cryptographic building blocks: PKCE, the installation key pair and JWK verification.

mod jwk;
mod keys;
mod pkce;

pub use jwk::{verify_id_token, Jwk, JwkSet};
pub use keys::{
    decrypt_aes_gcm, KeyHandle, KeyStore, KeyTags, StoredKeyStore, AES_GCM_NONCE_SIZE,
    KEY_SIZE_BITS,
};
pub use pkce::{PkceChallenge, PkceVerifier, CODE_VERIFIER_LENGTH, UNRESERVED_URI_CHARS};
