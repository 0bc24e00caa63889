//! Short code generation and validation.
//!
//! Codes are derived from a SHA-256 digest over the destination, a secret salt, a random
//! nonce and the current time, encoded as URL-safe base64 without padding. The same
//! destination produces a different code on every call; uniqueness is enforced by the
//! store and the retry loop in [`crate::application::services::LinkService`].

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const MIN_CODE_LENGTH: usize = 6;
pub const MAX_CODE_LENGTH: usize = 12;
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Minimum salt size in bytes.
pub const MIN_SALT_LENGTH: usize = 32;

const NONCE_BYTES: usize = 16;
const EXTENSION_NONCE_BYTES: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum CodeGenError {
    #[error("shortcode salt must be at least {MIN_SALT_LENGTH} bytes, got {0}")]
    SaltTooShort(usize),
}

/// A code length within `[MIN_CODE_LENGTH, MAX_CODE_LENGTH]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLength(usize);

impl CodeLength {
    /// Returns `None` when `len` is out of range.
    pub fn new(len: usize) -> Option<Self> {
        (MIN_CODE_LENGTH..=MAX_CODE_LENGTH)
            .contains(&len)
            .then_some(Self(len))
    }

    /// Falls back to the default length when unset or out of range.
    pub fn or_default(len: Option<usize>) -> Self {
        len.and_then(Self::new).unwrap_or_default()
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for CodeLength {
    fn default() -> Self {
        Self(DEFAULT_CODE_LENGTH)
    }
}

/// Salted, nonce-based short code generator.
pub struct ShortcodeGenerator {
    salt: Vec<u8>,
}

impl std::fmt::Debug for ShortcodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcodeGenerator")
            .field("salt", &"<redacted>")
            .finish()
    }
}

impl ShortcodeGenerator {
    /// # Errors
    ///
    /// Returns [`CodeGenError::SaltTooShort`] when the salt is shorter than
    /// [`MIN_SALT_LENGTH`] bytes.
    pub fn new(salt: impl Into<Vec<u8>>) -> Result<Self, CodeGenError> {
        let salt = salt.into();
        if salt.len() < MIN_SALT_LENGTH {
            return Err(CodeGenError::SaltTooShort(salt.len()));
        }
        Ok(Self { salt })
    }

    /// Generates a fresh code of exactly `length` characters.
    ///
    /// Never fails and never checks uniqueness.
    pub fn generate(&self, destination: &str, length: CodeLength) -> String {
        let len = length.get();

        let mut rng = rand::rng();
        let mut nonce = [0u8; NONCE_BYTES];
        rng.fill_bytes(&mut nonce);

        let timestamp = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_be_bytes();

        let digest = Sha256::new()
            .chain_update(destination.as_bytes())
            .chain_update(&self.salt)
            .chain_update(nonce)
            .chain_update(timestamp)
            .finalize();

        let needed = (len * 6).div_ceil(8).min(digest.len());
        let mut code = URL_SAFE_NO_PAD.encode(&digest[..needed]);

        let mut previous = digest;
        while code.len() < len {
            let mut extra = [0u8; EXTENSION_NONCE_BYTES];
            rng.fill_bytes(&mut extra);

            previous = Sha256::new()
                .chain_update(previous)
                .chain_update(extra)
                .finalize();
            code.push_str(&URL_SAFE_NO_PAD.encode(previous));
        }

        code.truncate(len);
        code
    }
}

/// Checks length range and the URL-safe base64 alphabet.
pub fn is_valid_code(code: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
