use crate::error::{ClientError, Result};
use sha2::{Digest, Sha256};

pub trait KeyTransformer: Send + Sync {
    fn transform(&self, key: &str) -> Result<String>;
}

/// Passes keys through untouched, but refuses the characters the text protocol uses as
/// separators (0x00 - 0x20).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyTransformer;

impl KeyTransformer for DefaultKeyTransformer {
    fn transform(&self, key: &str) -> Result<String> {
        if key.chars().any(|c| c <= '\u{20}') {
            return Err(ClientError::InvalidArgument(format!(
                "key {:?} contains control characters or spaces",
                key
            )));
        }

        Ok(key.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Base64KeyTransformer;

impl KeyTransformer for Base64KeyTransformer {
    fn transform(&self, key: &str) -> Result<String> {
        Ok(base64::encode(key.as_bytes()))
    }
}

/// Hex SHA-256 digest of the key, which keeps every key at 64 characters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256KeyTransformer;

impl KeyTransformer for Sha256KeyTransformer {
    fn transform(&self, key: &str) -> Result<String> {
        let digest = Sha256::digest(key.as_bytes());

        Ok(digest.iter().map(|byte| format!("{:02x}", byte)).collect())
    }
}
