/// Process-wide signing secret.
///
/// The configured secret is base64-encoded once when the provider is built,
/// and both HMAC keys are derived from that encoding. Nothing mutates it
/// afterwards, so every token in the process lifetime is signed and verified
/// with the same key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::fmt;

use crate::error::ConfigError;

pub struct SigningSecret {
    encoded: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SigningSecret {
    pub fn from_config(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }

        let encoded = STANDARD.encode(raw.as_bytes());
        let encoding_key = EncodingKey::from_base64_secret(&encoded)
            .map_err(|e| ConfigError::InvalidValue(format!("jwt.secret: {}", e)))?;
        let decoding_key = DecodingKey::from_base64_secret(&encoded)
            .map_err(|e| ConfigError::InvalidValue(format!("jwt.secret: {}", e)))?;

        Ok(Self {
            encoded,
            encoding_key,
            decoding_key,
        })
    }

    /// Base64 form of the configured secret
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("encoded", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_base64_encoded_once() {
        let secret = SigningSecret::from_config("samuel").unwrap();
        assert_eq!(secret.encoded(), "c2FtdWVs");
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(matches!(
            SigningSecret::from_config("   "),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let secret = SigningSecret::from_config("super-secret-value").unwrap();
        let printed = format!("{:?}", secret);

        assert!(!printed.contains("super-secret-value"));
        assert!(!printed.contains(secret.encoded()));
        assert!(printed.contains("REDACTED"));
    }
}
