use aes_gcm::{
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
    aead::{Aead, KeyInit, OsRng, consts::U12, rand_core::RngCore},
    aes::Aes192,
};
use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose},
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{AppError, Result};

/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// The size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Accepted raw key lengths: AES-128, AES-192 and AES-256.
pub const KEY_SIZES: [usize; 3] = [16, 24, 32];

/// Standard-alphabet decoder that, like the browser's `atob`, does not
/// insist on trailing padding.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An AES-GCM key that can open login tokens. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: Vec<u8>,
}

impl SessionKey {
    /// Imports raw key material of 128, 192 or 256 bits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            len if KEY_SIZES.contains(&len) => Ok(Self { bytes: bytes.to_vec() }),
            len => Err(AppError::TokenDecryption(format!(
                "Key import failed: unsupported key length {}",
                len
            ))),
        }
    }

    /// Imports a standard base64 encoded key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            LENIENT_STANDARD
                .decode(encoded.trim())
                .map_err(|e| AppError::TokenDecryption(format!("Key is not valid base64: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Decrypts `ciphertext` (which carries the trailing tag) with `nonce`.
    pub fn decrypt(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from(*nonce);
        let opened = match self.bytes.len() {
            16 => Aes128Gcm::new_from_slice(&self.bytes)
                .map_err(|e| AppError::TokenDecryption(format!("Key import failed: {}", e)))?
                .decrypt(&nonce, ciphertext),
            24 => Aes192Gcm::new_from_slice(&self.bytes)
                .map_err(|e| AppError::TokenDecryption(format!("Key import failed: {}", e)))?
                .decrypt(&nonce, ciphertext),
            _ => Aes256Gcm::new_from_slice(&self.bytes)
                .map_err(|e| AppError::TokenDecryption(format!("Key import failed: {}", e)))?
                .decrypt(&nonce, ciphertext),
        };

        opened.map_err(|e| AppError::TokenDecryption(format!("Decryption failed: {}", e)))
    }

    /// Encrypts `plaintext` under `nonce`, returning ciphertext with the tag appended.
    pub fn encrypt(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from(*nonce);
        let sealed = match self.bytes.len() {
            16 => Aes128Gcm::new_from_slice(&self.bytes)
                .map_err(|e| AppError::Internal(format!("Key import failed: {}", e)))?
                .encrypt(&nonce, plaintext),
            24 => Aes192Gcm::new_from_slice(&self.bytes)
                .map_err(|e| AppError::Internal(format!("Key import failed: {}", e)))?
                .encrypt(&nonce, plaintext),
            _ => Aes256Gcm::new_from_slice(&self.bytes)
                .map_err(|e| AppError::Internal(format!("Key import failed: {}", e)))?
                .encrypt(&nonce, plaintext),
        };

        sealed.map_err(|e| AppError::Internal(format!("Encryption failed: {}", e)))
    }
}

/// Generates a new random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Decodes a base64url login token into raw bytes.
///
/// The URL-safe characters are mapped back to the standard alphabet first,
/// so tokens that were produced with either alphabet decode the same way.
pub fn decode_token(token: &str) -> Result<Vec<u8>> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::TokenDecryption("Token is empty".to_string()));
    }

    let standard: String = token
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    LENIENT_STANDARD
        .decode(standard)
        .map_err(|e| AppError::TokenDecryption(format!("Token is not valid base64: {}", e)))
}

/// Opens a login token (`nonce || ciphertext || tag`, base64url) and returns
/// the session credential it carries.
pub fn decrypt_token(key: &SessionKey, token: &str) -> Result<Zeroizing<String>> {
    let raw = Zeroizing::new(decode_token(token)?);
    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(AppError::TokenDecryption(format!(
            "Token too short: {} bytes",
            raw.len()
        )));
    }

    let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
    let nonce: [u8; NONCE_SIZE] = nonce
        .try_into()
        .map_err(|_| AppError::TokenDecryption("Invalid nonce".to_string()))?;

    let plaintext = key.decrypt(&nonce, ciphertext)?;
    let credential = String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        AppError::TokenDecryption("Credential is not valid UTF-8".to_string())
    })?;

    Ok(Zeroizing::new(credential))
}

/// Seals a credential the way the identity provider does: a fresh nonce,
/// AES-GCM, then unpadded base64url.
pub fn seal_token(key: &SessionKey, credential: &str) -> Result<String> {
    let nonce = generate_nonce();
    let ciphertext = key.encrypt(&nonce, credential.as_bytes())?;

    let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_256() -> SessionKey {
        SessionKey::from_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn opens_sealed_token() {
        let key = key_256();
        let token = seal_token(&key, "abc123").unwrap();
        assert_eq!(decrypt_token(&key, &token).unwrap().as_str(), "abc123");
    }

    #[test]
    fn opens_token_with_128_bit_key() {
        let key = SessionKey::from_bytes(&[9u8; 16]).unwrap();
        let token = seal_token(&key, "short-key").unwrap();
        assert_eq!(decrypt_token(&key, &token).unwrap().as_str(), "short-key");
    }

    #[test]
    fn opens_token_with_192_bit_key() {
        let key = SessionKey::from_bytes(&[11u8; 24]).unwrap();
        let token = seal_token(&key, "mid-key").unwrap();
        assert_eq!(decrypt_token(&key, &token).unwrap().as_str(), "mid-key");
        assert!(decrypt_token(&key_256(), &token).is_err());
    }

    #[test]
    fn accepts_padded_and_standard_alphabet_tokens() {
        let key = key_256();
        let nonce = [1u8; NONCE_SIZE];
        let mut raw = nonce.to_vec();
        raw.extend(key.encrypt(&nonce, b"padded").unwrap());

        let padded = general_purpose::URL_SAFE.encode(&raw);
        let standard = general_purpose::STANDARD.encode(&raw);

        assert_eq!(decrypt_token(&key, &padded).unwrap().as_str(), "padded");
        assert_eq!(decrypt_token(&key, &standard).unwrap().as_str(), "padded");
    }

    #[test]
    fn rejects_wrong_key() {
        let token = seal_token(&key_256(), "abc123").unwrap();
        let other = SessionKey::from_bytes(&[8u8; 32]).unwrap();
        assert!(matches!(
            decrypt_token(&other, &token),
            Err(AppError::TokenDecryption(_))
        ));
    }

    #[test]
    fn rejects_flipped_bit() {
        let key = key_256();
        let token = seal_token(&key, "abc123").unwrap();
        let mut raw = general_purpose::URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = general_purpose::URL_SAFE_NO_PAD.encode(raw);

        assert!(matches!(
            decrypt_token(&key, &tampered),
            Err(AppError::TokenDecryption(_))
        ));
    }

    #[test]
    fn rejects_short_empty_and_garbage_tokens() {
        let key = key_256();
        assert!(decrypt_token(&key, "").is_err());
        assert!(decrypt_token(&key, "AAAA").is_err());
        assert!(decrypt_token(&key, "!!not-base64!!").is_err());
    }

    #[test]
    fn rejects_non_utf8_plaintext() {
        let key = key_256();
        let nonce = [2u8; NONCE_SIZE];
        let mut raw = nonce.to_vec();
        raw.extend(key.encrypt(&nonce, &[0xff, 0xfe, 0xfd]).unwrap());
        let token = general_purpose::URL_SAFE_NO_PAD.encode(raw);

        assert!(matches!(
            decrypt_token(&key, &token),
            Err(AppError::TokenDecryption(_))
        ));
    }

    #[test]
    fn rejects_unsupported_key_length() {
        assert!(SessionKey::from_bytes(&[0u8; 20]).is_err());
        assert!(SessionKey::from_base64("AAECAwQFBgcICQoLDA0ODw").is_ok());
    }
}
