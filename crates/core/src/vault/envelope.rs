//! The `$ANSIBLE_VAULT;1.1;AES256` envelope used for encrypted variables.
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 over a random salt. The padded
//! plaintext is encrypted with AES-256-CTR and authenticated with HMAC-SHA256.
//! The salt, MAC and ciphertext are hex encoded, joined by newlines and hex
//! encoded once more, wrapped at 80 columns.

use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::vault::Secret;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const HEADER_PREFIX: &str = "$ANSIBLE_VAULT;";
const HEADER: &str = "$ANSIBLE_VAULT;1.1;AES256";
const KDF_ITERATIONS: u32 = 10_000;
const SALT_LENGTH: usize = 32;
const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const BLOCK_SIZE: usize = 16;
const LINE_WIDTH: usize = 80;

struct DerivedKeys {
    cipher_key: [u8; KEY_LENGTH],
    mac_key: [u8; KEY_LENGTH],
    iv: [u8; IV_LENGTH],
}

fn derive_keys(secret: &Secret, salt: &[u8]) -> DerivedKeys {
    let mut material = [0u8; KEY_LENGTH * 2 + IV_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret.expose(), salt, KDF_ITERATIONS, &mut material);

    let mut keys = DerivedKeys {
        cipher_key: [0u8; KEY_LENGTH],
        mac_key: [0u8; KEY_LENGTH],
        iv: [0u8; IV_LENGTH],
    };
    keys.cipher_key.copy_from_slice(&material[..KEY_LENGTH]);
    keys.mac_key.copy_from_slice(&material[KEY_LENGTH..KEY_LENGTH * 2]);
    keys.iv.copy_from_slice(&material[KEY_LENGTH * 2..]);
    keys
}

fn apply_keystream(keys: &DerivedKeys, buffer: &mut [u8]) -> Result<()> {
    let mut cipher = Aes256Ctr::new_from_slices(&keys.cipher_key, &keys.iv)
        .map_err(|_| Error::Vault("invalid key material".to_string()))?;
    cipher.apply_keystream(buffer);
    Ok(())
}

fn mac_for(keys: &DerivedKeys) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(&keys.mac_key)
        .map_err(|_| Error::Vault("invalid key material".to_string()))
}

/// Whether `text` starts with a vault header.
#[must_use]
pub fn is_encrypted(text: &str) -> bool {
    text.trim_start().starts_with(HEADER_PREFIX)
}

/// Encrypts `plaintext` into a vault envelope.
///
/// # Errors
///
/// Returns an error only if the cipher rejects the derived key material.
pub fn encrypt(plaintext: &[u8], secret: &Secret) -> Result<String> {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let keys = derive_keys(secret, &salt);

    let padding = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
    let mut ciphertext = plaintext.to_vec();
    ciphertext.extend(std::iter::repeat(padding as u8).take(padding));
    apply_keystream(&keys, &mut ciphertext)?;

    let mut mac = mac_for(&keys)?;
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let inner = format!(
        "{}\n{}\n{}",
        hex::encode(salt),
        hex::encode(tag),
        hex::encode(&ciphertext)
    );
    let body = hex::encode(inner);

    let mut envelope = String::from(HEADER);
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        envelope.push('\n');
        envelope.push_str(&String::from_utf8_lossy(line));
    }
    envelope.push('\n');

    Ok(envelope)
}

/// Decrypts a vault envelope produced by [`encrypt`] or by other tools
/// writing the same format.
///
/// # Errors
///
/// Returns [`Error::Vault`] if the envelope is malformed, uses an unsupported
/// cipher, or the secret does not match.
pub fn decrypt(envelope: &str, secret: &Secret) -> Result<Vec<u8>> {
    let mut lines = envelope.trim().lines();
    let header = lines.next().unwrap_or_default().trim();
    check_header(header)?;

    let body: String = lines.map(str::trim).collect();
    let inner = hex::decode(body).map_err(|e| Error::Vault(format!("malformed body: {e}")))?;
    let inner =
        String::from_utf8(inner).map_err(|_| Error::Vault("malformed body".to_string()))?;

    let mut parts = inner.split('\n');
    let (Some(salt), Some(tag), Some(ciphertext), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Vault("expected salt, hmac and ciphertext".to_string()));
    };

    let salt = decode_part("salt", salt)?;
    let tag = decode_part("hmac", tag)?;
    let mut buffer = decode_part("ciphertext", ciphertext)?;

    let keys = derive_keys(secret, &salt);

    let mut mac = mac_for(&keys)?;
    mac.update(&buffer);
    mac.verify_slice(&tag)
        .map_err(|_| Error::Vault("decryption failed, the vault password is incorrect".to_string()))?;

    apply_keystream(&keys, &mut buffer)?;
    strip_padding(&mut buffer)?;

    Ok(buffer)
}

/// Decrypts an envelope whose plaintext is expected to be UTF-8 text.
///
/// # Errors
///
/// Same as [`decrypt`], plus an error if the plaintext is not valid UTF-8.
pub fn decrypt_to_string(envelope: &str, secret: &Secret) -> Result<String> {
    String::from_utf8(decrypt(envelope, secret)?)
        .map_err(|_| Error::Vault("decrypted content is not valid UTF-8".to_string()))
}

fn check_header(header: &str) -> Result<()> {
    let fields: Vec<&str> = header.split(';').collect();
    match fields.as_slice() {
        ["$ANSIBLE_VAULT", "1.1" | "1.2", "AES256", ..] => Ok(()),
        ["$ANSIBLE_VAULT", version, cipher, ..] => Err(Error::Vault(format!(
            "unsupported vault format {version} with cipher {cipher}"
        ))),
        _ => Err(Error::Vault("missing vault header".to_string())),
    }
}

fn decode_part(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| Error::Vault(format!("malformed {name}: {e}")))
}

fn strip_padding(buffer: &mut Vec<u8>) -> Result<()> {
    let Some(&padding) = buffer.last() else {
        return Err(Error::Vault("empty ciphertext".to_string()));
    };
    let padding = padding as usize;

    if padding == 0
        || padding > BLOCK_SIZE
        || padding > buffer.len()
        || !buffer[buffer.len() - padding..]
            .iter()
            .all(|&byte| byte as usize == padding)
    {
        return Err(Error::Vault("invalid padding".to_string()));
    }

    buffer.truncate(buffer.len() - padding);
    Ok(())
}
