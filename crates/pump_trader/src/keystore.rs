use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use solana_sdk::{signature::Keypair, signer::Signer};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::errors::KeyStoreError;

/// Offsets at which filler letters are inserted into the encoded secret.
const FILLER_POSITIONS: [usize; 6] = [3, 8, 11, 17, 30, 40];
const MIN_SECRET_LEN: usize = 40;
const FILLER_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// On-disk form of a keypair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyRecord {
    secret_key: String,
    public_key: String,
}

/// Named keypairs persisted as `<dir>/<role>.json`.
///
/// The secret is stored base58-encoded with filler letters mixed in. This
/// only keeps the key from being copy-pasted at a glance; the files must be
/// protected like plaintext keys.
pub struct KeyStore {
    dir: PathBuf,
    creation: Mutex<()>,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            creation: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the keypair for `role`, generating and storing a new one if none
    /// exists. Concurrent callers for the same role, in this process or
    /// another, all end up with the same keypair.
    pub fn get_or_create(&self, role: &str) -> Result<Keypair, KeyStoreError> {
        validate_role(role)?;
        let path = self.dir.join(format!("{role}.json"));
        if path.exists() {
            return load(&path);
        }

        let _guard = self.creation.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fs::create_dir_all(&self.dir)?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(format!("{role}.lock")))?;
        lock_file.lock_exclusive()?;
        let result = self.create_locked(role, &path);
        if let Err(err) = FileExt::unlock(&lock_file) {
            warn!(role, %err, "failed to release key lock");
        }
        result
    }

    fn create_locked(&self, role: &str, path: &Path) -> Result<Keypair, KeyStoreError> {
        // another process may have won the race
        if path.exists() {
            return load(path);
        }

        let keypair = Keypair::new();
        let record = KeyRecord {
            secret_key: obfuscate(&keypair.to_base58_string())?,
            public_key: keypair.pubkey().to_string(),
        };

        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &record)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        info!(role, pubkey = %keypair.pubkey(), "generated keypair");
        Ok(keypair)
    }
}

fn validate_role(role: &str) -> Result<(), KeyStoreError> {
    let valid = !role.is_empty()
        && role
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(KeyStoreError::InvalidRole(role.to_string()))
    }
}

fn load(path: &Path) -> Result<Keypair, KeyStoreError> {
    let record: KeyRecord = serde_json::from_reader(File::open(path)?)?;
    let secret = deobfuscate(&record.secret_key)?;
    let bytes = bs58::decode(&secret)
        .into_vec()
        .map_err(|e| KeyStoreError::InvalidSecret(e.to_string()))?;
    let keypair = Keypair::from_bytes(&bytes).map_err(|e| KeyStoreError::InvalidSecret(e.to_string()))?;

    let derived = keypair.pubkey().to_string();
    if derived != record.public_key {
        return Err(KeyStoreError::PublicKeyMismatch {
            stored: record.public_key,
            derived,
        });
    }
    Ok(keypair)
}

pub fn obfuscate(secret: &str) -> Result<String, KeyStoreError> {
    obfuscate_with(secret, &mut rand::thread_rng())
}

pub fn obfuscate_with(secret: &str, rng: &mut impl Rng) -> Result<String, KeyStoreError> {
    if !secret.is_ascii() {
        return Err(KeyStoreError::InvalidSecret("secret must be ascii".into()));
    }
    if secret.len() < MIN_SECRET_LEN {
        return Err(KeyStoreError::SecretTooShort {
            len: secret.len(),
            min: MIN_SECRET_LEN,
        });
    }
    let mut chars = secret.as_bytes().to_vec();
    for pos in FILLER_POSITIONS {
        let filler = FILLER_ALPHABET[rng.gen_range(0..FILLER_ALPHABET.len())];
        chars.insert(pos, filler);
    }
    String::from_utf8(chars).map_err(|e| KeyStoreError::InvalidSecret(e.to_string()))
}

pub fn deobfuscate(obfuscated: &str) -> Result<String, KeyStoreError> {
    let min_len = MIN_SECRET_LEN + FILLER_POSITIONS.len();
    if obfuscated.len() < min_len || !obfuscated.is_ascii() {
        return Err(KeyStoreError::InvalidSecret(format!(
            "obfuscated secret must be at least {min_len} ascii characters"
        )));
    }
    let mut chars = obfuscated.as_bytes().to_vec();
    for pos in FILLER_POSITIONS.iter().rev() {
        chars.remove(*pos);
    }
    String::from_utf8(chars).map_err(|e| KeyStoreError::InvalidSecret(e.to_string()))
}
