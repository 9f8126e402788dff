//! Directory NodeStore
//!
//! A filesystem backend that keeps every node and value in a single flat
//! directory, one file per store key.
//!
//! ## File Formats
//! - Node files use the binary node wire format (see
//!   [`crate::node::read_node`]) with bincode-encoded keys inside the
//!   length-prefixed slots.
//! - Value files are a bincode payload followed by a 4-byte little-endian
//!   CRC32 of that payload. A checksum mismatch is a codec error, not a
//!   missing value.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CanopyError, Result};
use crate::node::{read_node, write_node, Node};

use super::NodeStore;

/// A node store over one flat directory.
///
/// Store keys are file names: `u-{hex}` for converted user keys, `n-{seq}`
/// and `v-{seq}` for generated keys. Key generation probes for existing
/// files so reopening a directory never reissues a key already on disk.
pub struct DirectoryNodeStore<K, V> {
    directory: PathBuf,
    key_seq: AtomicU64,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> DirectoryNodeStore<K, V> {
    /// Open a store rooted at `directory`, creating it if needed.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            key_seq: AtomicU64::new(0),
            _marker: PhantomData,
        })
    }

    /// The directory all files live in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }

    fn remove_file(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CanopyError::Io(e)),
        }
    }

    fn create_file(&self, key: &str) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path_for(key))?;
        Ok(BufWriter::new(file))
    }
}

// =============================================================================
// Encoding Helpers
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CanopyError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| CanopyError::Codec(e.to_string()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

impl<K, V> NodeStore for DirectoryNodeStore<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    type UserKey = K;
    type StoreKey = String;
    type Value = V;

    fn load_value(&self, key: &String) -> Result<Option<V>> {
        let mut file = match File::open(self.path_for(key)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CanopyError::Io(e)),
        };

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        if contents.len() < 4 {
            return Err(CanopyError::Codec(format!(
                "value file {} too short for checksum",
                key
            )));
        }

        let (payload, crc_bytes) = contents.split_at(contents.len() - 4);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual_crc = crc32fast::hash(payload);
        if stored_crc != actual_crc {
            return Err(CanopyError::Codec(format!(
                "value file {} checksum mismatch: stored {:08x}, computed {:08x}",
                key, stored_crc, actual_crc
            )));
        }

        Ok(Some(decode(payload)?))
    }

    fn load_node(&self, key: &String) -> Result<Node<K, String>> {
        let file = match File::open(self.path_for(key)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CanopyError::NodeNotFound(key.clone()))
            }
            Err(e) => return Err(CanopyError::Io(e)),
        };

        let mut reader = BufReader::new(file);
        read_node(&mut reader, |bytes| decode::<K>(bytes), |bytes| {
            decode::<String>(bytes)
        })
    }

    fn store_value(&self, key: &String, value: V) -> Result<()> {
        let payload = encode(&value)?;
        let crc = crc32fast::hash(&payload);

        let mut writer = self.create_file(key)?;
        writer.write_all(&payload)?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn store_node(&self, key: &String, node: Node<K, String>) -> Result<()> {
        let mut writer = self.create_file(key)?;
        write_node(&mut writer, &node, |k| encode(k), |sk| encode(sk))?;
        writer.flush()?;
        Ok(())
    }

    fn remove_node(&self, key: &String) -> Result<()> {
        self.remove_file(key)
    }

    fn remove_value(&self, key: &String) -> Result<()> {
        self.remove_file(key)
    }

    fn generate_key(&self, node: Option<&Node<K, String>>, _value: Option<&V>) -> Result<String> {
        let prefix = if node.is_some() { "n" } else { "v" };

        // Probe so a store reopened over existing files never reissues a key.
        loop {
            let seq = self.key_seq.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{}-{:016x}", prefix, seq);
            if !self.path_for(&candidate).exists() {
                return Ok(candidate);
            }
        }
    }

    fn convert(&self, key: &K) -> Result<String> {
        Ok(format!("u-{}", to_hex(&encode(key)?)))
    }
}
