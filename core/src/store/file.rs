use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::sample::{decode_ledger, encode_ledger, LocationSample};
use crate::store::{DurableStore, StoreError};

/// Directory-backed store holding one JSON file per key.
///
/// Writes go to a sibling temp file which is synced and renamed over the
/// target, so readers see either the previous ledger or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key such as `@app:location_buffer` to a file name.
    ///
    /// ASCII alphanumerics and `-` are kept; every other byte becomes `_XX`
    /// (uppercase hex), so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("_{:02X}", byte));
            }
        }
        name.push_str(".json");
        self.root.join(name)
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<LocationSample>>, StoreError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => decode_ledger(&bytes).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, key: &str, samples: &[LocationSample]) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let staging = target.with_extension("json.tmp");
        let bytes = encode_ledger(samples)?;

        let mut file = fs::File::create(&staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(err) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
