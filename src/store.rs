use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A whole-file JSON collection with its cached contents.
///
/// Every mutation runs under the store's mutex as one load-mutate-save step,
/// so two concurrent writers of the same file cannot lose each other's update.
pub struct JsonStore<T> {
    path: PathBuf,
    data: Mutex<T>,
}

impl<T> JsonStore<T>
where
    T: Default + Serialize + DeserializeOwned + Clone,
{
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create data directory {}", parent.display()))?;
                info!("created data directory: {}", parent.display());
            }
        }
        let data = load_json(&path);
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let data = self.data.lock().await;
        f(&data)
    }

    pub async fn snapshot(&self) -> T {
        self.data.lock().await.clone()
    }

    /// Applies `f` to a working copy and persists it. The cached contents
    /// only change once the file has been written; an error from `f` or
    /// from the write leaves both untouched.
    pub async fn update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        E: From<anyhow::Error>,
    {
        let mut data = self.data.lock().await;
        let mut working = data.clone();
        let result = f(&mut working)?;
        save_json(&self.path, &working).await.map_err(E::from)?;
        *data = working;
        Ok(result)
    }
}

/// Reads `path`, treating a missing, empty or corrupt file as an empty
/// collection.
pub fn load_json<T>(path: &Path) -> T
where
    T: Default + DeserializeOwned,
{
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("failed to read {}: {}, starting fresh", path.display(), e);
            return T::default();
        }
    };
    if content.trim().is_empty() {
        return T::default();
    }
    match serde_json::from_str(&content) {
        Ok(data) => data,
        Err(e) => {
            warn!("corrupted JSON file: {}: {}, resetting", path.display(), e);
            T::default()
        }
    }
}

pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, content)
        .await
        .with_context(|| format!("write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
