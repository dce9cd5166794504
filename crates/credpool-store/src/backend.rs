use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};

/// Minimal string key/value storage.
///
/// Implementations must be safe to share between threads, but callers do
/// not get any atomicity across separate calls.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-process backend. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        map.remove(key);
        Ok(())
    }
}

/// One file per key inside `base_dir`.
///
/// Writes go to `{key}.tmp` first and are renamed into place, so a crash
/// mid-write leaves the previous value intact. Files are created 0600 and
/// the directory 0700 on Unix.
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }

    fn ensure_storage_dir(&self) -> Result<()> {
        let dir_exists = self.base_dir.exists();
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("failed to create state dir: {}", self.base_dir.display()))?;

        if !dir_exists {
            set_dir_mode_700(&self.base_dir)?;
        }

        Ok(())
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        self.ensure_storage_dir()?;

        let tmp_path = self.base_dir.join(format!("{key}.tmp"));
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("failed to open temp file: {}", tmp_path.display()))?;
        set_file_mode_600(&tmp_path)?;

        file.write_all(value.as_bytes())
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", tmp_path.display()))?;

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to atomically replace {}", path.display()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}

/// Keys become file names, so only allow a conservative character set.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('.') {
        bail!("invalid storage key '{key}'");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        bail!("invalid storage key '{key}': only [A-Za-z0-9._-] allowed");
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode_700(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("failed to chmod 700: {}", path.display()))
}

#[cfg(not(unix))]
fn set_dir_mode_700(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod 600: {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> Result<()> {
    Ok(())
}
