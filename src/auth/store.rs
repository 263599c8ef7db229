//! Credential persistence backends.
//!
//! A store holds exactly one slot: the raw GitHub token, or nothing.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const CREDENTIALS_ENV: &str = "HEAL_CREDENTIALS_FILE";

/// Durable single-slot storage for the access credential.
///
/// Implementations report failures honestly; degrading them to "no credential"
/// is the lifecycle manager's job.
pub trait CredentialStore: Send + Sync {
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, credential: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
    /// Human-friendly backend label used in log lines.
    fn label(&self) -> &'static str;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, credential: &str) -> Result<()> {
        (**self).write(credential)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn label(&self) -> &'static str {
        (**self).label()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    github_token: Option<String>,
}

/// JSON file under the user config directory, written atomically with 0600 permissions.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HEAL_CREDENTIALS_FILE`, else `<config dir>/heal-client/credentials.json`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CREDENTIALS_ENV) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
        dirs::config_dir()
            .map(|p| p.join("heal-client").join("credentials.json"))
            .ok_or_else(|| anyhow!("could not determine config directory"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_contents(&self, stored: &StoredCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create credentials directory {}", parent.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
            }
        }

        let content = serde_json::to_string(stored).context("serialize credentials")?;
        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("create {}", tmp_path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = tmp.set_permissions(fs::Permissions::from_mode(0o600));
        }
        tmp.write_all(content.as_bytes())
            .with_context(|| format!("write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("finalize {}", self.path.display()))?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let stored: StoredCredential = serde_json::from_str(&json)
            .with_context(|| format!("parse {}", self.path.display()))?;
        Ok(stored.github_token.filter(|t| !t.is_empty()))
    }

    fn write(&self, credential: &str) -> Result<()> {
        self.write_contents(&StoredCredential {
            github_token: Some(credential.to_string()),
        })
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", self.path.display())),
        }
    }

    fn label(&self) -> &'static str {
        "credentials file"
    }
}

/// Process-local store. `unavailable()` builds one whose every operation fails,
/// standing in for storage that is disabled.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: &str) -> Self {
        Self {
            slot: Mutex::new(Some(credential.to_string())),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            slot: Mutex::new(None),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            Err(anyhow!("storage is disabled"))
        } else {
            Ok(())
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot
            .lock()
            .map_err(|_| anyhow!("credential slot poisoned"))
    }
}

impl CredentialStore for MemoryStore {
    fn read(&self) -> Result<Option<String>> {
        self.check()?;
        Ok(self.slot()?.clone())
    }

    fn write(&self, credential: &str) -> Result<()> {
        self.check()?;
        *self.slot()? = Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check()?;
        *self.slot()? = None;
        Ok(())
    }

    fn label(&self) -> &'static str {
        "memory"
    }
}
