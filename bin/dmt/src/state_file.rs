//! JSON state file holding a [`TokenSnapshot`] between invocations
//!
//! Every read-modify-write cycle holds a [`StateLock`] on a sibling
//! `<state>.lock` file, so concurrent `dmt` runs against one state file are
//! applied one after another.

use anyhow::{bail, Context, Result};
use dmt_faucet::TokenSnapshot;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Exclusive advisory lock over one state file, released on drop.
///
/// The lock lives on a separate file because [`save`] replaces the state
/// file itself by rename.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Block until no other process or thread holds the lock for `state`.
    pub fn acquire(state: &Path) -> Result<Self> {
        let path = lock_path(state);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {:?}", path))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {:?}", path))?;
        debug!("Acquired {:?}", path);
        Ok(Self { file, path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {:?}: {}", self.path, err);
        }
    }
}

pub fn load(path: &Path) -> Result<TokenSnapshot> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {:?} (run `dmt init` first)", path))?;
    let snapshot = TokenSnapshot::from_json(&json)
        .with_context(|| format!("Invalid state file {:?}", path))?;
    debug!("Loaded state from {:?}", path);
    Ok(snapshot)
}

/// Write to a uniquely named temp file in the same directory, then rename it
/// over `path`. A crash never leaves a half-written state file behind.
pub fn save(path: &Path, snapshot: &TokenSnapshot) -> Result<()> {
    let json = snapshot.to_json()?;
    let mut tmp = NamedTempFile::new_in(parent_dir(path))
        .with_context(|| format!("Failed to create temp file next to {:?}", path))?;
    tmp.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write {:?}", tmp.path()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {:?}", path))?;
    debug!("Saved state to {:?}", path);
    Ok(())
}

/// Caller must hold the [`StateLock`] for `path`.
pub fn create(path: &Path, snapshot: &TokenSnapshot, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("State file {:?} already exists (use --force to replace it)", path);
    }
    save(path, snapshot)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dmt-state".into());
    name.push(".lock");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmt_common::Address;
    use dmt_faucet::{DmtToken, ManualClock, TokenParams};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    fn snapshot() -> TokenSnapshot {
        let clock = Arc::new(ManualClock::new(0));
        let token = DmtToken::new(TokenParams::with_owner(Address::from([1u8; 20])), clock).unwrap();
        token.claim(&Address::from([2u8; 20])).unwrap();
        token.snapshot()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let original = snapshot();
        create(&path, &original, false).unwrap();
        assert_eq!(load(&path).unwrap(), original);

        // Only the state file remains; no temp files are left behind.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        create(&path, &snapshot(), false).unwrap();
        assert!(create(&path, &snapshot(), false).is_err());
        assert!(create(&path, &snapshot(), true).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("dmt init"));
    }

    #[test]
    fn test_relative_path_saves_in_current_dir() {
        assert_eq!(parent_dir(Path::new("state.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/tmp/state.json")), Path::new("/tmp"));
        assert_eq!(lock_path(Path::new("/tmp/state.json")), PathBuf::from("/tmp/state.json.lock"));
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let held = StateLock::acquire(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let path = path.clone();
            std::thread::spawn(move || {
                let _lock = StateLock::acquire(&path).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        waiter.join().unwrap();
    }
}
