use crate::assets::AssetRepository;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKUP_SUFFIX: &str = ".backup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    NotFound,
}

/// Side-car copies stored next to the original asset as `<path><suffix>`.
/// Nothing about backups is cached; every call checks the filesystem.
#[derive(Debug, Clone)]
pub struct BackupManager {
    suffix: String,
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUP_SUFFIX)
    }
}

impl BackupManager {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn backup_path(&self, asset_path: &Path) -> PathBuf {
        let mut raw = OsString::from(asset_path.as_os_str());
        raw.push(&self.suffix);
        PathBuf::from(raw)
    }

    pub fn has_backup<R>(&self, repo: &R, asset_path: &Path) -> bool
    where
        R: AssetRepository + ?Sized,
    {
        repo.disk_path(&self.backup_path(asset_path)).is_file()
    }

    /// Copies the asset to its backup path unless a backup is already there.
    pub fn create<R>(&self, repo: &mut R, asset_path: &Path) -> Result<BackupStatus>
    where
        R: AssetRepository + ?Sized,
    {
        if self.has_backup(&*repo, asset_path) {
            return Ok(BackupStatus::AlreadyExists);
        }
        let backup = self.backup_path(asset_path);
        repo.copy_asset(asset_path, &backup)
            .with_context(|| format!("Creating backup for {}", asset_path.display()))?;
        log::info!("[backup] Created {}", backup.display());
        Ok(BackupStatus::Created)
    }

    /// Overwrites the live asset with its backup bytes and reloads only that
    /// asset. Once the bytes are copied the restore counts as done; a failed
    /// reload is logged.
    pub fn restore<R>(&self, repo: &mut R, asset_path: &Path) -> Result<RestoreOutcome>
    where
        R: AssetRepository + ?Sized,
    {
        if !self.has_backup(&*repo, asset_path) {
            return Ok(RestoreOutcome::NotFound);
        }
        self.copy_back(&*repo, asset_path)?;
        if let Err(err) = repo.reload(&[asset_path.to_path_buf()]) {
            log::warn!("[backup] Restored {} but reloading it failed: {err:#}", asset_path.display());
        }
        log::info!("[backup] Restored backup for {}", asset_path.display());
        Ok(RestoreOutcome::Restored)
    }

    /// Restores every asset in `asset_paths` that has a backup and returns how
    /// many were restored. Copy failures are logged and skipped.
    pub fn restore_all<R, I>(&self, repo: &mut R, asset_paths: I) -> Result<usize>
    where
        R: AssetRepository + ?Sized,
        I: IntoIterator<Item = PathBuf>,
    {
        let mut restored = Vec::new();
        for asset_path in asset_paths {
            if !self.has_backup(&*repo, &asset_path) {
                continue;
            }
            match self.copy_back(&*repo, &asset_path) {
                Ok(()) => restored.push(asset_path),
                Err(err) => log::warn!("[backup] {err:?}"),
            }
        }
        if !restored.is_empty() {
            if let Err(err) = repo.reload(&restored) {
                log::warn!("[backup] Reloading restored materials failed: {err:#}");
            }
            log::info!("[backup] Restored {} material backups", restored.len());
        }
        Ok(restored.len())
    }

    fn copy_back<R>(&self, repo: &R, asset_path: &Path) -> Result<()>
    where
        R: AssetRepository + ?Sized,
    {
        let backup = repo.disk_path(&self.backup_path(asset_path));
        let live = repo.disk_path(asset_path);
        fs::copy(&backup, &live)
            .with_context(|| format!("Restoring {} from {}", live.display(), backup.display()))?;
        Ok(())
    }
}
