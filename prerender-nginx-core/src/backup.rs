//! File-level backups of the configuration files being patched
//!
//! A backup lives next to its target under a fixed suffix, so every run
//! addresses the same slot. A backup is valid iff it is a regular file with
//! non-zero size. Backups are never deleted here; retention is up to the
//! caller.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to the target's file name
pub const BACKUP_SUFFIX: &str = ".prerender.backup";

/// Backup slot for `target`
pub fn backup_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    target.with_file_name(name)
}

/// Copy the full content of `target` into its backup slot
///
/// The copy goes through a sibling temporary file and a rename, so the slot
/// never holds a partial backup.
pub fn create_backup(target: &Path) -> Result<PathBuf> {
    let backup = backup_path_for(target);
    let content = fs::read(target).map_err(|e| Error::io(target, e))?;

    let mut tmp_name = backup.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = backup.with_file_name(tmp_name);

    let written = fs::write(&tmp, &content).and_then(|_| fs::rename(&tmp, &backup));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(&backup, e));
    }

    tracing::info!(
        file = %target.display(),
        backup = %backup.display(),
        bytes = content.len(),
        "Backup created"
    );
    Ok(backup)
}

/// Whether `backup` exists, is a regular file and is not empty
pub fn is_valid(backup: &Path) -> bool {
    fs::metadata(backup)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Overwrite `target` with the full content of `backup`
pub fn restore(backup: &Path, target: &Path) -> Result<()> {
    restore_raw(backup, target).map_err(|e| Error::io(target, e))?;
    tracing::info!(
        file = %target.display(),
        backup = %backup.display(),
        "Restored from backup"
    );
    Ok(())
}

fn restore_raw(backup: &Path, target: &Path) -> io::Result<()> {
    let content = fs::read(backup)?;
    fs::write(target, content)
}

/// Targets among `paths` whose backup is valid, i.e. a restore is pending
pub fn pending(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| is_valid(&backup_path_for(p)))
        .cloned()
        .collect()
}

/// Lifecycle of one target file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    NoBackup,
    BackedUp,
    Modified,
    Restored,
    Kept,
}

/// A target file and its backup slot
#[derive(Debug, Clone)]
pub struct BackupSlot {
    pub target: PathBuf,
    pub backup: PathBuf,
    pub state: BackupState,
    /// Whether the backup was written by this run (as opposed to reused)
    pub created: bool,
    /// Target content when this run started; rollback writes this back
    snapshot: Vec<u8>,
}

impl BackupSlot {
    /// Describe `target` without touching the filesystem
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let backup = backup_path_for(&target);
        Self {
            target,
            backup,
            state: BackupState::NoBackup,
            created: false,
            snapshot: Vec::new(),
        }
    }

    /// Reuse a valid backup or create one, and snapshot the target
    ///
    /// A valid backup already in the slot holds the content from before the
    /// first modification, so it is kept rather than overwritten with a
    /// possibly modified file. The snapshot is what a failed run rolls back
    /// to, so edits made since that first run survive.
    pub fn ensure(&mut self) -> Result<()> {
        self.snapshot = fs::read(&self.target).map_err(|e| Error::io(&self.target, e))?;
        if is_valid(&self.backup) {
            tracing::info!(backup = %self.backup.display(), "Reusing existing backup");
        } else {
            self.backup = create_backup(&self.target)?;
            self.created = true;
        }
        self.state = BackupState::BackedUp;
        Ok(())
    }

    /// `BackedUp -> Modified`; refused unless the backup is still valid
    pub fn mark_modified(&mut self) -> Result<()> {
        match self.state {
            BackupState::BackedUp | BackupState::Modified if is_valid(&self.backup) => {
                self.state = BackupState::Modified;
                Ok(())
            }
            _ => Err(Error::BackupUnsafe {
                path: self.backup.clone(),
            }),
        }
    }

    /// `Modified -> Restored`
    pub fn restore(&mut self) -> Result<()> {
        restore(&self.backup, &self.target)?;
        self.state = BackupState::Restored;
        Ok(())
    }

    /// `Modified -> Kept`
    pub fn keep(&mut self) {
        if self.state == BackupState::Modified {
            self.state = BackupState::Kept;
        }
    }
}

/// Backups for every file a run is going to modify
#[derive(Debug, Clone, Default)]
pub struct BackupManager {
    slots: Vec<BackupSlot>,
}

impl BackupManager {
    /// Ensure a backup for each target, in order
    ///
    /// If a later backup fails after earlier ones succeeded, the run has an
    /// incomplete set of backups; this is logged before the error is
    /// returned. Nothing has been modified at that point.
    pub fn prepare(targets: &[PathBuf]) -> Result<Self> {
        let mut slots: Vec<BackupSlot> = Vec::with_capacity(targets.len());
        for target in targets {
            let mut slot = BackupSlot::new(target);
            if let Err(e) = slot.ensure() {
                if !slots.is_empty() {
                    tracing::warn!(
                        failed = %target.display(),
                        backed_up = ?slots.iter().map(|s| s.target.display().to_string()).collect::<Vec<_>>(),
                        "Backup set is incomplete; no file will be modified"
                    );
                }
                return Err(e);
            }
            slots.push(slot);
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[BackupSlot] {
        &self.slots
    }

    /// Every slot must hold a valid backup before anything is modified
    pub fn verify(&self) -> Result<()> {
        match self.slots.iter().find(|s| !is_valid(&s.backup)) {
            Some(slot) => Err(Error::BackupUnsafe {
                path: slot.backup.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn mark_modified(&mut self) -> Result<()> {
        self.slots.iter_mut().try_for_each(BackupSlot::mark_modified)
    }

    /// Put every modified target back to its content from the start of
    /// this run, collecting failures
    ///
    /// The backup files are left alone; they stay available to an explicit
    /// restore.
    pub fn restore_all(&mut self) -> Vec<(PathBuf, io::Error)> {
        let mut failures = Vec::new();
        for slot in self.slots.iter_mut().filter(|s| s.state == BackupState::Modified) {
            if let Err(e) = fs::write(&slot.target, &slot.snapshot) {
                tracing::error!(
                    file = %slot.target.display(),
                    error = %e,
                    "Rolling back failed"
                );
                failures.push((slot.target.clone(), e));
            } else {
                tracing::info!(file = %slot.target.display(), "Rolled back to the content before this run");
                slot.state = BackupState::Restored;
            }
        }
        failures
    }

    pub fn keep_all(&mut self) {
        self.slots.iter_mut().for_each(BackupSlot::keep);
    }
}
