//! Filesystem side of an upgrade.
//!
//! Everything here is blocking and runs on the blocking pool while the
//! upgrade lock is held. Work happens in a hidden staging directory inside
//! the install directory so the final swap is a same-filesystem rename.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{DeployError, DeployResult};

/// Prefix of the per-upgrade staging directory under the install path.
pub const STAGING_PREFIX: &str = ".oms-staging-";

/// Archive directory whose contents are merged into `lib/`.
pub const UPGRADE_DIR: &str = "upgrade";

/// Live library directory under the install path.
pub const LIB_DIR: &str = "lib";

const ARCHIVE_DIR: &str = "archive";
const EXTRACT_DIR: &str = "extracted";
const BACKUP_DIR: &str = "lib.old";

/// What an install changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Files copied from the archive's `upgrade/` tree into `lib/`.
    pub merged_files: usize,
    /// Archive root-level files moved into the install directory.
    pub root_files: Vec<String>,
}

/// Number of regular files directly under `dir`, including symlinks to
/// regular files. Subdirectories are not counted and a missing directory
/// counts as empty.
pub fn count_root_files(dir: &Path) -> DeployResult<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(DeployError::io(dir, e)),
    };
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| DeployError::io(dir, e))?;
        // Follows symlinks; a dangling link is not a file.
        if entry.path().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// Unpack `bytes` (a zip archive named `archive_name`) into `install`.
///
/// The archive is written and extracted in a staging directory, the
/// `upgrade/` tree is merged over a copy of the live `lib/`, and the result
/// replaces `lib/` by rename. The staging directory is always removed.
pub fn install_package(
    install: &Path,
    archive_name: &str,
    bytes: &[u8],
) -> DeployResult<InstallOutcome> {
    let file_name = Path::new(archive_name)
        .file_name()
        .ok_or_else(|| DeployError::Validation(format!("invalid archive name {archive_name:?}")))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(install)
        .map_err(|e| DeployError::io(install, e))?;
    debug!(staging = ?staging.path(), "staging directory created");

    let result = stage_and_swap(install, staging.path(), Path::new(file_name), bytes);

    let staging_path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!(staging = ?staging_path, error = %e, "failed to remove staging directory");
    }
    result
}

fn stage_and_swap(
    install: &Path,
    staging: &Path,
    file_name: &Path,
    bytes: &[u8],
) -> DeployResult<InstallOutcome> {
    let archive_dir = staging.join(ARCHIVE_DIR);
    fs::create_dir(&archive_dir).map_err(|e| DeployError::io(&archive_dir, e))?;
    let archive_path = archive_dir.join(file_name);
    fs::write(&archive_path, bytes).map_err(|e| DeployError::io(&archive_path, e))?;

    let extracted = staging.join(EXTRACT_DIR);
    let file = fs::File::open(&archive_path).map_err(|e| DeployError::io(&archive_path, e))?;
    let mut archive = ZipArchive::new(file)?;
    archive.extract(&extracted)?;
    debug!(entries = archive.len(), archive = ?archive_path, "archive extracted");

    let upgrade_root = extracted.join(UPGRADE_DIR);
    if !upgrade_root.is_dir() {
        return Err(DeployError::Validation(format!(
            "archive {} has no {UPGRADE_DIR}/ directory",
            file_name.display()
        )));
    }

    let live_lib = install.join(LIB_DIR);
    let staged_lib = staging.join(LIB_DIR);
    if live_lib.is_dir() {
        let copied = copy_tree(&live_lib, &staged_lib)?;
        debug!(copied, "live lib copied to staging");
    } else {
        fs::create_dir_all(&staged_lib).map_err(|e| DeployError::io(&staged_lib, e))?;
    }
    let merged_files = copy_tree(&upgrade_root, &staged_lib)?;

    let root_files = archive_root_files(&extracted)?;

    swap_dir(&staged_lib, &live_lib, &staging.join(BACKUP_DIR))?;
    info!(lib = ?live_lib, merged_files, "lib directory replaced");

    for name in &root_files {
        let from = extracted.join(name);
        let to = install.join(name);
        if !to.exists() {
            warn!(file = ?to, "archive adds a new file to the install root");
        }
        fs::rename(&from, &to).map_err(|e| DeployError::io(&to, e))?;
        info!(file = ?to, "root file installed");
    }

    Ok(InstallOutcome {
        merged_files,
        root_files,
    })
}

/// Names of regular files at the archive root. Top-level directories other
/// than `upgrade/` are not installed.
fn archive_root_files(extracted: &Path) -> DeployResult<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(extracted).map_err(|e| DeployError::io(extracted, e))? {
        let entry = entry.map_err(|e| DeployError::io(extracted, e))?;
        let file_type = entry.file_type().map_err(|e| DeployError::io(entry.path(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if file_type.is_file() {
            files.push(name);
        } else if name != UPGRADE_DIR {
            warn!(entry = %name, "ignoring archive entry outside {UPGRADE_DIR}/");
        }
    }
    files.sort();
    Ok(files)
}

/// Recursively copy every file under `src` into `dst`, overwriting files
/// that already exist. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> DeployResult<usize> {
    fs::create_dir_all(dst).map_err(|e| DeployError::io(dst, e))?;
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| DeployError::io(src, e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| DeployError::io(&target, e))?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| DeployError::io(&target, e))?;
            copied += 1;
        } else {
            debug!(path = ?entry.path(), "skipping non-regular file");
        }
    }
    Ok(copied)
}

/// Move `staged` into place at `live`, parking the current `live` at
/// `backup`. If the second rename fails the previous directory is put back.
fn swap_dir(staged: &Path, live: &Path, backup: &Path) -> DeployResult<()> {
    let had_live = live.exists();
    if had_live {
        fs::rename(live, backup).map_err(|e| DeployError::io(live, e))?;
    }
    if let Err(e) = fs::rename(staged, live) {
        if had_live {
            if let Err(restore) = fs::rename(backup, live) {
                warn!(lib = ?live, error = %restore, "failed to restore previous lib directory");
            }
        }
        return Err(DeployError::io(live, e));
    }
    Ok(())
}
