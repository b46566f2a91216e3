//! Low-level filesystem moves for an import: hardlink-or-copy the media
//! file into place, carry along any matching extras, and journal every
//! step so a mid-flight failure can be rolled back.
//!
//! Uses plain [`std::fs`] calls rather than `tokio::fs`, matching how the
//! downloader handles its own one-shot filesystem writes outside the
//! streaming download path.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::error::ImportError;

/// One filesystem change made during an import, in the order it was made.
/// Replayed in reverse to undo a failed import.
#[derive(Debug)]
enum JournaledAction {
    CreatedDir(PathBuf),
    PlacedFile(PathBuf),
}

/// Accumulates the filesystem changes one import makes, so they can be
/// rolled back as a unit if a later step fails.
#[derive(Debug, Default)]
pub struct ImportJournal {
    actions: Vec<JournaledAction>,
}

impl ImportJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Undoes every journaled action, most recent first. Errors while
    /// rolling back are logged by the caller and otherwise ignored, since
    /// the import has already failed and partial cleanup is still better
    /// than none.
    pub fn rollback(&self) {
        for action in self.actions.iter().rev() {
            match action {
                JournaledAction::PlacedFile(path) => {
                    let _ = fs::remove_file(path);
                }
                JournaledAction::CreatedDir(path) => {
                    let _ = fs::remove_dir(path);
                }
            }
        }
    }
}

/// Creates `dir` (and any missing parents) if it doesn't exist, journaling
/// only the directories this call actually created.
pub fn ensure_dir(dir: &Path, journal: &mut ImportJournal) -> Result<(), ImportError> {
    let mut to_create = Vec::new();
    let mut current = dir;
    while !current.exists() {
        to_create.push(current.to_path_buf());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    fs::create_dir_all(dir)?;
    for created in to_create.into_iter().rev() {
        journal.actions.push(JournaledAction::CreatedDir(created));
    }
    Ok(())
}

/// Places `source` at `destination`, preferring a hardlink (same-volume,
/// instant, no extra disk use) and falling back to a copy-then-fsync when
/// the hardlink fails (e.g. cross-device) or `use_hardlinks` is disabled.
///
/// Either way the destination is built under a temporary name in the same
/// directory and renamed into place at the end, so a reader never observes
/// a partially written file at `destination`.
pub fn place_file(
    source: &Path,
    destination: &Path,
    use_hardlinks: bool,
    journal: &mut ImportJournal,
) -> Result<(), ImportError> {
    if !source.exists() {
        return Err(ImportError::SourceMissing(source.to_path_buf()));
    }
    if destination.exists() {
        return Err(ImportError::DestinationConflict(destination.to_path_buf()));
    }

    let staging_path = staging_path_for(destination);

    let hardlinked = use_hardlinks && fs::hard_link(source, &staging_path).is_ok();
    if !hardlinked {
        fs::copy(source, &staging_path)?;
        let file = File::open(&staging_path)?;
        file.sync_all()?;
    }

    fs::rename(&staging_path, destination)?;
    journal.actions.push(JournaledAction::PlacedFile(destination.to_path_buf()));
    Ok(())
}

/// Applies a Unix permission mode to a file or directory, ignoring the
/// request on platforms with no `chmod` equivalent.
///
/// Failing to apply a configured mode is logged by the caller and otherwise
/// non-fatal; the import itself already succeeded.
pub fn apply_permissions(path: &Path, mode: u32) -> Result<(), ImportError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

fn staging_path_for(destination: &Path) -> PathBuf {
    let file_name = destination.file_name().map_or_else(|| "import".into(), |name| {
        let mut staged = std::ffi::OsString::from(".importing-");
        staged.push(name);
        staged
    });
    destination.with_file_name(file_name)
}

/// Finds sibling files next to `source` that share its stem and carry one
/// of `extra_extensions` (subtitles, `.nfo`, artwork), so they can be
/// imported alongside the media file.
#[must_use]
pub fn find_extras(source: &Path, extra_extensions: &[String]) -> Vec<PathBuf> {
    let Some(parent) = source.parent() else {
        return Vec::new();
    };
    let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(parent) else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_stem().and_then(|s| s.to_str()) == Some(stem)
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| extra_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        })
        .collect()
}
