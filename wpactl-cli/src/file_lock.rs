use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::PathBuf;

/// Path of the lock file guarding `interface`.
pub fn lock_path(interface: &str) -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or(std::env::temp_dir());
    path.push("wpactl");
    path.push(format!("{interface}.lock"));
    path
}

/// Takes the exclusive lock for `interface`.
///
/// Only one front end may drive an interface's control channel at a time;
/// the lock is released when the returned file is dropped.
pub fn acquire_interface_lock(interface: &str) -> Result<File> {
    let lock_path = lock_path(interface);
    if let Some(dir) = lock_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create lock directory {}", dir.display()))?;
    }

    let file = File::create(&lock_path)
        .with_context(|| format!("Failed to create lock file {}", lock_path.display()))?;

    // Exclusive lock; fails if another instance holds it
    file.try_lock_exclusive()
        .with_context(|| format!("Another wpactl instance is already driving {interface}"))?;

    Ok(file)
}
