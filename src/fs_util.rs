//! Small filesystem helpers shared by the dedup index, key vault, and
//! transaction manager: directory creation with the vault's permission
//! bits, and atomic write-to-temp-then-rename.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Creates `dir` (and parents) if missing, then applies `mode` on Unix.
pub fn ensure_dir(dir: &Path, #[cfg_attr(not(unix), allow(unused_variables))] mode: u32) -> Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Writes `bytes` to `path` via a sibling `.tmp` file, then renames into
/// place. Rename is the only operation that changes what a reader observes.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = sibling_tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Builds the `.tmp` sibling path used by [`write_atomic`] and the dedup
/// index's own persistence.
pub fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp").to_owned();
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// `true` if `path` exists, tolerating any error other than "not found" by
/// propagating it (a permissions error should not be silently read as
/// "absent").
pub fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
