//! Atomic file replacement.
//!
//! Content is written to a temporary file in the target directory and
//! renamed over the target, so observers see either the old file or the
//! complete new one. A symlinked target is written through: the link stays
//! and the file it points at is replaced.

use std::borrow::Cow;
use std::fs::{self, FileTimes};
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use sink_core::{ContentHash, FilesystemError};

/// Replace `to` with `from`'s content, permissions and timestamps.
///
/// Missing parent directories of `to` are created. Returns the signature of
/// the copied content.
pub fn copy_atomic(from: &Path, to: &Path) -> Result<ContentHash, FilesystemError> {
    let metadata = fs::metadata(from).map_err(|e| FilesystemError::io(from, e))?;
    let content = fs::read(from).map_err(|e| FilesystemError::io(from, e))?;

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }

    write_atomic(to, &content, Some(metadata.permissions()), Some(times))?;
    tracing::debug!(from = %from.display(), to = %to.display(), bytes = content.len(), "copied");
    Ok(ContentHash::of_bytes(&content))
}

/// Write `content` to `path` through a temporary sibling file.
pub fn write_atomic(
    path: &Path,
    content: &[u8],
    permissions: Option<fs::Permissions>,
    times: Option<FileTimes>,
) -> Result<(), FilesystemError> {
    let resolved = resolve_link(path)?;
    let path: &Path = &resolved;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| FilesystemError::io(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| FilesystemError::io(parent, e))?;
    temp.write_all(content)
        .map_err(|e| FilesystemError::io(temp.path(), e))?;

    let file = temp.as_file();
    if let Some(permissions) = permissions {
        file.set_permissions(permissions)
            .map_err(|e| FilesystemError::io(path, e))?;
    }
    if let Some(times) = times {
        file.set_times(times)
            .map_err(|e| FilesystemError::io(path, e))?;
    }
    file.sync_all().map_err(|e| FilesystemError::io(path, e))?;

    temp.persist(path)
        .map_err(|e| FilesystemError::io(path, e.error))?;
    Ok(())
}

/// The file a symlinked `path` points at, or `path` itself.
fn resolve_link(path: &Path) -> Result<Cow<'_, Path>, FilesystemError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {}
        _ => return Ok(Cow::Borrowed(path)),
    }
    if let Ok(target) = fs::canonicalize(path) {
        return Ok(Cow::Owned(target));
    }

    // Dangling: create the file the link names.
    let target = fs::read_link(path).map_err(|e| FilesystemError::io(path, e))?;
    Ok(match path.parent() {
        Some(parent) if target.is_relative() => Cow::Owned(parent.join(target)),
        _ => Cow::Owned(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_copy_keeps_mtime_and_content() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("from.txt");
        fs::write(&from, "payload").unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        File::options()
            .write(true)
            .open(&from)
            .unwrap()
            .set_modified(stamp)
            .unwrap();

        let to = temp.path().join("nested/dir/to.txt");
        let hash = copy_atomic(&from, &to).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "payload");
        assert_eq!(fs::metadata(&to).unwrap().modified().unwrap(), stamp);
        assert_eq!(hash, ContentHash::of_bytes(b"payload"));
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new", None, None).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let from = temp.path().join("script.sh");
        fs::write(&from, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&from, fs::Permissions::from_mode(0o750)).unwrap();

        let to = temp.path().join("copy.sh");
        copy_atomic(&from, &to).unwrap();
        assert_eq!(fs::metadata(&to).unwrap().permissions().mode() & 0o777, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_onto_symlink_keeps_link() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("dotfiles/bashrc");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, "old").unwrap();
        let link = temp.path().join("bashrc");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let from = temp.path().join("from.txt");
        fs::write(&from, "new").unwrap();
        copy_atomic(&from, &link).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_through_dangling_relative_symlink() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("config");
        std::os::unix::fs::symlink("real/config", &link).unwrap();

        write_atomic(&link, b"created", None, None).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(temp.path().join("real/config")).unwrap(),
            "created"
        );
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = copy_atomic(&temp.path().join("nope"), &temp.path().join("to")).unwrap_err();
        assert!(matches!(err, FilesystemError::NotFound { .. }));
    }
}
