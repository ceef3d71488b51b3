//! Small filesystem utilities shared across workspace crates.
//!
//! The store never exposes a partially written file under its final name:
//! - write to a temp file in the same directory (avoids cross-device renames)
//! - flush + `sync_all`
//! - rename into place, either replacing ([`atomic_write`]) or failing when the
//!   destination already exists ([`atomic_create`])

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

#[derive(Debug)]
pub enum AtomicWriteError<E> {
    Io(io::Error),
    Writer(E),
}

impl<E> From<io::Error> for AtomicWriteError<E> {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for AtomicWriteError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicWriteError::Io(err) => write!(f, "io error: {err}"),
            AtomicWriteError::Writer(err) => write!(f, "write error: {err}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AtomicWriteError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AtomicWriteError::Io(err) => Some(err),
            AtomicWriteError::Writer(err) => Some(err),
        }
    }
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` returns `Some("")` for bare relative file names like `meta.json`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Atomically write a file by:
/// - creating parent directories (if needed)
/// - writing to a temp file in the same directory
/// - flushing + syncing the temp file
/// - renaming it into place with replace semantics
///
/// If `write_fn` returns an error, the destination file is left untouched.
pub fn atomic_write<T, E>(
    dest: impl AsRef<Path>,
    write_fn: impl FnOnce(&mut File) -> Result<T, E>,
) -> Result<T, AtomicWriteError<E>> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir).map_err(AtomicWriteError::Io)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(AtomicWriteError::Io)?;
    let out = write_fn(tmp.as_file_mut()).map_err(AtomicWriteError::Writer)?;

    tmp.as_file_mut().flush().map_err(AtomicWriteError::Io)?;
    tmp.as_file().sync_all().map_err(AtomicWriteError::Io)?;

    let tmp_path = tmp.into_temp_path();
    replace_file(tmp_path.as_ref(), dest).map_err(AtomicWriteError::Io)?;

    // Best-effort: the file is already in place.
    let _ = sync_parent_dir(dest);

    Ok(out)
}

/// Convenience helper for atomically writing a full byte slice to disk.
pub fn atomic_write_bytes(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write(dest, |file| file.write_all(bytes)).map_err(flatten_io)
}

/// Atomically create `dest` with `bytes`, failing with [`io::ErrorKind::AlreadyExists`] if
/// something is already there.
///
/// The file's contents are synced before the rename. Unlike [`atomic_write`] this does not
/// create parent directories or sync the parent; callers writing many files into one
/// directory sync it once it is complete (see [`sync_dir`]).
pub fn atomic_create(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(dest).map_err(|err| err.error)?;
    Ok(())
}

/// Run a single filesystem operation, retrying it once if the first attempt failed with a
/// transient error kind.
pub fn retry_transient<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(err) if is_transient(&err) => op(),
        other => other,
    }
}

pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Sync a directory's metadata (entries created/renamed inside it).
///
/// A no-op where directories cannot be opened as files (Windows); there the rename itself
/// is the durability point.
pub fn sync_dir(dir: impl AsRef<Path>) -> io::Result<()> {
    #[cfg(unix)]
    {
        File::open(dir.as_ref())?.sync_all()
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    sync_dir(parent_dir_or_dot(path))
}

fn flatten_io(err: AtomicWriteError<io::Error>) -> io::Error {
    match err {
        AtomicWriteError::Io(err) => err,
        AtomicWriteError::Writer(err) => err,
    }
}

fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt as _;
        use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_REPLACE_EXISTING};

        fn to_wide_null(path: &Path) -> Vec<u16> {
            let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
            wide.push(0);
            wide
        }

        let from_w = to_wide_null(from);
        let to_w = to_wide_null(to);
        let ok = unsafe { MoveFileExW(from_w.as_ptr(), to_w.as_ptr(), MOVEFILE_REPLACE_EXISTING) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

/// Path of a sibling file formed by appending `suffix` to the file name, e.g. the detached
/// digest `_metadata.json.sha256` next to `_metadata.json`.
pub fn sibling_path_with_suffix(path: impl AsRef<Path>, suffix: &str) -> PathBuf {
    let path = path.as_ref();
    let dir = parent_dir_or_dot(path);
    let file_name = path.file_name().unwrap_or_default();
    dir.join(format!("{}{}", file_name.to_string_lossy(), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn atomic_write_does_not_clobber_existing_file_on_write_error() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("existing.json");

        std::fs::write(&dest, b"sentinel").expect("write sentinel");

        let err = atomic_write(&dest, |file| {
            file.write_all(b"partial").expect("write to temp file");
            Err::<(), _>(io::Error::new(io::ErrorKind::Other, "simulated write failure"))
        })
        .expect_err("expected atomic_write to return error");

        assert_eq!(std::fs::read(&dest).expect("read dest"), b"sentinel", "{err}");
        assert_eq!(file_names(tmp.path()), vec!["existing.json".to_string()]);
    }

    #[test]
    fn atomic_create_refuses_to_replace() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("7");

        atomic_create(&dest, b"first\n").expect("create");
        let err = atomic_create(&dest, b"second\n").expect_err("second create must fail");

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&dest).expect("read"), b"first\n");
        assert_eq!(file_names(tmp.path()), vec!["7".to_string()]);
    }

    #[test]
    fn created_files_and_their_directory_can_be_synced() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let group = tmp.path().join("rows_0-9");
        std::fs::create_dir(&group).expect("mkdir");
        for row in 0..3 {
            atomic_create(group.join(row.to_string()), format!("{row}\n").as_bytes())
                .expect("create");
        }
        sync_dir(&group).expect("sync group");
        sync_dir(tmp.path()).expect("sync root");
        assert_eq!(file_names(&group), vec!["0", "1", "2"]);
        assert_eq!(std::fs::read(group.join("2")).expect("read"), b"2\n");
    }

    #[test]
    fn retry_transient_retries_exactly_once() {
        let mut calls = 0;
        let out = retry_transient(|| {
            calls += 1;
            if calls == 1 {
                Err(io::Error::new(io::ErrorKind::Interrupted, "eintr"))
            } else {
                Ok(calls)
            }
        })
        .expect("second attempt succeeds");
        assert_eq!(out, 2);

        let mut calls = 0;
        let err = retry_transient(|| -> io::Result<()> {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        })
        .expect_err("not transient");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(calls, 1);
    }

    #[test]
    fn sibling_path_appends_suffix() {
        let p = sibling_path_with_suffix("/data/set/_metadata.json", ".sha256");
        assert_eq!(p, PathBuf::from("/data/set/_metadata.json.sha256"));
    }
}
