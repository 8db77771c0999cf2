use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// Filesystem primitives the executor and restore engine go through.
pub trait FileSystem: Send + Sync {
    /// Copies `from` into a new file at `to`.
    ///
    /// Fails with `AlreadyExists` when `to` is taken and leaves it untouched.
    /// A partial `to` created by a failed copy is removed before returning.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let mut source = File::open(from)?;
        let permissions = source.metadata()?.permissions();
        let mut target = OpenOptions::new().write(true).create_new(true).open(to)?;

        let copied = io::copy(&mut source, &mut target).and_then(|bytes| {
            target.sync_all()?;
            target.set_permissions(permissions)?;
            Ok(bytes)
        });
        if copied.is_err() {
            drop(target);
            let _ = fs::remove_file(to);
        }
        copied
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so that dangling links still count as occupied
        fs::symlink_metadata(path).is_ok()
    }
}

/// Moves `from` to `to` without ever replacing an existing file.
///
/// A case-only rename of the same file (`a.txt` -> `A.txt` on a
/// case-insensitive filesystem) is allowed through.
pub fn move_no_clobber(fs: &dyn FileSystem, from: &Path, to: &Path) -> io::Result<()> {
    if fs.exists(to) && !same_path_ignoring_case(from, to) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("移動先に既にファイルがあります: {}", to.display()),
        ));
    }
    fs.rename(from, to)
}

pub fn same_path_ignoring_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{move_no_clobber, FileSystem, StdFileSystem};
    use std::fs;
    use std::io::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn move_no_clobber_refuses_existing_destination() {
        let temp = tempdir().expect("tempdir");
        let from = temp.path().join("a.txt");
        let to = temp.path().join("b.txt");
        fs::write(&from, b"a").expect("write a");
        fs::write(&to, b"b").expect("write b");

        let err = move_no_clobber(&StdFileSystem, &from, &to).expect_err("must not overwrite");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&to).expect("read b"), b"b");
        assert!(from.exists());
    }

    #[test]
    fn move_no_clobber_moves_into_free_name() {
        let temp = tempdir().expect("tempdir");
        let from = temp.path().join("a.txt");
        let to = temp.path().join("c.txt");
        fs::write(&from, b"a").expect("write a");

        move_no_clobber(&StdFileSystem, &from, &to).expect("move");
        assert!(!from.exists());
        assert_eq!(fs::read(&to).expect("read c"), b"a");
    }

    #[test]
    fn copy_refuses_to_replace_an_existing_file() {
        let temp = tempdir().expect("tempdir");
        let from = temp.path().join("a.txt");
        let to = temp.path().join("a.txt.bak");
        fs::write(&from, b"new").expect("write a");
        fs::write(&to, b"keep me").expect("write bak");

        let err = StdFileSystem.copy(&from, &to).expect_err("must not overwrite");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&to).expect("read bak"), b"keep me");
    }

    #[test]
    fn copy_of_missing_source_creates_nothing() {
        let temp = tempdir().expect("tempdir");
        let to = temp.path().join("gone.txt.bak");

        StdFileSystem
            .copy(&temp.path().join("gone.txt"), &to)
            .expect_err("missing source");
        assert!(!to.exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_copy_removes_its_own_partial_file() {
        let temp = tempdir().expect("tempdir");
        // a directory opens fine on unix but every read fails
        let from = temp.path().join("folder");
        fs::create_dir_all(&from).expect("mkdir");
        let to = temp.path().join("folder.bak");

        StdFileSystem.copy(&from, &to).expect_err("read fails");
        assert!(!to.exists());
    }
}
