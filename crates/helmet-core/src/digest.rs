//! Canonical content digest of a directory tree
//!
//! Two trees hash to the same value iff they hold the same set of
//! (relative path, file content) pairs. Timestamps, ownership, permissions and
//! the order in which the filesystem enumerates entries never reach the hasher.

use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Result;

/// Prefix of every digest string produced here
pub const DIGEST_PREFIX: &str = "sha256:";

/// Compute the canonical digest of a directory
///
/// Each regular file is framed as `len(path) | path | len(content) | content`
/// (lengths as big-endian u64) in relative-path order, so no two different
/// trees can produce the same byte stream.
pub fn digest_dir(root: &Path) -> Result<String> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_bytes(entry.path().strip_prefix(root).unwrap_or(entry.path()));
        files.push((relative, entry.into_path()));
    }

    // Byte-wise order of the normalized path, identical on every host
    files.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut hasher = Sha256::new();

    for (relative, path) in files {
        let content = std::fs::read(&path)?;

        hasher.update((relative.len() as u64).to_be_bytes());
        hasher.update(&relative);
        hasher.update((content.len() as u64).to_be_bytes());
        hasher.update(&content);
    }

    Ok(format!("{}{}", DIGEST_PREFIX, hex::encode(hasher.finalize())))
}

/// Raw bytes of a relative path, components joined with `/`
fn relative_bytes(relative: &Path) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (i, component) in relative.components().enumerate() {
        if i > 0 {
            bytes.push(b'/');
        }
        bytes.extend_from_slice(os_bytes(component.as_os_str()));
    }
    bytes
}

#[cfg(unix)]
fn os_bytes(name: &OsStr) -> &[u8] {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes()
}

#[cfg(not(unix))]
fn os_bytes(name: &OsStr) -> &[u8] {
    name.as_encoded_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_same_content_same_digest() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();

        write(a.path(), "one.yaml", "kind: A");
        write(a.path(), "sub/two.yaml", "kind: B");

        // Reverse creation order on the second tree
        write(b.path(), "sub/two.yaml", "kind: B");
        write(b.path(), "one.yaml", "kind: A");

        assert_eq!(digest_dir(a.path()).unwrap(), digest_dir(b.path()).unwrap());
    }

    #[test]
    fn test_timestamps_ignored() {
        let a = TempDir::new().unwrap();
        write(a.path(), "one.yaml", "kind: A");
        let before = digest_dir(a.path()).unwrap();

        let file = fs::File::options()
            .write(true)
            .open(a.path().join("one.yaml"))
            .unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(42))
            .unwrap();

        assert_eq!(before, digest_dir(a.path()).unwrap());
    }

    #[test]
    fn test_content_change_changes_digest() {
        let a = TempDir::new().unwrap();
        write(a.path(), "one.yaml", "kind: A");
        let before = digest_dir(a.path()).unwrap();

        write(a.path(), "one.yaml", "kind: B");
        assert_ne!(before, digest_dir(a.path()).unwrap());
    }

    #[test]
    fn test_rename_changes_digest() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "one.yaml", "kind: A");
        write(b.path(), "two.yaml", "kind: A");

        assert_ne!(digest_dir(a.path()).unwrap(), digest_dir(b.path()).unwrap());
    }

    #[test]
    fn test_framing_is_unambiguous() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "ab", "c");
        write(b.path(), "a", "bc");

        assert_ne!(digest_dir(a.path()).unwrap(), digest_dir(b.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_stay_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join(OsStr::from_bytes(b"x\xff")), "same").unwrap();
        fs::write(b.path().join(OsStr::from_bytes(b"x\xfe")), "same").unwrap();

        assert_ne!(digest_dir(a.path()).unwrap(), digest_dir(b.path()).unwrap());
    }

    #[test]
    fn test_empty_directories_do_not_count() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "one.yaml", "kind: A");
        write(b.path(), "one.yaml", "kind: A");
        fs::create_dir_all(b.path().join("empty/nested")).unwrap();

        assert_eq!(digest_dir(a.path()).unwrap(), digest_dir(b.path()).unwrap());
    }

    #[test]
    fn test_digest_format() {
        let a = TempDir::new().unwrap();
        let digest = digest_dir(a.path()).unwrap();
        assert!(digest.starts_with(DIGEST_PREFIX));
        assert_eq!(digest.len(), DIGEST_PREFIX.len() + 64);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let a = TempDir::new().unwrap();
        let err = digest_dir(&a.path().join("missing")).unwrap_err();
        assert!(matches!(err, crate::CoreError::Io(_)));
    }
}
